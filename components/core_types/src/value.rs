//! JavaScript value representation using a tagged union.
//!
//! This module provides the core `Value` enum that represents all possible
//! JavaScript values. Primitives are stored inline, while objects are
//! referenced through handles into the runtime's heap.

use crate::handles::{ObjectRef, SymbolId};
use num_bigint::BigInt;
use num_traits::Zero;
use std::fmt;
use std::rc::Rc;

/// Represents any JavaScript value.
///
/// This enum uses a tagged representation for efficient value handling.
/// Numbers keep the int32/double split: an integral number in int32 range is
/// stored as [`Value::Int32`], everything else (including `-0.0`, `NaN` and
/// the infinities) as [`Value::Double`]. Use [`Value::number`] to get the
/// canonical representation of an `f64`.
///
/// Equality is explicit. `PartialEq` compares representations (bit equality
/// for doubles) and is meant for tests; language-level comparison goes
/// through [`Value::strict_equals`], [`Value::same_value`] and
/// [`Value::same_value_zero`].
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// let number = Value::number(42.0);
/// assert!(matches!(number, Value::Int32(42)));
///
/// let negative_zero = Value::number(-0.0);
/// assert!(matches!(negative_zero, Value::Double(_)));
/// assert!(negative_zero.strict_equals(&Value::Int32(0)));
/// assert!(!negative_zero.same_value(&Value::Int32(0)));
/// ```
#[derive(Debug, Clone)]
pub enum Value {
    /// JavaScript undefined value
    Undefined,
    /// JavaScript null value
    Null,
    /// JavaScript boolean (true or false)
    Boolean(bool),
    /// Integral number in int32 range (tagged small-integer representation)
    Int32(i32),
    /// IEEE 754 double-precision floating point
    Double(f64),
    /// JavaScript string value (immutable, shared)
    String(Rc<str>),
    /// JavaScript symbol, identified by its registry id
    Symbol(SymbolId),
    /// JavaScript BigInt (arbitrary precision integer)
    BigInt(Rc<BigInt>),
    /// Heap-allocated object, referenced by handle
    Object(ObjectRef),
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::Int32(a), Value::Int32(b)) => a == b,
            (Value::Double(a), Value::Double(b)) => a.to_bits() == b.to_bits(),
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

impl Value {
    /// Creates a number value in canonical representation.
    ///
    /// Integral numbers in int32 range become [`Value::Int32`]; `-0.0`,
    /// `NaN`, the infinities and all other numbers stay [`Value::Double`].
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(matches!(Value::number(1.0), Value::Int32(1)));
    /// assert!(matches!(Value::number(1.5), Value::Double(_)));
    /// assert!(matches!(Value::number(-0.0), Value::Double(_)));
    /// assert!(matches!(Value::number(f64::NAN), Value::Double(_)));
    /// ```
    pub fn number(n: f64) -> Value {
        if n == 0.0 && n.is_sign_negative() {
            return Value::Double(n); // -0.0 must stay a double
        }
        if n.fract() == 0.0 && n >= i32::MIN as f64 && n <= i32::MAX as f64 {
            Value::Int32(n as i32)
        } else {
            Value::Double(n)
        }
    }

    /// Creates a string value.
    pub fn string(s: impl Into<Rc<str>>) -> Value {
        Value::String(s.into())
    }

    /// Returns the numeric value if this is a number (Int32 or Double).
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Int32(n) => Some(*n as f64),
            Value::Double(n) => Some(*n),
            _ => None,
        }
    }

    /// Returns the object handle if this is an object.
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            Value::Object(obj) => Some(*obj),
            _ => None,
        }
    }

    /// Returns whether this value is a number (Int32 or Double).
    pub fn is_number(&self) -> bool {
        matches!(self, Value::Int32(_) | Value::Double(_))
    }

    /// Returns whether this value is an object.
    pub fn is_object(&self) -> bool {
        matches!(self, Value::Object(_))
    }

    /// Returns whether this value is undefined.
    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// Returns whether this value is undefined or null.
    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Undefined | Value::Null)
    }

    /// Returns whether this value is truthy in JavaScript semantics.
    ///
    /// In JavaScript, the following values are falsy:
    /// - undefined
    /// - null
    /// - false
    /// - 0 (including -0) and NaN
    /// - "" (empty string)
    /// - 0n
    ///
    /// All other values are truthy, including all objects.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert!(!Value::Undefined.is_truthy());
    /// assert!(!Value::Null.is_truthy());
    /// assert!(!Value::Int32(0).is_truthy());
    /// assert!(!Value::Double(f64::NAN).is_truthy());
    ///
    /// assert!(Value::Boolean(true).is_truthy());
    /// assert!(Value::Int32(42).is_truthy());
    /// ```
    pub fn is_truthy(&self) -> bool {
        match self {
            Value::Undefined => false,
            Value::Null => false,
            Value::Boolean(b) => *b,
            Value::Int32(n) => *n != 0,
            Value::Double(n) => !n.is_nan() && *n != 0.0,
            Value::String(s) => !s.is_empty(), // Empty string is falsy
            Value::Symbol(_) => true,
            Value::BigInt(n) => !n.is_zero(), // 0n is falsy
            Value::Object(_) => true, // All objects are truthy
        }
    }

    /// Returns the JavaScript typeof result for this value.
    ///
    /// # Examples
    ///
    /// ```
    /// use core_types::Value;
    ///
    /// assert_eq!(Value::Undefined.type_of(), "undefined");
    /// assert_eq!(Value::Null.type_of(), "object");
    /// assert_eq!(Value::Int32(42).type_of(), "number");
    /// ```
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "object", // JavaScript quirk
            Value::Boolean(_) => "boolean",
            Value::Int32(_) | Value::Double(_) => "number",
            Value::String(_) => "string",
            Value::Symbol(_) => "symbol",
            Value::BigInt(_) => "bigint",
            Value::Object(_) => "object",
        }
    }

    /// JavaScript strict equality (`===`).
    ///
    /// Numbers compare numerically across the Int32/Double split, so
    /// `1 === 1.0` and `0 === -0` hold while `NaN === NaN` does not.
    /// Strings compare by content, symbols and objects by identity.
    pub fn strict_equals(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return a == b;
        }
        self.non_numeric_equals(other)
    }

    /// The SameValue algorithm (`Object.is`).
    ///
    /// Like strict equality except that `NaN` matches `NaN` and `+0` does
    /// not match `-0`.
    pub fn same_value(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            if a.is_nan() && b.is_nan() {
                return true;
            }
            return a.to_bits() == b.to_bits();
        }
        self.non_numeric_equals(other)
    }

    /// The SameValueZero algorithm.
    ///
    /// Like SameValue except that `+0` matches `-0`. This is the equality
    /// used by `Array.prototype.includes`.
    pub fn same_value_zero(&self, other: &Value) -> bool {
        if let (Some(a), Some(b)) = (self.as_number(), other.as_number()) {
            return (a.is_nan() && b.is_nan()) || a == b;
        }
        self.non_numeric_equals(other)
    }

    fn non_numeric_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Undefined, Value::Undefined) => true,
            (Value::Null, Value::Null) => true,
            (Value::Boolean(a), Value::Boolean(b)) => a == b,
            (Value::String(a), Value::String(b)) => a == b,
            (Value::Symbol(a), Value::Symbol(b)) => a == b,
            (Value::BigInt(a), Value::BigInt(b)) => a == b,
            (Value::Object(a), Value::Object(b)) => a == b,
            _ => false,
        }
    }
}

/// Implementation of Display trait for JavaScript string conversion.
///
/// This follows JavaScript's `String()` conversion rules:
/// - undefined → "undefined"
/// - null → "null"
/// - boolean → "true" or "false"
/// - number → decimal representation
/// - object → "[object Object]" (simplified)
///
/// # Examples
///
/// ```
/// use core_types::Value;
///
/// assert_eq!(Value::Undefined.to_string(), "undefined");
/// assert_eq!(Value::Int32(42).to_string(), "42");
/// assert_eq!(Value::Double(f64::NAN).to_string(), "NaN");
/// ```
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => write!(f, "undefined"),
            Value::Null => write!(f, "null"),
            Value::Boolean(b) => write!(f, "{}", if *b { "true" } else { "false" }),
            Value::Int32(n) => write!(f, "{}", n),
            Value::Double(n) => {
                if n.is_nan() {
                    write!(f, "NaN")
                } else if n.is_infinite() {
                    if n.is_sign_positive() {
                        write!(f, "Infinity")
                    } else {
                        write!(f, "-Infinity")
                    }
                } else if n.fract() == 0.0 && n.abs() < 1e15 {
                    // Integer-valued doubles display without decimal point
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::String(s) => write!(f, "{}", s),
            Value::Symbol(id) => write!(f, "Symbol({})", id.0),
            Value::BigInt(n) => write!(f, "{}n", n),
            Value::Object(_) => write!(f, "[object Object]"),
        }
    }
}
