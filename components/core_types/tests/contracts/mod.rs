//! Contract compliance tests for core_types
//!
//! These tests verify the public API surface other components rely on:
//! every value variant is constructible, handles are plain copyable ids,
//! and the three equality algorithms diverge exactly where the language
//! says they do.

use core_types::{Atom, ErrorKind, JsError, ObjectRef, PropertyKey, SymbolId, Value};
use std::rc::Rc;

// ============================================================================
// Value variant contract
// ============================================================================

#[test]
fn test_value_has_all_variants() {
    let _: Value = Value::Undefined;
    let _: Value = Value::Null;
    let _: Value = Value::Boolean(true);
    let _: Value = Value::Int32(i32::MIN);
    let _: Value = Value::Double(f64::MAX);
    let _: Value = Value::String(Rc::from("s"));
    let _: Value = Value::Symbol(SymbolId(0));
    let _: Value = Value::BigInt(Rc::new(num_bigint::BigInt::from(0u8)));
    let _: Value = Value::Object(ObjectRef(0));
}

#[test]
fn test_value_is_cheaply_clonable() {
    // Strings and bigints are shared, not copied
    let s = Value::string("shared");
    let t = s.clone();
    assert!(s.strict_equals(&t));
}

#[test]
fn test_canonical_number_contract() {
    // Integral in-range doubles collapse to Int32; -0.0 never does.
    for n in [-1.0, 0.0, 1.0, 1024.0] {
        assert!(matches!(Value::number(n), Value::Int32(_)));
    }
    for n in [-0.0, 0.5, f64::NAN, 1e100] {
        assert!(matches!(Value::number(n), Value::Double(_)));
    }
}

// ============================================================================
// Equality algorithm contract
// ============================================================================

#[test]
fn test_equality_algorithms_diverge_only_on_zero_and_nan() {
    let nan = Value::Double(f64::NAN);
    let pos_zero = Value::Int32(0);
    let neg_zero = Value::Double(-0.0);

    // strict_equals: NaN != NaN, +0 == -0
    assert!(!nan.strict_equals(&nan));
    assert!(pos_zero.strict_equals(&neg_zero));

    // same_value: NaN == NaN, +0 != -0
    assert!(nan.same_value(&nan));
    assert!(!pos_zero.same_value(&neg_zero));

    // same_value_zero: NaN == NaN, +0 == -0
    assert!(nan.same_value_zero(&nan));
    assert!(pos_zero.same_value_zero(&neg_zero));
}

// ============================================================================
// Handle and key contract
// ============================================================================

#[test]
fn test_handles_are_copy() {
    fn takes_copy<T: Copy>(_: T) {}
    takes_copy(ObjectRef(0));
    takes_copy(Atom(0));
    takes_copy(SymbolId(0));
    takes_copy(PropertyKey::Index(0));
}

#[test]
fn test_keys_are_hashable() {
    use std::collections::HashSet;
    let mut set = HashSet::new();
    set.insert(PropertyKey::Index(0));
    set.insert(PropertyKey::Name(Atom(0)));
    set.insert(PropertyKey::Symbol(SymbolId(0)));
    assert_eq!(set.len(), 3);
    assert!(set.contains(&PropertyKey::Index(0)));
}

// ============================================================================
// Error contract
// ============================================================================

#[test]
fn test_error_kinds() {
    let _ = ErrorKind::TypeError;
    let _ = ErrorKind::RangeError;
    let _ = ErrorKind::InternalError;
}

#[test]
fn test_error_implements_std_error() {
    fn takes_error<E: std::error::Error>(_: E) {}
    takes_error(JsError::type_error("x"));
}
