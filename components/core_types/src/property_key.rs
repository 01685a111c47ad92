//! Property keys and array index canonicalization.
//!
//! Property lookup treats `obj[0]` and `obj["0"]` as the same property, so
//! keys must be canonical before they reach structures, butterflies or
//! caches. This module defines the key type and the strict parser that
//! decides which strings count as array indices.

use crate::handles::{Atom, SymbolId};

/// Largest valid array index.
///
/// Array indices are integers in `0..=u32::MAX - 1`; `u32::MAX` itself is
/// excluded because array `length` must be able to exceed every index by
/// one.
pub const MAX_ARRAY_INDEX: u32 = u32::MAX - 1;

/// A property key: an array index, an interned name, or a symbol.
///
/// Keys are canonical: a string that spells a valid array index is always
/// represented as [`PropertyKey::Index`], so `"0"` and index `0` are the
/// same key. Non-canonical numeric strings such as `"00"` or `"1e3"` stay
/// names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PropertyKey {
    /// Canonical array index in `0..=MAX_ARRAY_INDEX`
    Index(u32),
    /// Interned string name
    Name(Atom),
    /// Symbol key
    Symbol(SymbolId),
}

impl PropertyKey {
    /// Returns the array index if this key is one.
    pub fn as_index(&self) -> Option<u32> {
        match self {
            PropertyKey::Index(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns whether this key is an array index.
    pub fn is_index(&self) -> bool {
        matches!(self, PropertyKey::Index(_))
    }

    /// Returns whether this key is a symbol.
    pub fn is_symbol(&self) -> bool {
        matches!(self, PropertyKey::Symbol(_))
    }
}

/// Parses a string as a canonical array index.
///
/// Returns `Some` only for strings that are the canonical decimal form of
/// an integer in `0..=MAX_ARRAY_INDEX`: no sign, no leading zeros, no
/// whitespace. `"0"` parses; `"00"`, `"-1"`, `"1.0"` and `"4294967295"` do
/// not.
///
/// # Examples
///
/// ```
/// use core_types::parse_array_index;
///
/// assert_eq!(parse_array_index("0"), Some(0));
/// assert_eq!(parse_array_index("4294967294"), Some(4294967294));
/// assert_eq!(parse_array_index("00"), None);
/// assert_eq!(parse_array_index("4294967295"), None);
/// ```
pub fn parse_array_index(s: &str) -> Option<u32> {
    // u32::MAX has 10 digits; anything longer cannot be in range.
    if s.is_empty() || s.len() > 10 {
        return None;
    }
    if s == "0" {
        return Some(0);
    }
    if s.starts_with('0') || !s.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let n: u64 = s.parse().ok()?;
    if n <= MAX_ARRAY_INDEX as u64 {
        Some(n as u32)
    } else {
        None
    }
}
