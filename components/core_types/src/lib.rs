//! Core JavaScript value types, property keys, and error handling.
//!
//! This crate provides the foundational types for a JavaScript object
//! model, including value representation, handle types, canonical property
//! keys, and error types.
//!
//! # Overview
//!
//! - [`Value`] - Tagged representation of JavaScript values
//! - [`ObjectRef`], [`Atom`], [`SymbolId`] - Handles into runtime-owned tables
//! - [`PropertyKey`] - Canonical property keys (index, name, or symbol)
//! - [`JsError`] - JavaScript errors with constructor kind
//!
//! # Examples
//!
//! ```
//! use core_types::{PropertyKey, Value};
//!
//! // Create JavaScript values
//! let num = Value::number(42.0);
//! assert!(num.is_truthy());
//! assert_eq!(num.type_of(), "number");
//!
//! // Index keys are canonical
//! let key = PropertyKey::Index(0);
//! assert!(key.is_index());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(unsafe_code)]

mod error;
mod handles;
mod property_key;
mod value;

pub use error::{ErrorKind, JsError, JsResult};
pub use handles::{Atom, ObjectRef, SymbolId};
pub use property_key::{parse_array_index, PropertyKey, MAX_ARRAY_INDEX};
pub use value::Value;
