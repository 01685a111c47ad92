//! JavaScript error types and error handling.
//!
//! This module provides error types that correspond to JavaScript's built-in
//! error constructors. The object model raises them for descriptor
//! violations, invalid lengths, and internal invariant failures; the
//! embedding runtime is responsible for materializing them as error objects.

use std::fmt;
use thiserror::Error;

/// The kind of JavaScript error.
///
/// These correspond to the JavaScript error constructors the object model
/// and its embedders can raise.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Type error (e.g., redefining a non-configurable property)
    TypeError,
    /// Value out of allowed range (e.g., an invalid array length)
    RangeError,
    /// Unresolvable reference (raised by embedding interpreter tiers)
    ReferenceError,
    /// Internal engine error
    InternalError,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ErrorKind::TypeError => "TypeError",
            ErrorKind::RangeError => "RangeError",
            ErrorKind::ReferenceError => "ReferenceError",
            ErrorKind::InternalError => "InternalError",
        })
    }
}

/// A JavaScript error with kind and message.
///
/// # Examples
///
/// ```
/// use core_types::{ErrorKind, JsError};
///
/// let error = JsError::type_error("cannot add property, object is not extensible");
/// assert_eq!(error.kind, ErrorKind::TypeError);
/// assert!(error.to_string().starts_with("TypeError:"));
/// ```
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{kind}: {message}")]
pub struct JsError {
    /// The type of error
    pub kind: ErrorKind,
    /// Human-readable error message
    pub message: String,
}

impl JsError {
    /// Creates a `TypeError` with the given message.
    pub fn type_error(message: impl Into<String>) -> JsError {
        JsError {
            kind: ErrorKind::TypeError,
            message: message.into(),
        }
    }

    /// Creates a `RangeError` with the given message.
    pub fn range_error(message: impl Into<String>) -> JsError {
        JsError {
            kind: ErrorKind::RangeError,
            message: message.into(),
        }
    }

    /// Creates a `ReferenceError` with the given message.
    pub fn reference_error(message: impl Into<String>) -> JsError {
        JsError {
            kind: ErrorKind::ReferenceError,
            message: message.into(),
        }
    }

    /// Creates an `InternalError` with the given message.
    pub fn internal_error(message: impl Into<String>) -> JsError {
        JsError {
            kind: ErrorKind::InternalError,
            message: message.into(),
        }
    }
}

/// Result type for operations that can raise a JavaScript error.
pub type JsResult<T> = Result<T, JsError>;
