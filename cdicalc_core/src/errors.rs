//! # Error Types
//!
//! Structured error types for cdicalc_core. Most user-facing failures never
//! leave the engine: a field that does not parse becomes an `ERROR` sentinel
//! on its dependents plus a status message. The variants below are what the
//! adapters report internally, and what the engine returns when its own wiring
//! is broken.
//!
//! ## Example
//!
//! ```rust
//! use cdicalc_core::errors::{CalcError, CalcResult};
//!
//! fn check_distance(distance_m: f64) -> CalcResult<()> {
//!     if distance_m < 0.0 {
//!         return Err(CalcError::invalid_input(
//!             "detector_distance",
//!             distance_m.to_string(),
//!             "distance must not be negative",
//!         ));
//!     }
//!     Ok(())
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for cdicalc_core operations
pub type CalcResult<T> = Result<T, CalcError>;

/// Structured error type for parsing, conversion and recalculation.
#[derive(Error, Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", content = "details")]
pub enum CalcError {
    /// The text could not be read as a quantity
    #[error("Invalid input for '{field}': {value} - {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    /// A unit symbol is not in the unit table
    #[error("Unknown unit '{unit}'")]
    UnknownUnit { unit: String },

    /// Units are valid but belong to different physical dimensions
    #[error("Cannot convert {from} to {to}")]
    DimensionMismatch { from: String, to: String },

    /// A field name is not part of the form
    #[error("Unknown field: {field}")]
    UnknownField { field: String },

    /// A formula hit a division by zero or left its domain
    #[error("Undefined computation in {formula}: {reason}")]
    UndefinedComputation { formula: String, reason: String },

    /// File I/O error
    #[error("File error: {operation} on '{path}' - {reason}")]
    FileError {
        operation: String,
        path: String,
        reason: String,
    },

    /// JSON serialization/deserialization error
    #[error("Serialization error: {reason}")]
    SerializationError { reason: String },

    /// Internal wiring error (malformed target list, runaway propagation)
    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CalcError {
    /// Create an InvalidInput error
    pub fn invalid_input(field: impl Into<String>, value: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::InvalidInput {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
        }
    }

    /// Create an UnknownUnit error
    pub fn unknown_unit(unit: impl Into<String>) -> Self {
        CalcError::UnknownUnit { unit: unit.into() }
    }

    /// Create a DimensionMismatch error
    pub fn dimension_mismatch(from: impl Into<String>, to: impl Into<String>) -> Self {
        CalcError::DimensionMismatch {
            from: from.into(),
            to: to.into(),
        }
    }

    /// Create an UnknownField error
    pub fn unknown_field(field: impl Into<String>) -> Self {
        CalcError::UnknownField { field: field.into() }
    }

    /// Create an UndefinedComputation error
    pub fn undefined(formula: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::UndefinedComputation {
            formula: formula.into(),
            reason: reason.into(),
        }
    }

    /// Create a FileError
    pub fn file_error(operation: impl Into<String>, path: impl Into<String>, reason: impl Into<String>) -> Self {
        CalcError::FileError {
            operation: operation.into(),
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Create an Internal error
    pub fn internal(message: impl Into<String>) -> Self {
        CalcError::Internal {
            message: message.into(),
        }
    }

    /// True for failures caused by what the user typed, as opposed to
    /// I/O problems or broken wiring.
    pub fn is_user_input(&self) -> bool {
        matches!(
            self,
            CalcError::InvalidInput { .. } | CalcError::UnknownUnit { .. } | CalcError::DimensionMismatch { .. }
        )
    }

    /// Get a short error code for programmatic handling
    pub fn error_code(&self) -> &'static str {
        match self {
            CalcError::InvalidInput { .. } => "INVALID_INPUT",
            CalcError::UnknownUnit { .. } => "UNKNOWN_UNIT",
            CalcError::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            CalcError::UnknownField { .. } => "UNKNOWN_FIELD",
            CalcError::UndefinedComputation { .. } => "UNDEFINED_COMPUTATION",
            CalcError::FileError { .. } => "FILE_ERROR",
            CalcError::SerializationError { .. } => "SERIALIZATION_ERROR",
            CalcError::Internal { .. } => "INTERNAL_ERROR",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_serialization() {
        let error = CalcError::dimension_mismatch("kg", "m");
        let json = serde_json::to_string(&error).unwrap();
        assert!(json.contains("DimensionMismatch"));
        let roundtrip: CalcError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, roundtrip);
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(CalcError::unknown_field("test").error_code(), "UNKNOWN_FIELD");
        assert_eq!(CalcError::unknown_unit("furlong").error_code(), "UNKNOWN_UNIT");
        assert_eq!(CalcError::internal("loop").error_code(), "INTERNAL_ERROR");
    }

    #[test]
    fn test_user_input_classification() {
        assert!(CalcError::unknown_unit("parsec").is_user_input());
        assert!(CalcError::dimension_mismatch("kg", "m").is_user_input());
        assert!(!CalcError::internal("bad targets").is_user_input());
        assert!(!CalcError::file_error("open", "a.json", "denied").is_user_input());
    }

    #[test]
    fn test_display_names_field() {
        let error = CalcError::invalid_input("crystal_size", "abc", "not a number");
        assert_eq!(error.to_string(), "Invalid input for 'crystal_size': abc - not a number");
    }
}
