//! Error types for ShelfDB.

use crate::value::ValueKind;
use std::fmt;

/// The main error type for ShelfDB operations.
///
/// Every variant describes a local, synchronous failure of the single
/// operation that raised it. Tables never retry internally and never leave
/// a half-applied mutation behind when they return one of these.
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Insert carried a different number of values than the schema has columns
    ColumnCountMismatch {
        /// Number of columns in the schema
        expected: usize,
        /// Number of values supplied
        actual: usize,
    },

    /// A predicate or update referenced a column the schema does not have
    UnknownColumn(String),

    /// Comparison operator outside `=`, `>`, `<`, `>=`, `<=`
    UnsupportedOperator(String),

    /// Ordering comparison between values of different tags
    TypeMismatch {
        /// Tag of the stored cell
        left: ValueKind,
        /// Tag of the literal
        right: ValueKind,
    },

    /// A condition unit is missing a field or carries an unknown connector
    MalformedCondition(String),

    /// Schema is empty or names a column twice
    InvalidSchema(String),

    /// A table with this name is already registered
    TableExists(String),

    /// No table with this name is registered
    TableNotFound(String),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::ColumnCountMismatch { expected, actual } => write!(
                f,
                "Column count mismatch: expected {} values, got {}",
                expected, actual
            ),
            Error::UnknownColumn(column) => write!(f, "Unknown column: {}", column),
            Error::UnsupportedOperator(op) => write!(f, "Unsupported operator: {}", op),
            Error::TypeMismatch { left, right } => {
                write!(f, "Type mismatch: cannot compare {} with {}", left, right)
            }
            Error::MalformedCondition(msg) => write!(f, "Malformed condition: {}", msg),
            Error::InvalidSchema(msg) => write!(f, "Invalid schema: {}", msg),
            Error::TableExists(name) => write!(f, "Table '{}' already exists", name),
            Error::TableNotFound(name) => write!(f, "Table '{}' does not exist", name),
        }
    }
}

impl std::error::Error for Error {}

/// A specialized `Result` type for ShelfDB operations.
pub type Result<T> = std::result::Result<T, Error>;
