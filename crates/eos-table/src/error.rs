//! Table construction and validation errors.

use crate::table::Field;
use crate::validate::Violation;
use eos_core::CoreError;
use thiserror::Error;

/// Result type for table operations.
pub type TableResult<T> = Result<T, TableError>;

/// Errors that can occur while building, validating, or reducing a table.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TableError {
    /// An array's shape disagrees with the declared axis lengths.
    #[error("Shape mismatch for {what}: expected {expected:?}, got {got:?}")]
    ShapeMismatch {
        what: String,
        expected: Vec<usize>,
        got: Vec<usize>,
    },

    /// Axis values are not strictly increasing.
    #[error("Axis {axis} is not strictly increasing at index {index}")]
    NonMonotonicAxis { axis: &'static str, index: usize },

    /// Axis spacing deviates from uniform beyond the configured tolerance.
    #[error("Axis {axis} is irregular: max relative spacing deviation {deviation:e} > {tol:e}")]
    IrregularGrid {
        axis: &'static str,
        deviation: f64,
        tol: f64,
    },

    /// A species code appears more than once in the registry.
    #[error("Duplicate species code {code} in registry")]
    DuplicateSpeciesCode { code: i32 },

    /// A fraction array references a code the registry does not know.
    #[error("Unknown species code {code} in table data")]
    UnknownSpecies { code: i32 },

    /// A field required by the operation is absent from the table.
    #[error("Missing field: {field}")]
    MissingField { field: Field },

    /// An index resolved outside its axis, or a restriction came up empty.
    #[error("Index out of range: {what} (index={index}, len={len})")]
    IndexOutOfRange {
        what: &'static str,
        index: isize,
        len: usize,
    },

    /// No contiguous density interval is valid across the whole grid.
    #[error("No valid density region in table")]
    NoValidRegion,

    /// Physical invariants are violated; carries the full list so callers
    /// get complete diagnostic context, not just the first offender.
    #[error("Table failed validation with {} violation(s)", violations.len())]
    TableInvalid { violations: Vec<Violation> },
}

impl From<CoreError> for TableError {
    fn from(err: CoreError) -> Self {
        let CoreError::IndexOutOfRange { what, index, len } = err;
        TableError::IndexOutOfRange { what, index, len }
    }
}
