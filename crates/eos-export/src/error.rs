//! Export errors.
//!
//! Each exporter fails independently: an error from one format never
//! prevents another exporter from running on the same table.

use eos_table::{Field, TableError};
use std::path::PathBuf;
use thiserror::Error;

/// Result type for export operations.
pub type ExportResult<T> = Result<T, ExportError>;

/// Errors from exporting or re-reading tables.
#[derive(Error, Debug)]
pub enum ExportError {
    /// The target format needs a field the table does not carry (e.g. the
    /// AthenaK format requires cs2 to be computed first).
    #[error("Table incomplete for this format: missing {field}")]
    IncompleteTable { field: Field },

    /// Polynomial order outside the supported set.
    #[error("Unsupported NQT polynomial order {order} (supported: 1, 2)")]
    UnsupportedOrder { order: usize },

    /// The archive the NQT conversion builds from does not exist.
    #[error("Source table not found: {path}")]
    SourceTableMissing { path: PathBuf },

    /// An input file exists but does not parse as the expected format.
    #[error("Malformed input: {what}")]
    Malformed { what: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Table(#[from] TableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_names_the_missing_field() {
        let err = ExportError::IncompleteTable { field: Field::Cs2 };
        assert!(err.to_string().contains("cs2"));
    }

    #[test]
    fn display_names_the_order() {
        let err = ExportError::UnsupportedOrder { order: 7 };
        assert!(err.to_string().contains('7'));
    }
}
