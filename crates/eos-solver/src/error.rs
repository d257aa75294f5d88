//! Solver errors.

use eos_table::{Field, TableError};
use thiserror::Error;

/// Result type for solver operations.
pub type SolverResult<T> = Result<T, SolverError>;

/// Errors from the beta-equilibrium solve.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SolverError {
    /// A field required by the solve is absent from the slice.
    #[error("Missing field for beta-equilibrium solve: {field}")]
    MissingField { field: Field },

    /// The balance function has no root over the tabulated yq range at this
    /// density, or the iteration cap was hit. Recovered per point, never
    /// fatal to the whole solve.
    #[error("No beta equilibrium at density index {i_nb}: {reason}")]
    NoEquilibriumFound { i_nb: usize, reason: &'static str },

    /// Assembling the reduced table failed structurally.
    #[error(transparent)]
    Table(#[from] TableError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_points_at_density_index() {
        let err = SolverError::NoEquilibriumFound {
            i_nb: 7,
            reason: "no sign change",
        };
        assert!(err.to_string().contains('7'));
        assert!(err.to_string().contains("no sign change"));
    }
}
