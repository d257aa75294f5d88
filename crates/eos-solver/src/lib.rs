//! eos-solver: beta-equilibrium reduction of EOS table slices.
//!
//! Given a table already collapsed to a single temperature, solves for the
//! charge fraction at which beta equilibrium holds at every density point
//! and assembles the converged points into a 1-D reduced table.

pub mod beta;
pub mod error;

pub use beta::{make_beta_eq_table, BetaSolveConfig, BetaSolveReport, PointFailure};
pub use error::{SolverError, SolverResult};
