//! eos-core: stable foundation for eostab.
//!
//! Contains:
//! - units (natural-unit constants used by nuclear-matter tables)
//! - numeric (grid spacing and index helpers)
//! - error (shared error types)

pub mod error;
pub mod numeric;
pub mod units;

// Re-exports: nice ergonomics for downstream crates
pub use error::{CoreError, CoreResult};
pub use numeric::*;
pub use units::*;
