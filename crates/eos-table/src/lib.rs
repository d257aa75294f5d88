//! eos-table: tabulated nuclear-matter equation-of-state data model.
//!
//! Provides:
//! - Species registry (elementary pairs and composite quads)
//! - Monotonic grid axes with equal-spacing enforcement
//! - The 3-D EosTable plus 2-D slices and 1-D reduced tables
//! - Derived quantities (sound speed squared, mean mass number)
//! - Table-wide physical validation
//! - Grid reduction (index restriction, valid-region shrinking, slicing)
//!
//! # Architecture
//!
//! The numerical derivative scheme behind the sound speed is isolated behind
//! the `ThermodynamicModel` trait so that the table machinery never hard-codes
//! a particular microphysics choice. `FiniteDifferenceModel` is the default
//! backend; alternative schemes plug in at the same seam.
//!
//! Every reduction returns a freshly owned table. Arrays are never shared
//! between a source table and anything derived from it, so mutating a derived
//! table cannot corrupt the original.

pub mod axis;
pub mod derived;
pub mod error;
pub mod model;
pub mod reduce;
pub mod species;
pub mod table;
pub mod validate;

// Re-exports for ergonomics
pub use axis::{AxisId, GridAxis};
pub use error::{TableError, TableResult};
pub use model::{FiniteDifferenceModel, ThermodynamicModel};
pub use species::{dd2_registry, SpeciesInfo, SpeciesKind, SpeciesRegistry};
pub use table::{EosTable, Field, QuadComposition, ReducedEosTable, TableBuilder, TableSlice};
pub use validate::{GridTolerance, Violation, ViolationKind};
