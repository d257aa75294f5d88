//! eos-export: on-disk formats for EOS tables.
//!
//! Provides:
//! - The general table archive (self-describing container with a JSON
//!   manifest and binary datasets), with a reader for exact round-trips
//! - AthenaK grid export (`.athtab`)
//! - Lorene ASCII export plus the companion number-fractions file
//! - The NQT fast-lookup structure built from an archive file
//!
//! Every writer goes through an atomic temp-file-plus-rename step, so a
//! crash never leaves a half-written output behind.

pub mod archive;
pub mod athtab;
pub mod atomic;
pub mod error;
pub mod lorene;
pub mod nqt;

pub use archive::{read_archive, read_reduced_archive, write_archive, write_reduced_archive};
pub use athtab::{write_athtab, write_reduced_athtab};
pub use error::{ExportError, ExportResult};
pub use lorene::{write_lorene, write_number_fractions};
pub use nqt::{NqtConfig, NqtTable};
