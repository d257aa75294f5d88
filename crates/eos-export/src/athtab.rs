//! AthenaK grid export.
//!
//! A plain-text grid file carrying the axis arrays and the minimal field
//! set the simulation code consumes: pressure, energy density, and sound
//! speed squared. Values are printed in scientific notation with the
//! shortest representation that round-trips, eight per line, in row-major
//! (nb, t, yq) order.

use crate::atomic::write_atomic;
use crate::error::{ExportError, ExportResult};
use eos_table::{EosTable, Field, ReducedEosTable};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

const VALUES_PER_LINE: usize = 8;

fn push_values<'a>(out: &mut String, values: impl Iterator<Item = &'a f64>) {
    let mut col = 0;
    for v in values {
        if col == VALUES_PER_LINE {
            out.push('\n');
            col = 0;
        } else if col > 0 {
            out.push(' ');
        }
        let _ = write!(out, "{v:e}");
        col += 1;
    }
    out.push('\n');
}

fn require(table: &EosTable, field: Field) -> ExportResult<&ndarray::Array3<f64>> {
    table
        .field(field)
        .ok_or(ExportError::IncompleteTable { field })
}

/// Write a 3-D table in the AthenaK grid layout.
///
/// Requires cs2 to have been computed; fails with [`ExportError::IncompleteTable`]
/// otherwise.
pub fn write_athtab(table: &EosTable, path: &Path) -> ExportResult<()> {
    let cs2 = require(table, Field::Cs2)?;
    let pressure = require(table, Field::Pressure)?;
    let energy = require(table, Field::Energy)?;
    let (n_nb, n_t, n_yq) = table.shape();

    let mut out = String::new();
    out.push_str("athtab 1\n");
    out.push_str("kind table3d\n");
    let _ = writeln!(out, "shape {n_nb} {n_t} {n_yq}");
    for axis in [table.nb(), table.t(), table.yq()] {
        let _ = writeln!(out, "axis {} {}", axis.id(), axis.len());
        push_values(&mut out, axis.values().iter());
    }
    for (field, data) in [
        (Field::Pressure, pressure),
        (Field::Energy, energy),
        (Field::Cs2, cs2),
    ] {
        let _ = writeln!(out, "field {} {}", field, data.len());
        push_values(&mut out, data.iter());
    }
    write_atomic(path, out.as_bytes())?;
    info!(path = %path.display(), "wrote athtab table");
    Ok(())
}

/// Write a reduced (1-D, beta-equilibrium) table in the AthenaK layout.
///
/// The solved charge fraction is emitted as an extra `yq_eq` block so the
/// consumer can recover the composition axis.
pub fn write_reduced_athtab(table: &ReducedEosTable, path: &Path) -> ExportResult<()> {
    let mut arrays = Vec::new();
    for field in [Field::Pressure, Field::Energy, Field::Cs2] {
        let data = table
            .field(field)
            .ok_or(ExportError::IncompleteTable { field })?;
        arrays.push((field, data));
    }
    let n = table.len();

    let mut out = String::new();
    out.push_str("athtab 1\n");
    out.push_str("kind reduced1d\n");
    let _ = writeln!(out, "shape {n}");
    let _ = writeln!(out, "t_value {:e}", table.t_value());
    let _ = writeln!(out, "axis nb {n}");
    push_values(&mut out, table.nb().values().iter());
    let _ = writeln!(out, "yq_eq {n}");
    push_values(&mut out, table.yq().iter());
    for (field, data) in arrays {
        let _ = writeln!(out, "field {} {}", field, data.len());
        push_values(&mut out, data.iter());
    }
    write_atomic(path, out.as_bytes())?;
    info!(path = %path.display(), "wrote reduced athtab table");
    Ok(())
}
