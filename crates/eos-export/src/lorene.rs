//! Lorene ASCII export.
//!
//! Lorene reads a cold, beta-equilibrated one-parameter EOS: one row per
//! density point carrying the baryon density in fm^-3 and the mass/energy
//! density and pressure converted to CGS. A companion "number fractions"
//! file lists per-species fractions with the same 1-based row indices, so
//! the two files can be joined by row.

use crate::atomic::write_atomic;
use crate::error::{ExportError, ExportResult};
use eos_core::{MEV_FM3_TO_ERG_CM3, MEV_FM3_TO_G_CM3};
use eos_table::{Field, ReducedEosTable};
use std::fmt::Write as _;
use std::path::Path;
use tracing::info;

/// Write the main Lorene table: index, nb [fm^-3], rho [g cm^-3],
/// p [erg cm^-3].
pub fn write_lorene(table: &ReducedEosTable, path: &Path) -> ExportResult<()> {
    let pressure = table
        .field(Field::Pressure)
        .ok_or(ExportError::IncompleteTable {
            field: Field::Pressure,
        })?;
    let energy = table
        .field(Field::Energy)
        .ok_or(ExportError::IncompleteTable {
            field: Field::Energy,
        })?;
    let n = table.len();

    let mut out = String::new();
    out.push_str("#\n# Cold beta-equilibrium EOS table\n#\n");
    let _ = writeln!(out, "{n}  <-- number of lines");
    out.push_str("#\n#  index   n_B [fm^-3]   rho [g/cm^3]   p [erg/cm^3]\n#\n");
    for (i, &nb) in table.nb().values().iter().enumerate() {
        let rho = energy[i] * MEV_FM3_TO_G_CM3;
        let p = pressure[i] * MEV_FM3_TO_ERG_CM3;
        let _ = writeln!(out, "{:>6}  {:e}  {:e}  {:e}", i + 1, nb, rho, p);
    }
    write_atomic(path, out.as_bytes())?;
    info!(path = %path.display(), rows = n, "wrote Lorene table");
    Ok(())
}

/// Write the companion number-fractions file, ordered by the same 1-based
/// row index as the main table. Columns follow species-code order; for
/// composite species only the fraction column is emitted.
pub fn write_number_fractions(table: &ReducedEosTable, path: &Path) -> ExportResult<()> {
    let n = table.len();
    let mut out = String::new();
    out.push_str("#  index   n_B [fm^-3]");
    for (code, _) in table.pair_fractions() {
        let info = table.registry().resolve(code)?;
        let _ = write!(out, "   Y_{}", info.symbol);
    }
    for (code, _) in table.quads() {
        let info = table.registry().resolve(code)?;
        let _ = write!(out, "   Y_{}", info.symbol);
    }
    out.push('\n');
    for (i, &nb) in table.nb().values().iter().enumerate() {
        let _ = write!(out, "{:>6}  {:e}", i + 1, nb);
        for (_, fractions) in table.pair_fractions() {
            let _ = write!(out, "  {:e}", fractions[i]);
        }
        for (_, quad) in table.quads() {
            let _ = write!(out, "  {:e}", quad.fraction[i]);
        }
        out.push('\n');
    }
    write_atomic(path, out.as_bytes())?;
    info!(path = %path.display(), rows = n, "wrote number fractions");
    Ok(())
}
