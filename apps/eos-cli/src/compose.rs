//! CompOSE table directory reader.
//!
//! Parses the `eos.nb` / `eos.t` / `eos.yq` axis files, `eos.thermo`, and
//! `eos.compo` from a CompOSE download and assembles them into an
//! [`EosTable`]. Thermo rows store CompOSE's scaled quantities, which are
//! de-normalized here: pressure is `Q1 * nb` and energy density is
//! `nb * m_n * (Q7 + 1)` with the neutron mass taken from the thermo
//! header.

use eos_table::{EosTable, Field, QuadComposition, SpeciesRegistry, TableBuilder};
use ndarray::{Array1, Array3};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::sync::Arc;
use thiserror::Error;
use tracing::info;

#[derive(Error, Debug)]
pub enum ComposeError {
    #[error("{file}:{line}: {what}")]
    Parse {
        file: String,
        line: usize,
        what: String,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Table(#[from] eos_table::TableError),
}

type Result<T> = std::result::Result<T, ComposeError>;

fn parse_err(file: &str, line: usize, what: impl Into<String>) -> ComposeError {
    ComposeError::Parse {
        file: file.to_string(),
        line,
        what: what.into(),
    }
}

/// Parse a float, accepting Fortran-style `D` exponents.
fn parse_f64(tok: &str, file: &str, line: usize) -> Result<f64> {
    let tok = tok.replace(['d', 'D'], "e");
    tok.parse()
        .map_err(|_| parse_err(file, line, format!("bad float {tok:?}")))
}

fn parse_usize(tok: &str, file: &str, line: usize) -> Result<usize> {
    tok.parse()
        .map_err(|_| parse_err(file, line, format!("bad integer {tok:?}")))
}

fn parse_i32(tok: &str, file: &str, line: usize) -> Result<i32> {
    tok.parse()
        .map_err(|_| parse_err(file, line, format!("bad species code {tok:?}")))
}

/// Read one axis file: two index header lines, then one value per line.
fn read_axis(dir: &Path, name: &str) -> Result<Array1<f64>> {
    let text = fs::read_to_string(dir.join(name))?;
    let mut values = Vec::new();
    let mut seen = 0usize;
    for (lineno, raw) in text.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }
        seen += 1;
        if seen <= 2 {
            // first/last index header lines
            continue;
        }
        values.push(parse_f64(trimmed, name, lineno + 1)?);
    }
    if values.is_empty() {
        return Err(parse_err(name, 0, "no axis values"));
    }
    Ok(Array1::from(values))
}

/// Convert a 1-based CompOSE grid index, range-checked.
fn grid_index(raw: usize, len: usize, axis: &str, file: &str, line: usize) -> Result<usize> {
    if raw == 0 || raw > len {
        return Err(parse_err(
            file,
            line,
            format!("{axis} index {raw} outside 1..={len}"),
        ));
    }
    Ok(raw - 1)
}

struct ThermoData {
    m_neutron: f64,
    fields: BTreeMap<Field, Array3<f64>>,
    covered: Array3<bool>,
}

/// Read `eos.thermo`: a mass header line, then one row per grid point
/// with `it inb iyq Q1..Q7`.
fn read_thermo(
    dir: &Path,
    nb: &Array1<f64>,
    shape: (usize, usize, usize),
) -> Result<ThermoData> {
    const FILE: &str = "eos.thermo";
    let text = fs::read_to_string(dir.join(FILE))?;
    let mut lines = text
        .lines()
        .enumerate()
        .filter(|(_, l)| !l.trim().is_empty());

    let (header_no, header) = lines
        .next()
        .ok_or_else(|| parse_err(FILE, 0, "empty thermo file"))?;
    let m_neutron = header
        .split_whitespace()
        .next()
        .map(|tok| parse_f64(tok, FILE, header_no + 1))
        .transpose()?
        .ok_or_else(|| parse_err(FILE, header_no + 1, "missing neutron mass"))?;

    let mut fields: BTreeMap<Field, Array3<f64>> = BTreeMap::new();
    for field in [
        Field::Pressure,
        Field::Energy,
        Field::Entropy,
        Field::MuB,
        Field::MuQ,
        Field::MuL,
    ] {
        fields.insert(field, Array3::zeros(shape));
    }
    let mut covered = Array3::from_elem(shape, false);

    for (lineno, raw) in lines {
        let line = lineno + 1;
        let toks: Vec<&str> = raw.split_whitespace().collect();
        if toks.len() < 10 {
            return Err(parse_err(FILE, line, "thermo row has fewer than 10 columns"));
        }
        let j = grid_index(parse_usize(toks[0], FILE, line)?, shape.1, "t", FILE, line)?;
        let i = grid_index(parse_usize(toks[1], FILE, line)?, shape.0, "nb", FILE, line)?;
        let k = grid_index(parse_usize(toks[2], FILE, line)?, shape.2, "yq", FILE, line)?;
        let mut q = [0.0; 7];
        for (slot, tok) in q.iter_mut().zip(&toks[3..10]) {
            *slot = parse_f64(tok, FILE, line)?;
        }
        let n = nb[i];
        let at = [i, j, k];
        if let Some(a) = fields.get_mut(&Field::Pressure) {
            a[at] = q[0] * n;
        }
        if let Some(a) = fields.get_mut(&Field::Entropy) {
            a[at] = q[1];
        }
        if let Some(a) = fields.get_mut(&Field::MuB) {
            a[at] = m_neutron * (q[2] + 1.0);
        }
        if let Some(a) = fields.get_mut(&Field::MuQ) {
            a[at] = m_neutron * q[3];
        }
        if let Some(a) = fields.get_mut(&Field::MuL) {
            a[at] = m_neutron * q[4];
        }
        if let Some(a) = fields.get_mut(&Field::Energy) {
            a[at] = n * m_neutron * (q[6] + 1.0);
        }
        covered[at] = true;
    }

    Ok(ThermoData {
        m_neutron,
        fields,
        covered,
    })
}

struct CompoData {
    pairs: BTreeMap<i32, Array3<f64>>,
    quads: BTreeMap<i32, QuadComposition<Array3<f64>>>,
}

/// Read `eos.compo`: rows of `it inb iyq iphase npairs {code Y}*
/// nquad {code A Z Y}*`.
fn read_compo(dir: &Path, shape: (usize, usize, usize)) -> Result<CompoData> {
    const FILE: &str = "eos.compo";
    let text = fs::read_to_string(dir.join(FILE))?;

    let mut pairs: BTreeMap<i32, Array3<f64>> = BTreeMap::new();
    let mut quads: BTreeMap<i32, QuadComposition<Array3<f64>>> = BTreeMap::new();

    for (lineno, raw) in text.lines().enumerate() {
        if raw.trim().is_empty() {
            continue;
        }
        let line = lineno + 1;
        let toks: Vec<&str> = raw.split_whitespace().collect();
        if toks.len() < 5 {
            return Err(parse_err(FILE, line, "compo row has fewer than 5 columns"));
        }
        let j = grid_index(parse_usize(toks[0], FILE, line)?, shape.1, "t", FILE, line)?;
        let i = grid_index(parse_usize(toks[1], FILE, line)?, shape.0, "nb", FILE, line)?;
        let k = grid_index(parse_usize(toks[2], FILE, line)?, shape.2, "yq", FILE, line)?;
        let at = [i, j, k];

        let mut cursor = 4; // skip iphase
        let n_pairs = parse_usize(toks[cursor], FILE, line)?;
        cursor += 1;
        for _ in 0..n_pairs {
            if cursor + 2 > toks.len() {
                return Err(parse_err(FILE, line, "truncated pair list"));
            }
            let code = parse_i32(toks[cursor], FILE, line)?;
            let y = parse_f64(toks[cursor + 1], FILE, line)?;
            cursor += 2;
            pairs
                .entry(code)
                .or_insert_with(|| Array3::zeros(shape))[at] = y;
        }

        if cursor >= toks.len() {
            continue; // no quad block on this row
        }
        let n_quads = parse_usize(toks[cursor], FILE, line)?;
        cursor += 1;
        for _ in 0..n_quads {
            if cursor + 4 > toks.len() {
                return Err(parse_err(FILE, line, "truncated quad list"));
            }
            let code = parse_i32(toks[cursor], FILE, line)?;
            let a = parse_f64(toks[cursor + 1], FILE, line)?;
            let z = parse_f64(toks[cursor + 2], FILE, line)?;
            let y = parse_f64(toks[cursor + 3], FILE, line)?;
            cursor += 4;
            let quad = quads.entry(code).or_insert_with(|| QuadComposition {
                fraction: Array3::zeros(shape),
                mass_number: Array3::zeros(shape),
                charge_number: Array3::zeros(shape),
            });
            quad.fraction[at] = y;
            quad.mass_number[at] = a;
            quad.charge_number[at] = z;
        }
    }

    Ok(CompoData { pairs, quads })
}

/// Read a full CompOSE directory into a table.
///
/// Grid points missing from `eos.thermo` are marked invalid rather than
/// rejected, so a table with a ragged physical domain still loads.
pub fn read_compose_dir(
    dir: &Path,
    registry: Arc<SpeciesRegistry>,
    spacing_tol: Option<f64>,
) -> Result<EosTable> {
    let nb = read_axis(dir, "eos.nb")?;
    let t = read_axis(dir, "eos.t")?;
    let yq = read_axis(dir, "eos.yq")?;
    let shape = (nb.len(), t.len(), yq.len());
    info!(
        n_nb = shape.0,
        n_t = shape.1,
        n_yq = shape.2,
        "read CompOSE axes"
    );

    let thermo = read_thermo(dir, &nb, shape)?;
    let compo = read_compo(dir, shape)?;
    info!(
        m_neutron = thermo.m_neutron,
        n_pairs = compo.pairs.len(),
        n_quads = compo.quads.len(),
        "read CompOSE thermo and composition data"
    );

    let mut builder = TableBuilder::new(registry, nb, t, yq).validity(thermo.covered);
    if let Some(tol) = spacing_tol {
        builder = builder.enforce_equal_spacing(tol);
    }
    for (field, data) in thermo.fields {
        builder = builder.field(field, data);
    }
    for (code, data) in compo.pairs {
        builder = builder.pair_fraction(code, data);
    }
    for (code, quad) in compo.quads {
        builder = builder.quad(code, quad);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eos_table::dd2_registry;
    use std::path::PathBuf;

    fn write_fixture() -> PathBuf {
        let dir = std::env::temp_dir().join("eostab-compose-fixture");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("eos.nb"), "1\n2\n1.0e-2\n2.0e-2\n").unwrap();
        fs::write(dir.join("eos.t"), "1\n1\n1.0e-1\n").unwrap();
        fs::write(dir.join("eos.yq"), "1\n2\n1.0e-1\n5.0e-1\n").unwrap();
        // header: m_n m_p i_leptons; rows: it inb iyq Q1..Q7
        let mut thermo = String::from("939.565 938.272 1\n");
        for inb in 1..=2 {
            for iyq in 1..=2 {
                thermo.push_str(&format!(
                    "1 {inb} {iyq} 2.0 1.5 0.1 -0.05 0.02 0.0 0.5\n"
                ));
            }
        }
        fs::write(dir.join("eos.thermo"), thermo).unwrap();
        let mut compo = String::new();
        for inb in 1..=2 {
            for iyq in 1..=2 {
                compo.push_str(&format!(
                    "1 {inb} {iyq} 0 2 10 0.7 11 0.3 1 999 56.0 26.0 1.0e-4\n"
                ));
            }
        }
        fs::write(dir.join("eos.compo"), compo).unwrap();
        dir
    }

    #[test]
    fn reads_and_denormalizes() {
        let dir = write_fixture();
        let table = read_compose_dir(&dir, Arc::new(dd2_registry()), None).unwrap();
        assert_eq!(table.shape(), (2, 1, 2));
        // pressure = Q1 * nb
        let p = table.field(Field::Pressure).unwrap();
        assert!((p[[0, 0, 0]] - 2.0 * 1.0e-2).abs() < 1e-15);
        // energy = nb * m_n * (Q7 + 1)
        let e = table.field(Field::Energy).unwrap();
        assert!((e[[1, 0, 0]] - 2.0e-2 * 939.565 * 1.5).abs() < 1e-10);
        // mu_q = m_n * Q4
        let mu_q = table.field(Field::MuQ).unwrap();
        assert!((mu_q[[0, 0, 0]] - 939.565 * -0.05).abs() < 1e-10);
        assert_eq!(table.pair_fraction(10).unwrap()[[0, 0, 0]], 0.7);
        assert_eq!(table.quad(999).unwrap().mass_number[[0, 0, 1]], 56.0);
        assert!(table.valid().iter().all(|&v| v));
    }

    #[test]
    fn missing_thermo_rows_are_invalid() {
        let dir = std::env::temp_dir().join("eostab-compose-partial");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("eos.nb"), "1\n2\n1.0e-2\n2.0e-2\n").unwrap();
        fs::write(dir.join("eos.t"), "1\n1\n1.0e-1\n").unwrap();
        fs::write(dir.join("eos.yq"), "1\n2\n1.0e-1\n5.0e-1\n").unwrap();
        fs::write(
            dir.join("eos.thermo"),
            "939.565 938.272 1\n1 1 1 2.0 1.5 0.1 -0.05 0.02 0.0 0.5\n",
        )
        .unwrap();
        fs::write(dir.join("eos.compo"), "").unwrap();
        let table = read_compose_dir(&dir, Arc::new(dd2_registry()), None).unwrap();
        assert!(table.is_valid(0, 0, 0));
        assert!(!table.is_valid(1, 0, 1));
    }

    #[test]
    fn fortran_exponents_accepted() {
        assert_eq!(parse_f64("1.5D-2", "x", 1).unwrap(), 1.5e-2);
    }
}
