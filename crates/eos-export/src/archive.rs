//! The general table archive: a self-describing container holding every
//! axis, field, and species-fraction array of a table plus its validity
//! mask and species registry.
//!
//! Layout: an 8-byte magic, a little-endian u64 manifest length, a JSON
//! manifest describing each dataset (name, role, shape, unit, dtype), then
//! the dataset payloads in manifest order: f64 datasets as little-endian
//! IEEE-754 bits, the validity mask as one byte per point. Doubles survive
//! a round-trip bit-exactly.

use crate::atomic::write_atomic;
use crate::error::{ExportError, ExportResult};
use eos_table::{
    EosTable, Field, QuadComposition, ReducedEosTable, SpeciesRegistry, TableBuilder,
};
use ndarray::{Array1, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

pub(crate) const MAGIC: &[u8; 8] = b"EOSTAB01";
pub(crate) const FORMAT_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct DatasetMeta {
    pub name: String,
    /// What the dataset is: "axis", "field", "pair_fraction",
    /// "quad_fraction", "quad_mass", "quad_charge", "validity", "yq_eq".
    pub role: String,
    /// Species code for fraction datasets.
    pub code: Option<i32>,
    pub shape: Vec<usize>,
    pub unit: String,
    pub dtype: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub(crate) struct Manifest {
    pub format_version: u32,
    /// RFC 3339 creation timestamp; absent from byte-reproducible outputs.
    pub created: Option<String>,
    /// "table3d" or "reduced1d".
    pub kind: String,
    /// Fixed temperature of a reduced table [MeV].
    pub t_value: Option<f64>,
    pub species: SpeciesRegistry,
    pub datasets: Vec<DatasetMeta>,
}

enum Payload {
    F64(Vec<f64>),
    U8(Vec<u8>),
}

fn f64_meta(name: &str, role: &str, code: Option<i32>, shape: Vec<usize>, unit: &str) -> DatasetMeta {
    DatasetMeta {
        name: name.to_string(),
        role: role.to_string(),
        code,
        shape,
        unit: unit.to_string(),
        dtype: "f64".to_string(),
    }
}

fn encode(manifest: &Manifest, payloads: &[Payload]) -> ExportResult<Vec<u8>> {
    let manifest_json = serde_json::to_vec(manifest)?;
    let mut out = Vec::new();
    out.extend_from_slice(MAGIC);
    out.extend_from_slice(&(manifest_json.len() as u64).to_le_bytes());
    out.extend_from_slice(&manifest_json);
    for payload in payloads {
        match payload {
            Payload::F64(values) => {
                for v in values {
                    out.extend_from_slice(&v.to_le_bytes());
                }
            }
            Payload::U8(bytes) => out.extend_from_slice(bytes),
        }
    }
    Ok(out)
}

/// Write a 3-D table to `path`.
pub fn write_archive(table: &EosTable, path: &Path) -> ExportResult<()> {
    let (n_nb, n_t, n_yq) = table.shape();
    let mut datasets = Vec::new();
    let mut payloads = Vec::new();

    let mut push_f64 = |meta: DatasetMeta, values: Vec<f64>, payloads: &mut Vec<Payload>| {
        datasets.push(meta);
        payloads.push(Payload::F64(values));
    };

    for axis in [table.nb(), table.t(), table.yq()] {
        let name = axis.id().as_str();
        push_f64(
            f64_meta(name, "axis", None, vec![axis.len()], eos_core::unit_label(name)),
            axis.values().to_vec(),
            &mut payloads,
        );
    }
    let shape3 = vec![n_nb, n_t, n_yq];
    for (field, data) in table.fields() {
        push_f64(
            f64_meta(field.as_str(), "field", None, shape3.clone(), field.unit()),
            data.iter().copied().collect(),
            &mut payloads,
        );
    }
    for (code, data) in table.pair_fractions() {
        let symbol = &table.registry().resolve(code)?.symbol;
        push_f64(
            f64_meta(&format!("Y_{symbol}"), "pair_fraction", Some(code), shape3.clone(), ""),
            data.iter().copied().collect(),
            &mut payloads,
        );
    }
    for (code, quad) in table.quads() {
        let symbol = table.registry().resolve(code)?.symbol.clone();
        for (suffix, role, data) in [
            ("Y", "quad_fraction", &quad.fraction),
            ("A", "quad_mass", &quad.mass_number),
            ("Z", "quad_charge", &quad.charge_number),
        ] {
            push_f64(
                f64_meta(&format!("{suffix}_{symbol}"), role, Some(code), shape3.clone(), ""),
                data.iter().copied().collect(),
                &mut payloads,
            );
        }
    }
    datasets.push(DatasetMeta {
        name: "valid".to_string(),
        role: "validity".to_string(),
        code: None,
        shape: shape3,
        unit: String::new(),
        dtype: "u8".to_string(),
    });
    payloads.push(Payload::U8(
        table.valid().iter().map(|&v| u8::from(v)).collect(),
    ));

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        created: Some(chrono::Utc::now().to_rfc3339()),
        kind: "table3d".to_string(),
        t_value: None,
        species: table.registry().as_ref().clone(),
        datasets,
    };
    write_atomic(path, &encode(&manifest, &payloads)?)?;
    info!(path = %path.display(), "wrote table archive");
    Ok(())
}

/// Write a 1-D reduced (beta-equilibrium) table to `path`.
pub fn write_reduced_archive(table: &ReducedEosTable, path: &Path) -> ExportResult<()> {
    let n = table.len();
    let shape1 = vec![n];
    let mut datasets = Vec::new();
    let mut payloads = Vec::new();

    let mut push_f64 = |meta: DatasetMeta, values: Vec<f64>, payloads: &mut Vec<Payload>| {
        datasets.push(meta);
        payloads.push(Payload::F64(values));
    };

    push_f64(
        f64_meta("nb", "axis", None, shape1.clone(), eos_core::unit_label("nb")),
        table.nb().values().to_vec(),
        &mut payloads,
    );
    push_f64(
        f64_meta("yq", "yq_eq", None, shape1.clone(), ""),
        table.yq().to_vec(),
        &mut payloads,
    );
    for (field, data) in table.fields() {
        push_f64(
            f64_meta(field.as_str(), "field", None, shape1.clone(), field.unit()),
            data.to_vec(),
            &mut payloads,
        );
    }
    for (code, data) in table.pair_fractions() {
        let symbol = &table.registry().resolve(code)?.symbol;
        push_f64(
            f64_meta(&format!("Y_{symbol}"), "pair_fraction", Some(code), shape1.clone(), ""),
            data.to_vec(),
            &mut payloads,
        );
    }
    for (code, quad) in table.quads() {
        let symbol = table.registry().resolve(code)?.symbol.clone();
        for (suffix, role, data) in [
            ("Y", "quad_fraction", &quad.fraction),
            ("A", "quad_mass", &quad.mass_number),
            ("Z", "quad_charge", &quad.charge_number),
        ] {
            push_f64(
                f64_meta(&format!("{suffix}_{symbol}"), role, Some(code), shape1.clone(), ""),
                data.to_vec(),
                &mut payloads,
            );
        }
    }

    let manifest = Manifest {
        format_version: FORMAT_VERSION,
        created: Some(chrono::Utc::now().to_rfc3339()),
        kind: "reduced1d".to_string(),
        t_value: Some(table.t_value()),
        species: table.registry().as_ref().clone(),
        datasets,
    };
    write_atomic(path, &encode(&manifest, &payloads)?)?;
    info!(path = %path.display(), "wrote reduced table archive");
    Ok(())
}

/// Raw archive contents: the manifest plus every dataset decoded to f64
/// (the validity mask stays in `mask`).
pub(crate) struct RawArchive {
    pub manifest: Manifest,
    pub data: Vec<(DatasetMeta, Vec<f64>)>,
    pub mask: Option<Vec<u8>>,
}

pub(crate) fn read_raw(path: &Path) -> ExportResult<RawArchive> {
    let bytes = std::fs::read(path)?;
    if bytes.len() < 16 || &bytes[..8] != MAGIC {
        return Err(ExportError::Malformed {
            what: format!("{} is not a table archive", path.display()),
        });
    }
    let mut len_buf = [0u8; 8];
    len_buf.copy_from_slice(&bytes[8..16]);
    let manifest_len = u64::from_le_bytes(len_buf) as usize;
    // Length comes from untrusted bytes; unchecked addition could wrap.
    let manifest_end = match 16usize.checked_add(manifest_len) {
        Some(end) if end <= bytes.len() => end,
        _ => {
            return Err(ExportError::Malformed {
                what: "truncated manifest".to_string(),
            });
        }
    };
    let manifest: Manifest = serde_json::from_slice(&bytes[16..manifest_end])?;
    if manifest.format_version != FORMAT_VERSION {
        return Err(ExportError::Malformed {
            what: format!("unsupported format version {}", manifest.format_version),
        });
    }

    let mut offset = manifest_end;
    let mut data = Vec::new();
    let mut mask = None;
    for meta in &manifest.datasets {
        let count: usize = meta.shape.iter().product();
        let span = |width: usize| {
            count
                .checked_mul(width)
                .and_then(|n| offset.checked_add(n))
                .filter(|&end| end <= bytes.len())
                .ok_or_else(|| ExportError::Malformed {
                    what: format!("truncated dataset {}", meta.name),
                })
        };
        match meta.dtype.as_str() {
            "f64" => {
                let end = span(8)?;
                let values: Vec<f64> = bytes[offset..end]
                    .chunks_exact(8)
                    .map(|c| {
                        let mut b = [0u8; 8];
                        b.copy_from_slice(c);
                        f64::from_le_bytes(b)
                    })
                    .collect();
                data.push((meta.clone(), values));
                offset = end;
            }
            "u8" => {
                let end = span(1)?;
                mask = Some(bytes[offset..end].to_vec());
                offset = end;
            }
            other => {
                return Err(ExportError::Malformed {
                    what: format!("unknown dtype {other}"),
                });
            }
        }
    }
    Ok(RawArchive {
        manifest,
        data,
        mask,
    })
}

fn find<'a>(
    raw: &'a RawArchive,
    role: &str,
    name: &str,
) -> ExportResult<&'a (DatasetMeta, Vec<f64>)> {
    raw.data
        .iter()
        .find(|(m, _)| m.role == role && m.name == name)
        .ok_or_else(|| ExportError::Malformed {
            what: format!("archive missing {role} dataset {name}"),
        })
}

/// Read a 3-D table archive back into an [`EosTable`]. Axes, fields,
/// fractions, and the mask reproduce the written table exactly.
pub fn read_archive(path: &Path) -> ExportResult<EosTable> {
    let raw = read_raw(path)?;
    if raw.manifest.kind != "table3d" {
        return Err(ExportError::Malformed {
            what: format!("expected a 3-D table archive, found {}", raw.manifest.kind),
        });
    }
    let registry = Arc::new(raw.manifest.species.clone());

    let nb = Array1::from(find(&raw, "axis", "nb")?.1.clone());
    let t = Array1::from(find(&raw, "axis", "t")?.1.clone());
    let yq = Array1::from(find(&raw, "axis", "yq")?.1.clone());
    let shape = (nb.len(), t.len(), yq.len());
    let to3 = |meta: &DatasetMeta, values: &[f64]| -> ExportResult<Array3<f64>> {
        Array3::from_shape_vec(shape, values.to_vec()).map_err(|_| ExportError::Malformed {
            what: format!("dataset {} shape mismatch", meta.name),
        })
    };

    let mut builder = TableBuilder::new(registry, nb, t, yq);
    let mut quads: BTreeMap<i32, (Option<Array3<f64>>, Option<Array3<f64>>, Option<Array3<f64>>)> =
        BTreeMap::new();
    for (meta, values) in &raw.data {
        match meta.role.as_str() {
            "field" => {
                let field: Field = meta.name.parse().map_err(|_| ExportError::Malformed {
                    what: format!("unknown field {}", meta.name),
                })?;
                builder = builder.field(field, to3(meta, values)?);
            }
            "pair_fraction" => {
                let code = meta.code.ok_or_else(|| ExportError::Malformed {
                    what: format!("fraction dataset {} lacks a species code", meta.name),
                })?;
                builder = builder.pair_fraction(code, to3(meta, values)?);
            }
            "quad_fraction" | "quad_mass" | "quad_charge" => {
                let code = meta.code.ok_or_else(|| ExportError::Malformed {
                    what: format!("quad dataset {} lacks a species code", meta.name),
                })?;
                let entry = quads.entry(code).or_default();
                let slot = match meta.role.as_str() {
                    "quad_fraction" => &mut entry.0,
                    "quad_mass" => &mut entry.1,
                    _ => &mut entry.2,
                };
                *slot = Some(to3(meta, values)?);
            }
            _ => {}
        }
    }
    for (code, (fraction, mass, charge)) in quads {
        match (fraction, mass, charge) {
            (Some(fraction), Some(mass_number), Some(charge_number)) => {
                builder = builder.quad(
                    code,
                    QuadComposition {
                        fraction,
                        mass_number,
                        charge_number,
                    },
                );
            }
            _ => {
                return Err(ExportError::Malformed {
                    what: format!("incomplete quad composition for code {code}"),
                });
            }
        }
    }
    if let Some(mask) = &raw.mask {
        let mask = Array3::from_shape_vec(shape, mask.iter().map(|&b| b != 0).collect())
            .map_err(|_| ExportError::Malformed {
                what: "validity mask shape mismatch".to_string(),
            })?;
        builder = builder.validity(mask);
    }
    Ok(builder.build()?)
}

/// Read a reduced (1-D) table archive.
pub fn read_reduced_archive(path: &Path) -> ExportResult<ReducedEosTable> {
    let raw = read_raw(path)?;
    if raw.manifest.kind != "reduced1d" {
        return Err(ExportError::Malformed {
            what: format!("expected a reduced table archive, found {}", raw.manifest.kind),
        });
    }
    let registry = Arc::new(raw.manifest.species.clone());
    let t_value = raw.manifest.t_value.ok_or_else(|| ExportError::Malformed {
        what: "reduced archive lacks a temperature attribute".to_string(),
    })?;

    let nb_values = find(&raw, "axis", "nb")?.1.clone();
    let yq = Array1::from(find(&raw, "yq_eq", "yq")?.1.clone());

    let mut fields: BTreeMap<Field, Array1<f64>> = BTreeMap::new();
    let mut pair_fractions: BTreeMap<i32, Array1<f64>> = BTreeMap::new();
    let mut quads: BTreeMap<i32, (Option<Array1<f64>>, Option<Array1<f64>>, Option<Array1<f64>>)> =
        BTreeMap::new();
    for (meta, values) in &raw.data {
        let arr = Array1::from(values.clone());
        match meta.role.as_str() {
            "field" => {
                let field: Field = meta.name.parse().map_err(|_| ExportError::Malformed {
                    what: format!("unknown field {}", meta.name),
                })?;
                fields.insert(field, arr);
            }
            "pair_fraction" => {
                let code = meta.code.ok_or_else(|| ExportError::Malformed {
                    what: format!("fraction dataset {} lacks a species code", meta.name),
                })?;
                pair_fractions.insert(code, arr);
            }
            "quad_fraction" | "quad_mass" | "quad_charge" => {
                let code = meta.code.ok_or_else(|| ExportError::Malformed {
                    what: format!("quad dataset {} lacks a species code", meta.name),
                })?;
                let entry = quads.entry(code).or_default();
                let slot = match meta.role.as_str() {
                    "quad_fraction" => &mut entry.0,
                    "quad_mass" => &mut entry.1,
                    _ => &mut entry.2,
                };
                *slot = Some(arr);
            }
            _ => {}
        }
    }
    let mut quad_map = BTreeMap::new();
    for (code, (fraction, mass, charge)) in quads {
        match (fraction, mass, charge) {
            (Some(fraction), Some(mass_number), Some(charge_number)) => {
                quad_map.insert(
                    code,
                    QuadComposition {
                        fraction,
                        mass_number,
                        charge_number,
                    },
                );
            }
            _ => {
                return Err(ExportError::Malformed {
                    what: format!("incomplete quad composition for code {code}"),
                });
            }
        }
    }

    let nb = eos_table::GridAxis::new(eos_table::AxisId::Nb, Array1::from(nb_values))?;
    Ok(ReducedEosTable::new(
        nb,
        t_value,
        yq,
        fields,
        pair_fractions,
        quad_map,
        registry,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn oversized_manifest_length_rejected() {
        let dir = std::env::temp_dir().join("eostab-archive-header-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("bad-header.eostab");
        // Valid magic followed by a length that would wrap 16 + len
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&u64::MAX.to_le_bytes());
        bytes.extend_from_slice(b"{}");
        std::fs::write(&path, &bytes).unwrap();

        match read_raw(&path) {
            Err(ExportError::Malformed { what }) => assert!(what.contains("manifest")),
            other => panic!("expected Malformed, got {:?}", other.map(|_| ())),
        }
        std::fs::remove_file(&path).unwrap();
    }

    #[test]
    fn truncated_manifest_rejected() {
        let dir = std::env::temp_dir().join("eostab-archive-header-test");
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("short-manifest.eostab");
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&100u64.to_le_bytes());
        bytes.extend_from_slice(b"{}");
        std::fs::write(&path, &bytes).unwrap();

        match read_raw(&path) {
            Err(ExportError::Malformed { what }) => assert!(what.contains("manifest")),
            other => panic!("expected Malformed, got {:?}", other.map(|_| ())),
        }
        std::fs::remove_file(&path).unwrap();
    }
}
