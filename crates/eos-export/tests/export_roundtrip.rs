//! Round-trip and determinism tests for the on-disk formats.

use eos_export::{
    read_archive, read_reduced_archive, write_archive, write_reduced_archive, NqtConfig, NqtTable,
};
use eos_table::{dd2_registry, AxisId, Field, GridAxis, QuadComposition, ReducedEosTable, TableBuilder};
use ndarray::{Array1, Array3};
use proptest::prelude::*;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

fn temp_dir(name: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("eostab-roundtrip-{name}"));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

/// 5x3x4 table with irrational-ish values that exercise full f64 precision.
fn synthetic_table() -> eos_table::EosTable {
    let nb = Array1::from((0..5).map(|i| 0.01 * 2f64.powi(i)).collect::<Vec<_>>());
    let t = Array1::from(vec![0.1, 1.0, 10.0]);
    let yq = Array1::from(vec![0.05, 0.2, 0.35, 0.5]);
    let shape = (5, 3, 4);
    let mut pressure = Array3::zeros(shape);
    let mut energy = Array3::zeros(shape);
    let mut y_n = Array3::zeros(shape);
    let mut y_p = Array3::zeros(shape);
    let mut quad_y = Array3::zeros(shape);
    for i in 0..5 {
        for j in 0..3 {
            for k in 0..4 {
                let x = 1.0 + i as f64 + 0.1 * j as f64 + 0.01 * k as f64;
                pressure[[i, j, k]] = 80.0 * x * x / 7.0;
                energy[[i, j, k]] = 939.0 * x + x.sqrt();
                y_n[[i, j, k]] = 0.7 + 0.001 * x;
                y_p[[i, j, k]] = 0.3 - 0.001 * x;
                quad_y[[i, j, k]] = 1e-4 * x;
            }
        }
    }
    let mut valid = Array3::from_elem(shape, true);
    valid[[2, 1, 3]] = false;
    TableBuilder::new(Arc::new(dd2_registry()), nb, t, yq)
        .field(Field::Pressure, pressure)
        .field(Field::Energy, energy)
        .pair_fraction(10, y_n)
        .pair_fraction(11, y_p)
        .quad(
            999,
            QuadComposition {
                fraction: quad_y,
                mass_number: Array3::from_elem(shape, 56.0),
                charge_number: Array3::from_elem(shape, 26.0),
            },
        )
        .validity(valid)
        .build()
        .unwrap()
}

fn synthetic_reduced() -> ReducedEosTable {
    let nb = GridAxis::new(
        AxisId::Nb,
        Array1::from((0..6).map(|i| 0.02 * 1.5f64.powi(i)).collect::<Vec<_>>()),
    )
    .unwrap();
    let n = nb.len();
    let mut fields = BTreeMap::new();
    for (field, scale) in [(Field::Pressure, 3.1), (Field::Energy, 941.7), (Field::Cs2, 0.01)] {
        fields.insert(
            field,
            Array1::from((0..n).map(|i| scale * (1.0 + i as f64 / 3.0)).collect::<Vec<_>>()),
        );
    }
    let mut pair_fractions = BTreeMap::new();
    pair_fractions.insert(10, Array1::from_elem(n, 0.93));
    pair_fractions.insert(11, Array1::from_elem(n, 0.07));
    ReducedEosTable::new(
        nb,
        0.1,
        Array1::from((0..n).map(|i| 0.05 + 0.001 * i as f64).collect::<Vec<_>>()),
        fields,
        pair_fractions,
        BTreeMap::new(),
        Arc::new(dd2_registry()),
    )
    .unwrap()
}

#[test]
fn archive_roundtrip_is_exact() {
    let table = synthetic_table();
    let path = temp_dir("archive3d").join("t.eostab");
    write_archive(&table, &path).unwrap();
    let back = read_archive(&path).unwrap();

    assert_eq!(back.nb().values(), table.nb().values());
    assert_eq!(back.t().values(), table.t().values());
    assert_eq!(back.yq().values(), table.yq().values());
    for (field, data) in table.fields() {
        assert_eq!(back.field(field).unwrap(), data, "field {field}");
    }
    for (code, data) in table.pair_fractions() {
        assert_eq!(back.pair_fraction(code).unwrap(), data, "code {code}");
    }
    let quad = back.quad(999).unwrap();
    assert_eq!(quad, table.quad(999).unwrap());
    assert_eq!(back.valid(), table.valid());
    assert_eq!(back.registry().len(), table.registry().len());
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn reduced_archive_roundtrip_is_exact() {
    let table = synthetic_reduced();
    let path = temp_dir("archive1d").join("t_beta.eostab");
    write_reduced_archive(&table, &path).unwrap();
    let back = read_reduced_archive(&path).unwrap();

    assert_eq!(back.t_value(), table.t_value());
    assert_eq!(back.nb().values(), table.nb().values());
    assert_eq!(back.yq(), table.yq());
    for (field, data) in table.fields() {
        assert_eq!(back.field(field).unwrap(), data, "field {field}");
    }
    for (code, data) in table.pair_fractions() {
        let got = back.pair_fractions().find(|(c, _)| *c == code).unwrap().1;
        assert_eq!(got, data, "code {code}");
    }
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn reading_the_wrong_kind_fails() {
    let table = synthetic_table();
    let path = temp_dir("wrongkind").join("t.eostab");
    write_archive(&table, &path).unwrap();
    assert!(read_reduced_archive(&path).is_err());
    std::fs::remove_file(&path).unwrap();
}

#[test]
fn nqt_build_is_byte_reproducible() {
    let table = synthetic_table();
    let path = temp_dir("nqt").join("t.eostab");
    write_archive(&table, &path).unwrap();

    let config = NqtConfig::default();
    let a = NqtTable::build_from_archive(&path, &config).unwrap().to_bytes();
    let b = NqtTable::build_from_archive(&path, &config).unwrap().to_bytes();
    assert_eq!(a, b);

    let reread = NqtTable::from_bytes(&a).unwrap();
    assert_eq!(reread.order(), 2);
    std::fs::remove_file(&path).unwrap();
}

proptest! {
    #[test]
    fn nqt_segment_modes_agree(q in 1e-3f64..10.0) {
        let x: Vec<f64> = (0..50).map(|i| 1e-3 * 1.25f64.powi(i)).collect();
        let y: Vec<f64> = x.iter().map(|&v| 12.0 * v * v + v).collect();
        let fast = NqtTable::fit(&x, &y, &NqtConfig { order: 2, use_bithacks: true }).unwrap();
        let slow = NqtTable::fit(&x, &y, &NqtConfig { order: 2, use_bithacks: false }).unwrap();
        prop_assert_eq!(fast.segment_index(q), slow.segment_index(q));
        prop_assert_eq!(fast.evaluate(q).to_bits(), slow.evaluate(q).to_bits());
    }
}
