//! Pipeline scenario over a synthetic 5x3x4 table: derive, validate, reduce.

use eos_table::{
    dd2_registry, AxisId, Field, FiniteDifferenceModel, GridTolerance, QuadComposition,
    TableBuilder,
};
use ndarray::{Array1, Array3};
use std::sync::Arc;

mod common {
    use super::*;

    /// Synthetic but physically sensible table: log-spaced density,
    /// p = K nb^2, e = m_n nb + 1.5 p, pure neutron/proton/electron matter
    /// plus a constant heavy-nucleus admixture.
    pub fn synthetic_table() -> eos_table::EosTable {
        let n = (5, 3, 4);
        let nb_vals: Vec<f64> = (0..5).map(|i| 0.01 * 2f64.powi(i)).collect();
        let t_vals = vec![0.1, 1.0, 1.9];
        let yq_vals = vec![0.05, 0.25, 0.45, 0.65];

        let nb = Array1::from(nb_vals.clone());
        let pressure = Array3::from_shape_fn(n, |(i, _, _)| 80.0 * nb_vals[i] * nb_vals[i]);
        let energy = Array3::from_shape_fn(n, |(i, _, _)| {
            939.565 * nb_vals[i] + 120.0 * nb_vals[i] * nb_vals[i]
        });
        let entropy = Array3::from_elem(n, 0.5);

        // Composition: X_N = 0.1 of baryons in the average nucleus (A = 50),
        // the rest split between free neutrons and protons by yq.
        let x_quad = 0.1 / 50.0;
        let xn = Array3::from_shape_fn(n, |(_, _, k)| 0.9 * (1.0 - yq_vals[k]));
        let xp = Array3::from_shape_fn(n, |(_, _, k)| 0.9 * yq_vals[k]);
        let xe = Array3::from_shape_fn(n, |(_, _, k)| yq_vals[k]);

        TableBuilder::new(
            Arc::new(dd2_registry()),
            nb,
            Array1::from(t_vals),
            Array1::from(yq_vals),
        )
        .enforce_equal_spacing(1e-6)
        .field(Field::Pressure, pressure)
        .field(Field::Energy, energy)
        .field(Field::Entropy, entropy)
        .pair_fraction(10, xn)
        .pair_fraction(11, xp)
        .pair_fraction(0, xe)
        .quad(
            999,
            QuadComposition {
                fraction: Array3::from_elem(n, x_quad),
                mass_number: Array3::from_elem(n, 50.0),
                charge_number: Array3::from_elem(n, 22.0),
            },
        )
        .build()
        .expect("synthetic table is well-formed")
    }
}

#[test]
fn derive_then_validate_clean() {
    let mut table = common::synthetic_table();
    table.compute_cs2(&FiniteDifferenceModel, 1e-6);
    table.compute_abar();

    assert!(table.validate(1e-6, &GridTolerance::default()).is_ok());

    let cs2 = table.field(Field::Cs2).unwrap();
    for &v in cs2 {
        assert!((1e-6..=1.0).contains(&v));
    }
    let abar = table.field(Field::Abar).unwrap();
    assert!((abar[[0, 0, 0]] - 50.0).abs() < 1e-12);
}

#[test]
fn restrict_then_slice() {
    let mut table = common::synthetic_table();
    table.compute_cs2(&FiniteDifferenceModel, 1e-6);

    let restricted = table.restrict_idx(AxisId::T, None, Some(-1)).unwrap();
    assert_eq!(restricted.shape(), (5, 2, 4));

    let slice = restricted.slice_at_t_idx(0).unwrap();
    assert_eq!(slice.t_value(), 0.1);
    assert_eq!(slice.field(Field::Cs2).unwrap().dim(), (5, 4));
}

#[test]
fn shrink_output_revalidates_clean() {
    let mut table = common::synthetic_table();
    table.compute_cs2(&FiniteDifferenceModel, 1e-6);
    table.compute_abar();

    // Poison the lowest density plane and shrink it away
    let mut pressure = table.field(Field::Pressure).unwrap().clone();
    pressure[[0, 0, 0]] = f64::NAN;
    table.insert_field(Field::Pressure, pressure).unwrap();
    let mut mask = table.valid().clone();
    mask[[0, 0, 0]] = false;
    // Rebuilding the mask through the public API: mark every (t, yq) of
    // plane 0 invalid so the shrink drops the whole plane.
    for j in 0..3 {
        for k in 0..4 {
            mask[[0, j, k]] = false;
        }
    }
    let table = {
        let mut t = table.clone();
        t.set_validity(mask).unwrap();
        t
    };

    let shrunk = table.shrink_to_valid_nb().unwrap();
    assert_eq!(shrunk.nb().len(), 4);
    assert!(shrunk.validate(1e-6, &GridTolerance::default()).is_ok());
    assert!(shrunk.valid().iter().all(|&v| v));
}
