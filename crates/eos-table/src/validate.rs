//! Table-wide physical validation.
//!
//! The validator never stops at the first problem: every violation is
//! collected with its grid location so a broken table can be diagnosed in
//! one pass.

use crate::table::{EosTable, Field};
use crate::species::SpeciesKind;
use rayon::prelude::*;
use tracing::info;

/// Numeric knobs for structural/physical checks.
#[derive(Debug, Clone, Copy)]
pub struct GridTolerance {
    /// Max relative deviation from uniform axis spacing.
    pub spacing_rel: f64,
    /// Absolute tolerance on the baryon-number-weighted fraction sum vs 1.
    /// Source tables carry limited compositional precision, hence the loose
    /// default.
    pub fraction_sum_abs: f64,
}

impl Default for GridTolerance {
    fn default() -> Self {
        Self {
            spacing_rel: 1e-6,
            fraction_sum_abs: 1e-2,
        }
    }
}

/// What went wrong at a grid point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViolationKind {
    /// Pressure decreases with increasing density.
    NonMonotonePressure,
    /// Energy density decreases with increasing density.
    NonMonotoneEnergy,
    /// A field value is NaN or infinite at a valid point.
    NonFinite,
    /// Baryon-weighted species fractions do not sum to one.
    FractionSum,
    /// Sound speed squared outside [floor, 1].
    AcausalCs2,
}

impl std::fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ViolationKind::NonMonotonePressure => "non-monotone pressure",
            ViolationKind::NonMonotoneEnergy => "non-monotone energy",
            ViolationKind::NonFinite => "non-finite value",
            ViolationKind::FractionSum => "fraction sum",
            ViolationKind::AcausalCs2 => "acausal cs2",
        };
        f.write_str(s)
    }
}

/// One recorded invariant violation with its grid location.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    pub kind: ViolationKind,
    /// Offending field or species, when one is identifiable.
    pub what: String,
    /// Grid index [i_nb, i_t, i_yq].
    pub index: [usize; 3],
    pub value: f64,
}

impl std::fmt::Display for Violation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} ({}) at [{}, {}, {}]: {}",
            self.kind, self.what, self.index[0], self.index[1], self.index[2], self.value
        )
    }
}

impl EosTable {
    /// Scan all fields and the validity mask for physical invariants:
    ///
    /// (a) pressure and energy density non-decreasing along the density axis
    ///     at fixed (t, yq);
    /// (b) finiteness of every field at every valid point;
    /// (c) baryon-number-weighted species fractions summing to one
    ///     (leptons carry baryon number zero and drop out);
    /// (d) cs2 within [floor, 1] where the field is present.
    ///
    /// Returns all violations via `TableError::TableInvalid`, never just the
    /// first one. The scan is parallel over density planes; violations are
    /// reassembled in ascending grid order, so the report is deterministic.
    pub fn validate(&self, floor: f64, tol: &GridTolerance) -> crate::TableResult<()> {
        let (n_nb, n_t, n_yq) = self.shape();
        let has_composition = !self.pair_fractions.is_empty() || !self.quads.is_empty();

        let violations: Vec<Violation> = (0..n_nb)
            .into_par_iter()
            .map(|i| {
                let mut found = Vec::new();
                for j in 0..n_t {
                    for k in 0..n_yq {
                        if !self.is_valid(i, j, k) {
                            continue;
                        }
                        self.check_point(i, j, k, floor, tol, has_composition, &mut found);
                        if i + 1 < n_nb && self.is_valid(i + 1, j, k) {
                            self.check_monotone(i, j, k, &mut found);
                        }
                    }
                }
                found
            })
            .flatten()
            .collect();

        if violations.is_empty() {
            info!(points = n_nb * n_t * n_yq, "table validation passed");
            Ok(())
        } else {
            Err(crate::TableError::TableInvalid { violations })
        }
    }

    fn check_point(
        &self,
        i: usize,
        j: usize,
        k: usize,
        floor: f64,
        tol: &GridTolerance,
        has_composition: bool,
        found: &mut Vec<Violation>,
    ) {
        for (field, data) in &self.fields {
            let v = data[[i, j, k]];
            if !v.is_finite() {
                found.push(Violation {
                    kind: ViolationKind::NonFinite,
                    what: field.as_str().to_string(),
                    index: [i, j, k],
                    value: v,
                });
            }
        }
        for (&code, data) in &self.pair_fractions {
            let v = data[[i, j, k]];
            if !v.is_finite() {
                found.push(Violation {
                    kind: ViolationKind::NonFinite,
                    what: format!("fraction {code}"),
                    index: [i, j, k],
                    value: v,
                });
            }
        }

        if let Some(cs2) = self.fields.get(&Field::Cs2) {
            let v = cs2[[i, j, k]];
            if v.is_finite() && !(floor..=1.0).contains(&v) {
                found.push(Violation {
                    kind: ViolationKind::AcausalCs2,
                    what: "cs2".to_string(),
                    index: [i, j, k],
                    value: v,
                });
            }
        }

        if has_composition {
            let mut sum = 0.0;
            for (&code, data) in &self.pair_fractions {
                if let Some(info) = self.registry.get(code) {
                    if let SpeciesKind::Pair { mass_number } = info.kind {
                        sum += mass_number as f64 * data[[i, j, k]];
                    }
                }
            }
            for q in self.quads.values() {
                sum += q.mass_number[[i, j, k]] * q.fraction[[i, j, k]];
            }
            if (sum - 1.0).abs() > tol.fraction_sum_abs {
                found.push(Violation {
                    kind: ViolationKind::FractionSum,
                    what: "species fractions".to_string(),
                    index: [i, j, k],
                    value: sum,
                });
            }
        }
    }

    fn check_monotone(&self, i: usize, j: usize, k: usize, found: &mut Vec<Violation>) {
        for (field, kind) in [
            (Field::Pressure, ViolationKind::NonMonotonePressure),
            (Field::Energy, ViolationKind::NonMonotoneEnergy),
        ] {
            if let Some(data) = self.fields.get(&field) {
                let here = data[[i, j, k]];
                let next = data[[i + 1, j, k]];
                if next < here {
                    found.push(Violation {
                        kind,
                        what: field.as_str().to_string(),
                        index: [i + 1, j, k],
                        value: next,
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::species::dd2_registry;
    use crate::table::TableBuilder;
    use ndarray::{Array1, Array3};
    use std::sync::Arc;

    fn monotone_table() -> EosTable {
        let nb = Array1::from(vec![0.01, 0.02, 0.03, 0.04, 0.05]);
        let t = Array1::from(vec![0.1, 1.0, 2.0]);
        let yq = Array1::from(vec![0.1, 0.3, 0.5, 0.7]);
        let energy = Array3::from_shape_fn((5, 3, 4), |(i, _, _)| 940.0 * (i as f64 + 1.0) * 0.01);
        let pressure = energy.mapv(|e| 0.1 * e);
        TableBuilder::new(Arc::new(dd2_registry()), nb, t, yq)
            .field(Field::Pressure, pressure)
            .field(Field::Energy, energy)
            .build()
            .unwrap()
    }

    #[test]
    fn clean_table_passes() {
        let table = monotone_table();
        assert!(table.validate(1e-6, &GridTolerance::default()).is_ok());
    }

    #[test]
    fn decreasing_pressure_reported() {
        let mut table = monotone_table();
        let mut pressure = table.field(Field::Pressure).unwrap().clone();
        pressure[[3, 1, 2]] = -1.0;
        table.insert_field(Field::Pressure, pressure).unwrap();

        let err = table
            .validate(1e-6, &GridTolerance::default())
            .unwrap_err();
        match err {
            crate::TableError::TableInvalid { violations } => {
                assert!(violations
                    .iter()
                    .any(|v| v.kind == ViolationKind::NonMonotonePressure
                        && v.index == [3, 1, 2]));
            }
            other => panic!("expected TableInvalid, got {other:?}"),
        }
    }

    #[test]
    fn nan_at_valid_point_reported() {
        let mut table = monotone_table();
        let mut energy = table.field(Field::Energy).unwrap().clone();
        energy[[2, 0, 0]] = f64::NAN;
        table.insert_field(Field::Energy, energy).unwrap();

        let err = table
            .validate(1e-6, &GridTolerance::default())
            .unwrap_err();
        match err {
            crate::TableError::TableInvalid { violations } => {
                assert!(violations
                    .iter()
                    .any(|v| v.kind == ViolationKind::NonFinite && v.index == [2, 0, 0]));
            }
            other => panic!("expected TableInvalid, got {other:?}"),
        }
    }

    #[test]
    fn nan_at_masked_point_ignored() {
        let mut table = monotone_table();
        let mut energy = table.field(Field::Energy).unwrap().clone();
        energy[[2, 0, 0]] = f64::NAN;
        table.insert_field(Field::Energy, energy).unwrap();
        table.set_invalid(2, 0, 0);
        assert!(table.validate(1e-6, &GridTolerance::default()).is_ok());
    }

    #[test]
    fn short_fraction_sum_reported() {
        let nb = Array1::from(vec![0.01, 0.02, 0.03, 0.04, 0.05]);
        let t = Array1::from(vec![0.1, 1.0, 2.0]);
        let yq = Array1::from(vec![0.1, 0.3, 0.5, 0.7]);
        let energy = Array3::from_shape_fn((5, 3, 4), |(i, _, _)| 940.0 * (i as f64 + 1.0) * 0.01);
        let pressure = energy.mapv(|e| 0.1 * e);
        // Neutrons carry all baryons but only 0.8 of them are accounted for
        let table = TableBuilder::new(Arc::new(dd2_registry()), nb, t, yq)
            .field(Field::Pressure, pressure)
            .field(Field::Energy, energy)
            .pair_fraction(10, Array3::from_elem((5, 3, 4), 0.8))
            .build()
            .unwrap();

        let err = table
            .validate(1e-6, &GridTolerance::default())
            .unwrap_err();
        match err {
            crate::TableError::TableInvalid { violations } => {
                // Every valid point is short by 0.2
                assert_eq!(violations.len(), 5 * 3 * 4);
                let v = violations
                    .iter()
                    .find(|v| v.index == [2, 1, 3])
                    .expect("violation at [2, 1, 3]");
                assert_eq!(v.kind, ViolationKind::FractionSum);
                assert!((v.value - 0.8).abs() < 1e-12);
            }
            other => panic!("expected TableInvalid, got {other:?}"),
        }
    }

    #[test]
    fn acausal_cs2_reported() {
        let mut table = monotone_table();
        let shape = table.shape();
        let mut cs2 = Array3::from_elem(shape, 0.5);
        cs2[[0, 0, 0]] = 1.5;
        table.insert_field(Field::Cs2, cs2).unwrap();

        let err = table
            .validate(1e-6, &GridTolerance::default())
            .unwrap_err();
        match err {
            crate::TableError::TableInvalid { violations } => {
                assert_eq!(violations.len(), 1);
                assert_eq!(violations[0].kind, ViolationKind::AcausalCs2);
            }
            other => panic!("expected TableInvalid, got {other:?}"),
        }
    }
}
