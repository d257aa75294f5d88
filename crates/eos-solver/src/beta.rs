//! Per-density beta-equilibrium root finding.
//!
//! For each density point of a fixed-temperature slice, the solver looks for
//! the charge fraction at which the weak-interaction balance
//! mu_q + mu_l = 0 holds (charge neutrality, no trapped neutrinos). The
//! balance is bracketed on the tabulated yq grid, then bisected on the
//! linear interpolant between the two bracketing planes; all fields and
//! fractions at the solution are linearly interpolated between the same two
//! planes.

use crate::error::{SolverError, SolverResult};
use eos_table::{
    AxisId, Field, GridAxis, QuadComposition, ReducedEosTable, TableSlice, ThermodynamicModel,
};
use ndarray::Array1;
use std::collections::BTreeMap;
use tracing::{info, warn};

/// Bisection configuration.
#[derive(Debug, Clone, Copy)]
pub struct BetaSolveConfig {
    /// Convergence tolerance on the bracket width in charge-fraction units.
    pub tol: f64,
    /// Iteration cap; exceeding it is reported as a per-point failure, the
    /// solve never hangs.
    pub max_iter: usize,
}

impl Default for BetaSolveConfig {
    fn default() -> Self {
        Self {
            tol: 1e-10,
            max_iter: 200,
        }
    }
}

/// One density point the solver could not reduce.
#[derive(Debug, Clone, PartialEq)]
pub struct PointFailure {
    pub i_nb: usize,
    pub error: SolverError,
}

/// Outcome of a beta-equilibrium solve: the reduced table over the
/// converged density points plus the per-point failures that were excluded.
#[derive(Debug, Clone)]
pub struct BetaSolveReport {
    pub table: ReducedEosTable,
    pub failures: Vec<PointFailure>,
}

impl BetaSolveReport {
    pub fn num_converged(&self) -> usize {
        self.table.len()
    }

    pub fn num_failed(&self) -> usize {
        self.failures.len()
    }
}

struct EquilibriumPoint {
    /// Bracketing yq grid index (lower plane).
    k: usize,
    /// Interpolation weight towards the upper plane, in [0, 1].
    w: f64,
    /// Solved charge fraction.
    yq: f64,
}

/// Solve beta equilibrium at every density point of `slice`.
///
/// Points where the balance never changes sign over the yq range, where the
/// bracket touches masked grid points, or where the iteration cap is hit
/// are excluded from the reduced table and reported in the result, never
/// fatal to the whole solve.
pub fn make_beta_eq_table(
    slice: &TableSlice,
    model: &dyn ThermodynamicModel,
    cfg: &BetaSolveConfig,
) -> SolverResult<BetaSolveReport> {
    let mu_q = slice.expect_field(Field::MuQ).map_err(missing)?;
    let mu_l = slice.expect_field(Field::MuL).map_err(missing)?;
    let n_nb = slice.nb().len();
    let n_yq = slice.yq().len();

    let mut solved: Vec<(usize, EquilibriumPoint)> = Vec::with_capacity(n_nb);
    let mut failures = Vec::new();

    for i in 0..n_nb {
        let balance: Vec<f64> = (0..n_yq)
            .map(|k| model.beta_balance(mu_q[[i, k]], mu_l[[i, k]]))
            .collect();
        match solve_point(slice, &balance, i, cfg) {
            Ok(point) => solved.push((i, point)),
            Err(error) => {
                warn!(i_nb = i, %error, "density point excluded from beta-equilibrium table");
                failures.push(PointFailure { i_nb: i, error });
            }
        }
    }

    let table = assemble(slice, &solved)?;
    info!(
        converged = solved.len(),
        failed = failures.len(),
        t = slice.t_value(),
        "beta-equilibrium solve finished"
    );
    Ok(BetaSolveReport { table, failures })
}

fn missing(err: eos_table::TableError) -> SolverError {
    match err {
        eos_table::TableError::MissingField { field } => SolverError::MissingField { field },
        other => SolverError::Table(other),
    }
}

fn solve_point(
    slice: &TableSlice,
    balance: &[f64],
    i: usize,
    cfg: &BetaSolveConfig,
) -> SolverResult<EquilibriumPoint> {
    let yq = slice.yq();
    let n_yq = yq.len();

    // Bracket on the grid: first pair of adjacent, unmasked points with a
    // sign change (or an exact zero).
    let mut bracket = None;
    for k in 0..n_yq - 1 {
        if !slice.is_valid(i, k) || !slice.is_valid(i, k + 1) {
            continue;
        }
        if balance[k] == 0.0 {
            return Ok(EquilibriumPoint {
                k,
                w: 0.0,
                yq: yq.get(k),
            });
        }
        if balance[k] * balance[k + 1] < 0.0 {
            bracket = Some(k);
            break;
        }
    }
    if bracket.is_none() && n_yq > 0 && balance[n_yq - 1] == 0.0 && slice.is_valid(i, n_yq - 1) {
        return Ok(EquilibriumPoint {
            k: n_yq - 1,
            w: 0.0,
            yq: yq.get(n_yq - 1),
        });
    }
    let k = bracket.ok_or(SolverError::NoEquilibriumFound {
        i_nb: i,
        reason: "balance does not change sign over the yq range",
    })?;

    // Bisection on the linear interpolant between the bracketing planes.
    let (y_k, y_k1) = (yq.get(k), yq.get(k + 1));
    let (b_k, b_k1) = (balance[k], balance[k + 1]);
    let f = |y: f64| b_k + (b_k1 - b_k) * (y - y_k) / (y_k1 - y_k);

    let mut lo = y_k;
    let mut hi = y_k1;
    let mut iter = 0;
    while hi - lo > cfg.tol {
        if iter >= cfg.max_iter {
            return Err(SolverError::NoEquilibriumFound {
                i_nb: i,
                reason: "iteration cap exceeded",
            });
        }
        let mid = 0.5 * (lo + hi);
        if f(lo) * f(mid) <= 0.0 {
            hi = mid;
        } else {
            lo = mid;
        }
        iter += 1;
    }

    let root = 0.5 * (lo + hi);
    Ok(EquilibriumPoint {
        k,
        w: (root - y_k) / (y_k1 - y_k),
        yq: root,
    })
}

/// Build the reduced table from the converged points, interpolating every
/// field and fraction between the bracketing yq planes.
fn assemble(
    slice: &TableSlice,
    solved: &[(usize, EquilibriumPoint)],
) -> SolverResult<ReducedEosTable> {
    let lerp2 = |data: &ndarray::Array2<f64>, i: usize, p: &EquilibriumPoint| -> f64 {
        let lo = data[[i, p.k]];
        let hi = if p.w == 0.0 {
            lo
        } else {
            data[[i, p.k + 1]]
        };
        (1.0 - p.w) * lo + p.w * hi
    };

    let nb_values: Vec<f64> = solved.iter().map(|&(i, _)| slice.nb().get(i)).collect();
    let yq_values: Vec<f64> = solved.iter().map(|(_, p)| p.yq).collect();

    let mut fields: BTreeMap<Field, Array1<f64>> = BTreeMap::new();
    for (field, data) in slice.fields() {
        let v: Vec<f64> = solved.iter().map(|(i, p)| lerp2(data, *i, p)).collect();
        fields.insert(field, Array1::from(v));
    }

    let mut pair_fractions: BTreeMap<i32, Array1<f64>> = BTreeMap::new();
    for (code, data) in slice.pair_fractions() {
        let v: Vec<f64> = solved.iter().map(|(i, p)| lerp2(data, *i, p)).collect();
        pair_fractions.insert(code, Array1::from(v));
    }

    let mut quads: BTreeMap<i32, QuadComposition<Array1<f64>>> = BTreeMap::new();
    for (code, q) in slice.quads() {
        let take = |d: &ndarray::Array2<f64>| -> Array1<f64> {
            Array1::from(
                solved
                    .iter()
                    .map(|(i, p)| lerp2(d, *i, p))
                    .collect::<Vec<f64>>(),
            )
        };
        quads.insert(
            code,
            QuadComposition {
                fraction: take(&q.fraction),
                mass_number: take(&q.mass_number),
                charge_number: take(&q.charge_number),
            },
        );
    }

    let nb = GridAxis::new(AxisId::Nb, Array1::from(nb_values))?;
    Ok(ReducedEosTable::new(
        nb,
        slice.t_value(),
        Array1::from(yq_values),
        fields,
        pair_fractions,
        quads,
        slice.registry().clone(),
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use eos_table::{dd2_registry, FiniteDifferenceModel, TableBuilder};
    use ndarray::{Array1, Array3};
    use std::sync::Arc;

    /// Slice with a planted equilibrium: mu_q + mu_l crosses zero exactly at
    /// yq = root(nb), linear in yq.
    fn planted_slice(roots: &[f64]) -> TableSlice {
        let n_nb = roots.len();
        let n = (n_nb, 1, 5);
        let nb_vals: Vec<f64> = (0..n_nb).map(|i| 0.01 * (i as f64 + 1.0)).collect();
        let yq_vals = [0.05, 0.15, 0.25, 0.35, 0.45];

        let roots = roots.to_vec();
        let mu_q = Array3::from_shape_fn(n, |(i, _, k)| yq_vals[k] - roots[i]);
        let mu_l = Array3::zeros(n);
        let energy = Array3::from_shape_fn(n, |(i, _, _)| 940.0 * nb_vals[i]);
        let pressure = energy.mapv(|e| 0.05 * e);

        let table = TableBuilder::new(
            Arc::new(dd2_registry()),
            Array1::from(nb_vals),
            Array1::from(vec![0.1]),
            Array1::from(yq_vals.to_vec()),
        )
        .field(Field::Pressure, pressure)
        .field(Field::Energy, energy)
        .field(Field::MuQ, mu_q)
        .field(Field::MuL, mu_l)
        .build()
        .unwrap();
        table.slice_at_t_idx(0).unwrap()
    }

    #[test]
    fn converges_to_planted_root() {
        let slice = planted_slice(&[0.31]);
        let report =
            make_beta_eq_table(&slice, &FiniteDifferenceModel, &BetaSolveConfig::default())
                .unwrap();
        assert_eq!(report.num_converged(), 1);
        assert_eq!(report.num_failed(), 0);
        assert!((report.table.yq()[0] - 0.31).abs() < 1e-8);
    }

    #[test]
    fn every_density_converges() {
        let slice = planted_slice(&[0.07, 0.12, 0.22, 0.33, 0.44]);
        let report =
            make_beta_eq_table(&slice, &FiniteDifferenceModel, &BetaSolveConfig::default())
                .unwrap();
        assert_eq!(report.num_converged(), 5);
        for (i, &root) in [0.07, 0.12, 0.22, 0.33, 0.44].iter().enumerate() {
            assert!((report.table.yq()[i] - root).abs() < 1e-8);
        }
        // Interpolated fields follow the planted linear profiles
        let pressure = report.table.field(Field::Pressure).unwrap();
        assert!((pressure[0] - 0.05 * 940.0 * 0.01).abs() < 1e-9);
    }

    #[test]
    fn no_sign_change_is_excluded_not_fatal() {
        // Roots at 0.1 and (out of range) 0.9: one converges, one fails
        let slice = planted_slice(&[0.1, 0.9]);
        let report =
            make_beta_eq_table(&slice, &FiniteDifferenceModel, &BetaSolveConfig::default())
                .unwrap();
        assert_eq!(report.num_converged(), 1);
        assert_eq!(report.num_failed(), 1);
        assert_eq!(report.failures[0].i_nb, 1);
        assert!(matches!(
            report.failures[0].error,
            SolverError::NoEquilibriumFound { i_nb: 1, .. }
        ));
    }

    #[test]
    fn missing_chemical_potentials_rejected() {
        let table = TableBuilder::new(
            Arc::new(dd2_registry()),
            Array1::from(vec![0.01, 0.02]),
            Array1::from(vec![0.1]),
            Array1::from(vec![0.1, 0.2]),
        )
        .field(Field::Pressure, Array3::from_elem((2, 1, 2), 1.0))
        .field(Field::Energy, Array3::from_elem((2, 1, 2), 10.0))
        .build()
        .unwrap();
        let slice = table.slice_at_t_idx(0).unwrap();
        let err = make_beta_eq_table(&slice, &FiniteDifferenceModel, &BetaSolveConfig::default())
            .unwrap_err();
        assert_eq!(err, SolverError::MissingField { field: Field::MuQ });
    }
}
