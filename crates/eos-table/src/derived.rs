//! Derived quantities: sound speed squared and mean mass/charge numbers.

use crate::model::ThermodynamicModel;
use crate::table::{EosTable, Field};
use ndarray::Array3;
use rayon::prelude::*;
use tracing::{debug, warn};

impl EosTable {
    /// Compute sound speed squared at every grid point from the tabulated
    /// pressure and energy density, via the model's derivative along the
    /// density axis at fixed (t, yq).
    ///
    /// Values below `floor` are clamped to `floor`, values above 1 (the
    /// causal bound in units of c^2) are clamped to 1; numerical noise near
    /// table edges otherwise produces small negative or superluminal values
    /// that downstream consumers choke on. Never fails: pressure and energy
    /// are construction-time required fields.
    ///
    /// Parallel over (t, yq) rays; each ray is independent, so the result
    /// does not depend on scheduling order.
    pub fn compute_cs2(&mut self, model: &dyn ThermodynamicModel, floor: f64) {
        let (n_nb, n_t, n_yq) = self.shape();
        let pressure = &self.fields[&Field::Pressure];
        let energy = &self.fields[&Field::Energy];
        let nb: Vec<f64> = self.nb.values().to_vec();

        let rays: Vec<((usize, usize), Vec<f64>)> = (0..n_t * n_yq)
            .into_par_iter()
            .map(|ray| {
                let (j, k) = (ray / n_yq, ray % n_yq);
                let p: Vec<f64> = (0..n_nb).map(|i| pressure[[i, j, k]]).collect();
                let e: Vec<f64> = (0..n_nb).map(|i| energy[[i, j, k]]).collect();
                let mut out = vec![0.0; n_nb];
                model.cs2_along_density(&nb, &p, &e, &mut out);
                for v in &mut out {
                    *v = v.clamp(floor, 1.0);
                    if !v.is_finite() {
                        *v = floor;
                    }
                }
                ((j, k), out)
            })
            .collect();

        let mut cs2 = Array3::from_elem((n_nb, n_t, n_yq), floor);
        for ((j, k), ray) in rays {
            for (i, v) in ray.into_iter().enumerate() {
                cs2[[i, j, k]] = v;
            }
        }
        debug!(floor, "computed cs2 field");
        self.fields.insert(Field::Cs2, cs2);
    }

    /// Compute the mean mass number (and mean charge number) of composite
    /// species at every grid point:
    ///
    ///   Abar = sum_i A_i X_i / sum_i X_i   over quad species i.
    ///
    /// A point with zero total quad fraction gets the sentinel 0.0 and is
    /// excluded from the validity mask; it is not an error. A table with no
    /// quad species at all is left untouched: masking the whole grid for a
    /// purely nucleonic table would be wrong.
    pub fn compute_abar(&mut self) {
        if self.quads.is_empty() {
            warn!("no composite species present; abar/zbar not computed");
            return;
        }
        let shape = self.shape();
        let mut abar = Array3::zeros(shape);
        let mut zbar = Array3::zeros(shape);
        let mut dropped = 0usize;

        for i in 0..shape.0 {
            for j in 0..shape.1 {
                for k in 0..shape.2 {
                    let mut x_sum = 0.0;
                    let mut ax_sum = 0.0;
                    let mut zx_sum = 0.0;
                    for q in self.quads.values() {
                        let x = q.fraction[[i, j, k]];
                        x_sum += x;
                        ax_sum += q.mass_number[[i, j, k]] * x;
                        zx_sum += q.charge_number[[i, j, k]] * x;
                    }
                    if x_sum > 0.0 {
                        abar[[i, j, k]] = ax_sum / x_sum;
                        zbar[[i, j, k]] = zx_sum / x_sum;
                    } else {
                        // Sentinel stays 0.0; mask the point instead of
                        // raising a division error.
                        if self.valid[[i, j, k]] {
                            self.valid[[i, j, k]] = false;
                            dropped += 1;
                        }
                    }
                }
            }
        }
        if dropped > 0 {
            debug!(dropped, "masked points with no composite species");
        }
        self.fields.insert(Field::Abar, abar);
        self.fields.insert(Field::Zbar, zbar);
    }
}
