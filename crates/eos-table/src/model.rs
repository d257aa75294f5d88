//! Thermodynamic model seam.
//!
//! The exact derivative scheme behind the sound speed, and the sign
//! convention of the beta-equilibrium balance, are microphysics choices.
//! They sit behind this trait so the table machinery stays agnostic and
//! alternative schemes can plug in without touching the grid code.

/// Pluggable microphysics used by derived-quantity computation and the
/// beta-equilibrium solver.
pub trait ThermodynamicModel: Send + Sync {
    /// Sound speed squared along one density ray at fixed (t, yq):
    /// cs^2 = dp/de with `p` pressure and `e` total energy density, both
    /// tabulated on the `nb` grid. Writes one value per density point into
    /// `out`. No clamping here; the caller applies the floor/causality
    /// bounds.
    fn cs2_along_density(&self, nb: &[f64], pressure: &[f64], energy: &[f64], out: &mut [f64]);

    /// Beta-equilibrium balance at one grid point. A root in `yq` of this
    /// function is the equilibrium charge fraction.
    ///
    /// Convention: with mu_q = mu_p - mu_n and mu_l = mu_e, the balance
    /// mu_q + mu_l equals -(mu_n - mu_p - mu_e), so it shares its root with
    /// the textbook condition mu_n = mu_p + mu_e.
    fn beta_balance(&self, mu_q: f64, mu_l: f64) -> f64 {
        mu_q + mu_l
    }
}

/// Default model: centered finite differences in the interior, one-sided
/// differences at the first and last density points.
#[derive(Debug, Clone, Copy, Default)]
pub struct FiniteDifferenceModel;

impl ThermodynamicModel for FiniteDifferenceModel {
    fn cs2_along_density(&self, nb: &[f64], pressure: &[f64], energy: &[f64], out: &mut [f64]) {
        let n = nb.len();
        debug_assert!(n == pressure.len() && n == energy.len() && n == out.len());
        if n < 2 {
            // A single point has no density derivative.
            out.fill(0.0);
            return;
        }
        for i in 0..n {
            let (lo, hi) = match i {
                0 => (0, 1),
                _ if i == n - 1 => (n - 2, n - 1),
                _ => (i - 1, i + 1),
            };
            let de = energy[hi] - energy[lo];
            out[i] = if de == 0.0 {
                0.0
            } else {
                (pressure[hi] - pressure[lo]) / de
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn linear_eos_gives_constant_cs2() {
        // p = 0.25 * e  =>  dp/de = 0.25 everywhere
        let nb: Vec<f64> = (1..=5).map(|i| i as f64 * 0.01).collect();
        let energy: Vec<f64> = nb.iter().map(|&x| 940.0 * x).collect();
        let pressure: Vec<f64> = energy.iter().map(|&e| 0.25 * e).collect();
        let mut out = vec![0.0; nb.len()];
        FiniteDifferenceModel.cs2_along_density(&nb, &pressure, &energy, &mut out);
        for v in out {
            assert!((v - 0.25).abs() < 1e-12);
        }
    }

    #[test]
    fn single_point_has_no_derivative() {
        let mut out = vec![42.0];
        FiniteDifferenceModel.cs2_along_density(&[0.1], &[1.0], &[2.0], &mut out);
        assert_eq!(out[0], 0.0);
    }

    #[test]
    fn balance_sign_convention() {
        // mu_n = mu_p + mu_e  <=>  mu_q + mu_l = 0
        let m = FiniteDifferenceModel;
        assert_eq!(m.beta_balance(-5.0, 5.0), 0.0);
        assert!(m.beta_balance(-5.0, 4.0) < 0.0);
    }
}
