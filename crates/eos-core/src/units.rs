// eos-core/src/units.rs
//
// Natural units throughout: energies and chemical potentials in MeV,
// number densities in fm^-3, pressure and energy density in MeV fm^-3,
// temperature in MeV, sound speed squared in units of c^2.

/// MeV fm^-3 expressed in CGS energy density [erg cm^-3].
pub const MEV_FM3_TO_ERG_CM3: f64 = 1.602_176_634e33;

/// MeV fm^-3 expressed in CGS mass density [g cm^-3].
pub const MEV_FM3_TO_G_CM3: f64 = 1.782_661_921e6;

/// Unit label for each exported quantity, recorded in archive metadata.
pub fn unit_label(what: &str) -> &'static str {
    match what {
        "nb" => "fm^-3",
        "t" => "MeV",
        "yq" => "",
        "pressure" => "MeV fm^-3",
        "energy" => "MeV fm^-3",
        "entropy" => "k_B / baryon",
        "mu_b" | "mu_q" | "mu_l" => "MeV",
        "cs2" => "c^2",
        _ => "",
    }
}
