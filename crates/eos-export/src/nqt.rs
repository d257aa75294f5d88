//! NQT fast-lookup tables.
//!
//! Converts an exported table archive into a piecewise-polynomial lookup
//! structure over the density axis: one polynomial segment per binary
//! exponent of the query coordinate, so segment selection reduces to
//! extracting the IEEE-754 exponent field from the query's bit pattern
//! (no comparisons, no binary search). A comparison-based scan is kept as
//! the fallback mode.
//!
//! The serialized form is byte-reproducible: building twice from the same
//! archive with the same order and mode produces identical files, and a
//! SHA-256 digest over the payload is appended so consumers can verify
//! integrity by checksum.

use crate::archive::read_raw;
use crate::atomic::write_atomic;
use crate::error::{ExportError, ExportResult};
use nalgebra::{DMatrix, DVector};
use sha2::{Digest, Sha256};
use std::path::Path;
use tracing::{debug, info};

const MAGIC: &[u8; 8] = b"EOSNQT01";
const DIGEST_LEN: usize = 32;

/// Conversion parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NqtConfig {
    /// Polynomial order per segment; 1 (linear) and 2 (quadratic) are
    /// supported.
    pub order: usize,
    /// Select segments via the exponent bit trick rather than a
    /// comparison scan.
    pub use_bithacks: bool,
}

impl Default for NqtConfig {
    fn default() -> Self {
        Self {
            order: 2,
            use_bithacks: true,
        }
    }
}

/// A built lookup table: pressure as a piecewise polynomial of baryon
/// density, one segment per binary exponent between the grid endpoints.
#[derive(Debug, Clone, PartialEq)]
pub struct NqtTable {
    order: usize,
    use_bithacks: bool,
    /// Binary exponent of the first segment.
    lo_exp: i32,
    n_seg: usize,
    x_min: f64,
    x_max: f64,
    /// `n_seg * (order + 1)` coefficients, lowest power first per segment.
    coeffs: Vec<f64>,
}

fn exponent_of(x: f64) -> i32 {
    (((x.to_bits() >> 52) & 0x7ff) as i32) - 1023
}

/// Piecewise-linear interpolation of tabulated (x, y) at `q`, clamped to
/// the grid range.
fn interpolate(x: &[f64], y: &[f64], q: f64) -> f64 {
    if q <= x[0] {
        return y[0];
    }
    let last = x.len() - 1;
    if q >= x[last] {
        return y[last];
    }
    let hi = x.partition_point(|&v| v < q).max(1);
    let lo = hi - 1;
    let w = (q - x[lo]) / (x[hi] - x[lo]);
    y[lo] + w * (y[hi] - y[lo])
}

impl NqtTable {
    /// Build a lookup table from an archive file written by
    /// [`crate::write_archive`] or [`crate::write_reduced_archive`].
    ///
    /// The density axis and the pressure field are read back; for a 3-D
    /// archive the ray at the first temperature and charge-fraction
    /// indices is used. Fails with [`ExportError::SourceTableMissing`]
    /// if `path` does not exist and [`ExportError::UnsupportedOrder`]
    /// for orders outside {1, 2}.
    pub fn build_from_archive(path: &Path, config: &NqtConfig) -> ExportResult<Self> {
        if !(config.order == 1 || config.order == 2) {
            return Err(ExportError::UnsupportedOrder {
                order: config.order,
            });
        }
        if !path.exists() {
            return Err(ExportError::SourceTableMissing {
                path: path.to_path_buf(),
            });
        }
        let raw = read_raw(path)?;
        let nb = raw
            .data
            .iter()
            .find(|(m, _)| m.role == "axis" && m.name == "nb")
            .ok_or_else(|| ExportError::Malformed {
                what: "archive lacks a density axis".to_string(),
            })?
            .1
            .clone();
        let (pressure_meta, pressure_all) = raw
            .data
            .iter()
            .find(|(m, _)| m.role == "field" && m.name == "pressure")
            .ok_or_else(|| ExportError::Malformed {
                what: "archive lacks a pressure field".to_string(),
            })?;
        // Row-major layout: for a 3-D field the (i, 0, 0) ray has stride
        // n_t * n_yq.
        let stride: usize = pressure_meta.shape[1..].iter().product();
        let pressure: Vec<f64> = pressure_all.iter().copied().step_by(stride.max(1)).collect();
        if pressure.len() != nb.len() || nb.len() < 2 {
            return Err(ExportError::Malformed {
                what: "density axis and pressure field disagree".to_string(),
            });
        }
        Self::fit(&nb, &pressure, config)
    }

    /// Fit segment polynomials to tabulated (density, pressure) samples.
    pub fn fit(x: &[f64], y: &[f64], config: &NqtConfig) -> ExportResult<Self> {
        if !(config.order == 1 || config.order == 2) {
            return Err(ExportError::UnsupportedOrder {
                order: config.order,
            });
        }
        if x.len() < 2 || x.len() != y.len() {
            return Err(ExportError::Malformed {
                what: "lookup fit needs at least two matched samples".to_string(),
            });
        }
        let x_min = x[0];
        let x_max = x[x.len() - 1];
        if !(x_min > 0.0) {
            return Err(ExportError::Malformed {
                what: "density axis must be positive for exponent segmentation".to_string(),
            });
        }
        let lo_exp = exponent_of(x_min);
        let n_seg = (exponent_of(x_max) - lo_exp + 1) as usize;
        let n_coef = config.order + 1;

        let mut coeffs = Vec::with_capacity(n_seg * n_coef);
        for seg in 0..n_seg {
            let seg_lo = f64::powi(2.0, lo_exp + seg as i32).max(x_min);
            let seg_hi = f64::powi(2.0, lo_exp + seg as i32 + 1).min(x_max);
            if seg_hi <= seg_lo {
                // x_max sits exactly on a power of two: the last segment is a
                // single point, fitted as a constant.
                coeffs.push(interpolate(x, y, seg_lo));
                coeffs.extend(std::iter::repeat(0.0).take(n_coef - 1));
                continue;
            }
            // Collocate at n_coef evenly spaced nodes across the segment;
            // the fit matches the tabulated interpolant there exactly,
            // which keeps the build deterministic.
            let mut vander = DMatrix::zeros(n_coef, n_coef);
            let mut rhs = DVector::zeros(n_coef);
            for node in 0..n_coef {
                let q = seg_lo + (seg_hi - seg_lo) * node as f64 / (n_coef - 1) as f64;
                let mut pow = 1.0;
                for col in 0..n_coef {
                    vander[(node, col)] = pow;
                    pow *= q;
                }
                rhs[node] = interpolate(x, y, q);
            }
            let solution = vander.lu().solve(&rhs).ok_or_else(|| ExportError::Malformed {
                what: format!("degenerate segment {seg} in lookup fit"),
            })?;
            coeffs.extend(solution.iter());
        }
        debug!(n_seg, order = config.order, "fitted lookup segments");
        Ok(Self {
            order: config.order,
            use_bithacks: config.use_bithacks,
            lo_exp,
            n_seg,
            x_min,
            x_max,
            coeffs,
        })
    }

    pub fn order(&self) -> usize {
        self.order
    }

    pub fn n_segments(&self) -> usize {
        self.n_seg
    }

    /// Segment index for a query, clamped to the covered range.
    pub fn segment_index(&self, x: f64) -> usize {
        let x = x.clamp(self.x_min, self.x_max);
        if self.use_bithacks {
            let seg = exponent_of(x) - self.lo_exp;
            (seg.max(0) as usize).min(self.n_seg - 1)
        } else {
            let mut seg = 0;
            while seg + 1 < self.n_seg
                && x >= f64::powi(2.0, self.lo_exp + seg as i32 + 1)
            {
                seg += 1;
            }
            seg
        }
    }

    /// Evaluate the lookup polynomial at `x` (clamped to the table range).
    pub fn evaluate(&self, x: f64) -> f64 {
        let x = x.clamp(self.x_min, self.x_max);
        let n_coef = self.order + 1;
        let seg = self.segment_index(x);
        let c = &self.coeffs[seg * n_coef..(seg + 1) * n_coef];
        let mut acc = 0.0;
        for &coef in c.iter().rev() {
            acc = acc * x + coef;
        }
        acc
    }

    /// Serialize. The layout is fixed-order little-endian with a trailing
    /// SHA-256 digest over everything before it, so identical builds are
    /// byte-for-byte identical.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&(self.order as u32).to_le_bytes());
        out.push(u8::from(self.use_bithacks));
        out.extend_from_slice(&self.lo_exp.to_le_bytes());
        out.extend_from_slice(&(self.n_seg as u64).to_le_bytes());
        out.extend_from_slice(&self.x_min.to_le_bytes());
        out.extend_from_slice(&self.x_max.to_le_bytes());
        for c in &self.coeffs {
            out.extend_from_slice(&c.to_le_bytes());
        }
        let digest = Sha256::digest(&out);
        out.extend_from_slice(&digest);
        out
    }

    /// Deserialize and verify the trailing digest.
    pub fn from_bytes(bytes: &[u8]) -> ExportResult<Self> {
        let header_len = 8 + 4 + 1 + 4 + 8 + 8 + 8;
        if bytes.len() < header_len + DIGEST_LEN || &bytes[..8] != MAGIC {
            return Err(ExportError::Malformed {
                what: "not an NQT lookup file".to_string(),
            });
        }
        let payload_len = bytes.len() - DIGEST_LEN;
        let digest = Sha256::digest(&bytes[..payload_len]);
        if digest.as_slice() != &bytes[payload_len..] {
            return Err(ExportError::Malformed {
                what: "NQT checksum mismatch".to_string(),
            });
        }
        fn take<'a>(bytes: &'a [u8], cursor: &mut usize, n: usize) -> &'a [u8] {
            let s = &bytes[*cursor..*cursor + n];
            *cursor += n;
            s
        }
        let mut cursor = 8;
        let mut b4 = [0u8; 4];
        let mut b8 = [0u8; 8];
        b4.copy_from_slice(take(bytes, &mut cursor, 4));
        let order = u32::from_le_bytes(b4) as usize;
        let use_bithacks = take(bytes, &mut cursor, 1)[0] != 0;
        b4.copy_from_slice(take(bytes, &mut cursor, 4));
        let lo_exp = i32::from_le_bytes(b4);
        b8.copy_from_slice(take(bytes, &mut cursor, 8));
        let n_seg = u64::from_le_bytes(b8) as usize;
        b8.copy_from_slice(take(bytes, &mut cursor, 8));
        let x_min = f64::from_le_bytes(b8);
        b8.copy_from_slice(take(bytes, &mut cursor, 8));
        let x_max = f64::from_le_bytes(b8);

        let n_coef = order + 1;
        if payload_len != header_len + 8 * n_seg * n_coef {
            return Err(ExportError::Malformed {
                what: "NQT coefficient block has the wrong length".to_string(),
            });
        }
        let mut coeffs = Vec::with_capacity(n_seg * n_coef);
        for _ in 0..n_seg * n_coef {
            b8.copy_from_slice(take(bytes, &mut cursor, 8));
            coeffs.push(f64::from_le_bytes(b8));
        }
        Ok(Self {
            order,
            use_bithacks,
            lo_exp,
            n_seg,
            x_min,
            x_max,
            coeffs,
        })
    }

    /// Write the serialized table atomically.
    pub fn write(&self, path: &Path) -> ExportResult<()> {
        write_atomic(path, &self.to_bytes())?;
        info!(path = %path.display(), n_seg = self.n_seg, "wrote NQT lookup table");
        Ok(())
    }
}
