//! Grid axes: strictly increasing coordinate arrays with index helpers.

use crate::error::{TableError, TableResult};
use eos_core::{max_spacing_deviation, resolve_index};
use ndarray::Array1;

/// Identity of a table axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisId {
    /// Baryon number density [fm^-3].
    Nb,
    /// Temperature [MeV].
    T,
    /// Charge fraction per baryon.
    Yq,
}

impl AxisId {
    pub fn as_str(&self) -> &'static str {
        match self {
            AxisId::Nb => "nb",
            AxisId::T => "t",
            AxisId::Yq => "yq",
        }
    }
}

impl std::fmt::Display for AxisId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One coordinate axis of the grid.
///
/// Construction guarantees the values are strictly increasing; optionally it
/// also guarantees uniform spacing (in linear or, for positive axes such as
/// density, logarithmic coordinates) within a relative tolerance.
#[derive(Debug, Clone, PartialEq)]
pub struct GridAxis {
    id: AxisId,
    values: Array1<f64>,
}

impl GridAxis {
    pub fn new(id: AxisId, values: Array1<f64>) -> TableResult<Self> {
        let v = values.to_vec();
        for (i, w) in v.windows(2).enumerate() {
            if !(w[1] > w[0]) {
                return Err(TableError::NonMonotonicAxis {
                    axis: id.as_str(),
                    index: i + 1,
                });
            }
        }
        Ok(Self { id, values })
    }

    /// Construct and additionally require uniform spacing.
    ///
    /// A log-uniform grid (common for the density axis) passes too: spacing
    /// is checked in linear and, when all values are positive, logarithmic
    /// coordinates, and the smaller deviation is compared to `tol`.
    pub fn new_equally_spaced(id: AxisId, values: Array1<f64>, tol: f64) -> TableResult<Self> {
        let axis = Self::new(id, values)?;
        let v = axis.values.to_vec();
        let mut deviation = max_spacing_deviation(&v);
        if v.iter().all(|&x| x > 0.0) {
            let logs: Vec<f64> = v.iter().map(|&x| x.ln()).collect();
            deviation = deviation.min(max_spacing_deviation(&logs));
        }
        if deviation > tol {
            return Err(TableError::IrregularGrid {
                axis: id.as_str(),
                deviation,
                tol,
            });
        }
        Ok(axis)
    }

    pub fn id(&self) -> AxisId {
        self.id
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    pub fn get(&self, i: usize) -> f64 {
        self.values[i]
    }

    pub fn first(&self) -> f64 {
        self.values[0]
    }

    pub fn last(&self) -> f64 {
        self.values[self.values.len() - 1]
    }

    /// Resolve a possibly negative index against this axis (`-1` is the last
    /// point), consistent across all table operations.
    pub fn resolve(&self, index: isize) -> TableResult<usize> {
        Ok(resolve_index(index, self.len(), self.id.as_str())?)
    }

    /// Index of the grid value closest to `x`.
    pub fn nearest(&self, x: f64) -> usize {
        let mut best = 0;
        let mut best_d = f64::INFINITY;
        for (i, &v) in self.values.iter().enumerate() {
            let d = (v - x).abs();
            if d < best_d {
                best_d = d;
                best = i;
            }
        }
        best
    }

    /// New axis keeping indices `[i0, i1)`. Caller has already resolved and
    /// range-checked the bounds.
    pub(crate) fn restricted(&self, i0: usize, i1: usize) -> Self {
        Self {
            id: self.id,
            values: self.values.slice(ndarray::s![i0..i1]).to_owned(),
        }
    }
}
