//! Grid reduction: axis restriction, valid-region shrinking, slicing.
//!
//! Every operation here returns a freshly owned table; no arrays are shared
//! with the source.

use crate::axis::AxisId;
use crate::error::{TableError, TableResult};
use crate::table::{EosTable, QuadComposition, TableSlice};
use ndarray::Axis as NdAxis;
use std::collections::BTreeMap;
use tracing::info;

impl EosTable {
    /// New table keeping only indices `[i0, i1)` of the given axis.
    ///
    /// Python-style negative indices count from the end, so `i1 = -1` drops
    /// exactly the last plane. `None` bounds default to the full range.
    /// An empty result is an error, not an empty table.
    pub fn restrict_idx(
        &self,
        axis: AxisId,
        i0: Option<isize>,
        i1: Option<isize>,
    ) -> TableResult<EosTable> {
        let (axis_ref, dim) = match axis {
            AxisId::Nb => (&self.nb, 0),
            AxisId::T => (&self.t, 1),
            AxisId::Yq => (&self.yq, 2),
        };
        let len = axis_ref.len();

        let i0 = match i0 {
            None => 0,
            Some(i) => axis_ref.resolve(i)?,
        };
        // The upper bound is exclusive, so `len` itself is in range.
        let i1 = match i1 {
            None => len,
            Some(i) => {
                let r = if i < 0 { i + len as isize } else { i };
                if r < 0 || r as usize > len {
                    return Err(TableError::IndexOutOfRange {
                        what: axis.as_str(),
                        index: i,
                        len,
                    });
                }
                r as usize
            }
        };
        if i1 <= i0 {
            return Err(TableError::IndexOutOfRange {
                what: axis.as_str(),
                index: i1 as isize,
                len,
            });
        }

        let indices: Vec<usize> = (i0..i1).collect();
        let take3 = |a: &ndarray::Array3<f64>| a.select(NdAxis(dim), &indices);

        let mut out = self.clone();
        match axis {
            AxisId::Nb => out.nb = self.nb.restricted(i0, i1),
            AxisId::T => out.t = self.t.restricted(i0, i1),
            AxisId::Yq => out.yq = self.yq.restricted(i0, i1),
        }
        out.fields = self.fields.iter().map(|(&f, a)| (f, take3(a))).collect();
        out.pair_fractions = self
            .pair_fractions
            .iter()
            .map(|(&c, a)| (c, take3(a)))
            .collect();
        out.quads = self
            .quads
            .iter()
            .map(|(&c, q)| {
                (
                    c,
                    QuadComposition {
                        fraction: take3(&q.fraction),
                        mass_number: take3(&q.mass_number),
                        charge_number: take3(&q.charge_number),
                    },
                )
            })
            .collect();
        out.valid = self.valid.select(NdAxis(dim), &indices);
        info!(axis = %axis, i0, i1, "restricted axis");
        Ok(out)
    }

    /// Restrict the density axis to the longest contiguous interval whose
    /// every (t, yq) point is valid.
    pub fn shrink_to_valid_nb(&self) -> TableResult<EosTable> {
        let (n_nb, _, _) = self.shape();
        let plane_valid: Vec<bool> = (0..n_nb)
            .map(|i| self.valid.index_axis(NdAxis(0), i).iter().all(|&v| v))
            .collect();

        let mut best: Option<(usize, usize)> = None;
        let mut start = None;
        for (i, &ok) in plane_valid.iter().enumerate() {
            match (ok, start) {
                (true, None) => start = Some(i),
                (false, Some(s)) => {
                    if best.is_none_or(|(bs, be)| i - s > be - bs) {
                        best = Some((s, i));
                    }
                    start = None;
                }
                _ => {}
            }
        }
        if let Some(s) = start {
            if best.is_none_or(|(bs, be)| n_nb - s > be - bs) {
                best = Some((s, n_nb));
            }
        }

        let (s, e) = best.ok_or(TableError::NoValidRegion)?;
        self.restrict_idx(AxisId::Nb, Some(s as isize), Some(e as isize))
    }

    /// Collapse the temperature axis to the single value at `i_t`, producing
    /// a 2-D (nb x yq) slice with the temperature as a fixed attribute.
    pub fn slice_at_t_idx(&self, i_t: isize) -> TableResult<TableSlice> {
        let j = self.t.resolve(i_t)?;
        let take2 = |a: &ndarray::Array3<f64>| a.index_axis(NdAxis(1), j).to_owned();

        let fields: BTreeMap<_, _> = self.fields.iter().map(|(&f, a)| (f, take2(a))).collect();
        let pair_fractions: BTreeMap<_, _> = self
            .pair_fractions
            .iter()
            .map(|(&c, a)| (c, take2(a)))
            .collect();
        let quads: BTreeMap<_, _> = self
            .quads
            .iter()
            .map(|(&c, q)| {
                (
                    c,
                    QuadComposition {
                        fraction: take2(&q.fraction),
                        mass_number: take2(&q.mass_number),
                        charge_number: take2(&q.charge_number),
                    },
                )
            })
            .collect();

        Ok(TableSlice {
            nb: self.nb.clone(),
            yq: self.yq.clone(),
            t_value: self.t.get(j),
            fields,
            pair_fractions,
            quads,
            valid: self.valid.index_axis(NdAxis(1), j).to_owned(),
            registry: self.registry.clone(),
        })
    }
}
