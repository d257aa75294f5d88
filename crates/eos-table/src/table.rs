//! The EOS table data model: 3-D tables, 2-D slices, 1-D reduced tables.

use crate::axis::{AxisId, GridAxis};
use crate::error::{TableError, TableResult};
use crate::species::{SpeciesKind, SpeciesRegistry};
use ndarray::{Array1, Array2, Array3};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Canonical thermodynamic field names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Field {
    /// Pressure [MeV fm^-3].
    Pressure,
    /// Total energy density [MeV fm^-3].
    Energy,
    /// Entropy per baryon [k_B].
    Entropy,
    /// Baryon chemical potential [MeV].
    MuB,
    /// Charge chemical potential, mu_p - mu_n [MeV].
    MuQ,
    /// Lepton chemical potential [MeV].
    MuL,
    /// Sound speed squared [c^2].
    Cs2,
    /// Mean mass number of composite species.
    Abar,
    /// Mean charge number of composite species.
    Zbar,
}

impl Field {
    pub const ALL: [Field; 9] = [
        Field::Pressure,
        Field::Energy,
        Field::Entropy,
        Field::MuB,
        Field::MuQ,
        Field::MuL,
        Field::Cs2,
        Field::Abar,
        Field::Zbar,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Field::Pressure => "pressure",
            Field::Energy => "energy",
            Field::Entropy => "entropy",
            Field::MuB => "mu_b",
            Field::MuQ => "mu_q",
            Field::MuL => "mu_l",
            Field::Cs2 => "cs2",
            Field::Abar => "abar",
            Field::Zbar => "zbar",
        }
    }

    pub fn unit(&self) -> &'static str {
        eos_core::unit_label(self.as_str())
    }
}

impl std::fmt::Display for Field {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Field {
    type Err = &'static str;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Field::ALL
            .iter()
            .copied()
            .find(|f| f.as_str() == s)
            .ok_or("unknown field name")
    }
}

/// Per-point composition of one composite (quad) species: its number
/// fraction plus the average mass and charge numbers of the cluster.
#[derive(Debug, Clone, PartialEq)]
pub struct QuadComposition<D> {
    pub fraction: D,
    pub mass_number: D,
    pub charge_number: D,
}

/// Builder for [`EosTable`]: collects axes, fields, and composition arrays,
/// then checks every structural invariant in one place.
pub struct TableBuilder {
    registry: Arc<SpeciesRegistry>,
    nb: Array1<f64>,
    t: Array1<f64>,
    yq: Array1<f64>,
    spacing_tol: Option<f64>,
    fields: BTreeMap<Field, Array3<f64>>,
    pair_fractions: BTreeMap<i32, Array3<f64>>,
    quads: BTreeMap<i32, QuadComposition<Array3<f64>>>,
    valid: Option<Array3<bool>>,
}

impl TableBuilder {
    pub fn new(
        registry: Arc<SpeciesRegistry>,
        nb: Array1<f64>,
        t: Array1<f64>,
        yq: Array1<f64>,
    ) -> Self {
        Self {
            registry,
            nb,
            t,
            yq,
            spacing_tol: None,
            fields: BTreeMap::new(),
            pair_fractions: BTreeMap::new(),
            quads: BTreeMap::new(),
            valid: None,
        }
    }

    /// Require equally spaced axes (linear or logarithmic) within `tol`.
    pub fn enforce_equal_spacing(mut self, tol: f64) -> Self {
        self.spacing_tol = Some(tol);
        self
    }

    pub fn field(mut self, field: Field, data: Array3<f64>) -> Self {
        self.fields.insert(field, data);
        self
    }

    pub fn pair_fraction(mut self, code: i32, data: Array3<f64>) -> Self {
        self.pair_fractions.insert(code, data);
        self
    }

    pub fn quad(mut self, code: i32, comp: QuadComposition<Array3<f64>>) -> Self {
        self.quads.insert(code, comp);
        self
    }

    pub fn validity(mut self, mask: Array3<bool>) -> Self {
        self.valid = Some(mask);
        self
    }

    pub fn build(self) -> TableResult<EosTable> {
        let (nb, t, yq) = match self.spacing_tol {
            Some(tol) => (
                GridAxis::new_equally_spaced(AxisId::Nb, self.nb, tol)?,
                GridAxis::new_equally_spaced(AxisId::T, self.t, tol)?,
                GridAxis::new_equally_spaced(AxisId::Yq, self.yq, tol)?,
            ),
            None => (
                GridAxis::new(AxisId::Nb, self.nb)?,
                GridAxis::new(AxisId::T, self.t)?,
                GridAxis::new(AxisId::Yq, self.yq)?,
            ),
        };
        let shape = (nb.len(), t.len(), yq.len());

        for (field, data) in &self.fields {
            check_shape(field.as_str(), shape, data.dim())?;
        }
        for field in [Field::Pressure, Field::Energy] {
            if !self.fields.contains_key(&field) {
                return Err(TableError::MissingField { field });
            }
        }
        for (&code, data) in &self.pair_fractions {
            let info = self.registry.resolve(code)?;
            if matches!(info.kind, SpeciesKind::Quad) {
                return Err(TableError::UnknownSpecies { code });
            }
            check_shape(&info.symbol, shape, data.dim())?;
        }
        for (&code, comp) in &self.quads {
            let info = self.registry.resolve(code)?;
            if !matches!(info.kind, SpeciesKind::Quad) {
                return Err(TableError::UnknownSpecies { code });
            }
            check_shape(&info.symbol, shape, comp.fraction.dim())?;
            check_shape(&info.symbol, shape, comp.mass_number.dim())?;
            check_shape(&info.symbol, shape, comp.charge_number.dim())?;
        }

        let valid = match self.valid {
            Some(mask) => {
                check_shape("validity mask", shape, mask.dim())?;
                mask
            }
            None => Array3::from_elem(shape, true),
        };

        Ok(EosTable {
            nb,
            t,
            yq,
            fields: self.fields,
            pair_fractions: self.pair_fractions,
            quads: self.quads,
            valid,
            registry: self.registry,
        })
    }
}

fn check_shape(
    what: &str,
    expected: (usize, usize, usize),
    got: (usize, usize, usize),
) -> TableResult<()> {
    if expected != got {
        return Err(TableError::ShapeMismatch {
            what: what.to_string(),
            expected: vec![expected.0, expected.1, expected.2],
            got: vec![got.0, got.1, got.2],
        });
    }
    Ok(())
}

/// A 3-D (nb x t x yq) equation-of-state table.
///
/// Owns all of its arrays; reductions always return new, independently
/// owned tables.
#[derive(Debug, Clone)]
pub struct EosTable {
    pub(crate) nb: GridAxis,
    pub(crate) t: GridAxis,
    pub(crate) yq: GridAxis,
    pub(crate) fields: BTreeMap<Field, Array3<f64>>,
    pub(crate) pair_fractions: BTreeMap<i32, Array3<f64>>,
    pub(crate) quads: BTreeMap<i32, QuadComposition<Array3<f64>>>,
    pub(crate) valid: Array3<bool>,
    pub(crate) registry: Arc<SpeciesRegistry>,
}

impl EosTable {
    pub fn nb(&self) -> &GridAxis {
        &self.nb
    }

    pub fn t(&self) -> &GridAxis {
        &self.t
    }

    pub fn yq(&self) -> &GridAxis {
        &self.yq
    }

    pub fn shape(&self) -> (usize, usize, usize) {
        (self.nb.len(), self.t.len(), self.yq.len())
    }

    pub fn registry(&self) -> &Arc<SpeciesRegistry> {
        &self.registry
    }

    pub fn field(&self, field: Field) -> Option<&Array3<f64>> {
        self.fields.get(&field)
    }

    pub fn expect_field(&self, field: Field) -> TableResult<&Array3<f64>> {
        self.fields
            .get(&field)
            .ok_or(TableError::MissingField { field })
    }

    pub fn has_field(&self, field: Field) -> bool {
        self.fields.contains_key(&field)
    }

    /// Insert or replace a field, shape-checked against the axes.
    pub fn insert_field(&mut self, field: Field, data: Array3<f64>) -> TableResult<()> {
        check_shape(field.as_str(), self.shape(), data.dim())?;
        self.fields.insert(field, data);
        Ok(())
    }

    /// Fields present, in canonical order.
    pub fn fields(&self) -> impl Iterator<Item = (Field, &Array3<f64>)> {
        self.fields.iter().map(|(&f, a)| (f, a))
    }

    pub fn pair_fraction(&self, code: i32) -> Option<&Array3<f64>> {
        self.pair_fractions.get(&code)
    }

    pub fn pair_fractions(&self) -> impl Iterator<Item = (i32, &Array3<f64>)> {
        self.pair_fractions.iter().map(|(&c, a)| (c, a))
    }

    pub fn quad(&self, code: i32) -> Option<&QuadComposition<Array3<f64>>> {
        self.quads.get(&code)
    }

    pub fn quads(&self) -> impl Iterator<Item = (i32, &QuadComposition<Array3<f64>>)> {
        self.quads.iter().map(|(&c, q)| (c, q))
    }

    pub fn valid(&self) -> &Array3<bool> {
        &self.valid
    }

    pub fn is_valid(&self, i: usize, j: usize, k: usize) -> bool {
        self.valid[[i, j, k]]
    }

    pub(crate) fn set_invalid(&mut self, i: usize, j: usize, k: usize) {
        self.valid[[i, j, k]] = false;
    }

    /// Replace the validity mask, shape-checked against the axes.
    pub fn set_validity(&mut self, mask: Array3<bool>) -> TableResult<()> {
        check_shape("validity mask", self.shape(), mask.dim())?;
        self.valid = mask;
        Ok(())
    }
}

/// A table collapsed to one temperature: 2-D (nb x yq) arrays plus the
/// fixed temperature value.
#[derive(Debug, Clone)]
pub struct TableSlice {
    pub(crate) nb: GridAxis,
    pub(crate) yq: GridAxis,
    pub(crate) t_value: f64,
    pub(crate) fields: BTreeMap<Field, Array2<f64>>,
    pub(crate) pair_fractions: BTreeMap<i32, Array2<f64>>,
    pub(crate) quads: BTreeMap<i32, QuadComposition<Array2<f64>>>,
    pub(crate) valid: Array2<bool>,
    pub(crate) registry: Arc<SpeciesRegistry>,
}

impl TableSlice {
    pub fn nb(&self) -> &GridAxis {
        &self.nb
    }

    pub fn yq(&self) -> &GridAxis {
        &self.yq
    }

    /// The temperature this slice was taken at [MeV].
    pub fn t_value(&self) -> f64 {
        self.t_value
    }

    pub fn registry(&self) -> &Arc<SpeciesRegistry> {
        &self.registry
    }

    pub fn field(&self, field: Field) -> Option<&Array2<f64>> {
        self.fields.get(&field)
    }

    pub fn expect_field(&self, field: Field) -> TableResult<&Array2<f64>> {
        self.fields
            .get(&field)
            .ok_or(TableError::MissingField { field })
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &Array2<f64>)> {
        self.fields.iter().map(|(&f, a)| (f, a))
    }

    pub fn pair_fractions(&self) -> impl Iterator<Item = (i32, &Array2<f64>)> {
        self.pair_fractions.iter().map(|(&c, a)| (c, a))
    }

    pub fn quads(&self) -> impl Iterator<Item = (i32, &QuadComposition<Array2<f64>>)> {
        self.quads.iter().map(|(&c, q)| (c, q))
    }

    pub fn is_valid(&self, i: usize, k: usize) -> bool {
        self.valid[[i, k]]
    }
}

/// A 1-D table over density, produced by the beta-equilibrium solver:
/// per-point scalar fields and fractions evaluated at the solved charge
/// fraction.
#[derive(Debug, Clone)]
pub struct ReducedEosTable {
    pub(crate) nb: GridAxis,
    pub(crate) t_value: f64,
    /// Solved equilibrium charge fraction per density point.
    pub(crate) yq: Array1<f64>,
    pub(crate) fields: BTreeMap<Field, Array1<f64>>,
    pub(crate) pair_fractions: BTreeMap<i32, Array1<f64>>,
    pub(crate) quads: BTreeMap<i32, QuadComposition<Array1<f64>>>,
    pub(crate) registry: Arc<SpeciesRegistry>,
}

impl ReducedEosTable {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        nb: GridAxis,
        t_value: f64,
        yq: Array1<f64>,
        fields: BTreeMap<Field, Array1<f64>>,
        pair_fractions: BTreeMap<i32, Array1<f64>>,
        quads: BTreeMap<i32, QuadComposition<Array1<f64>>>,
        registry: Arc<SpeciesRegistry>,
    ) -> TableResult<Self> {
        let n = nb.len();
        let check = |what: &str, len: usize| -> TableResult<()> {
            if len != n {
                return Err(TableError::ShapeMismatch {
                    what: what.to_string(),
                    expected: vec![n],
                    got: vec![len],
                });
            }
            Ok(())
        };
        check("yq", yq.len())?;
        for (field, a) in &fields {
            check(field.as_str(), a.len())?;
        }
        for (code, a) in &pair_fractions {
            registry.resolve(*code)?;
            check("pair fraction", a.len())?;
        }
        for (code, q) in &quads {
            registry.resolve(*code)?;
            check("quad fraction", q.fraction.len())?;
            check("quad mass number", q.mass_number.len())?;
            check("quad charge number", q.charge_number.len())?;
        }
        Ok(Self {
            nb,
            t_value,
            yq,
            fields,
            pair_fractions,
            quads,
            registry,
        })
    }

    pub fn len(&self) -> usize {
        self.nb.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nb.is_empty()
    }

    pub fn nb(&self) -> &GridAxis {
        &self.nb
    }

    pub fn t_value(&self) -> f64 {
        self.t_value
    }

    /// Equilibrium charge fraction per density point.
    pub fn yq(&self) -> &Array1<f64> {
        &self.yq
    }

    pub fn registry(&self) -> &Arc<SpeciesRegistry> {
        &self.registry
    }

    pub fn field(&self, field: Field) -> Option<&Array1<f64>> {
        self.fields.get(&field)
    }

    pub fn expect_field(&self, field: Field) -> TableResult<&Array1<f64>> {
        self.fields
            .get(&field)
            .ok_or(TableError::MissingField { field })
    }

    pub fn fields(&self) -> impl Iterator<Item = (Field, &Array1<f64>)> {
        self.fields.iter().map(|(&f, a)| (f, a))
    }

    pub fn pair_fractions(&self) -> impl Iterator<Item = (i32, &Array1<f64>)> {
        self.pair_fractions.iter().map(|(&c, a)| (c, a))
    }

    pub fn quads(&self) -> impl Iterator<Item = (i32, &QuadComposition<Array1<f64>>)> {
        self.quads.iter().map(|(&c, q)| (c, q))
    }
}
