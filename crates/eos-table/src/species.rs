//! Species registry: maps numeric codes to constituent metadata.
//!
//! Two kinds of constituents appear in CompOSE-style tables: elementary
//! "pair" species (leptons, baryons, light nuclei up to mass 4) with a fixed
//! mass number, and composite "quad" species (clusters such as the average
//! heavy nucleus) whose mass and charge numbers vary per grid point and are
//! stored alongside the fraction arrays.

use crate::error::{TableError, TableResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Constituent kind: elementary pair or composite quad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SpeciesKind {
    /// Single-particle species with a fixed baryon (mass) number.
    Pair {
        /// Baryon number carried by one particle of this species
        /// (0 for leptons).
        mass_number: u32,
    },
    /// Composite/cluster species; mass and charge numbers are tabulated
    /// per grid point, not fixed.
    Quad,
}

/// Metadata for one species.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeciesInfo {
    /// Short symbol, e.g. "n", "He4".
    pub symbol: String,
    /// Descriptive name, e.g. "neutron".
    pub name: String,
    pub kind: SpeciesKind,
}

/// Immutable code -> species lookup, built once at startup and shared by
/// reference with every table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeciesRegistry {
    entries: BTreeMap<i32, SpeciesInfo>,
}

impl SpeciesRegistry {
    /// Build a registry from (code, info) entries.
    ///
    /// Codes must be unique across pairs and quads.
    pub fn new(entries: impl IntoIterator<Item = (i32, SpeciesInfo)>) -> TableResult<Self> {
        let mut map = BTreeMap::new();
        for (code, info) in entries {
            if map.insert(code, info).is_some() {
                return Err(TableError::DuplicateSpeciesCode { code });
            }
        }
        Ok(Self { entries: map })
    }

    pub fn get(&self, code: i32) -> Option<&SpeciesInfo> {
        self.entries.get(&code)
    }

    /// Resolve a code, failing with `UnknownSpecies` if absent.
    pub fn resolve(&self, code: i32) -> TableResult<&SpeciesInfo> {
        self.entries
            .get(&code)
            .ok_or(TableError::UnknownSpecies { code })
    }

    pub fn is_quad(&self, code: i32) -> bool {
        matches!(
            self.entries.get(&code),
            Some(SpeciesInfo {
                kind: SpeciesKind::Quad,
                ..
            })
        )
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate entries in ascending code order (stable for export).
    pub fn iter(&self) -> impl Iterator<Item = (i32, &SpeciesInfo)> {
        self.entries.iter().map(|(&c, info)| (c, info))
    }
}

fn pair(symbol: &str, name: &str, mass_number: u32) -> SpeciesInfo {
    SpeciesInfo {
        symbol: symbol.to_string(),
        name: name.to_string(),
        kind: SpeciesKind::Pair { mass_number },
    }
}

fn quad(symbol: &str, name: &str) -> SpeciesInfo {
    SpeciesInfo {
        symbol: symbol.to_string(),
        name: name.to_string(),
        kind: SpeciesKind::Quad,
    }
}

/// Species set of the DD2 table family (Hempel & Schaffner-Bielich with
/// electrons): electron, nucleons, light nuclei up to helium-4, and one
/// averaged heavy nucleus.
pub fn dd2_registry() -> SpeciesRegistry {
    SpeciesRegistry::new([
        (0, pair("e", "electron", 0)),
        (10, pair("n", "neutron", 1)),
        (11, pair("p", "proton", 1)),
        (2001, pair("H2", "deuteron", 2)),
        (3001, pair("H3", "triton", 3)),
        (3002, pair("He3", "helium 3", 3)),
        (4002, pair("He4", "alpha particle", 4)),
        (999, quad("N", "average nucleus")),
    ])
    .expect("DD2 registry codes are unique")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dd2_codes_resolve() {
        let reg = dd2_registry();
        assert_eq!(reg.len(), 8);
        assert_eq!(reg.get(10).unwrap().symbol, "n");
        assert_eq!(reg.get(999).unwrap().name, "average nucleus");
        assert!(reg.is_quad(999));
        assert!(!reg.is_quad(10));
    }

    #[test]
    fn duplicate_code_rejected() {
        let err = SpeciesRegistry::new([
            (1, pair("a", "a", 1)),
            (1, pair("b", "b", 1)),
        ])
        .unwrap_err();
        assert_eq!(err, TableError::DuplicateSpeciesCode { code: 1 });
    }

    #[test]
    fn unknown_code_reported() {
        let reg = dd2_registry();
        assert_eq!(
            reg.resolve(42).unwrap_err(),
            TableError::UnknownSpecies { code: 42 }
        );
    }

    #[test]
    fn iteration_is_code_ordered() {
        let reg = dd2_registry();
        let codes: Vec<i32> = reg.iter().map(|(c, _)| c).collect();
        let mut sorted = codes.clone();
        sorted.sort_unstable();
        assert_eq!(codes, sorted);
    }
}
