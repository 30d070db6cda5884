//! Emission factor table: signed kg CO₂e per kg of waste.
//!
//! Sign convention: positive = net emissions (landfilling), negative = net
//! avoided emissions (recycling, composting, energy recovery).
//!
//! Lookup is a single interface over two granularities: a per-(method, type)
//! entry wins, then the per-method default, then `0.0` (no effect).

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::taxonomy::{CategoryTaxonomy, DisposalMethod, WasteType};

/// One per-type factor entry (wire shape).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TypeFactor {
    pub method: DisposalMethod,
    pub waste_type: WasteType,
    pub factor: f64,
}

/// Wire shape of the factor table.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FactorTableWire {
    #[serde(default)]
    pub method_defaults: BTreeMap<DisposalMethod, f64>,
    #[serde(default)]
    pub per_type: Vec<TypeFactor>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct EmissionFactorTable {
    method_defaults: BTreeMap<DisposalMethod, f64>,
    per_type: BTreeMap<(DisposalMethod, WasteType), f64>,
}

impl EmissionFactorTable {
    /// Build and validate against `taxonomy`: every per-type entry must name a
    /// pair the taxonomy declares, and every factor must be finite.
    pub fn new(wire: FactorTableWire, taxonomy: &CategoryTaxonomy) -> Result<Self, CoreError> {
        for (m, f) in &wire.method_defaults {
            if !f.is_finite() {
                return Err(CoreError::NonFiniteFactor(m.label().to_string()));
            }
        }
        let mut per_type = BTreeMap::new();
        for e in wire.per_type {
            if !taxonomy.is_valid_type(e.method, &e.waste_type) {
                return Err(CoreError::UnknownFactorPair {
                    method: e.method.label(),
                    waste_type: e.waste_type.to_string(),
                });
            }
            if !e.factor.is_finite() {
                return Err(CoreError::NonFiniteFactor(format!(
                    "{}/{}",
                    e.method.label(),
                    e.waste_type
                )));
            }
            per_type.insert((e.method, e.waste_type), e.factor);
        }
        Ok(Self { method_defaults: wire.method_defaults, per_type })
    }

    /// Built-in factors for the campus taxonomy (kg CO₂e per kg).
    pub fn campus_default() -> Self {
        let d = |m: DisposalMethod, f: f64| (m, f);
        let t = |m: DisposalMethod, wt: &str, f: f64| ((m, WasteType::from_token(wt)), f);
        Self {
            method_defaults: BTreeMap::from([
                d(DisposalMethod::Landfilling, 1.0),
                d(DisposalMethod::Recycling, -0.5),
                d(DisposalMethod::Composting, -0.18),
                d(DisposalMethod::EnergyRecovery, -0.1),
            ]),
            per_type: BTreeMap::from([
                t(DisposalMethod::Landfilling, "GeneralWaste", 1.0),
                t(DisposalMethod::Recycling, "Paper", -0.7),
                t(DisposalMethod::Recycling, "Plastic", -1.0),
                t(DisposalMethod::Recycling, "Glass", -0.3),
                t(DisposalMethod::Recycling, "Metal", -4.0),
                t(DisposalMethod::Recycling, "EWaste", -1.5),
                t(DisposalMethod::Composting, "FoodWaste", -0.2),
                t(DisposalMethod::Composting, "GardenWaste", -0.15),
            ]),
        }
    }

    /// Factor for (method, type); type entry → method default → 0.0.
    pub fn get_factor(&self, method: DisposalMethod, waste_type: &WasteType) -> f64 {
        if let Some(f) = self.per_type.get(&(method, waste_type.clone())) {
            return *f;
        }
        self.method_defaults.get(&method).copied().unwrap_or(0.0)
    }

    pub fn to_wire(&self) -> FactorTableWire {
        FactorTableWire {
            method_defaults: self.method_defaults.clone(),
            per_type: self
                .per_type
                .iter()
                .map(|((m, wt), f)| TypeFactor { method: *m, waste_type: wt.clone(), factor: *f })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wt(s: &str) -> WasteType {
        s.parse().unwrap()
    }

    #[test]
    fn lookup_falls_back_type_then_method_then_zero() {
        let tax = CategoryTaxonomy::campus_default();
        let wire = FactorTableWire {
            method_defaults: BTreeMap::from([(DisposalMethod::Recycling, -0.5)]),
            per_type: vec![TypeFactor {
                method: DisposalMethod::Recycling,
                waste_type: wt("Paper"),
                factor: -0.7,
            }],
        };
        let t = EmissionFactorTable::new(wire, &tax).unwrap();
        assert_eq!(t.get_factor(DisposalMethod::Recycling, &wt("Paper")), -0.7);
        assert_eq!(t.get_factor(DisposalMethod::Recycling, &wt("Glass")), -0.5);
        assert_eq!(t.get_factor(DisposalMethod::Composting, &wt("FoodWaste")), 0.0);
    }

    #[test]
    fn pair_outside_taxonomy_is_rejected() {
        let tax = CategoryTaxonomy::campus_default();
        let wire = FactorTableWire {
            method_defaults: BTreeMap::new(),
            per_type: vec![TypeFactor {
                method: DisposalMethod::Landfilling,
                waste_type: wt("Paper"),
                factor: 1.0,
            }],
        };
        assert!(matches!(
            EmissionFactorTable::new(wire, &tax),
            Err(CoreError::UnknownFactorPair { .. })
        ));
    }

    #[test]
    fn non_finite_factor_is_rejected() {
        let tax = CategoryTaxonomy::campus_default();
        let wire = FactorTableWire {
            method_defaults: BTreeMap::from([(DisposalMethod::Composting, f64::NAN)]),
            per_type: vec![],
        };
        assert!(matches!(
            EmissionFactorTable::new(wire, &tax),
            Err(CoreError::NonFiniteFactor(_))
        ));
    }

    #[test]
    fn default_table_is_valid_for_default_taxonomy() {
        let tax = CategoryTaxonomy::campus_default();
        let t = EmissionFactorTable::campus_default();
        let rebuilt = EmissionFactorTable::new(t.to_wire(), &tax).unwrap();
        assert_eq!(rebuilt, t);
        assert!(t.get_factor(DisposalMethod::Landfilling, &wt("GeneralWaste")) > 0.0);
        assert!(t.get_factor(DisposalMethod::EnergyRecovery, &wt("WoodWaste")) < 0.0);
    }
}
