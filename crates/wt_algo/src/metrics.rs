//! Derived environmental metrics.
//!
//! Computed from the yearly roll-up only. The GHG figure is the raw signed sum
//! of weight × factor: landfilling contributes a positive number, so a net
//! positive "reduction" means net emissions. Presentation decides how to show it.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wt_core::{DisposalMethod, EmissionFactorTable};

use crate::aggregate::MethodTypeWeights;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct DerivedMetrics {
    pub total_generated_kg: f64,
    /// Every diversion method (recycling, composting, energy recovery).
    pub total_recycled_kg: f64,
    pub total_landfilled_kg: f64,
    pub total_ghg_reduction_kg: f64,
    pub total_landfill_cost_savings: f64,
}

impl DerivedMetrics {
    /// Share of generated weight diverted from landfill; `None` when nothing was generated.
    pub fn diversion_rate(&self) -> Option<f64> {
        (self.total_generated_kg > 0.0).then(|| self.total_recycled_kg / self.total_generated_kg)
    }
}

pub fn derive_metrics(
    totals: &MethodTypeWeights,
    category_totals: &BTreeMap<DisposalMethod, f64>,
    factors: &EmissionFactorTable,
    landfill_cost_per_kg: f64,
) -> DerivedMetrics {
    let mut landfilled = 0.0;
    let mut recycled = 0.0;
    for (method, kg) in category_totals {
        if method.is_diversion() {
            recycled += kg;
        } else {
            landfilled += kg;
        }
    }

    let mut ghg = 0.0;
    for (method, types) in totals {
        for (waste_type, kg) in types {
            ghg += kg * factors.get_factor(*method, waste_type);
        }
    }

    DerivedMetrics {
        // Same addends as summing every category total, grouped so the
        // landfill/diversion split holds exactly.
        total_generated_kg: landfilled + recycled,
        total_recycled_kg: recycled,
        total_landfilled_kg: landfilled,
        total_ghg_reduction_kg: ghg,
        total_landfill_cost_savings: recycled * landfill_cost_per_kg,
    }
}
