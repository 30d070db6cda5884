//! Aggregation parameters and engine configuration.
//!
//! Every input that changes aggregation semantics is an explicit field here:
//! year, period field, scope, status filter. None of them has a serde default;
//! a caller that omits one gets a deserialization error, not a guess.
//!
//! `EngineConfig` is the static half (taxonomy, emission factors, landfill
//! cost, timezone). It is built and validated once at startup and is never
//! mutated by a request.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::CoreError;
use crate::factors::{EmissionFactorTable, FactorTableWire};
use crate::records::{RecordScope, RecordStatus};
use crate::taxonomy::{fold_label, CategoryTaxonomy};

/// Define a serde'd enum with explicit wire tokens.
macro_rules! serde_enum {
    ($name:ident => { $($variant:ident = $token:expr),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $(
                #[serde(rename = $token)]
                $variant,
            )+
        }

        impl $name {
            pub fn token(self) -> &'static str {
                match self {
                    $( $name::$variant => $token, )+
                }
            }
        }
    };
}

serde_enum!(PeriodField => {
    OccurredAt = "occurred_at",
    CreatedAt  = "created_at"
});

// ------------------------------------ Filters ------------------------------------

/// Which lifecycle statuses enter the aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value")]
pub enum StatusFilter {
    /// Official reporting.
    #[serde(rename = "verified_only")]
    VerifiedOnly,
    /// Provisional dashboards.
    #[serde(rename = "all")]
    All,
    #[serde(rename = "only")]
    Only(BTreeSet<RecordStatus>),
}

impl StatusFilter {
    /// Resolve the two caller-facing inputs (explicit status set, include-all
    /// toggle) into one filter. Supplying both, or an empty set, is rejected.
    pub fn from_inputs(
        statuses: Option<&[RecordStatus]>,
        include_all_statuses: bool,
    ) -> Result<Self, CoreError> {
        match (statuses, include_all_statuses) {
            (Some(_), true) => Err(CoreError::DomainOutOfRange(
                "statuses conflicts with include_all_statuses",
            )),
            (Some([]), false) => Err(CoreError::DomainOutOfRange("statuses must not be empty")),
            (Some(list), false) => Ok(StatusFilter::Only(list.iter().copied().collect())),
            (None, true) => Ok(StatusFilter::All),
            (None, false) => Ok(StatusFilter::VerifiedOnly),
        }
    }

    pub fn admits(&self, status: RecordStatus) -> bool {
        match self {
            StatusFilter::VerifiedOnly => status == RecordStatus::Verified,
            StatusFilter::All => true,
            StatusFilter::Only(set) => set.contains(&status),
        }
    }

    /// Status list for a fetch pushdown (`None` = all).
    pub fn as_list(&self) -> Option<Vec<RecordStatus>> {
        match self {
            StatusFilter::VerifiedOnly => Some(vec![RecordStatus::Verified]),
            StatusFilter::All => None,
            StatusFilter::Only(set) => Some(set.iter().copied().collect()),
        }
    }
}

/// Campus/department/unit scoping. A supplied dimension must match the record
/// (compared on folded labels); a record lacking that dimension does not match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScopeFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub campus: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl ScopeFilter {
    pub fn admits(&self, scope: &RecordScope) -> bool {
        fn dim(want: &Option<String>, have: &Option<String>) -> bool {
            match (want, have) {
                (None, _) => true,
                (Some(_), None) => false,
                (Some(w), Some(h)) => fold_label(w) == fold_label(h),
            }
        }
        dim(&self.campus, &scope.campus)
            && dim(&self.department, &scope.department)
            && dim(&self.unit, &scope.unit)
    }

    pub fn is_unscoped(&self) -> bool {
        self.campus.is_none() && self.department.is_none() && self.unit.is_none()
    }
}

// ------------------------------------ Params ------------------------------------

/// Per-request aggregation inputs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationParams {
    pub year: i32,
    pub period_field: PeriodField,
    pub scope: ScopeFilter,
    pub statuses: StatusFilter,
}

impl AggregationParams {
    pub fn validate(&self) -> Result<(), CoreError> {
        if !(1..=9999).contains(&self.year) {
            return Err(CoreError::DomainOutOfRange("year must be within 1..=9999"));
        }
        if let StatusFilter::Only(set) = &self.statuses {
            if set.is_empty() {
                return Err(CoreError::DomainOutOfRange("statuses must not be empty"));
            }
        }
        Ok(())
    }
}

// -------------------------------- Engine config --------------------------------

/// Wire shape of the engine configuration file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfigWire {
    pub taxonomy: CategoryTaxonomy,
    pub emission_factors: FactorTableWire,
    /// Currency units saved per kg diverted from landfill.
    pub landfill_cost_per_kg: f64,
    /// Fixed application timezone for month bucketing, minutes east of UTC.
    pub utc_offset_minutes: i32,
}

/// Validated static configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "EngineConfigWire", into = "EngineConfigWire")]
pub struct EngineConfig {
    pub taxonomy: CategoryTaxonomy,
    pub emission_factors: EmissionFactorTable,
    pub landfill_cost_per_kg: f64,
    pub utc_offset_minutes: i32,
}

pub const MAX_UTC_OFFSET_MINUTES: i32 = 14 * 60;

impl EngineConfig {
    pub fn from_wire(w: EngineConfigWire) -> Result<Self, CoreError> {
        if !w.landfill_cost_per_kg.is_finite() || w.landfill_cost_per_kg < 0.0 {
            return Err(CoreError::DomainOutOfRange(
                "landfill_cost_per_kg must be a finite, non-negative number",
            ));
        }
        if w.utc_offset_minutes.abs() > MAX_UTC_OFFSET_MINUTES {
            return Err(CoreError::DomainOutOfRange("utc_offset_minutes must be within ±840"));
        }
        let emission_factors = EmissionFactorTable::new(w.emission_factors, &w.taxonomy)?;
        Ok(Self {
            taxonomy: w.taxonomy,
            emission_factors,
            landfill_cost_per_kg: w.landfill_cost_per_kg,
            utc_offset_minutes: w.utc_offset_minutes,
        })
    }

    /// Built-in campus configuration (UTC, default taxonomy and factors).
    pub fn campus_default() -> Self {
        Self {
            taxonomy: CategoryTaxonomy::campus_default(),
            emission_factors: EmissionFactorTable::campus_default(),
            landfill_cost_per_kg: 0.05,
            utc_offset_minutes: 0,
        }
    }

    pub fn to_wire(&self) -> EngineConfigWire {
        EngineConfigWire {
            taxonomy: self.taxonomy.clone(),
            emission_factors: self.emission_factors.to_wire(),
            landfill_cost_per_kg: self.landfill_cost_per_kg,
            utc_offset_minutes: self.utc_offset_minutes,
        }
    }
}

impl TryFrom<EngineConfigWire> for EngineConfig {
    type Error = CoreError;
    fn try_from(w: EngineConfigWire) -> Result<Self, Self::Error> {
        Self::from_wire(w)
    }
}

impl From<EngineConfig> for EngineConfigWire {
    fn from(c: EngineConfig) -> Self {
        c.to_wire()
    }
}
