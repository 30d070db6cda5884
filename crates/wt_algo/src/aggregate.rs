//! Aggregation engine: filter → bucket → roll up → derive.
//!
//! Pure and synchronous. Every (month, method, type) cell of the taxonomy is
//! present in the result, zero when unobserved. No rounding happens here.
//!
//! Summation order is fixed: survivors are sorted by their canonical key
//! (`wt_core::determinism`), months roll up in calendar order and category
//! totals add types in taxonomy order. Permuting the input therefore cannot
//! change a single bit of the output.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use wt_core::determinism::sort_stable;
use wt_core::{
    AggregationParams, Anomaly, CategoryTaxonomy, DisposalMethod, EngineConfig, NormalizedRecord,
    WasteType,
};

use crate::metrics::{derive_metrics, DerivedMetrics};
use crate::MONTHS;

/// method → waste type → kilograms.
pub type MethodTypeWeights = BTreeMap<DisposalMethod, BTreeMap<WasteType, f64>>;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MonthBucket {
    /// 1..=12
    pub month: u8,
    pub per_method_per_type: MethodTypeWeights,
}

/// Yearly statistics. Recomputed per request; never persisted as a source of truth.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AggregationResult {
    pub year: i32,
    /// Exactly 12 buckets, January first.
    pub monthly: Vec<MonthBucket>,
    pub totals: MethodTypeWeights,
    pub category_totals: BTreeMap<DisposalMethod, f64>,
    pub derived_metrics: DerivedMetrics,
    /// Records summed into the view (zero-weight anomalies included).
    pub record_count: usize,
    /// Records dropped by the year/status/scope filters.
    pub filtered_out: usize,
}

impl AggregationResult {
    pub fn month(&self, month: u8) -> Option<&MonthBucket> {
        self.monthly.get(usize::from(month).checked_sub(1)?)
    }

    /// Monthly cell; `None` only for pairs outside the taxonomy.
    pub fn cell(&self, month: u8, method: DisposalMethod, waste_type: &WasteType) -> Option<f64> {
        self.month(month)?.per_method_per_type.get(&method)?.get(waste_type).copied()
    }

    pub fn total(&self, method: DisposalMethod, waste_type: &WasteType) -> Option<f64> {
        self.totals.get(&method)?.get(waste_type).copied()
    }

    pub fn category_total(&self, method: DisposalMethod) -> f64 {
        self.category_totals.get(&method).copied().unwrap_or(0.0)
    }

    /// No record contributed (a valid zero-activity year).
    pub fn is_empty(&self) -> bool {
        self.record_count == 0
    }
}

/// Zero-filled method → type map covering every taxonomy pair.
pub fn zero_filled(taxonomy: &CategoryTaxonomy) -> MethodTypeWeights {
    let mut out = MethodTypeWeights::new();
    for (method, waste_type) in taxonomy.pairs() {
        out.entry(method).or_default().insert(waste_type.clone(), 0.0);
    }
    out
}

/// Year, status and scope filter (step 1).
pub fn admits(params: &AggregationParams, r: &NormalizedRecord) -> bool {
    r.year == params.year && params.statuses.admits(r.status) && params.scope.admits(&r.scope)
}

/// Same filter for the anomaly of an excluded record. Whatever could not be
/// read about the record (year, status, scope) does not rule it out.
pub fn anomaly_in_view(params: &AggregationParams, a: &Anomaly) -> bool {
    a.year.map_or(true, |year| year == params.year)
        && a.status.map_or(true, |status| params.statuses.admits(status))
        && a.scope.as_ref().map_or(true, |scope| params.scope.admits(scope))
}

pub fn aggregate(
    records: &[NormalizedRecord],
    params: &AggregationParams,
    config: &EngineConfig,
) -> AggregationResult {
    let taxonomy = &config.taxonomy;

    // 1) Filter
    let mut survivors: Vec<&NormalizedRecord> = Vec::with_capacity(records.len());
    let mut filtered_out = 0usize;
    for r in records {
        if !admits(params, r) {
            filtered_out += 1;
            continue;
        }
        if !(1..=MONTHS).contains(&r.month) || !taxonomy.is_valid_type(r.method, &r.waste_type) {
            // Only reachable when records were normalized against another taxonomy.
            warn!(record = %r.id, method = r.method.token(), waste_type = %r.waste_type,
                  month = r.month, "record outside the configured taxonomy; skipped");
            filtered_out += 1;
            continue;
        }
        survivors.push(r);
    }
    sort_stable(&mut survivors);

    // 2) Bucket
    let mut monthly: Vec<MonthBucket> = (1..=MONTHS)
        .map(|month| MonthBucket { month, per_method_per_type: zero_filled(taxonomy) })
        .collect();
    for r in &survivors {
        let slot = monthly[usize::from(r.month) - 1]
            .per_method_per_type
            .get_mut(&r.method)
            .and_then(|types| types.get_mut(&r.waste_type));
        if let Some(kg) = slot {
            *kg += r.weight_kg;
        }
    }

    // 3) Roll up
    let mut totals = zero_filled(taxonomy);
    for bucket in &monthly {
        for (method, types) in &bucket.per_method_per_type {
            for (waste_type, kg) in types {
                if let Some(t) = totals.get_mut(method).and_then(|m| m.get_mut(waste_type)) {
                    *t += kg;
                }
            }
        }
    }
    let mut category_totals = BTreeMap::new();
    for method in taxonomy.methods() {
        let mut sum = 0.0;
        for waste_type in taxonomy.types_of(method) {
            sum += totals
                .get(&method)
                .and_then(|m| m.get(waste_type))
                .copied()
                .unwrap_or(0.0);
        }
        category_totals.insert(method, sum);
    }

    // 4) Derive
    let derived_metrics = derive_metrics(
        &totals,
        &category_totals,
        &config.emission_factors,
        config.landfill_cost_per_kg,
    );

    debug!(
        year = params.year,
        summed = survivors.len(),
        filtered_out,
        generated_kg = derived_metrics.total_generated_kg,
        "aggregated"
    );

    AggregationResult {
        year: params.year,
        monthly,
        totals,
        category_totals,
        derived_metrics,
        record_count: survivors.len(),
        filtered_out,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wt_core::{
        EmissionFactorTable, FactorTableWire, PeriodField, RecordScope, RecordStatus, ScopeFilter,
        StatusFilter,
    };

    fn wt(s: &str) -> WasteType {
        s.parse().unwrap()
    }

    fn rec(id: &str, month: u8, method: DisposalMethod, t: &str, kg: f64) -> NormalizedRecord {
        NormalizedRecord {
            id: id.into(),
            year: 2024,
            month,
            method,
            waste_type: wt(t),
            weight_kg: kg,
            status: RecordStatus::Verified,
            scope: RecordScope::default(),
        }
    }

    fn params() -> AggregationParams {
        AggregationParams {
            year: 2024,
            period_field: PeriodField::OccurredAt,
            scope: ScopeFilter::default(),
            statuses: StatusFilter::VerifiedOnly,
        }
    }

    fn all_cells(r: &AggregationResult) -> Vec<f64> {
        r.monthly
            .iter()
            .flat_map(|b| b.per_method_per_type.values().flat_map(|t| t.values().copied()))
            .collect()
    }

    #[test]
    fn empty_input_is_fully_zero_filled() {
        let cfg = EngineConfig::campus_default();
        let r = aggregate(&[], &params(), &cfg);
        assert_eq!(r.monthly.len(), 12);
        assert_eq!(r.monthly[0].month, 1);
        assert_eq!(r.monthly[11].month, 12);
        let cells = all_cells(&r);
        assert_eq!(cells.len(), 12 * cfg.taxonomy.pair_count());
        assert!(cells.iter().all(|v| *v == 0.0));
        for (m, t) in cfg.taxonomy.pairs() {
            for month in 1..=12 {
                assert_eq!(r.cell(month, m, t), Some(0.0));
            }
            assert_eq!(r.total(m, t), Some(0.0));
        }
        assert_eq!(r.category_totals.len(), 4);
        assert_eq!(r.derived_metrics, DerivedMetrics::default());
        assert!(r.is_empty());
    }

    #[test]
    fn single_record_lands_in_one_cell() {
        let cfg = EngineConfig::campus_default();
        let r = aggregate(&[rec("a", 3, DisposalMethod::Recycling, "Paper", 10.0)], &params(), &cfg);
        assert_eq!(r.cell(3, DisposalMethod::Recycling, &wt("Paper")), Some(10.0));
        let non_zero = all_cells(&r).into_iter().filter(|v| *v != 0.0).count();
        assert_eq!(non_zero, 1);
        assert_eq!(r.category_total(DisposalMethod::Recycling), 10.0);
        assert_eq!(r.derived_metrics.total_recycled_kg, 10.0);
        assert_eq!(r.derived_metrics.total_landfilled_kg, 0.0);
        assert_eq!(r.record_count, 1);
    }

    #[test]
    fn composting_counts_as_diversion() {
        let cfg = EngineConfig::campus_default();
        let recs = [
            rec("a", 6, DisposalMethod::Landfilling, "GeneralWaste", 5.0),
            rec("b", 6, DisposalMethod::Composting, "FoodWaste", 5.0),
        ];
        let m = aggregate(&recs, &params(), &cfg).derived_metrics;
        assert_eq!(m.total_generated_kg, 10.0);
        assert_eq!(m.total_landfilled_kg, 5.0);
        assert_eq!(m.total_recycled_kg, 5.0);
    }

    #[test]
    fn ghg_sum_keeps_its_sign() {
        let tax = wt_core::CategoryTaxonomy::campus_default();
        let wire: FactorTableWire = serde_json::from_value(serde_json::json!({
            "per_type": [
                {"method": "landfilling", "waste_type": "GeneralWaste", "factor": 1.0},
                {"method": "recycling", "waste_type": "Paper", "factor": -0.7}
            ]
        }))
        .unwrap();
        let cfg = EngineConfig {
            emission_factors: EmissionFactorTable::new(wire, &tax).unwrap(),
            ..EngineConfig::campus_default()
        };
        let recs = [
            rec("a", 1, DisposalMethod::Landfilling, "GeneralWaste", 1000.0),
            rec("b", 1, DisposalMethod::Recycling, "Paper", 1000.0),
        ];
        let m = aggregate(&recs, &params(), &cfg).derived_metrics;
        assert!((m.total_ghg_reduction_kg - 300.0).abs() < 1e-9);
    }

    #[test]
    fn filters_year_status_and_scope() {
        let cfg = EngineConfig::campus_default();
        let mut other_year = rec("y", 1, DisposalMethod::Recycling, "Glass", 1.0);
        other_year.year = 2023;
        let mut pending = rec("p", 1, DisposalMethod::Recycling, "Glass", 2.0);
        pending.status = RecordStatus::New;
        let mut north = rec("n", 1, DisposalMethod::Recycling, "Glass", 4.0);
        north.scope.campus = Some("North".into());
        let recs = [other_year, pending, north, rec("x", 1, DisposalMethod::Recycling, "Glass", 8.0)];

        let r = aggregate(&recs, &params(), &cfg);
        assert_eq!(r.category_total(DisposalMethod::Recycling), 12.0);
        assert_eq!((r.record_count, r.filtered_out), (2, 2));

        let mut p = params();
        p.statuses = StatusFilter::All;
        p.scope.campus = Some(" north ".into());
        let r = aggregate(&recs, &p, &cfg);
        assert_eq!(r.category_total(DisposalMethod::Recycling), 4.0);
        assert_eq!(r.record_count, 1);
    }

    #[test]
    fn permutation_is_bit_identical() {
        let cfg = EngineConfig::campus_default();
        let weights: [f64; 8] = [0.1, 0.2, 0.3, 1e16, 1.0, -0.0, 7.7, 0.3];
        let recs: Vec<_> = weights
            .iter()
            .enumerate()
            .map(|(i, w)| rec(&format!("r{i}"), 2, DisposalMethod::Recycling, "Metal", w.abs()))
            .collect();
        let mut reversed = recs.clone();
        reversed.reverse();
        let a = aggregate(&recs, &params(), &cfg);
        let b = aggregate(&reversed, &params(), &cfg);
        assert_eq!(
            a.total(DisposalMethod::Recycling, &wt("Metal")).map(f64::to_bits),
            b.total(DisposalMethod::Recycling, &wt("Metal")).map(f64::to_bits)
        );
        assert_eq!(a, b);
    }

    #[test]
    fn anomalies_outside_the_view_are_filtered() {
        use wt_core::{AnomalyKind, RawWasteRecord};

        let raw = |campus: &str, status: &str| RawWasteRecord {
            id: "s".into(),
            campus: Some(campus.into()),
            status: Some(status.into()),
            ..Default::default()
        };
        let mut p = params();
        p.scope.campus = Some("North".into());

        let south = Anomaly::from_raw(&raw("South", "verified"), AnomalyKind::UnknownMethod, None);
        assert!(!anomaly_in_view(&p, &south.clone().with_year(Some(2024))));

        let north = Anomaly::from_raw(&raw("north", "verified"), AnomalyKind::UnknownMethod, None);
        assert!(anomaly_in_view(&p, &north.clone().with_year(Some(2024))));
        assert!(!anomaly_in_view(&p, &north.clone().with_year(Some(2019))));
        // Year unreadable: kept.
        assert!(anomaly_in_view(&p, &north));

        let rejected = Anomaly::from_raw(&raw("North", "rejected"), AnomalyKind::InvalidDate, None);
        assert!(!anomaly_in_view(&p, &rejected));
        let odd_status = Anomaly::from_raw(&raw("North", "archived"), AnomalyKind::InvalidDate, None);
        assert_eq!(odd_status.status, None::<RecordStatus>);
        assert!(anomaly_in_view(&p, &odd_status));

        let undecodable = Anomaly::undecodable(0, None, "bad".into());
        assert_eq!(undecodable.scope, None::<RecordScope>);
        assert!(anomaly_in_view(&p, &undecodable));
    }

    #[test]
    fn foreign_pairs_are_skipped() {
        let cfg = EngineConfig::campus_default();
        let recs = [
            rec("a", 1, DisposalMethod::Landfilling, "Paper", 3.0),
            rec("b", 13, DisposalMethod::Recycling, "Paper", 3.0),
            rec("c", 1, DisposalMethod::Recycling, "Paper", 3.0),
        ];
        let r = aggregate(&recs, &params(), &cfg);
        assert_eq!(r.derived_metrics.total_generated_kg, 3.0);
        assert_eq!(r.filtered_out, 2);
    }
}
