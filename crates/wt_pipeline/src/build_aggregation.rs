// crates/wt_pipeline/src/build_aggregation.rs
//
// Aggregation document: params echo + result + data-quality anomalies, with a
// content-derived `AGG:` id. Anomalies are sorted so the document (and its id)
// does not depend on fetch order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use wt_algo::AggregationResult;
use wt_core::{AggregationParams, Anomaly, AnomalyKind};
use wt_io::{hasher, IoError};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregationDoc {
    /// "AGG:<hex64>" over the canonical document without `id`.
    pub id: String,
    pub params: AggregationParams,
    pub result: AggregationResult,
    pub anomalies: Vec<Anomaly>,
    pub anomaly_counts: BTreeMap<AnomalyKind, usize>,
    /// Records left out of the categorized view (unknown category or unusable date).
    pub excluded_count: usize,
}

impl AggregationDoc {
    /// Zero activity is a valid outcome, distinct from a failed fetch.
    pub fn is_zero_activity(&self) -> bool {
        self.result.is_empty()
    }
}

pub fn build_aggregation(
    params: AggregationParams,
    result: AggregationResult,
    mut anomalies: Vec<Anomaly>,
) -> Result<AggregationDoc, IoError> {
    anomalies.sort_by(|a, b| {
        (a.record_id.as_str(), a.kind, a.detail.as_deref())
            .cmp(&(b.record_id.as_str(), b.kind, b.detail.as_deref()))
    });

    let mut anomaly_counts = BTreeMap::new();
    for a in &anomalies {
        *anomaly_counts.entry(a.kind).or_insert(0usize) += 1;
    }
    let excluded_count = anomalies.iter().filter(|a| a.excluded()).count();

    #[derive(Serialize)]
    struct AggNoId<'a> {
        params: &'a AggregationParams,
        result: &'a AggregationResult,
        anomalies: &'a [Anomaly],
        anomaly_counts: &'a BTreeMap<AnomalyKind, usize>,
        excluded_count: usize,
    }
    let id = hasher::agg_id_from_canonical(&AggNoId {
        params: &params,
        result: &result,
        anomalies: &anomalies,
        anomaly_counts: &anomaly_counts,
        excluded_count,
    })?;

    Ok(AggregationDoc { id, params, result, anomalies, anomaly_counts, excluded_count })
}
