// crates/wt_pipeline/src/build_run_record.rs
//
// Run record: provenance for one aggregation (engine, params, input digests,
// output id). The `RUN:` id covers the timestamp and the canonical record.

use serde::{Deserialize, Serialize};

use wt_core::AggregationParams;
use wt_io::{canonical_json, hasher, IoError};

use crate::build_aggregation::AggregationDoc;
use crate::EngineMeta;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecordDoc {
    /// "RUN:<timestamp>-<hex64>"
    pub id: String,
    pub timestamp_utc: String,
    pub engine: EngineMeta,
    pub params: AggregationParams,
    pub inputs: RunInputs,
    pub outputs: RunOutputs,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunInputs {
    /// Canonical digest of the fetched raw records, in fetch order.
    pub records_sha256: String,
    pub records_fetched: usize,
    /// Entries the source could not decode; each is an `undecodable_record` anomaly.
    pub records_undecodable: usize,
    pub config_sha256: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutputs {
    pub aggregation_id: String,
    pub aggregation_sha256: String,
}

pub fn build_run_record(
    timestamp_utc: &str,
    engine: EngineMeta,
    inputs: RunInputs,
    aggregation: &AggregationDoc,
) -> Result<RunRecordDoc, IoError> {
    let timestamp_utc = hasher::normalize_timestamp(timestamp_utc)?;
    let outputs = RunOutputs {
        aggregation_id: aggregation.id.clone(),
        aggregation_sha256: hasher::sha256_hex(&canonical_json::to_canonical_bytes(aggregation)?),
    };

    #[derive(Serialize)]
    struct RunNoId<'a> {
        timestamp_utc: &'a str,
        engine: &'a EngineMeta,
        params: &'a AggregationParams,
        inputs: &'a RunInputs,
        outputs: &'a RunOutputs,
    }
    let id = hasher::run_id_from_canonical(
        &timestamp_utc,
        &RunNoId {
            timestamp_utc: &timestamp_utc,
            engine: &engine,
            params: &aggregation.params,
            inputs: &inputs,
            outputs: &outputs,
        },
    )?;

    Ok(RunRecordDoc {
        id,
        timestamp_utc,
        engine,
        params: aggregation.params.clone(),
        inputs,
        outputs,
    })
}
