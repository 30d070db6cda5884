//! wt_pipeline: fetch → normalize → aggregate → documents.
//!
//! I/O-free apart from the `RecordSource` collaborator and the manifest entry
//! point; JSON/hashing go through `wt_io`, math through `wt_algo`.
//!
//! One bulk fetch precedes each aggregation. A fetch failure is returned as
//! `PipelineError::Fetch` unchanged and is never turned into an empty result;
//! an empty fetch is a valid, fully zero-filled aggregation.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use wt_algo::{admits, aggregate, anomaly_in_view, normalize_batch, NormalizePolicy};
use wt_core::source::{RecordQuery, RecordSource, SourceError};
use wt_core::{AggregationParams, Anomaly, CoreError, EngineConfig};
use wt_io::{hasher, IoError, JsonFileSource};

pub mod build_aggregation;
pub mod build_run_record;

pub use build_aggregation::{build_aggregation, AggregationDoc};
pub use build_run_record::{build_run_record, RunInputs, RunOutputs, RunRecordDoc};

/// Engine identifiers recorded in every run record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineMeta {
    pub vendor: String,
    pub name: String,
    pub version: String,
    pub build: String,
}

pub fn engine_identifiers() -> EngineMeta {
    EngineMeta {
        vendor: "wastestat".to_string(),
        name: "wt_engine".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        build: if cfg!(debug_assertions) { "dev" } else { "release" }.to_string(),
    }
}

/// Everything one run needs. Config is validated at startup and shared read-only.
pub struct PipelineCtx<'a> {
    pub source: &'a dyn RecordSource,
    pub config: &'a EngineConfig,
    pub params: AggregationParams,
    pub engine_meta: EngineMeta,
    /// RFC3339; supplied by the caller so runs are reproducible under test.
    pub timestamp_utc: String,
}

#[derive(Debug, Clone)]
pub struct PipelineOutputs {
    pub aggregation: AggregationDoc,
    pub run_record: RunRecordDoc,
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid engine configuration: {0}")]
    Config(CoreError),
    #[error("invalid aggregation parameters: {0}")]
    Params(CoreError),
    #[error("failed to load records: {0}")]
    Fetch(#[from] SourceError),
    #[error(transparent)]
    Io(#[from] IoError),
}

/// Startup gate: refuse a configuration that would not survive a fresh load.
pub fn validate_config(config: &EngineConfig) -> Result<(), PipelineError> {
    EngineConfig::from_wire(config.to_wire()).map_err(PipelineError::Config)?;
    Ok(())
}

fn query_for(params: &AggregationParams) -> RecordQuery {
    RecordQuery {
        year: Some(params.year),
        campus: params.scope.campus.clone(),
        department: params.scope.department.clone(),
        unit: params.scope.unit.clone(),
        statuses: params.statuses.as_list(),
    }
}

/// Fetch, normalize and aggregate one year. Returns the document plus the
/// input provenance for the run record.
fn aggregate_once(
    source: &dyn RecordSource,
    config: &EngineConfig,
    params: &AggregationParams,
) -> Result<(AggregationDoc, RunInputs), PipelineError> {
    params.validate().map_err(PipelineError::Params)?;
    let policy = NormalizePolicy::new(params.period_field, config.utc_offset_minutes)
        .map_err(PipelineError::Config)?;

    let fetched = source.fetch_batch(&query_for(params))?;
    let raws = fetched.records;
    debug!(
        year = params.year,
        fetched = raws.len(),
        undecodable = fetched.undecodable.len(),
        "fetched records"
    );

    let batch = normalize_batch(&raws, &config.taxonomy, &policy);
    let result = aggregate(&batch.records, params, config);

    // Weight/status anomalies follow their record into or out of the view.
    // Excluded records are matched on whatever year, status and scope could
    // be read from them.
    let in_view: BTreeSet<&str> = batch
        .records
        .iter()
        .filter(|r| admits(params, r))
        .map(|r| r.id.as_str())
        .collect();
    let anomalies: Vec<Anomaly> = batch
        .anomalies
        .iter()
        .chain(&fetched.undecodable)
        .filter(|a| {
            if a.excluded() {
                anomaly_in_view(params, a)
            } else {
                in_view.contains(a.record_id.as_str())
            }
        })
        .cloned()
        .collect();

    let inputs = RunInputs {
        records_sha256: hasher::sha256_canonical(&raws)?,
        records_fetched: raws.len(),
        records_undecodable: fetched.undecodable.len(),
        config_sha256: hasher::sha256_canonical(config)?,
    };
    let doc = build_aggregation(params.clone(), result, anomalies)?;
    Ok((doc, inputs))
}

pub fn run_with_ctx(ctx: PipelineCtx<'_>) -> Result<PipelineOutputs, PipelineError> {
    validate_config(ctx.config)?;
    let (aggregation, inputs) = aggregate_once(ctx.source, ctx.config, &ctx.params)?;
    let run_record = build_run_record(&ctx.timestamp_utc, ctx.engine_meta, inputs, &aggregation)?;
    info!(
        aggregation = %aggregation.id,
        records = aggregation.result.record_count,
        anomalies = aggregation.anomalies.len(),
        "aggregation complete"
    );
    Ok(PipelineOutputs { aggregation, run_record })
}

/// Multi-year trend: one independent fetch + aggregation per year, returned in
/// request order. The first failure aborts the trend.
pub fn run_trend(
    source: &dyn RecordSource,
    config: &EngineConfig,
    params: &AggregationParams,
    years: &[i32],
) -> Result<Vec<AggregationDoc>, PipelineError> {
    validate_config(config)?;
    years
        .iter()
        .map(|&year| {
            let p = AggregationParams { year, ..params.clone() };
            aggregate_once(source, config, &p).map(|(doc, _)| doc)
        })
        .collect()
}

/// Loaded inputs of one run: validated config, file-backed source, params.
#[derive(Debug)]
pub struct RunPlan {
    pub config: EngineConfig,
    pub source: JsonFileSource,
    pub params: AggregationParams,
}

impl RunPlan {
    /// Config from `config_path`, else the built-in campus config.
    pub fn from_paths(
        records_path: &Path,
        config_path: Option<&Path>,
        params: AggregationParams,
    ) -> Result<Self, PipelineError> {
        let config = match config_path {
            Some(p) => wt_io::load_config(p)?,
            None => EngineConfig::campus_default(),
        };
        validate_config(&config)?;
        params.validate().map_err(PipelineError::Params)?;
        Ok(Self { config, source: JsonFileSource::new(records_path), params })
    }

    /// Load, validate and resolve a manifest (digests included).
    pub fn from_manifest(path: &Path) -> Result<Self, PipelineError> {
        let resolved = wt_io::load_and_resolve_manifest(path)?;
        Self::from_paths(&resolved.records_path, resolved.config_path.as_deref(), resolved.params)
    }

    pub fn run(&self, engine_meta: EngineMeta, timestamp_utc: &str) -> Result<PipelineOutputs, PipelineError> {
        run_with_ctx(PipelineCtx {
            source: &self.source,
            config: &self.config,
            params: self.params.clone(),
            engine_meta,
            timestamp_utc: timestamp_utc.to_string(),
        })
    }
}

/// Manifest entry: load the manifest (and config, else the built-in campus
/// config), read records from the file it names, run.
pub fn run_from_manifest_path(
    path: &Path,
    engine_meta: EngineMeta,
    timestamp_utc: &str,
) -> Result<PipelineOutputs, PipelineError> {
    RunPlan::from_manifest(path)?.run(engine_meta, timestamp_utc)
}
