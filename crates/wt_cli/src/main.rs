// crates/wt_cli/src/main.rs
//
// wastestat: load → aggregate → canonical artifacts → optional reports.
// Exit codes: 0 ok, 2 validation/config, 4 I/O or fetch, 5 report rendering.

mod args;

mod exitcodes {
    pub const OK: u8 = 0;
    pub const VALIDATION: u8 = 2;
    pub const IO: u8 = 4;
    pub const RENDER: u8 = 5;
}

use std::fs;
use std::path::Path;
use std::process::ExitCode;

use chrono::{SecondsFormat, Utc};
use thiserror::Error;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use args::{parse_and_validate as parse_cli, Args, RenderFormat};
use wt_io::{canonical_json, IoError};
use wt_pipeline::{engine_identifiers, PipelineError, PipelineOutputs, RunPlan};
use wt_report::{build_report_model, ExportSink, HtmlSink, JsonSink, ReportError};

/// Central error type for CLI → exit-code mapping.
#[derive(Debug, Error)]
enum MainError {
    /// Schema / JSON shape / manifest / configuration / parameter failures
    #[error("{0}")]
    Validation(String),
    /// Read/write/path/limit errors and record source failures
    #[error("{0}")]
    Io(String),
    #[error("{0}")]
    Render(String),
}

impl MainError {
    fn exit_code(&self) -> u8 {
        match self {
            MainError::Validation(_) => exitcodes::VALIDATION,
            MainError::Io(_) => exitcodes::IO,
            MainError::Render(_) => exitcodes::RENDER,
        }
    }
}

fn main() -> ExitCode {
    let args = match parse_cli() {
        Ok(a) => a,
        Err(e) => {
            eprintln!("wastestat: error: {e}");
            return ExitCode::from(exitcodes::VALIDATION);
        }
    };
    init_tracing(args.quiet);

    let outcome = if args.validate_only { validate_only(&args) } else { run_once(&args) };
    match outcome {
        Ok(()) => ExitCode::from(exitcodes::OK),
        Err(e) => {
            eprintln!("wastestat: error: {e}");
            ExitCode::from(e.exit_code())
        }
    }
}

/// Filter from `WASTESTAT_LOG`, then `RUST_LOG`, else `info` (`warn` with --quiet).
fn init_tracing(quiet: bool) {
    let fallback = if quiet { "warn" } else { "info" };
    let log_env = std::env::var("WASTESTAT_LOG")
        .or_else(|_| std::env::var("RUST_LOG"))
        .unwrap_or_else(|_| fallback.to_string());
    let env_filter = EnvFilter::try_new(&log_env).unwrap_or_else(|_| EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .compact()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .with_env_filter(env_filter)
        .init();
}

fn load_plan(args: &Args) -> Result<RunPlan, MainError> {
    let plan = match (&args.manifest, &args.records) {
        (Some(manifest), _) => RunPlan::from_manifest(manifest),
        (None, Some(records)) => {
            let params = args.params().map_err(|e| MainError::Validation(e.to_string()))?;
            RunPlan::from_paths(records, args.config.as_deref(), params)
        }
        (None, None) => return Err(MainError::Validation("missing --records or --manifest".into())),
    };
    plan.map_err(map_pipeline_err)
}

/// Load config, manifest and records; aggregate nothing.
fn validate_only(args: &Args) -> Result<(), MainError> {
    let plan = load_plan(args)?;
    let loaded = wt_io::load_records(plan.source.path()).map_err(map_io_err)?;
    for s in &loaded.skipped {
        warn!(index = s.index, record = ?s.record_id, reason = %s.reason,
              "record entry undecodable; a run reports it as undecodable_record");
    }
    info!(
        records = loaded.records.len(),
        skipped = loaded.skipped.len(),
        year = plan.params.year,
        "validate-only: inputs OK"
    );
    Ok(())
}

fn run_once(args: &Args) -> Result<(), MainError> {
    let plan = load_plan(args)?;
    let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true);
    let outs = plan.run(engine_identifiers(), &timestamp).map_err(map_pipeline_err)?;

    if outs.aggregation.is_zero_activity() {
        info!(year = plan.params.year, "no activity recorded for this view");
    }

    write_artifacts(&args.out, &outs)?;
    render_reports(args, &plan, &outs)?;

    info!(
        out = %args.out.display(),
        aggregation = %outs.aggregation.id,
        run = %outs.run_record.id,
        "artifacts written"
    );
    Ok(())
}

fn write_artifacts(out_dir: &Path, outs: &PipelineOutputs) -> Result<(), MainError> {
    fs::create_dir_all(out_dir)
        .map_err(|e| MainError::Io(format!("mkdir {}: {e}", out_dir.display())))?;

    canonical_json::write_canonical_file(&out_dir.join("aggregation.json"), &outs.aggregation)
        .map_err(|e| MainError::Io(format!("write aggregation.json: {e}")))?;
    canonical_json::write_canonical_file(&out_dir.join("run_record.json"), &outs.run_record)
        .map_err(|e| MainError::Io(format!("write run_record.json: {e}")))?;
    Ok(())
}

fn render_reports(args: &Args, plan: &RunPlan, outs: &PipelineOutputs) -> Result<(), MainError> {
    if args.render.is_empty() {
        return Ok(());
    }
    let doc = &outs.aggregation;
    let model = build_report_model(&doc.result, &plan.config.taxonomy, &doc.id, &doc.anomalies);

    for format in &args.render {
        let sink: &dyn ExportSink = match format {
            RenderFormat::Json => &JsonSink,
            RenderFormat::Html => &HtmlSink,
        };
        let bytes = sink.render(&model).map_err(map_report_err)?;
        let path = args.out.join(format!("report.{}", sink.extension()));
        canonical_json::write_bytes_atomic(&path, &bytes)
            .map_err(|e| MainError::Io(format!("write {}: {e}", path.display())))?;
    }
    Ok(())
}

// ------------------------------ error mapping ------------------------------

fn map_io_err(e: IoError) -> MainError {
    match e {
        IoError::Schema { .. } | IoError::Json { .. } | IoError::Manifest(_) | IoError::Config(_) => {
            MainError::Validation(e.to_string())
        }
        IoError::Path(_) | IoError::TooLarge { .. } => MainError::Io(e.to_string()),
    }
}

fn map_pipeline_err(e: PipelineError) -> MainError {
    match e {
        PipelineError::Config(_) | PipelineError::Params(_) => MainError::Validation(e.to_string()),
        PipelineError::Fetch(_) => MainError::Io(e.to_string()),
        PipelineError::Io(inner) => map_io_err(inner),
    }
}

fn map_report_err(e: ReportError) -> MainError {
    MainError::Render(e.to_string())
}
