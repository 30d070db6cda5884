// crates/wt_cli/src/args.rs
//
// Offline CLI argument surface.
// - No networked paths (reject any scheme:// like http/https/file)
// - Exactly one of: --manifest  XOR  --records (+ optional --config)
// - Records mode needs --year and --period-field; nothing semantic is defaulted
// - Output: --out dir, --render [json|html]*
// - --validate-only loads and checks inputs without aggregating

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use clap::{Parser, ValueEnum};
use thiserror::Error;

use wt_core::{AggregationParams, PeriodField, RecordStatus, ScopeFilter, StatusFilter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PeriodArg {
    OccurredAt,
    CreatedAt,
}

impl From<PeriodArg> for PeriodField {
    fn from(p: PeriodArg) -> Self {
        match p {
            PeriodArg::OccurredAt => PeriodField::OccurredAt,
            PeriodArg::CreatedAt => PeriodField::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    Json,
    Html,
}

/// Parsed CLI arguments (raw).
#[derive(Debug, Parser, Clone)]
#[command(
    name = "wastestat",
    version,
    disable_help_subcommand = true,
    about = "Yearly campus waste statistics from local record files"
)]
pub struct Args {
    // --- Mode selection ---
    /// Run manifest JSON (mutually exclusive with the explicit input flags).
    #[arg(
        long,
        conflicts_with_all = [
            "records", "config", "year", "period_field", "campus", "department",
            "unit", "status", "all_statuses",
        ]
    )]
    pub manifest: Option<PathBuf>,

    // --- Explicit mode ---
    /// Waste records JSON (array or {"records": [...]}).
    #[arg(long)]
    pub records: Option<PathBuf>,
    /// Engine configuration JSON; the built-in campus configuration when omitted.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Calendar year to aggregate.
    #[arg(long)]
    pub year: Option<i32>,
    /// Record date that places a record in a month.
    #[arg(long, value_enum)]
    pub period_field: Option<PeriodArg>,
    #[arg(long)]
    pub campus: Option<String>,
    #[arg(long)]
    pub department: Option<String>,
    #[arg(long)]
    pub unit: Option<String>,
    /// Status to include (repeatable). Default: verified only.
    #[arg(long, value_parser = parse_status, conflicts_with = "all_statuses")]
    pub status: Vec<RecordStatus>,
    /// Include records in every status.
    #[arg(long)]
    pub all_statuses: bool,

    // --- Output & rendering ---
    /// Output directory (default: current directory).
    #[arg(long, default_value = ".")]
    pub out: PathBuf,
    /// Report format(s) to emit in addition to the canonical artifacts.
    #[arg(long, value_enum, num_args = 1..=2)]
    pub render: Vec<RenderFormat>,

    /// Load and validate inputs only; write nothing.
    #[arg(long)]
    pub validate_only: bool,

    /// Only warnings and errors on stderr.
    #[arg(long)]
    pub quiet: bool,
}

/// Errors surfaced by argument validation. Messages are short and stable.
#[derive(Debug, Error)]
pub enum CliError {
    #[error("missing required flag: {0}")]
    Missing(&'static str),
    #[error("path must be local file (no scheme): {0}")]
    NonLocalPath(String),
    #[error("file not found: {0}")]
    NotFound(String),
    #[error("invalid parameters: {0}")]
    Params(String),
}

/// Status labels accepted the way records spell them ("Revision Required", "verified").
pub fn parse_status(s: &str) -> Result<RecordStatus, String> {
    RecordStatus::from_label(s).ok_or_else(|| {
        let known: Vec<&str> = RecordStatus::ALL.iter().map(|s| s.token()).collect();
        format!("unknown status '{s}' (expected one of {})", known.join(", "))
    })
}

impl Args {
    /// Aggregation parameters for records mode.
    pub fn params(&self) -> Result<AggregationParams, CliError> {
        let year = self.year.ok_or(CliError::Missing("--year"))?;
        let period_field = self.period_field.ok_or(CliError::Missing("--period-field"))?;
        let statuses = (!self.status.is_empty()).then_some(self.status.as_slice());
        let statuses = StatusFilter::from_inputs(statuses, self.all_statuses)
            .map_err(|e| CliError::Params(e.to_string()))?;
        let params = AggregationParams {
            year,
            period_field: period_field.into(),
            scope: ScopeFilter {
                campus: self.campus.clone(),
                department: self.department.clone(),
                unit: self.unit.clone(),
            },
            statuses,
        };
        params.validate().map_err(|e| CliError::Params(e.to_string()))?;
        Ok(params)
    }
}

/// Entry point used by main.rs
pub fn parse_and_validate() -> Result<Args, CliError> {
    validate(Args::parse())
}

/// Scheme checks, mode checks, existence checks, then path normalization.
pub fn validate(mut args: Args) -> Result<Args, CliError> {
    for p in iter_all_paths(&args) {
        ensure_local_path(p)?;
    }

    if let Some(manifest) = &args.manifest {
        ensure_local_exists(manifest, "--manifest")?;
        args.manifest = args.manifest.take().map(|p| normalize_path(&p));
    } else {
        let records = args.records.as_ref().ok_or(CliError::Missing("--records or --manifest"))?;
        ensure_local_exists(records, "--records")?;
        if let Some(cfg) = &args.config {
            ensure_local_exists(cfg, "--config")?;
        }
        args.params()?;
        args.records = args.records.take().map(|p| normalize_path(&p));
        args.config = args.config.take().map(|p| normalize_path(&p));
    }

    // Output directory may not exist yet.
    args.out = normalize_path(&args.out);
    Ok(args)
}

/// URL-looking input (`scheme://`, `http:`, `https:`, `file:`).
fn looks_like_url(s: &str) -> bool {
    let s = s.trim();
    s.contains("://")
        || ["http:", "https:", "file:"]
            .iter()
            .any(|scheme| s.get(..scheme.len()).is_some_and(|head| head.eq_ignore_ascii_case(scheme)))
}

fn ensure_local_path(p: &Path) -> Result<(), CliError> {
    match p.to_str() {
        Some(s) if looks_like_url(s) => Err(CliError::NonLocalPath(s.to_string())),
        _ => Ok(()),
    }
}

fn iter_all_paths(args: &Args) -> impl Iterator<Item = &Path> {
    [args.manifest.as_deref(), args.records.as_deref(), args.config.as_deref()]
        .into_iter()
        .flatten()
        .chain(std::iter::once(args.out.as_path()))
}

/// Local regular file.
fn ensure_local_exists(p: &Path, label: &'static str) -> Result<(), CliError> {
    ensure_local_path(p)?;
    match fs::metadata(p) {
        Ok(meta) if meta.is_file() => Ok(()),
        _ => Err(CliError::NotFound(format!("{label} {}", p.display()))),
    }
}

/// Absolute form of `p`; paths that do not exist yet are joined onto the CWD.
fn normalize_path(p: &Path) -> PathBuf {
    if let Ok(real) = fs::canonicalize(p) {
        return real;
    }
    if p.is_absolute() {
        return p.to_path_buf();
    }
    env::current_dir().map(|cwd| cwd.join(p)).unwrap_or_else(|_| p.to_path_buf())
}
