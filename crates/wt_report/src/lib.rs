//! wt_report: summary projector and export shapes.
//!
//!   • Projections copy numbers from the `AggregationResult`; nothing is recomputed
//!   • Rounding to 2 decimals happens only when a sink lays values out
//!   • Column order is the taxonomy's declared order everywhere

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use wt_algo::AggregationResult;
use wt_core::{Anomaly, AnomalyKind, CategoryTaxonomy};

pub mod pdf_table;
pub mod render_html;
pub mod render_json;
pub mod sheet;
pub mod structure;

pub use pdf_table::{PdfCell, PdfTable};
pub use render_html::{render_html, HtmlSink};
pub use render_json::{render_report_json, JsonSink};
pub use sheet::{MergeRange, SheetCell, SheetLayout};
pub use structure::{
    breakdown, chart_series, flat_view, matrix_view, BreakdownGroup, BreakdownItem, CategoryTotal,
    ChartPoint, Column, ColumnGroup, FlatView, MatrixRow, MatrixView,
};

#[derive(Debug, Error)]
pub enum ReportError {
    #[error("report serialization failed: {0}")]
    Json(#[from] serde_json::Error),
    #[error("malformed matrix: {0}")]
    Shape(String),
}

/// Which projection a consumer wants.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    Matrix,
    Flat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "view", rename_all = "snake_case")]
pub enum ViewModel {
    Matrix(MatrixView),
    Flat(FlatView),
}

pub fn project(result: &AggregationResult, taxonomy: &CategoryTaxonomy, view: View) -> ViewModel {
    match view {
        View::Matrix => ViewModel::Matrix(matrix_view(result, taxonomy)),
        View::Flat => ViewModel::Flat(flat_view(result, taxonomy)),
    }
}

/// Header block of the report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoverSnapshot {
    pub aggregation_id: String,
    pub year: i32,
    pub record_count: usize,
    pub filtered_out: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalySummary {
    pub excluded_count: usize,
    pub counts: BTreeMap<AnomalyKind, usize>,
    pub items: Vec<Anomaly>,
}

/// Everything a sink renders. Built once from an aggregation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportModel {
    pub cover: CoverSnapshot,
    pub flat: FlatView,
    pub matrix: MatrixView,
    pub breakdown: Vec<BreakdownGroup>,
    pub anomalies: AnomalySummary,
}

pub fn build_report_model(
    result: &AggregationResult,
    taxonomy: &CategoryTaxonomy,
    aggregation_id: &str,
    anomalies: &[Anomaly],
) -> ReportModel {
    let mut counts = BTreeMap::new();
    for a in anomalies {
        *counts.entry(a.kind).or_insert(0usize) += 1;
    }
    ReportModel {
        cover: CoverSnapshot {
            aggregation_id: aggregation_id.to_string(),
            year: result.year,
            record_count: result.record_count,
            filtered_out: result.filtered_out,
        },
        flat: flat_view(result, taxonomy),
        matrix: matrix_view(result, taxonomy),
        breakdown: breakdown(result, taxonomy),
        anomalies: AnomalySummary {
            excluded_count: anomalies.iter().filter(|a| a.excluded()).count(),
            counts,
            items: anomalies.to_vec(),
        },
    }
}

/// Export target. Spreadsheet and PDF engines implement this on top of
/// [`SheetLayout`] / [`PdfTable`].
pub trait ExportSink {
    /// File extension without the dot.
    fn extension(&self) -> &'static str;
    fn render(&self, model: &ReportModel) -> Result<Vec<u8>, ReportError>;
}

pub(crate) fn check_shape(m: &MatrixView) -> Result<(), ReportError> {
    if m.is_rectangular() {
        Ok(())
    } else {
        Err(ReportError::Shape(format!(
            "{} columns but a row has a different cell count",
            m.column_count()
        )))
    }
}

// ------------------------- Presentation utilities -------------------------

/// Round half away from zero to 2 decimals, on the shortest decimal form of
/// `x` (2.675 → 2.68 even though its binary value sits just below). Never
/// yields -0.0; non-finite input passes through.
pub fn round_2dp(x: f64) -> f64 {
    // From 2^52 up every f64 is an integer.
    if !x.is_finite() || x.abs() >= 4_503_599_627_370_496.0 {
        return x;
    }
    let shortest = x.abs().to_string();
    let (int, frac) = shortest.split_once('.').unwrap_or((shortest.as_str(), ""));
    let digit = |i: usize| frac.as_bytes().get(i).map_or(0, |d| u64::from(d - b'0'));
    let cents = int.parse::<u64>().unwrap_or(0) * 100
        + digit(0) * 10
        + digit(1)
        + u64::from(digit(2) >= 5);
    if cents == 0 {
        return 0.0;
    }
    let r: f64 = format!("{}.{:02}", cents / 100, cents % 100).parse().unwrap_or(x.abs());
    if x < 0.0 {
        -r
    } else {
        r
    }
}

/// Kilograms with 2 decimals, ASCII, no grouping. "—" for non-finite input.
pub fn fmt_kg(x: f64) -> String {
    if !x.is_finite() {
        return "—".to_string();
    }
    format!("{:.2}", round_2dp(x))
}

/// Format a fraction `x` (0.0..=1.0) as a percentage with one decimal place,
/// round-half-up. Returns `"—"` if `x` is NaN/∞/out of range.
pub fn percent_1dp(x: f64) -> String {
    if !x.is_finite() || !(0.0..=1.0).contains(&x) {
        return "—".to_string();
    }
    let v = x * 100.0;
    let scaled = (v * 10.0 + 0.5_f64).floor() / 10.0;
    format!("{scaled:.1}%")
}
