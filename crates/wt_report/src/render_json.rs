//! Report JSON renderer (cover → dashboard → matrix → breakdown → anomalies).
//!
//! Key order is fixed by insertion into `serde_json::Map`; the crate enables
//! `preserve_order` so it survives serialization. Kilogram figures are rounded
//! to 2 decimals here and nowhere earlier.

use serde_json::{Map as JsonMap, Number, Value};

use crate::structure::{BreakdownGroup, FlatView, MatrixView};
use crate::{check_shape, percent_1dp, round_2dp, AnomalySummary, CoverSnapshot, ExportSink};
use crate::{ReportError, ReportModel};

pub fn render_report_json(m: &ReportModel) -> Result<Value, ReportError> {
    check_shape(&m.matrix)?;
    let mut root = obj();

    // 1) cover
    root.insert("cover".into(), cover_json(&m.cover));
    // 2) dashboard
    root.insert("dashboard".into(), dashboard_json(&m.flat));
    // 3) matrix
    root.insert("matrix".into(), matrix_json(&m.matrix));
    // 4) breakdown
    root.insert(
        "breakdown".into(),
        Value::Array(m.breakdown.iter().map(breakdown_json).collect()),
    );
    // 5) anomalies
    root.insert("anomalies".into(), anomalies_json(&m.anomalies)?);

    Ok(Value::Object(root))
}

/// Pretty-printed JSON with a trailing newline.
pub struct JsonSink;

impl ExportSink for JsonSink {
    fn extension(&self) -> &'static str {
        "json"
    }

    fn render(&self, model: &ReportModel) -> Result<Vec<u8>, ReportError> {
        let mut bytes = serde_json::to_vec_pretty(&render_report_json(model)?)?;
        bytes.push(b'\n');
        Ok(bytes)
    }
}

/* ------------------------------- sections ------------------------------- */

fn cover_json(c: &CoverSnapshot) -> Value {
    let mut o = obj();
    o.insert("aggregation_id".into(), Value::String(c.aggregation_id.clone()));
    o.insert("year".into(), Value::from(c.year));
    o.insert("record_count".into(), Value::from(c.record_count));
    o.insert("filtered_out".into(), Value::from(c.filtered_out));
    Value::Object(o)
}

fn dashboard_json(f: &FlatView) -> Value {
    let mut o = obj();
    o.insert("total_generated_kg".into(), kg(f.total_generated_kg));
    o.insert("total_recycled_kg".into(), kg(f.total_recycled_kg));
    o.insert("total_landfilled_kg".into(), kg(f.total_landfilled_kg));
    o.insert("total_ghg_reduction_kg".into(), kg(f.total_ghg_reduction_kg));
    o.insert("total_landfill_cost_savings".into(), kg(f.total_landfill_cost_savings));
    // Omitted when nothing was generated.
    if let Some(rate) = f.diversion_rate {
        o.insert("diversion_rate".into(), Value::String(percent_1dp(rate)));
    }

    let cats = f
        .category_totals
        .iter()
        .map(|c| {
            let mut e = obj();
            e.insert("method".into(), Value::String(c.method.token().to_string()));
            e.insert("label".into(), Value::String(c.label.clone()));
            e.insert("kg".into(), kg(c.kg));
            Value::Object(e)
        })
        .collect();
    o.insert("category_totals".into(), Value::Array(cats));
    Value::Object(o)
}

fn matrix_json(m: &MatrixView) -> Value {
    let mut o = obj();
    o.insert("year".into(), Value::from(m.year));

    let groups = m
        .groups
        .iter()
        .map(|g| {
            let mut e = obj();
            e.insert("method".into(), Value::String(g.method.token().to_string()));
            e.insert("label".into(), Value::String(g.label.clone()));
            e.insert(
                "types".into(),
                Value::Array(
                    g.columns
                        .iter()
                        .map(|c| {
                            let mut t = obj();
                            t.insert("waste_type".into(), Value::String(c.waste_type.to_string()));
                            t.insert("label".into(), Value::String(c.label.clone()));
                            Value::Object(t)
                        })
                        .collect(),
                ),
            );
            Value::Object(e)
        })
        .collect();
    o.insert("groups".into(), Value::Array(groups));

    let rows = m
        .rows
        .iter()
        .map(|r| {
            let mut e = obj();
            e.insert("label".into(), Value::String(r.label.clone()));
            e.insert("cells".into(), Value::Array(r.cells.iter().map(|&c| kg(c)).collect()));
            Value::Object(e)
        })
        .collect();
    o.insert("rows".into(), Value::Array(rows));
    Value::Object(o)
}

fn breakdown_json(g: &BreakdownGroup) -> Value {
    let mut o = obj();
    o.insert("method".into(), Value::String(g.method.token().to_string()));
    o.insert("total_kg".into(), kg(g.total_kg));
    let items = g
        .items
        .iter()
        .map(|i| {
            let mut e = obj();
            e.insert("waste_type".into(), Value::String(i.waste_type.to_string()));
            e.insert("kg".into(), kg(i.kg));
            Value::Object(e)
        })
        .collect();
    o.insert("items".into(), Value::Array(items));
    Value::Object(o)
}

fn anomalies_json(a: &AnomalySummary) -> Result<Value, ReportError> {
    let mut o = obj();
    o.insert("excluded_count".into(), Value::from(a.excluded_count));
    let mut counts = obj();
    for (kind, n) in &a.counts {
        counts.insert(kind.token().to_string(), Value::from(*n));
    }
    o.insert("counts".into(), Value::Object(counts));
    o.insert("items".into(), serde_json::to_value(&a.items)?);
    Ok(Value::Object(o))
}

/* -------------------------------- helpers -------------------------------- */

#[inline]
fn obj() -> JsonMap<String, Value> {
    JsonMap::new()
}

/// 2-decimal number; null for non-finite values.
fn kg(x: f64) -> Value {
    Number::from_f64(round_2dp(x)).map_or(Value::Null, Value::Number)
}
