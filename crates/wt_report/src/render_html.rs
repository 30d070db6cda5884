// crates/wt_report/src/render_html.rs
//
// Offline HTML report: no external assets, escaped text, grouped headers via
// colspan/rowspan. Section order: cover → dashboard → statistic table →
// breakdown → data quality.

use std::fmt::Write as _;

use crate::sheet::MONTH_HEADER;
use crate::structure::{BreakdownGroup, FlatView, MatrixView};
use crate::{check_shape, fmt_kg, percent_1dp, AnomalySummary, CoverSnapshot, ExportSink};
use crate::{ReportError, ReportModel};

// ------------------------- formatting helpers -------------------------

/// Escape text for HTML.
fn esc(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Group the integer part of an ASCII number with U+202F (narrow no-break space).
fn group_digits(num: &str) -> String {
    let (sign, rest) = match num.strip_prefix('-') {
        Some(r) => ("-", r),
        None => ("", num),
    };
    let (int, frac) = match rest.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (rest, None),
    };
    let mut out = String::with_capacity(num.len() + 8);
    out.push_str(sign);
    for (i, ch) in int.chars().enumerate() {
        if i > 0 && (int.len() - i) % 3 == 0 {
            out.push('\u{202F}');
        }
        out.push(ch);
    }
    if let Some(f) = frac {
        out.push('.');
        out.push_str(f);
    }
    out
}

fn fmt_int(n: usize) -> String {
    group_digits(&n.to_string())
}

fn fmt_kg_grouped(x: f64) -> String {
    group_digits(&fmt_kg(x))
}

// ------------------------- HTML builder -------------------------

pub struct HtmlBuilder {
    buf: String,
}

impl HtmlBuilder {
    pub fn new() -> Self {
        Self { buf: String::with_capacity(32 * 1024) }
    }

    /// Start document with minimal head.
    pub fn start(&mut self, title: &str) {
        let _ = write!(
            self.buf,
            "<!doctype html><html lang=\"en\"><head><meta charset=\"utf-8\">\
             <meta name=\"viewport\" content=\"width=device-width,initial-scale=1\">\
             <title>{}</title>\
             <style>\
             body{{font-family:system-ui,-apple-system,Segoe UI,Roboto,Ubuntu,Arial,sans-serif;margin:24px;}}\
             h1,h2,h3{{margin:0.2em 0;}}\
             .muted{{opacity:0.8}}\
             .grid{{display:grid;grid-template-columns:repeat(3,minmax(0,1fr));gap:8px}}\
             .pill{{display:inline-block;padding:.2em .6em;border-radius:9999px;background:#eee}}\
             table{{border-collapse:collapse}}\
             td,th{{padding:4px 8px;border:1px solid #ddd}}\
             td.num{{text-align:right;font-variant-numeric:tabular-nums}}\
             tr.total td{{font-weight:bold}}\
             </style></head><body>",
            esc(title)
        );
    }

    pub fn finish(mut self) -> String {
        self.buf.push_str("</body></html>");
        self.buf
    }

    pub fn section_cover(&mut self, c: &CoverSnapshot) {
        let _ = write!(
            self.buf,
            "<h1>Waste statistics {}</h1>\
             <p class=\"muted\">{} records summed, {} outside the filters<br>\
             <code>{}</code></p>",
            c.year,
            fmt_int(c.record_count),
            fmt_int(c.filtered_out),
            esc(&c.aggregation_id)
        );
    }

    pub fn section_dashboard(&mut self, f: &FlatView) {
        self.buf.push_str("<h2>Summary</h2><div class=\"grid\">");
        let cards = [
            ("Generated (kg)", fmt_kg_grouped(f.total_generated_kg)),
            ("Diverted (kg)", fmt_kg_grouped(f.total_recycled_kg)),
            ("Landfilled (kg)", fmt_kg_grouped(f.total_landfilled_kg)),
            ("Net GHG (kg CO2e)", fmt_kg_grouped(f.total_ghg_reduction_kg)),
            ("Landfill cost avoided", fmt_kg_grouped(f.total_landfill_cost_savings)),
            ("Diversion rate", f.diversion_rate.map_or_else(|| "—".to_string(), percent_1dp)),
        ];
        for (label, value) in cards {
            let _ = write!(
                self.buf,
                "<div><div class=\"pill\">{}</div><div><b>{}</b></div></div>",
                esc(label),
                esc(&value)
            );
        }
        self.buf.push_str("</div>");
    }

    /// Statistic table: category row with colspans, type row, 12 months + Total.
    pub fn section_matrix(&mut self, m: &MatrixView) {
        self.buf.push_str("<h2>Monthly statistics</h2><table><thead><tr>");
        let _ = write!(self.buf, "<th rowspan=\"2\">{}</th>", esc(MONTH_HEADER));
        for g in &m.groups {
            let _ = write!(
                self.buf,
                "<th colspan=\"{}\">{}</th>",
                g.columns.len(),
                esc(&g.label)
            );
        }
        self.buf.push_str("</tr><tr>");
        for c in m.groups.iter().flat_map(|g| g.columns.iter()) {
            let _ = write!(self.buf, "<th>{}</th>", esc(&c.label));
        }
        self.buf.push_str("</tr></thead><tbody>");
        for r in &m.rows {
            if r.month.is_none() {
                self.buf.push_str("<tr class=\"total\">");
            } else {
                self.buf.push_str("<tr>");
            }
            let _ = write!(self.buf, "<td>{}</td>", esc(&r.label));
            for &kg in &r.cells {
                let _ = write!(self.buf, "<td class=\"num\">{}</td>", fmt_kg_grouped(kg));
            }
            self.buf.push_str("</tr>");
        }
        self.buf.push_str("</tbody></table>");
    }

    pub fn section_breakdown(&mut self, groups: &[BreakdownGroup]) {
        self.buf.push_str("<h2>Breakdown</h2>");
        for g in groups {
            let _ = write!(
                self.buf,
                "<h3>{} <span class=\"muted\">{} kg</span></h3><ul>",
                esc(&g.label),
                fmt_kg_grouped(g.total_kg)
            );
            for i in &g.items {
                let _ = write!(
                    self.buf,
                    "<li>{}: {} kg</li>",
                    esc(&i.label),
                    fmt_kg_grouped(i.kg)
                );
            }
            self.buf.push_str("</ul>");
        }
    }

    pub fn section_anomalies(&mut self, a: &AnomalySummary) {
        self.buf.push_str("<h2>Data quality</h2>");
        if a.items.is_empty() {
            self.buf.push_str("<p class=\"muted\">No anomalous records.</p>");
            return;
        }
        let _ = write!(
            self.buf,
            "<p>{} records excluded from the statistics.</p><ul>",
            fmt_int(a.excluded_count)
        );
        for (kind, n) in &a.counts {
            let _ = write!(self.buf, "<li><code>{}</code>: {}</li>", esc(kind.token()), fmt_int(*n));
        }
        self.buf.push_str(
            "</ul><table><thead><tr><th>Record</th><th>Kind</th>\
             <th>Disposal method</th><th>Waste type</th><th>Detail</th></tr></thead><tbody>",
        );
        for item in &a.items {
            let _ = write!(
                self.buf,
                "<tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                esc(&item.record_id),
                esc(item.kind.token()),
                esc(item.disposal_method.as_deref().unwrap_or("")),
                esc(item.waste_type.as_deref().unwrap_or("")),
                esc(item.detail.as_deref().unwrap_or(""))
            );
        }
        self.buf.push_str("</tbody></table>");
    }
}

impl Default for HtmlBuilder {
    fn default() -> Self {
        Self::new()
    }
}

// ------------------------- top-level entry -------------------------

pub fn render_html(model: &ReportModel) -> Result<String, ReportError> {
    check_shape(&model.matrix)?;
    let mut h = HtmlBuilder::new();
    h.start(&format!("Waste statistics {}", model.cover.year));
    h.section_cover(&model.cover);
    h.section_dashboard(&model.flat);
    h.section_matrix(&model.matrix);
    h.section_breakdown(&model.breakdown);
    h.section_anomalies(&model.anomalies);
    Ok(h.finish())
}

pub struct HtmlSink;

impl ExportSink for HtmlSink {
    fn extension(&self) -> &'static str {
        "html"
    }

    fn render(&self, model: &ReportModel) -> Result<Vec<u8>, ReportError> {
        render_html(model).map(String::into_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::build_report_model;
    use wt_core::{
        AggregationParams, Anomaly, AnomalyKind, EngineConfig, PeriodField, ScopeFilter,
        StatusFilter,
    };

    fn model(anomalies: &[Anomaly]) -> ReportModel {
        let cfg = EngineConfig::campus_default();
        let params = AggregationParams {
            year: 2024,
            period_field: PeriodField::OccurredAt,
            scope: ScopeFilter::default(),
            statuses: StatusFilter::VerifiedOnly,
        };
        let r = wt_algo::aggregate(&[], &params, &cfg);
        build_report_model(&r, &cfg.taxonomy, "AGG:abc", anomalies)
    }

    #[test]
    fn escapes_text() {
        assert_eq!(esc("<a href='x'>&</a>"), "&lt;a href=&#x27;x&#x27;&gt;&amp;&lt;/a&gt;");
    }

    #[test]
    fn groups_thousands() {
        assert_eq!(group_digits("0.00"), "0.00");
        assert_eq!(group_digits("1234567.50"), "1\u{202F}234\u{202F}567.50");
        assert_eq!(group_digits("-1000.00"), "-1\u{202F}000.00");
        assert_eq!(fmt_int(999), "999");
    }

    #[test]
    fn grouped_headers_use_spans() {
        let html = render_html(&model(&[])).unwrap();
        assert!(html.starts_with("<!doctype html>"));
        assert!(html.ends_with("</body></html>"));
        assert!(html.contains("<th rowspan=\"2\">Month</th>"));
        assert!(html.contains("<th colspan=\"5\">Recycling</th>"));
        assert!(html.contains("<tr class=\"total\"><td>Total</td>"));
        assert!(html.contains("No anomalous records."));
        assert!(!html.contains("http"));
    }

    #[test]
    fn anomaly_strings_are_escaped() {
        let a = Anomaly {
            record_id: "r1".into(),
            kind: AnomalyKind::UnknownMethod,
            disposal_method: Some("<Burning>".into()),
            waste_type: None,
            detail: None,
            year: Some(2024),
            status: None,
            scope: None,
        };
        let html = String::from_utf8(HtmlSink.render(&model(&[a])).unwrap()).unwrap();
        assert!(html.contains("&lt;Burning&gt;"));
        assert!(html.contains("<code>unknown_method</code>: 1"));
    }
}
