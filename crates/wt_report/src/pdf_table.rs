// crates/wt_report/src/pdf_table.rs
//
// PDF table layout of the matrix view: head rows with col/row spans for the
// grouped headers, body rows of preformatted strings. Equivalent to the
// spreadsheet layout; a PDF engine draws it as is.

use serde::{Deserialize, Serialize};

use crate::sheet::MONTH_HEADER;
use crate::structure::MatrixView;
use crate::{check_shape, fmt_kg, ReportError};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfCell {
    pub content: String,
    pub col_span: usize,
    pub row_span: usize,
}

impl PdfCell {
    fn new(content: impl Into<String>) -> Self {
        Self { content: content.into(), col_span: 1, row_span: 1 }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PdfTable {
    pub title: String,
    /// Row 0 holds spanning cells; row 1 only the cells not covered by a span.
    pub head: Vec<Vec<PdfCell>>,
    pub body: Vec<Vec<String>>,
}

pub fn pdf_table(m: &MatrixView) -> Result<PdfTable, ReportError> {
    check_shape(m)?;

    let mut top = vec![PdfCell { row_span: 2, ..PdfCell::new(MONTH_HEADER) }];
    let mut sub = Vec::with_capacity(m.column_count());
    for g in &m.groups {
        top.push(PdfCell { col_span: g.columns.len(), ..PdfCell::new(g.label.as_str()) });
        sub.extend(g.columns.iter().map(|c| PdfCell::new(c.label.as_str())));
    }

    let body = m
        .rows
        .iter()
        .map(|r| {
            let mut row = Vec::with_capacity(1 + r.cells.len());
            row.push(r.label.clone());
            row.extend(r.cells.iter().map(|&kg| fmt_kg(kg)));
            row
        })
        .collect();

    Ok(PdfTable { title: format!("Waste statistics {}", m.year), head: vec![top, sub], body })
}
