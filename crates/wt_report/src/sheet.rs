// crates/wt_report/src/sheet.rs
//
// Spreadsheet layout of the matrix view: two header rows (category, type),
// merge ranges for the grouped headers, and a body of 2-decimal numbers.
// A spreadsheet writer only has to place cells and apply the merges.

use serde::{Deserialize, Serialize};

use crate::structure::MatrixView;
use crate::{check_shape, round_2dp, ReportError};

pub const MONTH_HEADER: &str = "Month";

/// Inclusive, zero-based cell range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRange {
    pub first_row: usize,
    pub last_row: usize,
    pub first_col: usize,
    pub last_col: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SheetCell {
    Text(String),
    Number(f64),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SheetLayout {
    pub title: String,
    /// Exactly two rows; cells covered by a merge are empty strings.
    pub header: Vec<Vec<String>>,
    pub merges: Vec<MergeRange>,
    /// Body rows start right after the header (row index 2).
    pub body: Vec<Vec<SheetCell>>,
}

impl SheetLayout {
    pub fn width(&self) -> usize {
        self.header.first().map_or(0, Vec::len)
    }
}

pub fn sheet_layout(m: &MatrixView) -> Result<SheetLayout, ReportError> {
    check_shape(m)?;
    let width = 1 + m.column_count();

    let mut categories = Vec::with_capacity(width);
    let mut types = Vec::with_capacity(width);
    categories.push(MONTH_HEADER.to_string());
    types.push(String::new());

    // "Month" spans both header rows.
    let mut merges = vec![MergeRange { first_row: 0, last_row: 1, first_col: 0, last_col: 0 }];

    for g in &m.groups {
        let first_col = categories.len();
        for (i, c) in g.columns.iter().enumerate() {
            categories.push(if i == 0 { g.label.clone() } else { String::new() });
            types.push(c.label.clone());
        }
        if g.columns.len() > 1 {
            merges.push(MergeRange {
                first_row: 0,
                last_row: 0,
                first_col,
                last_col: first_col + g.columns.len() - 1,
            });
        }
    }

    let body = m
        .rows
        .iter()
        .map(|r| {
            let mut row = Vec::with_capacity(width);
            row.push(SheetCell::Text(r.label.clone()));
            row.extend(r.cells.iter().map(|&kg| SheetCell::Number(round_2dp(kg))));
            row
        })
        .collect();

    Ok(SheetLayout {
        title: format!("Waste statistics {}", m.year),
        header: vec![categories, types],
        merges,
        body,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::structure::{Column, ColumnGroup, MatrixRow};
    use wt_core::DisposalMethod;

    fn view() -> MatrixView {
        let col = |t: &str| Column { waste_type: t.parse().unwrap(), label: t.to_string() };
        MatrixView {
            year: 2024,
            groups: vec![
                ColumnGroup {
                    method: DisposalMethod::Landfilling,
                    label: "Landfilling".into(),
                    columns: vec![col("GeneralWaste")],
                },
                ColumnGroup {
                    method: DisposalMethod::Recycling,
                    label: "Recycling".into(),
                    columns: vec![col("Paper"), col("Glass")],
                },
            ],
            rows: vec![
                MatrixRow { label: "January".into(), month: Some(1), cells: vec![1.0 / 3.0, 0.0, 2.0] },
                MatrixRow { label: "Total".into(), month: None, cells: vec![1.0 / 3.0, 0.0, 2.0] },
            ],
        }
    }

    #[test]
    fn header_rows_and_merges() {
        let s = sheet_layout(&view()).unwrap();
        assert_eq!(s.width(), 4);
        assert_eq!(s.header[0], vec!["Month", "Landfilling", "Recycling", ""]);
        assert_eq!(s.header[1], vec!["", "GeneralWaste", "Paper", "Glass"]);
        // Month block plus the two-column Recycling group; single columns are not merged.
        assert_eq!(
            s.merges,
            vec![
                MergeRange { first_row: 0, last_row: 1, first_col: 0, last_col: 0 },
                MergeRange { first_row: 0, last_row: 0, first_col: 2, last_col: 3 },
            ]
        );
    }

    #[test]
    fn body_is_rounded_only_here() {
        let v = view();
        let s = sheet_layout(&v).unwrap();
        assert_eq!(s.body[0][0], SheetCell::Text("January".into()));
        assert_eq!(s.body[0][1], SheetCell::Number(0.33));
        assert_eq!(s.body[1][3], SheetCell::Number(2.0));
        // Source view untouched.
        assert_eq!(v.rows[0].cells[0], 1.0 / 3.0);
    }

    #[test]
    fn ragged_view_is_an_error() {
        let mut v = view();
        v.rows[0].cells.push(9.0);
        assert!(sheet_layout(&v).is_err());
    }
}
