//! Summary projections of an `AggregationResult`.
//!
//! Pure re-shaping: every number here is copied from the result, never
//! recomputed or rounded. Column and group order follow the taxonomy.

use serde::{Deserialize, Serialize};

use wt_algo::AggregationResult;
use wt_core::{CategoryTaxonomy, DisposalMethod, WasteType};

pub const MONTH_NAMES: [&str; 12] = [
    "January", "February", "March", "April", "May", "June",
    "July", "August", "September", "October", "November", "December",
];

pub const TOTAL_LABEL: &str = "Total";

// ------------------------------- Matrix view -------------------------------

/// One type sub-column under its method group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub waste_type: WasteType,
    pub label: String,
}

/// Method group spanning its type columns (merged header cell).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnGroup {
    pub method: DisposalMethod,
    pub label: String,
    pub columns: Vec<Column>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRow {
    pub label: String,
    /// `None` on the Total row.
    pub month: Option<u8>,
    /// Flattened in column order: group by group, type by type.
    pub cells: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixView {
    pub year: i32,
    pub groups: Vec<ColumnGroup>,
    /// 12 month rows, then the Total row.
    pub rows: Vec<MatrixRow>,
}

impl MatrixView {
    pub fn column_count(&self) -> usize {
        self.groups.iter().map(|g| g.columns.len()).sum()
    }

    pub fn total_row(&self) -> Option<&MatrixRow> {
        self.rows.iter().find(|r| r.month.is_none())
    }

    /// Every row carries one cell per column.
    pub fn is_rectangular(&self) -> bool {
        let n = self.column_count();
        self.rows.iter().all(|r| r.cells.len() == n)
    }
}

pub fn matrix_view(result: &AggregationResult, taxonomy: &CategoryTaxonomy) -> MatrixView {
    let groups: Vec<ColumnGroup> = taxonomy
        .groups()
        .iter()
        .map(|g| ColumnGroup {
            method: g.method,
            label: g.method.label().to_string(),
            columns: g
                .waste_types
                .iter()
                .map(|t| Column { waste_type: t.clone(), label: t.label() })
                .collect(),
        })
        .collect();

    let mut rows = Vec::with_capacity(MONTH_NAMES.len() + 1);
    for (i, name) in MONTH_NAMES.iter().enumerate() {
        let month = (i + 1) as u8;
        rows.push(MatrixRow {
            label: (*name).to_string(),
            month: Some(month),
            cells: taxonomy
                .pairs()
                .map(|(m, t)| result.cell(month, m, t).unwrap_or(0.0))
                .collect(),
        });
    }
    rows.push(MatrixRow {
        label: TOTAL_LABEL.to_string(),
        month: None,
        cells: taxonomy
            .pairs()
            .map(|(m, t)| result.total(m, t).unwrap_or(0.0))
            .collect(),
    });

    MatrixView { year: result.year, groups, rows }
}

// -------------------------------- Flat view --------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryTotal {
    pub method: DisposalMethod,
    pub label: String,
    pub kg: f64,
}

/// Dashboard cards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatView {
    pub year: i32,
    pub total_generated_kg: f64,
    pub total_recycled_kg: f64,
    pub total_landfilled_kg: f64,
    /// Raw signed sum; positive means net emissions.
    pub total_ghg_reduction_kg: f64,
    pub total_landfill_cost_savings: f64,
    pub category_totals: Vec<CategoryTotal>,
    pub diversion_rate: Option<f64>,
}

pub fn flat_view(result: &AggregationResult, taxonomy: &CategoryTaxonomy) -> FlatView {
    let d = &result.derived_metrics;
    FlatView {
        year: result.year,
        total_generated_kg: d.total_generated_kg,
        total_recycled_kg: d.total_recycled_kg,
        total_landfilled_kg: d.total_landfilled_kg,
        total_ghg_reduction_kg: d.total_ghg_reduction_kg,
        total_landfill_cost_savings: d.total_landfill_cost_savings,
        category_totals: taxonomy
            .methods()
            .map(|m| CategoryTotal {
                method: m,
                label: m.label().to_string(),
                kg: result.category_total(m),
            })
            .collect(),
        diversion_rate: d.diversion_rate(),
    }
}

// ------------------------------- Drill-down --------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownItem {
    pub waste_type: WasteType,
    pub label: String,
    pub kg: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakdownGroup {
    pub method: DisposalMethod,
    pub label: String,
    pub total_kg: f64,
    pub items: Vec<BreakdownItem>,
}

/// Method → type → weight, re-projected from the yearly totals.
pub fn breakdown(result: &AggregationResult, taxonomy: &CategoryTaxonomy) -> Vec<BreakdownGroup> {
    taxonomy
        .methods()
        .map(|m| BreakdownGroup {
            method: m,
            label: m.label().to_string(),
            total_kg: result.category_total(m),
            items: taxonomy
                .types_of(m)
                .iter()
                .map(|t| BreakdownItem {
                    waste_type: t.clone(),
                    label: t.label(),
                    kg: result.total(m, t).unwrap_or(0.0),
                })
                .collect(),
        })
        .collect()
}

// ---------------------------------- Chart ----------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub month: u8,
    pub category: DisposalMethod,
    pub value: f64,
}

/// `{month, category, value}` per month and method; value sums the month's types
/// in taxonomy order.
pub fn chart_series(result: &AggregationResult, taxonomy: &CategoryTaxonomy) -> Vec<ChartPoint> {
    let mut out = Vec::with_capacity(result.monthly.len() * 4);
    for bucket in &result.monthly {
        for m in taxonomy.methods() {
            let mut value = 0.0;
            for t in taxonomy.types_of(m) {
                value += result.cell(bucket.month, m, t).unwrap_or(0.0);
            }
            out.push(ChartPoint { month: bucket.month, category: m, value });
        }
    }
    out
}
