// crates/wt_algo/src/lib.rs
//! Pure, synchronous algorithms over in-memory records: no I/O, no shared
//! state, safe to call concurrently for independent requests.
//!
//! normalize → aggregate → derive metrics. Presentation (rounding, layout)
//! lives in `wt_report`; nothing here rounds.

#![forbid(unsafe_code)]

// ----------------------------- Normalization ------------------------------------------

pub mod normalize;

pub use normalize::{normalize, normalize_batch, Normalized, NormalizePolicy, NormalizedBatch};

// ----------------------------- Aggregation --------------------------------------------

pub mod aggregate;
pub mod metrics;

pub use aggregate::{
    admits, aggregate, anomaly_in_view, zero_filled, AggregationResult, MethodTypeWeights, MonthBucket,
};
pub use metrics::{derive_metrics, DerivedMetrics};

/// Months per aggregation year; buckets are numbered 1..=12.
pub const MONTHS: u8 = 12;
