//! wt_core: Core types, category taxonomy, emission factors, and parameters.
//!
//! This crate is **I/O-free**. It defines stable types/APIs used across the
//! engine (`wt_io`, `wt_algo`, `wt_pipeline`, `wt_report`, `wt_cli`).
//!
//! - Category taxonomy: `DisposalMethod` (closed), `WasteType` (token), `CategoryTaxonomy`
//! - Emission factors: `EmissionFactorTable` with type → method → 0 fallback
//! - Records: raw persisted shape, normalized shape, anomalies
//! - Parameters: `AggregationParams`, `EngineConfig`, status/scope filters
//! - Deterministic ordering helpers
//! - Collaborator seam for record retrieval (`source::RecordSource`)

#![forbid(unsafe_code)]

pub mod errors {
    use thiserror::Error;

    /// Validation errors for taxonomy, emission factors and parameters.
    ///
    /// These are initialization-time failures; nothing in the request path
    /// returns them once an `EngineConfig` has been built.
    #[derive(Clone, Debug, Error, PartialEq)]
    pub enum CoreError {
        #[error("invalid token: {0:?}")]
        InvalidToken(String),
        #[error("taxonomy lists disposal method {0} more than once")]
        DuplicateMethod(&'static str),
        #[error("taxonomy is missing disposal method {0}")]
        MissingMethod(&'static str),
        #[error("disposal method {0} has no waste types")]
        EmptyMethod(&'static str),
        #[error("waste type {waste_type} is declared under both {first} and {second}")]
        SharedWasteType {
            waste_type: String,
            first: &'static str,
            second: &'static str,
        },
        #[error("emission factor for {method}/{waste_type} references a pair outside the taxonomy")]
        UnknownFactorPair { method: &'static str, waste_type: String },
        #[error("emission factor for {0} is not a finite number")]
        NonFiniteFactor(String),
        #[error("domain out of range: {0}")]
        DomainOutOfRange(&'static str),
    }
}

pub mod determinism;
pub mod factors;
pub mod records;
pub mod source;
pub mod taxonomy;
pub mod variables;

pub use errors::CoreError;
pub use factors::{EmissionFactorTable, FactorTableWire, TypeFactor};
pub use records::{
    Anomaly, AnomalyKind, NormalizedRecord, RawDate, RawWasteRecord, RawWeight, RecordScope,
    RecordStatus,
};
pub use taxonomy::{fold_label, CategoryTaxonomy, DisposalMethod, MethodGroup, WasteType};
pub use variables::{
    AggregationParams, EngineConfig, EngineConfigWire, PeriodField, ScopeFilter, StatusFilter,
};
