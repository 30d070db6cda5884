//! Waste records: the raw persisted shape, the normalized shape the engine
//! sums, and the anomaly records that surface data-quality problems.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::taxonomy::{fold_label, DisposalMethod, WasteType};

// ------------------------------------ Status ------------------------------------

/// Review lifecycle tag: New → Verified | Rejected | RevisionRequired.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RecordStatus {
    #[serde(rename = "new")]
    New,
    #[serde(rename = "verified")]
    Verified,
    #[serde(rename = "rejected")]
    Rejected,
    #[serde(rename = "revision_required")]
    RevisionRequired,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::New,
        RecordStatus::Verified,
        RecordStatus::Rejected,
        RecordStatus::RevisionRequired,
    ];

    pub fn token(self) -> &'static str {
        match self {
            RecordStatus::New => "new",
            RecordStatus::Verified => "verified",
            RecordStatus::Rejected => "rejected",
            RecordStatus::RevisionRequired => "revision_required",
        }
    }

    /// Case/separator-insensitive parse (`"Revision Required"`, `"revision_required"`).
    pub fn from_label(label: &str) -> Option<Self> {
        let key = fold_label(label);
        Self::ALL.into_iter().find(|s| fold_label(s.token()) == key)
    }
}

impl fmt::Display for RecordStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.token())
    }
}

// ---------------------------------- Raw records ----------------------------------

/// Weight as persisted: a JSON number or a numeric string. `null`/absent is
/// represented by `None` on the record; any other JSON lands in `Other` so the
/// record still decodes and is flagged later.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawWeight {
    Number(f64),
    Text(String),
    Other(Value),
}

/// Date as persisted. Text covers RFC3339, `YYYY-MM-DD` and naive
/// `YYYY-MM-DDTHH:MM:SS`; numbers are epoch milliseconds; the object form is a
/// document-store timestamp.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RawDate {
    Text(String),
    EpochMillis(i64),
    Timestamp {
        #[serde(alias = "_seconds")]
        seconds: i64,
        #[serde(default, alias = "_nanoseconds")]
        nanoseconds: u32,
    },
    /// Anything else (fractional epoch, booleans, arrays); never a valid period.
    Other(Value),
}

/// Persisted waste record, read-only for the engine.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawWasteRecord {
    #[serde(deserialize_with = "id_from_any")]
    pub id: String,
    #[serde(default, alias = "date")]
    pub occurred_at: Option<RawDate>,
    #[serde(default)]
    pub created_at: Option<RawDate>,
    #[serde(default)]
    pub campus: Option<String>,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub unit: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub disposal_method: Option<String>,
    #[serde(default)]
    pub waste_type: Option<String>,
    #[serde(default)]
    pub waste_weight: Option<RawWeight>,
    #[serde(default)]
    pub status: Option<String>,
}

/// Accept string or numeric identifiers; the engine treats ids as opaque text.
fn id_from_any<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum AnyId {
        Text(String),
        Int(i64),
    }
    Ok(match AnyId::deserialize(d)? {
        AnyId::Text(s) => s,
        AnyId::Int(n) => n.to_string(),
    })
}

impl RawWasteRecord {
    pub fn scope(&self) -> RecordScope {
        RecordScope {
            campus: self.campus.clone(),
            department: self.department.clone(),
            unit: self.unit.clone(),
            location: self.location.clone(),
        }
    }
}

// ------------------------------- Normalized records -------------------------------

/// Optional scoping dimensions, passed through for filtering.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordScope {
    pub campus: Option<String>,
    pub department: Option<String>,
    pub unit: Option<String>,
    pub location: Option<String>,
}

/// Canonical record: categories resolved against the taxonomy, weight coerced
/// to non-negative kilograms, period bucketed to a calendar month.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub id: String,
    pub year: i32,
    /// 1..=12
    pub month: u8,
    pub method: DisposalMethod,
    pub waste_type: WasteType,
    pub weight_kg: f64,
    pub status: RecordStatus,
    pub scope: RecordScope,
}

// ------------------------------------ Anomalies ------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AnomalyKind {
    /// Weight missing, non-numeric, negative or non-finite; counted with 0 kg.
    #[serde(rename = "invalid_weight")]
    InvalidWeight,
    /// Disposal method outside the taxonomy; record excluded.
    #[serde(rename = "unknown_method")]
    UnknownMethod,
    /// Waste type not declared for the record's method; record excluded.
    #[serde(rename = "unknown_waste_type")]
    UnknownWasteType,
    /// Period field present but unparseable; record excluded.
    #[serde(rename = "invalid_date")]
    InvalidDate,
    /// Period field absent; record excluded.
    #[serde(rename = "missing_date")]
    MissingDate,
    /// Status label not recognized; record kept as `new`.
    #[serde(rename = "unknown_status")]
    UnknownStatus,
    /// Entry the source could not decode into a record at all; excluded.
    #[serde(rename = "undecodable_record")]
    UndecodableRecord,
}

impl AnomalyKind {
    pub fn token(self) -> &'static str {
        match self {
            AnomalyKind::InvalidWeight => "invalid_weight",
            AnomalyKind::UnknownMethod => "unknown_method",
            AnomalyKind::UnknownWasteType => "unknown_waste_type",
            AnomalyKind::InvalidDate => "invalid_date",
            AnomalyKind::MissingDate => "missing_date",
            AnomalyKind::UnknownStatus => "unknown_status",
            AnomalyKind::UndecodableRecord => "undecodable_record",
        }
    }

    /// Whether a record with this anomaly is left out of the categorized view.
    pub fn excludes_record(self) -> bool {
        matches!(
            self,
            AnomalyKind::UnknownMethod
                | AnomalyKind::UnknownWasteType
                | AnomalyKind::InvalidDate
                | AnomalyKind::MissingDate
                | AnomalyKind::UndecodableRecord
        )
    }
}

/// Diagnostic record kept for data-quality review. Carries the original
/// category strings so reviewers can see what failed to resolve, and as much
/// of the record's year, status and scope as could be read, so a report only
/// lists anomalies of records that could belong to its view.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub record_id: String,
    pub kind: AnomalyKind,
    pub disposal_method: Option<String>,
    pub waste_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Calendar year of the record's period in the application offset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
    /// `None` when the status label was not recognized.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<RecordStatus>,
    /// `None` when the entry never decoded into a record.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<RecordScope>,
}

impl Anomaly {
    /// An absent status reads as `new`, the same as for normalized records.
    pub fn from_raw(raw: &RawWasteRecord, kind: AnomalyKind, detail: Option<String>) -> Self {
        Self {
            record_id: raw.id.clone(),
            kind,
            disposal_method: raw.disposal_method.clone(),
            waste_type: raw.waste_type.clone(),
            detail,
            year: None,
            status: raw.status.as_deref().map_or(Some(RecordStatus::New), RecordStatus::from_label),
            scope: Some(raw.scope()),
        }
    }

    /// Entry at `index` of a source that failed to decode. Without an id the
    /// position stands in (`#3`).
    pub fn undecodable(index: usize, record_id: Option<String>, reason: String) -> Self {
        Self {
            record_id: record_id.unwrap_or_else(|| format!("#{index}")),
            kind: AnomalyKind::UndecodableRecord,
            disposal_method: None,
            waste_type: None,
            detail: Some(reason),
            year: None,
            status: None,
            scope: None,
        }
    }

    pub fn with_year(mut self, year: Option<i32>) -> Self {
        self.year = year;
        self
    }

    pub fn excluded(&self) -> bool {
        self.kind.excludes_record()
    }
}
