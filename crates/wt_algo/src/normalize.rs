//! Record normalizer: raw persisted record → canonical record or anomaly.
//!
//! Contract:
//! - Category labels resolve by exact match on folded keys (`wt_core::fold_label`).
//! - Weight coerces to non-negative finite kilograms. Anything else becomes
//!   0 kg plus an `InvalidWeight` anomaly; the record stays in the count.
//! - Period comes from one configured field (occurred vs created) and is
//!   bucketed to a calendar month in one fixed application offset for the
//!   whole batch.
//! - Unknown category or unusable date → the record is excluded and reported.
//!   One bad record never aborts the batch.

use chrono::{DateTime, Datelike, FixedOffset, NaiveDate, NaiveDateTime};
use tracing::debug;

use wt_core::{
    Anomaly, AnomalyKind, CategoryTaxonomy, CoreError, NormalizedRecord, PeriodField, RawDate,
    RawWasteRecord, RawWeight, RecordStatus,
};

/// How to read the period and in which offset to bucket it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NormalizePolicy {
    pub period_field: PeriodField,
    pub utc_offset: FixedOffset,
}

impl NormalizePolicy {
    pub fn new(period_field: PeriodField, utc_offset_minutes: i32) -> Result<Self, CoreError> {
        let utc_offset = utc_offset_minutes
            .checked_mul(60)
            .and_then(FixedOffset::east_opt)
            .ok_or(CoreError::DomainOutOfRange("utc_offset_minutes"))?;
        Ok(Self { period_field, utc_offset })
    }
}

/// Outcome for a single raw record.
#[derive(Clone, Debug, PartialEq)]
pub enum Normalized {
    /// Categorized record, with any non-excluding anomalies (weight, status).
    Record { record: NormalizedRecord, anomalies: Vec<Anomaly> },
    /// Excluded from the categorized view.
    Rejected(Anomaly),
}

/// Batch outcome: every raw record lands in exactly one of `records` or an
/// excluding entry of `anomalies`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizedBatch {
    pub records: Vec<NormalizedRecord>,
    pub anomalies: Vec<Anomaly>,
}

impl NormalizedBatch {
    pub fn excluded_count(&self) -> usize {
        self.anomalies.iter().filter(|a| a.excluded()).count()
    }
}

pub fn normalize(
    raw: &RawWasteRecord,
    taxonomy: &CategoryTaxonomy,
    policy: &NormalizePolicy,
) -> Normalized {
    // The period is read first so category anomalies can carry the year.
    let date = match policy.period_field {
        PeriodField::OccurredAt => raw.occurred_at.as_ref(),
        PeriodField::CreatedAt => raw.created_at.as_ref(),
    };
    let period = date.and_then(|d| period_of(d, policy.utc_offset));
    let known_year = period.map(|(year, _)| year);

    // 1) Disposal method
    let Some(method) = raw.disposal_method.as_deref().and_then(|s| taxonomy.resolve_method(s))
    else {
        let a = Anomaly::from_raw(raw, AnomalyKind::UnknownMethod, None);
        return Normalized::Rejected(a.with_year(known_year));
    };

    // 2) Waste type, scoped to the method
    let Some(waste_type) = raw.waste_type.as_deref().and_then(|s| taxonomy.resolve_type(method, s))
    else {
        let detail = raw
            .waste_type
            .as_deref()
            .and_then(|s| taxonomy.owner_of(s))
            .map(|owner| format!("declared under {}", owner.label()));
        let a = Anomaly::from_raw(raw, AnomalyKind::UnknownWasteType, detail);
        return Normalized::Rejected(a.with_year(known_year));
    };

    // 3) Period
    let Some(date) = date else {
        let detail = Some(format!("{} is absent", policy.period_field.token()));
        return Normalized::Rejected(Anomaly::from_raw(raw, AnomalyKind::MissingDate, detail));
    };
    let Some((year, month)) = period else {
        let detail = Some(format!("unparseable {}: {}", policy.period_field.token(), describe(date)));
        return Normalized::Rejected(Anomaly::from_raw(raw, AnomalyKind::InvalidDate, detail));
    };

    let mut anomalies = Vec::new();

    // 4) Weight
    let weight_kg = match coerce_weight(raw.waste_weight.as_ref()) {
        Ok(w) => w,
        Err(detail) => {
            let a = Anomaly::from_raw(raw, AnomalyKind::InvalidWeight, Some(detail));
            anomalies.push(a.with_year(Some(year)));
            0.0
        }
    };

    // 5) Status
    let status = match raw.status.as_deref() {
        None => RecordStatus::New,
        Some(s) => RecordStatus::from_label(s).unwrap_or_else(|| {
            let detail = Some(format!("status {s:?} treated as new"));
            anomalies.push(Anomaly::from_raw(raw, AnomalyKind::UnknownStatus, detail).with_year(Some(year)));
            RecordStatus::New
        }),
    };

    Normalized::Record {
        record: NormalizedRecord {
            id: raw.id.clone(),
            year,
            month,
            method,
            waste_type: waste_type.clone(),
            weight_kg,
            status,
            scope: raw.scope(),
        },
        anomalies,
    }
}

/// Normalize every record independently.
pub fn normalize_batch(
    raws: &[RawWasteRecord],
    taxonomy: &CategoryTaxonomy,
    policy: &NormalizePolicy,
) -> NormalizedBatch {
    let mut batch = NormalizedBatch::default();
    for raw in raws {
        match normalize(raw, taxonomy, policy) {
            Normalized::Record { record, anomalies } => {
                batch.records.push(record);
                batch.anomalies.extend(anomalies);
            }
            Normalized::Rejected(a) => {
                debug!(record = %a.record_id, kind = a.kind.token(), "record excluded");
                batch.anomalies.push(a);
            }
        }
    }
    debug!(
        normalized = batch.records.len(),
        anomalies = batch.anomalies.len(),
        "normalized batch"
    );
    batch
}

// -------------------------------------------------------------------------------------------------
// Helpers
// -------------------------------------------------------------------------------------------------

/// Non-negative finite kilograms, or a short reason.
fn coerce_weight(w: Option<&RawWeight>) -> Result<f64, String> {
    let v = match w {
        None => return Err("weight is absent".to_string()),
        Some(RawWeight::Number(n)) => *n,
        Some(RawWeight::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("weight {s:?} is not a number"))?,
        Some(RawWeight::Other(v)) => return Err(format!("weight {v} is not a number")),
    };
    if !v.is_finite() {
        return Err(format!("weight {v} is not finite"));
    }
    if v < 0.0 {
        return Err(format!("weight {v} is negative"));
    }
    // -0.0 → +0.0 so the sort key's bit pattern stays monotonic.
    Ok(if v == 0.0 { 0.0 } else { v })
}

/// (year, month) of a persisted date in the application offset.
///
/// Instants (RFC3339, epoch, timestamps) are converted into the offset.
/// Zone-less text is already a wall-clock value and is taken as-is.
fn period_of(d: &RawDate, offset: FixedOffset) -> Option<(i32, u8)> {
    let local = match d {
        RawDate::Text(s) => {
            let s = s.trim();
            if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
                dt.with_timezone(&offset).date_naive()
            } else if let Ok(nd) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
                nd
            } else if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
                ndt.date()
            } else if let Ok(ndt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
                ndt.date()
            } else {
                return None;
            }
        }
        RawDate::EpochMillis(ms) => DateTime::from_timestamp_millis(*ms)?
            .with_timezone(&offset)
            .date_naive(),
        RawDate::Timestamp { seconds, nanoseconds } => DateTime::from_timestamp(*seconds, *nanoseconds)?
            .with_timezone(&offset)
            .date_naive(),
        RawDate::Other(_) => return None,
    };
    Some((local.year(), local.month() as u8))
}

fn describe(d: &RawDate) -> String {
    match d {
        RawDate::Text(s) => format!("{s:?}"),
        RawDate::EpochMillis(ms) => format!("{ms} ms"),
        RawDate::Timestamp { seconds, nanoseconds } => format!("{seconds}s+{nanoseconds}ns"),
        RawDate::Other(v) => v.to_string(),
    }
}
