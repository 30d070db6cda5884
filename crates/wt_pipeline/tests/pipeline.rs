use std::fs;

use serde_json::json;

use wt_core::source::{RecordQuery, RecordSource, SourceError};
use wt_core::{
    AggregationParams, AnomalyKind, DisposalMethod, EngineConfig, PeriodField, RawDate,
    RawWasteRecord, RawWeight, ScopeFilter, StatusFilter,
};
use wt_pipeline::{
    engine_identifiers, run_from_manifest_path, run_trend, run_with_ctx, validate_config,
    PipelineCtx, PipelineError, RunPlan,
};

const TS: &str = "2025-01-02T03:04:05Z";

fn raw(id: &str, date: &str, method: &str, wtype: &str, kg: RawWeight, status: &str) -> RawWasteRecord {
    RawWasteRecord {
        id: id.into(),
        occurred_at: Some(RawDate::Text(date.into())),
        disposal_method: Some(method.into()),
        waste_type: Some(wtype.into()),
        waste_weight: Some(kg),
        status: Some(status.into()),
        ..Default::default()
    }
}

fn batch() -> Vec<RawWasteRecord> {
    vec![
        raw("a", "2024-03-01", "Recycling", "Paper", RawWeight::Number(10.0), "verified"),
        raw("b", "2024-03-09", "Landfilling", "General Waste", RawWeight::Text("4.5".into()), "verified"),
        raw("c", "2024-04-01", "Recycling", "Paper", RawWeight::Text("abc".into()), "verified"),
        raw("d", "2024-05-01", "Burning", "Paper", RawWeight::Number(3.0), "verified"),
        raw("e", "2023-12-31", "Recycling", "Glass", RawWeight::Number(-1.0), "verified"),
        raw("f", "2024-06-01", "Composting", "Food Waste", RawWeight::Number(2.0), "new"),
    ]
}

fn params(year: i32) -> AggregationParams {
    AggregationParams {
        year,
        period_field: PeriodField::OccurredAt,
        scope: ScopeFilter::default(),
        statuses: StatusFilter::VerifiedOnly,
    }
}

fn ctx<'a>(source: &'a dyn RecordSource, config: &'a EngineConfig, year: i32) -> PipelineCtx<'a> {
    PipelineCtx {
        source,
        config,
        params: params(year),
        engine_meta: engine_identifiers(),
        timestamp_utc: TS.to_string(),
    }
}

struct DownSource;

impl RecordSource for DownSource {
    fn fetch(&self, _q: &RecordQuery) -> Result<Vec<RawWasteRecord>, SourceError> {
        Err(SourceError::Unavailable("connection refused".into()))
    }
}

#[test]
fn end_to_end_sums_and_anomalies() {
    let cfg = EngineConfig::campus_default();
    let src = batch();
    let out = run_with_ctx(ctx(&src, &cfg, 2024)).unwrap();
    let doc = &out.aggregation;

    assert!(doc.id.starts_with("AGG:"));
    let r = &doc.result;
    assert_eq!(r.category_total(DisposalMethod::Recycling), 10.0);
    assert_eq!(r.category_total(DisposalMethod::Landfilling), 4.5);
    assert_eq!(r.category_total(DisposalMethod::Composting), 0.0);
    // a, b, c summed; e (2023) and f (new) filtered.
    assert_eq!(r.record_count, 3);
    assert_eq!(r.filtered_out, 2);

    // c (bad weight, in view) and d (unknown method); e's negative weight is out of view.
    assert_eq!(doc.anomaly_counts.get(&AnomalyKind::InvalidWeight), Some(&1));
    assert_eq!(doc.anomaly_counts.get(&AnomalyKind::UnknownMethod), Some(&1));
    assert_eq!(doc.excluded_count, 1);
    assert_eq!(doc.anomalies[0].record_id, "c");

    let run = &out.run_record;
    assert!(run.id.starts_with("RUN:2025-01-02T03:04:05Z-"));
    assert_eq!(run.outputs.aggregation_id, doc.id);
    assert_eq!(run.inputs.records_fetched, 6);
}

#[test]
fn ids_do_not_depend_on_fetch_order() {
    let cfg = EngineConfig::campus_default();
    let a = batch();
    let mut b = batch();
    b.reverse();
    let x = run_with_ctx(ctx(&a, &cfg, 2024)).unwrap();
    let y = run_with_ctx(ctx(&b, &cfg, 2024)).unwrap();
    assert_eq!(x.aggregation, y.aggregation);
    // The input digest is over the fetch as delivered.
    assert_ne!(x.run_record.inputs.records_sha256, y.run_record.inputs.records_sha256);
}

#[test]
fn empty_year_is_valid_zero_activity() {
    let cfg = EngineConfig::campus_default();
    let src: Vec<RawWasteRecord> = Vec::new();
    let out = run_with_ctx(ctx(&src, &cfg, 2030)).unwrap();
    assert!(out.aggregation.is_zero_activity());
    assert_eq!(out.aggregation.result.monthly.len(), 12);
    assert!(out.aggregation.anomalies.is_empty());
}

#[test]
fn fetch_failure_is_not_an_empty_result() {
    let cfg = EngineConfig::campus_default();
    let err = run_with_ctx(ctx(&DownSource, &cfg, 2024)).unwrap_err();
    assert!(matches!(err, PipelineError::Fetch(SourceError::Unavailable(_))), "{err}");
}

#[test]
fn broken_config_is_refused_before_fetch() {
    let mut cfg = EngineConfig::campus_default();
    cfg.landfill_cost_per_kg = f64::NAN;
    assert!(matches!(validate_config(&cfg), Err(PipelineError::Config(_))));
    let err = run_with_ctx(ctx(&DownSource, &cfg, 2024)).unwrap_err();
    assert!(matches!(err, PipelineError::Config(_)));
}

#[test]
fn bad_year_is_a_params_error() {
    let cfg = EngineConfig::campus_default();
    let src = batch();
    assert!(matches!(run_with_ctx(ctx(&src, &cfg, 0)), Err(PipelineError::Params(_))));
}

#[test]
fn trend_keeps_request_order() {
    let cfg = EngineConfig::campus_default();
    let src = batch();
    let docs = run_trend(&src, &cfg, &params(2024), &[2024, 2023, 2022]).unwrap();
    let years: Vec<i32> = docs.iter().map(|d| d.result.year).collect();
    assert_eq!(years, vec![2024, 2023, 2022]);
    assert_eq!(docs[0].result.record_count, 3);
    // e has weight -1 → counted with 0 kg and flagged.
    assert_eq!(docs[1].result.record_count, 1);
    assert_eq!(docs[1].anomaly_counts.get(&AnomalyKind::InvalidWeight), Some(&1));
    assert!(docs[2].is_zero_activity());
    assert!(run_trend(&DownSource, &cfg, &params(2024), &[2024]).is_err());
}

#[test]
fn manifest_entry_reads_files() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(dir.path().join("records.json"), serde_json::to_vec(&batch()).unwrap()).unwrap();
    fs::write(
        dir.path().join("manifest.json"),
        serde_json::to_vec(&json!({
            "records_path": "records.json",
            "year": 2024,
            "period_field": "occurred_at",
            "include_all_statuses": true
        }))
        .unwrap(),
    )
    .unwrap();
    let out = run_from_manifest_path(&dir.path().join("manifest.json"), engine_identifiers(), TS)
        .unwrap();
    // f (new) now counts too.
    assert_eq!(out.aggregation.result.record_count, 4);
    assert_eq!(out.aggregation.result.category_total(DisposalMethod::Composting), 2.0);
}

#[test]
fn plan_from_paths_uses_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.json");
    let config = dir.path().join("config.json");
    fs::write(&records, serde_json::to_vec(&batch()).unwrap()).unwrap();
    let mut wire = EngineConfig::campus_default().to_wire();
    wire.landfill_cost_per_kg = 2.0;
    fs::write(&config, serde_json::to_vec(&wire).unwrap()).unwrap();

    let plan = RunPlan::from_paths(&records, Some(&config), params(2024)).unwrap();
    let out = plan.run(engine_identifiers(), TS).unwrap();
    // Only Recycling/Paper (10 kg) is diverted in the verified 2024 view.
    assert_eq!(out.aggregation.result.derived_metrics.total_landfill_cost_savings, 20.0);

    assert!(matches!(
        RunPlan::from_paths(&records, None, params(-5)),
        Err(PipelineError::Params(_))
    ));
}

#[test]
fn odd_entries_in_a_records_file_are_accounted_for() {
    let dir = tempfile::tempdir().unwrap();
    let records = dir.path().join("records.json");
    let file = json!([
        {"id": "ok", "occurredAt": "2024-03-01", "disposalMethod": "Recycling",
         "wasteType": "Paper", "wasteWeight": 10, "status": "verified"},
        {"id": "boolw", "occurredAt": "2024-03-02", "disposalMethod": "Recycling",
         "wasteType": "Paper", "wasteWeight": true, "status": "verified"},
        {"id": "floatdate", "occurredAt": 1709600000000.0, "disposalMethod": "Recycling",
         "wasteType": "Paper", "wasteWeight": 5, "status": "verified"},
        {"id": "badcampus", "campus": 7, "occurredAt": "2024-03-03",
         "disposalMethod": "Recycling", "wasteType": "Paper", "wasteWeight": 1}
    ]);
    fs::write(&records, serde_json::to_vec(&file).unwrap()).unwrap();

    let out = RunPlan::from_paths(&records, None, params(2024))
        .unwrap()
        .run(engine_identifiers(), TS)
        .unwrap();
    let doc = &out.aggregation;
    assert_eq!(doc.result.record_count, 2);
    assert_eq!(doc.result.category_total(DisposalMethod::Recycling), 10.0);

    let kinds: Vec<(&str, AnomalyKind)> =
        doc.anomalies.iter().map(|a| (a.record_id.as_str(), a.kind)).collect();
    assert_eq!(
        kinds,
        vec![
            ("badcampus", AnomalyKind::UndecodableRecord),
            ("boolw", AnomalyKind::InvalidWeight),
            ("floatdate", AnomalyKind::InvalidDate),
        ]
    );
    assert_eq!(doc.excluded_count, 2);
    assert_eq!(out.run_record.inputs.records_fetched, 3);
    assert_eq!(out.run_record.inputs.records_undecodable, 1);
}

#[test]
fn anomalies_stay_within_the_requested_view() {
    let cfg = EngineConfig::campus_default();
    let mut north = raw("n1", "2024-02-01", "Recycling", "Paper", RawWeight::Number(1.0), "verified");
    north.campus = Some("North".into());
    let mut south = raw("s-2019", "2019-02-01", "Burning", "Paper", RawWeight::Number(1.0), "verified");
    south.campus = Some("South".into());
    let mut undated = raw("u", "someday", "Burning", "Paper", RawWeight::Number(1.0), "verified");
    undated.campus = Some("North".into());
    let src = vec![north, south, undated];

    let mut p = params(2024);
    p.scope.campus = Some("North".into());
    let out = run_with_ctx(PipelineCtx { params: p.clone(), ..ctx(&src, &cfg, 2024) }).unwrap();
    let ids: Vec<&str> = out.aggregation.anomalies.iter().map(|a| a.record_id.as_str()).collect();
    // South's 2019 record is known to be elsewhere; u's year is unreadable.
    assert_eq!(ids, ["u"]);

    // A known year shows up in its own trend year only.
    let docs = run_trend(&src, &cfg, &params(2019), &[2019, 2024]).unwrap();
    let has_south = |d: &wt_pipeline::AggregationDoc| {
        d.anomalies.iter().any(|a| a.record_id == "s-2019")
    };
    assert!(has_south(&docs[0]));
    assert!(!has_south(&docs[1]));

    // Scope changes outside the anomaly's campus leave the AGG id alone.
    let without_south = vec![src[0].clone(), src[2].clone()];
    let other = run_with_ctx(PipelineCtx { params: p, ..ctx(&without_south, &cfg, 2024) }).unwrap();
    assert_eq!(other.aggregation.id, out.aggregation.id);
}
