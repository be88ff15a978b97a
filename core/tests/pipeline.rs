//! Integration tests: end-to-end pipeline, session lifecycle and the
//! settings store.

use fraudlens_core::{
    config::{ModelArtifact, PipelineSettings, ScoringConfig, DEFAULT_THRESHOLD},
    detector::{ColumnMapping, ColumnRole, DetectionMode},
    query::{select, SortField, SortOrder, TransactionFilter},
    rng::NoJitter,
    store::SettingsStore,
    strategy::LocalHeuristicStrategy,
    upload::Upload,
    AnalysisPipeline, AnalysisSession, PipelineError,
};

const LEDGER: &str = "id,dept,payee,amount,date\n\
    A1,Finance,Acme,120,2024-05-01\n\
    A2,Finance,Acme,130,2024-05-02\n\
    A3,Ops,Globex,125,2024-05-02\n\
    A4,Ops,Globex,900000,2024-05-04\n";

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn store() -> SettingsStore {
    SettingsStore::open_migrated(":memory:").unwrap()
}

fn local(config: ScoringConfig) -> Box<LocalHeuristicStrategy> {
    Box::new(LocalHeuristicStrategy::with_jitter(config, Box::new(NoJitter)))
}

fn ledger() -> Upload {
    Upload::from_bytes("ledger.csv", LEDGER.as_bytes().to_vec())
}

/// A local run should report every progress stage and land in run history.
#[test]
fn pipeline_reports_progress_and_records_run() {
    init_logging();
    let store = store();
    let mut pipeline = AnalysisPipeline::new(local(ScoringConfig::default())).with_store(&store);

    let mut seen = Vec::new();
    let report = pipeline
        .run_with_progress(&ledger(), &mut |pct: u8, _: &str| seen.push(pct))
        .unwrap();

    assert_eq!(seen, [10, 25, 40, 60, 80, 95, 100]);
    assert_eq!(report.source, "local_heuristic");
    assert_eq!(report.results.total_records, 4);
    assert_eq!(report.results.anomalies_detected, 1);
    assert_eq!(report.batch.records[3].id, "A4");

    assert_eq!(store.run_count().unwrap(), 1);
    let runs = store.recent_runs(5).unwrap();
    assert_eq!(runs[0].run_id, report.run_id);
    assert_eq!(runs[0].file_name, "ledger.csv");
    assert_eq!(runs[0].anomalies_detected, 1);
    assert_eq!(runs[0].threshold, Some(DEFAULT_THRESHOLD));
}

/// The JSON report should carry mapping, results and flat transactions.
#[test]
fn report_json_nests_transactions() {
    let mut pipeline = AnalysisPipeline::new(local(ScoringConfig::default()));
    let report = pipeline.run(&ledger()).unwrap();
    let json = serde_json::to_value(&report).unwrap();

    assert_eq!(json["source"], "local_heuristic");
    assert_eq!(json["results"]["totalRecords"], 4);
    assert_eq!(json["results"]["insights"]["peakRiskDate"], "2024-05-04");
    assert_eq!(json["mapping"]["vendor"], "payee");
    let txns = json["transactions"].as_array().unwrap();
    assert_eq!(txns.len(), 4);
    assert_eq!(txns[3]["id"], "A4");
    assert_eq!(txns[3]["_id"], "A4");
    assert_eq!(txns[3]["_isAnomaly"], true);
}

/// A caller-supplied mapping should replace header detection.
#[test]
fn caller_mapping_overrides_detection() {
    // Point the amount role at a non-amount column: nothing scores high.
    let mapping = ColumnMapping::default()
        .with(ColumnRole::Amount, "id")
        .with(ColumnRole::Vendor, "missing-column");
    let strategy = LocalHeuristicStrategy::with_jitter(ScoringConfig::default(), Box::new(NoJitter))
        .with_mapping(mapping);
    let report = AnalysisPipeline::new(Box::new(strategy)).run(&ledger()).unwrap();

    assert_eq!(report.results.anomalies_detected, 0);
    assert_eq!(report.batch.mapping.amount.as_deref(), Some("id"));
    assert_eq!(report.batch.mapping.vendor, None, "unknown headers are dropped");
}

/// A failed analysis should leave the session empty.
#[test]
fn session_resets_before_each_analysis() {
    let mut session = AnalysisSession::new();
    let mut pipeline = AnalysisPipeline::new(local(ScoringConfig::default()));

    let first = session
        .analyze(&mut pipeline, &ledger(), &mut fraudlens_core::progress::NoProgress)
        .unwrap()
        .run_id
        .clone();
    assert_eq!(session.current().map(|r| r.run_id.clone()), Some(first));

    let bad = Upload::from_bytes("notes.txt", b"x".to_vec());
    let err = session
        .analyze(&mut pipeline, &bad, &mut fraudlens_core::progress::NoProgress)
        .unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat { .. }));
    assert!(session.current().is_none(), "failed analysis leaves no stale result");

    session
        .analyze(&mut pipeline, &ledger(), &mut fraudlens_core::progress::NoProgress)
        .unwrap();
    session.reset();
    assert!(session.current().is_none());
}

/// Threshold and artifacts should survive a save, load and clear cycle.
#[test]
fn scoring_config_round_trips_through_store() {
    let store = store();
    assert_eq!(ScoringConfig::load(&store).unwrap(), ScoringConfig::default());

    let mut config = ScoringConfig::default().with_threshold(62.5);
    config.model = Some(ModelArtifact::new("model.pkl", "XGBoost", vec![7; 2048]));
    config.scaler = Some(ModelArtifact::new("scaler.pkl", "XGBoost", vec![1, 2]));
    config.save(&store).unwrap();

    let loaded = ScoringConfig::load(&store).unwrap();
    assert_eq!(loaded.threshold(), 62.5);
    assert!(loaded.has_model());
    let model = loaded.model.as_ref().unwrap();
    assert_eq!(model.name, "model.pkl");
    assert_eq!(model.size_bytes, 2048);
    assert_eq!(model.payload.len(), 2048);
    assert_eq!(model.uploaded_at, config.model.as_ref().unwrap().uploaded_at);

    ScoringConfig::clear(&store).unwrap();
    let cleared = ScoringConfig::load(&store).unwrap();
    assert_eq!(cleared.threshold(), DEFAULT_THRESHOLD);
    assert!(!cleared.has_model());
}

/// Saved settings should persist across reopening the database file.
#[test]
fn store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.db");
    let path = path.to_str().unwrap();

    {
        let store = SettingsStore::open_migrated(path).unwrap();
        ScoringConfig::default().with_threshold(40.0).save(&store).unwrap();
    }
    let store = SettingsStore::open_migrated(path).unwrap();
    assert_eq!(store.path(), Some(path));
    assert_eq!(ScoringConfig::load(&store).unwrap().threshold(), 40.0);
}

/// A settings file should clamp the threshold and set endpoint and detection mode.
#[test]
fn settings_file_overlays_config() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(
        &path,
        r#"{"threshold": 150, "endpoint": "http://localhost:9000/predict", "detection": "exclusive"}"#,
    )
    .unwrap();

    let settings = PipelineSettings::load(path.to_str().unwrap()).unwrap();
    let mut config = ScoringConfig::default();
    settings.apply_scoring(&mut config);
    assert_eq!(config.threshold(), 100.0);
    assert_eq!(config.detection, DetectionMode::Exclusive);
    assert_eq!(settings.remote().endpoint, "http://localhost:9000/predict");

    assert!(PipelineSettings::load("/nonexistent/settings.json").is_err());
}

/// Flagged rows should sort by score for the table view.
#[test]
fn flagged_rows_sorted_for_table_view() {
    let report = AnalysisPipeline::new(local(ScoringConfig::default().with_threshold(10.0)))
        .run(&ledger())
        .unwrap();
    let rows = select(
        &report.batch,
        &TransactionFilter::flagged(),
        SortField::Score,
        SortOrder::Desc,
        Some(2),
    );
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].id, "A4");
    assert!(rows[0].anomaly_score >= rows[1].anomaly_score);
}
