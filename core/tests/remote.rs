//! Integration tests: remote scoring adapter over a scripted transport.

use fraudlens_core::{
    aggregate::aggregate,
    config::RemoteConfig,
    progress::NoProgress,
    remote::{HttpReply, HttpTransport, RemoteClient},
    strategy::{RemoteOracleStrategy, ScoringStrategy},
    types::RiskLevel,
    upload::Upload,
    PipelineError, PipelineResult,
};
use std::sync::{Arc, Mutex};

/// Replies with a fixed status and body, and remembers what was sent.
struct Scripted {
    status: u16,
    body: String,
    sent: Arc<Mutex<Vec<(String, String, usize)>>>,
}

impl Scripted {
    fn new(status: u16, body: &str) -> Self {
        Self {
            status,
            body: body.to_string(),
            sent: Arc::default(),
        }
    }
}

impl HttpTransport for Scripted {
    fn post_file(&self, url: &str, field: &str, file_name: &str, bytes: Vec<u8>) -> PipelineResult<HttpReply> {
        self.sent
            .lock()
            .unwrap()
            .push((format!("{url}#{field}"), file_name.to_string(), bytes.len()));
        Ok(HttpReply {
            status: self.status,
            body: self.body.clone(),
        })
    }
}

/// Fails the test if any request is attempted.
struct Unreachable;

impl HttpTransport for Unreachable {
    fn post_file(&self, _: &str, _: &str, _: &str, _: Vec<u8>) -> PipelineResult<HttpReply> {
        panic!("no request should be sent");
    }
}

fn client(transport: impl HttpTransport + 'static) -> RemoteClient {
    RemoteClient::new(
        RemoteConfig {
            endpoint: "http://scoring.test/predict".into(),
        },
        Box::new(transport),
    )
}

fn csv() -> Upload {
    Upload::from_bytes("batch.csv", b"transaction_id,amount\nT1,10\n".to_vec())
}

const VERDICTS: &str = r#"{
    "total_transactions": 3,
    "fraud_detected": 2,
    "results": [
        {"transaction_id": "T1", "amount": 5000, "fraud_flag": 1, "risk_score": 91.5,
         "risk_level": "Critical", "explanation": "Amount far above vendor norm",
         "department_id": "D1", "vendor_id": "V9", "anomaly_score": -0.21, "extra": true},
        {"transaction_id": "T2", "amount": 40, "fraud_flag": 0, "risk_score": 12,
         "risk_level": "Low", "explanation": "", "department_id": "D2", "vendor_id": "V1"},
        {"transaction_id": "T3", "amount": 700, "fraud_flag": 1, "risk_score": 140,
         "risk_level": "severe", "explanation": "", "department_id": "D1", "vendor_id": "V9"}
    ]
}"#;

/// A non-success reply should surface its status and body.
#[test]
fn server_error_carries_status_and_body() {
    let err = client(Scripted::new(500, "model unavailable"))
        .analyze_remote(&csv())
        .unwrap_err();
    match &err {
        PipelineError::RemoteServiceError { status, body } => {
            assert_eq!(*status, 500);
            assert_eq!(body, "model unavailable");
        }
        other => panic!("expected RemoteServiceError, got {other:?}"),
    }
    assert_eq!(err.to_string(), "API Error (500): model unavailable");
}

/// A reply without totals should be rejected as an invalid shape.
#[test]
fn missing_totals_is_invalid_shape() {
    let err = client(Scripted::new(200, r#"{"results": []}"#))
        .analyze_remote(&csv())
        .unwrap_err();
    assert!(matches!(err, PipelineError::InvalidResponseShape(_)), "got {err:?}");
}

/// A reply whose results are not an array should be rejected.
#[test]
fn results_must_be_an_array() {
    let body = r#"{"total_transactions": 1, "fraud_detected": 0, "results": {}}"#;
    let err = client(Scripted::new(200, body)).analyze_remote(&csv()).unwrap_err();
    assert!(matches!(err, PipelineError::InvalidResponseShape(_)), "got {err:?}");
}

/// JSON uploads are not accepted by the remote service.
#[test]
fn json_uploads_are_not_sent() {
    let up = Upload::from_bytes("rows.json", b"[]".to_vec());
    let err = client(Unreachable).analyze_remote(&up).unwrap_err();
    assert!(matches!(err, PipelineError::UnsupportedFormat { .. }), "got {err:?}");
}

/// Oversized uploads should fail before any request is made.
#[test]
fn oversized_upload_never_hits_the_network() {
    let file = tempfile::Builder::new().suffix(".xlsx").tempfile().unwrap();
    file.as_file().set_len(60 * 1024 * 1024).unwrap();
    let up = Upload::from_path(file.path()).unwrap();

    let err = client(Unreachable).analyze_remote(&up).unwrap_err();
    assert!(matches!(err, PipelineError::FileTooLarge { .. }), "got {err:?}");
}

/// The upload should be sent under the file field with its name and bytes.
#[test]
fn sends_file_under_multipart_field() {
    let transport = Scripted::new(200, VERDICTS);
    let sent = Arc::clone(&transport.sent);
    let analysis = client(transport).analyze_remote(&csv()).unwrap();

    assert_eq!(analysis.total_transactions, 3);
    assert_eq!(analysis.fraud_detected, 2);
    assert_eq!(analysis.results.len(), 3);
    assert_eq!(analysis.results[0].anomaly_score, Some(-0.21));

    let sent = sent.lock().unwrap();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "http://scoring.test/predict#file");
    assert_eq!(sent[0].1, "batch.csv");
    assert_eq!(sent[0].2, 28);
}

/// Remote verdicts should map onto scored records and aggregate normally.
#[test]
fn verdicts_become_scored_records() {
    let mut strategy = RemoteOracleStrategy::new(client(Scripted::new(200, VERDICTS)));
    let mut seen = Vec::new();
    let batch = strategy
        .score(&csv(), &mut |pct: u8, _: &str| seen.push(pct))
        .unwrap();
    assert_eq!(seen, [5, 15, 25, 35, 50, 70]);

    let levels: Vec<RiskLevel> = batch.records.iter().map(|r| r.risk_level).collect();
    assert_eq!(levels, [RiskLevel::Critical, RiskLevel::Normal, RiskLevel::Low]);
    assert_eq!(batch.records[2].anomaly_score, 100.0);
    assert_eq!(batch.records[0].reason, "Amount far above vendor norm");
    assert_eq!(batch.records[1].reason, "Within normal parameters");
    assert_eq!(batch.records[2].reason, "Flagged by remote model");

    let results = aggregate(&batch);
    assert_eq!(results.anomalies_detected, 2);
    assert_eq!(results.total_fraud_risk_amount, 5700.0);
    assert_eq!(results.department_anomalies[0].name, "D1");
    assert_eq!(results.top_risk_entities[0].name, "V9");
    assert_eq!(results.top_risk_entities[0].count, 2);

    let json = serde_json::to_value(batch.records_view()).unwrap();
    assert_eq!(json[0]["transaction_id"], "T1");
    assert_eq!(json[0]["_riskLevel"], "Critical");
    assert_eq!(json[1]["_isAnomaly"], false);
}

/// Remote scoring should run without a progress listener.
#[test]
fn no_progress_is_accepted() {
    let mut strategy = RemoteOracleStrategy::new(client(Scripted::new(200, VERDICTS)));
    assert_eq!(strategy.name(), "remote_oracle");
    assert!(strategy.score(&csv(), &mut NoProgress).is_ok());
}
