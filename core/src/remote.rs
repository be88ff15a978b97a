//! Remote scoring adapter: a pass-through to the external fraud
//! scoring service.
//!
//! Contract:
//!   POST <endpoint>  multipart field `file` = raw upload bytes
//!   2xx → { total_transactions: number, fraud_detected: number, results: [...] }
//!   non-2xx → RemoteServiceError carrying status and body verbatim
//!
//! No local scoring happens here. No request timeout is configured;
//! failures come from the transport itself.

use crate::{
    config::RemoteConfig,
    error::{PipelineError, PipelineResult},
    progress::ProgressReporter,
    upload::{FileFormat, Upload},
};
use serde::Serialize;
use serde_json::{Map, Value};

// ── Transport ────────────────────────────────────────────────────────────────

/// Raw HTTP reply: status code and body text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// The network seam. Production uses `ReqwestTransport`.
pub trait HttpTransport: Send {
    fn post_file(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> PipelineResult<HttpReply>;
}

pub struct ReqwestTransport {
    client: reqwest::blocking::Client,
}

impl ReqwestTransport {
    pub fn new() -> PipelineResult<Self> {
        let client = reqwest::blocking::Client::builder().timeout(None).build()?;
        Ok(Self { client })
    }
}

impl HttpTransport for ReqwestTransport {
    fn post_file(
        &self,
        url: &str,
        field: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> PipelineResult<HttpReply> {
        use reqwest::blocking::multipart::{Form, Part};

        let part = Part::bytes(bytes).file_name(file_name.to_string());
        let form = Form::new().part(field.to_string(), part);
        let response = self.client.post(url).multipart(form).send()?;
        let status = response.status().as_u16();
        let body = response.text()?;
        Ok(HttpReply { status, body })
    }
}

// ── Response model ───────────────────────────────────────────────────────────

/// One per-transaction verdict. Missing optional fields are tolerated;
/// unknown extra fields are ignored.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FraudResult {
    pub transaction_id: String,
    pub amount: f64,
    pub fraud_flag: u8,
    pub risk_score: f64,
    pub risk_level: Option<String>,
    pub explanation: String,
    pub anomaly_score: Option<f64>,
    pub department_id: Option<String>,
    pub vendor_id: Option<String>,
}

impl FraudResult {
    pub fn is_fraud(&self) -> bool {
        self.fraud_flag == 1
    }

    fn from_object(obj: &Map<String, Value>) -> Self {
        Self {
            transaction_id: text_field(obj, "transaction_id").unwrap_or_default(),
            amount: number_field(obj, "amount").unwrap_or(0.0),
            fraud_flag: match obj.get("fraud_flag") {
                Some(Value::Bool(true)) => 1,
                Some(v) if v.as_f64() == Some(1.0) => 1,
                _ => 0,
            },
            risk_score: number_field(obj, "risk_score").unwrap_or(0.0),
            risk_level: text_field(obj, "risk_level"),
            explanation: text_field(obj, "explanation").unwrap_or_default(),
            anomaly_score: number_field(obj, "anomaly_score"),
            department_id: text_field(obj, "department_id"),
            vendor_id: text_field(obj, "vendor_id"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RemoteAnalysis {
    pub total_transactions: u64,
    pub fraud_detected: u64,
    pub results: Vec<FraudResult>,
}

fn text_field(obj: &Map<String, Value>, key: &str) -> Option<String> {
    match obj.get(key)? {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn number_field(obj: &Map<String, Value>, key: &str) -> Option<f64> {
    let n = match obj.get(key)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// Validate and decode a 2xx response body.
pub fn parse_response(body: &str) -> PipelineResult<RemoteAnalysis> {
    let root: Value = serde_json::from_str(body)
        .map_err(|e| PipelineError::InvalidResponseShape(format!("body is not JSON: {e}")))?;

    let total = root
        .get("total_transactions")
        .and_then(Value::as_f64)
        .ok_or_else(|| PipelineError::InvalidResponseShape("missing numeric total_transactions".into()))?;
    let detected = root
        .get("fraud_detected")
        .and_then(Value::as_f64)
        .ok_or_else(|| PipelineError::InvalidResponseShape("missing numeric fraud_detected".into()))?;
    let items = root
        .get("results")
        .and_then(Value::as_array)
        .ok_or_else(|| PipelineError::InvalidResponseShape("missing results array".into()))?;

    let results = items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            item.as_object().map(FraudResult::from_object).ok_or_else(|| {
                PipelineError::InvalidResponseShape(format!("results[{idx}] is not an object"))
            })
        })
        .collect::<PipelineResult<Vec<_>>>()?;

    let flagged = results.iter().filter(|r| r.is_fraud()).count() as u64;
    if flagged != detected as u64 {
        log::warn!("remote: fraud_detected={detected} but {flagged} results carry fraud_flag=1");
    }

    Ok(RemoteAnalysis {
        total_transactions: total.max(0.0) as u64,
        fraud_detected: detected.max(0.0) as u64,
        results,
    })
}

// ── Client ───────────────────────────────────────────────────────────────────

pub struct RemoteClient {
    config: RemoteConfig,
    transport: Box<dyn HttpTransport>,
}

impl RemoteClient {
    pub fn new(config: RemoteConfig, transport: Box<dyn HttpTransport>) -> Self {
        Self { config, transport }
    }

    /// Client backed by the real HTTP transport.
    pub fn with_reqwest(config: RemoteConfig) -> PipelineResult<Self> {
        Ok(Self::new(config, Box::new(ReqwestTransport::new()?)))
    }

    pub fn endpoint(&self) -> &str {
        &self.config.endpoint
    }

    pub fn analyze_remote(&self, upload: &Upload) -> PipelineResult<RemoteAnalysis> {
        self.analyze_with_progress(upload, &mut crate::progress::NoProgress)
    }

    pub fn analyze_with_progress(
        &self,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<RemoteAnalysis> {
        progress.report(5, "Validating file format...");
        upload.validate(FileFormat::REMOTE)?;

        progress.report(15, "Preparing file for upload...");
        let bytes = upload.read_bytes()?;

        progress.report(25, "Uploading to ML server...");
        progress.report(35, "Connecting to fraud detection API...");
        log::info!(
            "remote: POST {} file={} bytes={}",
            self.config.endpoint,
            upload.name(),
            bytes.len()
        );
        let reply = self
            .transport
            .post_file(&self.config.endpoint, "file", upload.name(), bytes)?;

        progress.report(50, "Processing with ML model...");
        if !reply.is_success() {
            log::warn!("remote: status={} body={:?}", reply.status, reply.body);
            return Err(PipelineError::RemoteServiceError {
                status: reply.status,
                body: reply.body,
            });
        }

        progress.report(70, "Receiving analysis results...");
        let analysis = parse_response(&reply.body)?;
        log::info!(
            "remote: total_transactions={} fraud_detected={} results={}",
            analysis.total_transactions,
            analysis.fraud_detected,
            analysis.results.len()
        );
        Ok(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_ids_become_text() {
        let body = r#"{"total_transactions":1,"fraud_detected":1,
            "results":[{"transaction_id":17,"amount":"250.5","fraud_flag":1,
            "risk_score":88,"risk_level":"High","explanation":"x"}]}"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.results[0].transaction_id, "17");
        assert_eq!(parsed.results[0].amount, 250.5);
        assert!(parsed.results[0].is_fraud());
    }

    #[test]
    fn non_finite_numbers_fall_back() {
        let body = r#"{"total_transactions":1,"fraud_detected":1,
            "results":[{"transaction_id":"T1","amount":"inf","fraud_flag":1,
            "risk_score":"NaN","risk_level":"High","anomaly_score":"-inf"}]}"#;
        let parsed = parse_response(body).unwrap();
        assert_eq!(parsed.results[0].risk_score, 0.0);
        assert_eq!(parsed.results[0].amount, 0.0);
        assert_eq!(parsed.results[0].anomaly_score, None);
    }

    #[test]
    fn string_total_is_rejected() {
        let body = r#"{"total_transactions":"3","fraud_detected":0,"results":[]}"#;
        assert!(matches!(
            parse_response(body),
            Err(PipelineError::InvalidResponseShape(_))
        ));
    }
}
