//! Scoring strategies.
//!
//! RULE: every scoring source implements ScoringStrategy and hands back
//! a ScoredBatch. Aggregation never knows which strategy produced it.

use crate::{
    config::ScoringConfig,
    detector::{detect_with, ColumnMapping, ColumnRole},
    error::PipelineResult,
    parser::{self, ParsedTable},
    progress::ProgressReporter,
    record::{ScoredBatch, ScoredRecord},
    remote::{FraudResult, RemoteAnalysis, RemoteClient},
    rng::{JitterSource, ScoreRng},
    scoring::{self, record_id},
    types::{CellValue, RiskLevel},
    upload::Upload,
};

/// The contract every scoring source fulfils.
pub trait ScoringStrategy: Send {
    /// Stable name recorded with each analysis run.
    fn name(&self) -> &'static str;

    fn score(
        &mut self,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<ScoredBatch>;
}

// ── Local heuristic ──────────────────────────────────────────────────────────

pub struct LocalHeuristicStrategy {
    config: ScoringConfig,
    jitter: Box<dyn JitterSource>,
    mapping: Option<ColumnMapping>,
}

impl LocalHeuristicStrategy {
    /// Production strategy: jitter seeded from entropy.
    pub fn new(config: ScoringConfig) -> Self {
        Self::with_jitter(config, Box::new(ScoreRng::from_entropy()))
    }

    pub fn with_jitter(config: ScoringConfig, jitter: Box<dyn JitterSource>) -> Self {
        Self {
            config,
            jitter,
            mapping: None,
        }
    }

    /// Use a caller-supplied mapping instead of auto-detection.
    pub fn with_mapping(mut self, mapping: ColumnMapping) -> Self {
        self.mapping = Some(mapping);
        self
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Score an already-parsed table.
    pub fn score_table(&mut self, table: &ParsedTable, mapping: &ColumnMapping) -> ScoredBatch {
        let mut mapping = mapping.clone();
        mapping.retain_known(&table.headers);
        let columns = mapping.resolve(&table.headers);
        let records = scoring::score_table(
            table,
            &columns,
            self.config.threshold(),
            self.jitter.as_mut(),
        );
        ScoredBatch {
            headers: table.headers.clone(),
            mapping,
            records,
            threshold: Some(self.config.threshold()),
            model_loaded: self.config.has_model(),
        }
    }
}

impl ScoringStrategy for LocalHeuristicStrategy {
    fn name(&self) -> &'static str {
        "local_heuristic"
    }

    fn score(
        &mut self,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<ScoredBatch> {
        progress.report(10, "Reading file data...");
        let table = parser::parse(upload)?;

        progress.report(
            25,
            if self.config.has_model() {
                "Loading ML models..."
            } else {
                "Initializing analysis engine..."
            },
        );

        progress.report(40, "Preprocessing features...");
        let mapping = match &self.mapping {
            Some(m) => m.clone(),
            None => detect_with(&table.headers, self.config.detection),
        };

        progress.report(60, "Running anomaly detection...");
        Ok(self.score_table(&table, &mapping))
    }
}

// ── Remote oracle ────────────────────────────────────────────────────────────

const REMOTE_HEADERS: [&str; 9] = [
    "transaction_id",
    "department_id",
    "vendor_id",
    "amount",
    "risk_score",
    "anomaly_score",
    "fraud_flag",
    "risk_level",
    "explanation",
];

pub struct RemoteOracleStrategy {
    client: RemoteClient,
}

impl RemoteOracleStrategy {
    pub fn new(client: RemoteClient) -> Self {
        Self { client }
    }

    /// Project the service verdicts onto scored records.
    pub fn to_batch(analysis: &RemoteAnalysis) -> ScoredBatch {
        let headers: Vec<String> = REMOTE_HEADERS.iter().map(|h| h.to_string()).collect();
        let mapping = ColumnMapping::default()
            .with(ColumnRole::Id, "transaction_id")
            .with(ColumnRole::Department, "department_id")
            .with(ColumnRole::Vendor, "vendor_id")
            .with(ColumnRole::Amount, "amount");

        let records = analysis
            .results
            .iter()
            .enumerate()
            .map(|(idx, r)| remote_record(r, idx))
            .collect();

        ScoredBatch {
            headers,
            mapping,
            records,
            threshold: None,
            model_loaded: false,
        }
    }
}

fn remote_record(result: &FraudResult, index: usize) -> ScoredRecord {
    let text = |v: &Option<String>| v.clone().map(CellValue::Text).unwrap_or(CellValue::Null);
    let values = vec![
        CellValue::Text(result.transaction_id.clone()),
        text(&result.department_id),
        text(&result.vendor_id),
        CellValue::Number(result.amount),
        CellValue::Number(result.risk_score),
        result.anomaly_score.map(CellValue::Number).unwrap_or(CellValue::Null),
        CellValue::Number(result.fraud_flag as f64),
        text(&result.risk_level),
        CellValue::Text(result.explanation.clone()),
    ];

    let risk_level = if result.is_fraud() {
        result
            .risk_level
            .as_deref()
            .and_then(RiskLevel::parse)
            .filter(RiskLevel::is_anomalous)
            .unwrap_or(RiskLevel::Low)
    } else {
        RiskLevel::Normal
    };

    let reason = if !result.explanation.trim().is_empty() {
        result.explanation.clone()
    } else if result.is_fraud() {
        "Flagged by remote model".to_string()
    } else {
        "Within normal parameters".to_string()
    };

    ScoredRecord {
        id: record_id(&values, Some(0), index),
        anomaly_score: result.risk_score.clamp(0.0, 100.0),
        risk_level,
        reason,
        values,
    }
}

impl ScoringStrategy for RemoteOracleStrategy {
    fn name(&self) -> &'static str {
        "remote_oracle"
    }

    fn score(
        &mut self,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<ScoredBatch> {
        let analysis = self.client.analyze_with_progress(upload, progress)?;
        Ok(Self::to_batch(&analysis))
    }
}
