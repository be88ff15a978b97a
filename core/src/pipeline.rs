//! End-to-end analysis: strategy → aggregation → optional run history.
//!
//! RULE: the pipeline never scores anything itself. It drives one
//! ScoringStrategy, aggregates whatever batch comes back, and records
//! the run when a store is attached.

use crate::{
    aggregate::{aggregate, AnalysisResults},
    error::PipelineResult,
    progress::{NoProgress, ProgressReporter},
    record::ScoredBatch,
    store::{RunRow, SettingsStore},
    strategy::ScoringStrategy,
    types::RunId,
    upload::Upload,
};
use chrono::{DateTime, Utc};
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};
use uuid::Uuid;

/// Everything one completed analysis produced.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub run_id: RunId,
    /// Name of the strategy that scored the batch.
    pub source: &'static str,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
    pub batch: ScoredBatch,
    pub results: AnalysisResults,
}

impl Serialize for AnalysisReport {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(7))?;
        map.serialize_entry("runId", &self.run_id)?;
        map.serialize_entry("source", self.source)?;
        map.serialize_entry("fileName", &self.file_name)?;
        map.serialize_entry("createdAt", &self.created_at.to_rfc3339())?;
        map.serialize_entry("mapping", &self.batch.mapping)?;
        map.serialize_entry("results", &self.results)?;
        map.serialize_entry("transactions", &self.batch.records_view())?;
        map.end()
    }
}

pub struct AnalysisPipeline<'s> {
    strategy: Box<dyn ScoringStrategy>,
    store: Option<&'s SettingsStore>,
}

impl<'s> AnalysisPipeline<'s> {
    pub fn new(strategy: Box<dyn ScoringStrategy>) -> Self {
        Self {
            strategy,
            store: None,
        }
    }

    /// Record every successful run in `store`.
    pub fn with_store(mut self, store: &'s SettingsStore) -> Self {
        self.store = Some(store);
        self
    }

    pub fn strategy_name(&self) -> &'static str {
        self.strategy.name()
    }

    pub fn run(&mut self, upload: &Upload) -> PipelineResult<AnalysisReport> {
        self.run_with_progress(upload, &mut NoProgress)
    }

    pub fn run_with_progress(
        &mut self,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<AnalysisReport> {
        let source = self.strategy.name();
        log::info!("pipeline: start file={} strategy={source}", upload.name());

        let batch = self.strategy.score(upload, progress)?;

        progress.report(80, "Calculating risk scores...");
        let results = aggregate(&batch);

        progress.report(95, "Generating insights...");
        let report = AnalysisReport {
            run_id: Uuid::new_v4().to_string(),
            source,
            file_name: upload.name().to_string(),
            created_at: Utc::now(),
            batch,
            results,
        };

        if let Some(store) = self.store {
            store.insert_run(&RunRow {
                run_id: report.run_id.clone(),
                file_name: report.file_name.clone(),
                source: source.to_string(),
                total_records: report.results.total_records,
                anomalies_detected: report.results.anomalies_detected,
                anomaly_rate: report.results.anomaly_rate,
                threshold: report.batch.threshold,
                created_at: report.created_at,
            })?;
        }

        progress.report(100, "Analysis complete!");
        log::info!(
            "pipeline: done run_id={} records={} anomalies={}",
            report.run_id,
            report.results.total_records,
            report.results.anomalies_detected
        );
        Ok(report)
    }
}

/// Holds the most recent analysis. Starting a new one discards the
/// previous result first, so a failure leaves the session empty.
#[derive(Default)]
pub struct AnalysisSession {
    current: Option<AnalysisReport>,
}

impl AnalysisSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn analyze(
        &mut self,
        pipeline: &mut AnalysisPipeline<'_>,
        upload: &Upload,
        progress: &mut dyn ProgressReporter,
    ) -> PipelineResult<&AnalysisReport> {
        self.reset();
        let report = pipeline.run_with_progress(upload, progress)?;
        Ok(self.current.insert(report))
    }

    pub fn current(&self) -> Option<&AnalysisReport> {
        self.current.as_ref()
    }

    pub fn reset(&mut self) {
        if self.current.take().is_some() {
            log::debug!("session: cleared previous analysis");
        }
    }
}
