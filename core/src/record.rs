//! Scored records: one source row plus its analysis annotations.

use crate::{
    detector::{ColumnMapping, ResolvedMapping},
    types::{CellValue, RecordId, RiskLevel, Row},
};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredRecord {
    /// Original cells, aligned with the batch headers.
    pub values: Row,
    pub id: RecordId,
    /// Clamped to [0, 100].
    pub anomaly_score: f64,
    pub risk_level: RiskLevel,
    pub reason: String,
}

impl ScoredRecord {
    /// Always derived from the risk level, so the two never disagree.
    pub fn is_anomaly(&self) -> bool {
        self.risk_level.is_anomalous()
    }

    pub fn cell(&self, column: Option<usize>) -> Option<&CellValue> {
        column.and_then(|i| self.values.get(i))
    }

    /// Amount in the given column, 0 when unmapped or unparsable.
    pub fn amount(&self, column: Option<usize>) -> f64 {
        self.cell(column).map(CellValue::as_amount).unwrap_or(0.0)
    }

    /// Grouping label for a column: falsy cells become `"Unknown"`.
    pub fn label(&self, column: Option<usize>) -> String {
        match self.cell(column) {
            Some(v) if v.is_truthy() => v.to_string(),
            _ => "Unknown".to_string(),
        }
    }
}

/// Every record from one scoring run, with the headers and mapping
/// needed to interpret them.
#[derive(Debug, Clone)]
pub struct ScoredBatch {
    pub headers: Vec<String>,
    pub mapping: ColumnMapping,
    pub records: Vec<ScoredRecord>,
    /// Active risk threshold, when the scores came from the local heuristic.
    pub threshold: Option<f64>,
    /// A model and scaler were registered when scoring ran.
    pub model_loaded: bool,
}

impl ScoredBatch {
    pub fn resolved(&self) -> ResolvedMapping {
        self.mapping.resolve(&self.headers)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn flagged(&self) -> impl Iterator<Item = &ScoredRecord> {
        self.records.iter().filter(|r| r.is_anomaly())
    }

    /// Serializable view of one record as a flat object.
    pub fn view<'a>(&'a self, record: &'a ScoredRecord) -> RecordView<'a> {
        RecordView {
            headers: &self.headers,
            record,
        }
    }

    /// Serializable view of every record.
    pub fn records_view(&self) -> RecordsView<'_> {
        RecordsView { batch: self }
    }
}

/// A record serialized as its original fields followed by
/// `_id`, `_anomalyScore`, `_riskLevel`, `_reason`, `_isAnomaly`.
pub struct RecordView<'a> {
    headers: &'a [String],
    record: &'a ScoredRecord,
}

impl Serialize for RecordView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.headers.len() + 5))?;
        let mut seen: Vec<&str> = Vec::with_capacity(self.headers.len());
        for (header, value) in self.headers.iter().zip(&self.record.values) {
            // Duplicate header names keep their first value only.
            if seen.contains(&header.as_str()) {
                continue;
            }
            seen.push(header);
            map.serialize_entry(header, value)?;
        }
        map.serialize_entry("_id", &self.record.id)?;
        map.serialize_entry("_anomalyScore", &self.record.anomaly_score)?;
        map.serialize_entry("_riskLevel", &self.record.risk_level)?;
        map.serialize_entry("_reason", &self.record.reason)?;
        map.serialize_entry("_isAnomaly", &self.record.is_anomaly())?;
        map.end()
    }
}

pub struct RecordsView<'a> {
    batch: &'a ScoredBatch,
}

impl Serialize for RecordsView<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.batch.records.len()))?;
        for record in &self.batch.records {
            seq.serialize_element(&self.batch.view(record))?;
        }
        seq.end()
    }
}
