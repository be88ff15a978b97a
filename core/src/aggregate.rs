//! Aggregation: turns a flat scored batch into the summary counts,
//! breakdowns and histograms the dashboard charts consume.
//!
//! Pure: the same batch always yields the same results.

use crate::{
    dates::parse_date,
    insights::{build_insights, AnalysisInsights},
    record::{ScoredBatch, ScoredRecord},
    types::{CellValue, RiskLevel},
};
use serde::Serialize;
use std::collections::HashMap;

// ── Constants ────────────────────────────────────────────────────────────────

pub const TOP_ENTITY_LIMIT: usize = 10;
const SCORE_BUCKET_WIDTH: f64 = 20.0;
const SCORE_RANGES: [&str; 5] = ["0-20", "20-40", "40-60", "60-80", "80-100"];
const HIGH_RISK_BUCKET_START: usize = 2;
const UNKNOWN: &str = "Unknown";

// ── Result types ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DepartmentAnomalies {
    pub name: String,
    pub anomalies: u64,
    pub total: u64,
    pub risk_amount: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimeSeriesPoint {
    pub date: String,
    pub normal_amount: f64,
    pub anomalous_amount: f64,
    pub anomaly_count: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskBucket {
    pub level: RiskLevel,
    pub count: u64,
    pub percentage: f64,
    pub color: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBucket {
    pub range: &'static str,
    pub count: u64,
    pub is_high_risk: bool,
}

/// Which mapped column a top-risk entity was grouped by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EntityKind {
    Vendor,
    Department,
    Category,
}

impl EntityKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Vendor => "Vendor",
            Self::Department => "Department",
            Self::Category => "Category",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskEntity {
    pub name: String,
    pub count: u64,
    pub amount: f64,
    #[serde(rename = "type")]
    pub kind: EntityKind,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResults {
    pub total_records: u64,
    pub anomalies_detected: u64,
    pub anomaly_rate: f64,
    pub total_fraud_risk_amount: f64,
    pub department_anomalies: Vec<DepartmentAnomalies>,
    pub time_series_data: Vec<TimeSeriesPoint>,
    pub risk_distribution: Vec<RiskBucket>,
    pub score_distribution: Vec<ScoreBucket>,
    pub top_risk_entities: Vec<RiskEntity>,
    pub insights: AnalysisInsights,
}

impl AnalysisResults {
    /// Count of anomalies in one bucket (0 when the bucket is absent).
    pub fn risk_count(&self, level: RiskLevel) -> u64 {
        self.risk_distribution
            .iter()
            .find(|b| b.level == level)
            .map(|b| b.count)
            .unwrap_or(0)
    }
}

// ── Grouping helper ──────────────────────────────────────────────────────────

/// Insertion-ordered accumulator keyed by label.
struct Groups<T> {
    index: HashMap<String, usize>,
    entries: Vec<(String, T)>,
}

impl<T: Default> Groups<T> {
    fn new() -> Self {
        Self {
            index: HashMap::new(),
            entries: Vec::new(),
        }
    }

    fn entry(&mut self, key: String) -> &mut T {
        let idx = match self.index.get(&key) {
            Some(idx) => *idx,
            None => {
                self.entries.push((key.clone(), T::default()));
                self.index.insert(key, self.entries.len() - 1);
                self.entries.len() - 1
            }
        };
        &mut self.entries[idx].1
    }

    fn into_entries(self) -> Vec<(String, T)> {
        self.entries
    }
}

// ── Aggregation ──────────────────────────────────────────────────────────────

/// ISO `YYYY-MM-DD` for a date cell, or `"Unknown"`.
pub fn calendar_date(cell: Option<&CellValue>) -> String {
    match cell {
        Some(CellValue::Text(raw)) => parse_date(raw)
            .map(|d| d.format("%Y-%m-%d").to_string())
            .unwrap_or_else(|| UNKNOWN.to_string()),
        _ => UNKNOWN.to_string(),
    }
}

fn department_breakdown(batch: &ScoredBatch) -> Vec<DepartmentAnomalies> {
    let columns = batch.resolved();
    let Some(group_col) = columns.department.or(columns.category) else {
        return Vec::new();
    };

    let mut groups: Groups<(u64, u64, f64)> = Groups::new();
    for record in &batch.records {
        let (anomalies, total, risk) = groups.entry(record.label(Some(group_col)));
        *total += 1;
        if record.is_anomaly() {
            *anomalies += 1;
            *risk += record.amount(columns.amount);
        }
    }

    let mut out: Vec<DepartmentAnomalies> = groups
        .into_entries()
        .into_iter()
        .map(|(name, (anomalies, total, risk_amount))| DepartmentAnomalies {
            name,
            anomalies,
            total,
            risk_amount,
        })
        .collect();
    out.sort_by(|a, b| b.anomalies.cmp(&a.anomalies));
    out
}

fn time_series(batch: &ScoredBatch) -> Vec<TimeSeriesPoint> {
    let columns = batch.resolved();
    let Some(date_col) = columns.date else {
        return Vec::new();
    };

    let mut groups: Groups<(f64, f64, u64)> = Groups::new();
    for record in &batch.records {
        let (normal, anomalous, count) = groups.entry(calendar_date(record.cell(Some(date_col))));
        // Without an amount column each row counts as 1.
        let amount = if columns.amount.is_some() {
            record.amount(columns.amount)
        } else {
            1.0
        };
        if record.is_anomaly() {
            *anomalous += amount;
            *count += 1;
        } else {
            *normal += amount;
        }
    }

    let mut out: Vec<TimeSeriesPoint> = groups
        .into_entries()
        .into_iter()
        .map(|(date, (normal_amount, anomalous_amount, anomaly_count))| TimeSeriesPoint {
            date,
            normal_amount,
            anomalous_amount,
            anomaly_count,
        })
        .collect();
    out.sort_by(|a, b| a.date.cmp(&b.date));
    out
}

fn risk_distribution(batch: &ScoredBatch, anomalies: u64) -> Vec<RiskBucket> {
    RiskLevel::FLAGGED
        .iter()
        .map(|level| {
            let count = batch.flagged().filter(|r| r.risk_level == *level).count() as u64;
            RiskBucket {
                level: *level,
                count,
                percentage: percent(count, anomalies),
                color: level.color(),
            }
        })
        .filter(|b| b.count > 0)
        .collect()
}

/// Index of the 20-point bucket for a score; 100 lands in the last one.
pub fn score_bucket(score: f64) -> usize {
    ((score.max(0.0) / SCORE_BUCKET_WIDTH).floor() as usize).min(SCORE_RANGES.len() - 1)
}

fn score_distribution(records: &[ScoredRecord]) -> Vec<ScoreBucket> {
    let mut counts = [0u64; 5];
    for record in records {
        counts[score_bucket(record.anomaly_score)] += 1;
    }
    SCORE_RANGES
        .iter()
        .zip(counts)
        .enumerate()
        .map(|(idx, (range, count))| ScoreBucket {
            range: *range,
            count,
            is_high_risk: idx >= HIGH_RISK_BUCKET_START,
        })
        .collect()
}

fn top_risk_entities(batch: &ScoredBatch) -> Vec<RiskEntity> {
    let columns = batch.resolved();
    let (entity_col, kind) = match (columns.vendor, columns.department, columns.category) {
        (Some(c), _, _) => (c, EntityKind::Vendor),
        (None, Some(c), _) => (c, EntityKind::Department),
        (None, None, Some(c)) => (c, EntityKind::Category),
        (None, None, None) => return Vec::new(),
    };

    let mut groups: Groups<(u64, f64)> = Groups::new();
    for record in batch.flagged() {
        let (count, amount) = groups.entry(record.label(Some(entity_col)));
        *count += 1;
        *amount += record.amount(columns.amount);
    }

    let mut out: Vec<RiskEntity> = groups
        .into_entries()
        .into_iter()
        .map(|(name, (count, amount))| RiskEntity {
            name,
            count,
            amount,
            kind,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count));
    out.truncate(TOP_ENTITY_LIMIT);
    out
}

fn percent(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Build every aggregate and insight for one scored batch.
pub fn aggregate(batch: &ScoredBatch) -> AnalysisResults {
    let columns = batch.resolved();
    let total_records = batch.len() as u64;
    let anomalies_detected = batch.flagged().count() as u64;
    let total_fraud_risk_amount = if columns.amount.is_some() {
        batch.flagged().map(|r| r.amount(columns.amount)).sum()
    } else {
        0.0
    };

    let department_anomalies = department_breakdown(batch);
    let time_series_data = time_series(batch);
    let risk_distribution = risk_distribution(batch, anomalies_detected);
    let score_distribution = score_distribution(&batch.records);
    let top_risk_entities = top_risk_entities(batch);

    let mut results = AnalysisResults {
        total_records,
        anomalies_detected,
        anomaly_rate: percent(anomalies_detected, total_records),
        total_fraud_risk_amount,
        department_anomalies,
        time_series_data,
        risk_distribution,
        score_distribution,
        top_risk_entities,
        insights: AnalysisInsights::default(),
    };
    results.insights = build_insights(batch, &results);

    log::info!(
        "aggregate: total={} anomalies={} rate={:.1}% departments={} dates={}",
        results.total_records,
        results.anomalies_detected,
        results.anomaly_rate,
        results.department_anomalies.len(),
        results.time_series_data.len()
    );
    results
}
