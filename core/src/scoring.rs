//! Local heuristic anomaly scoring.
//!
//! Score components (additive, then clamped to [0, 100]):
//!   1. Amount z-score against the corpus         (+40 / +25 / +15)
//!   2. Amount relative to the corpus maximum      (+20 / +10)
//!   3. Round-number suspicion                     (+10, +15)
//!   4. Uniform jitter in [0, 15)
//!   5. Weekend date                               (+8)
//!
//! Only the jitter is random. With NoJitter every score is reproducible.

use crate::{
    dates::parse_date,
    detector::ResolvedMapping,
    parser::ParsedTable,
    record::ScoredRecord,
    rng::JitterSource,
    types::{CellValue, RiskLevel, Row},
};
use chrono::{Datelike, Weekday};
use serde::Serialize;

// ── Constants ────────────────────────────────────────────────────────────────

const Z_EXTREME: f64 = 3.0;
const Z_HIGH: f64 = 2.0;
const Z_ELEVATED: f64 = 1.5;
const MAX_RATIO_HIGH: f64 = 0.8;
const MAX_RATIO_ELEVATED: f64 = 0.5;
const ROUND_10K_MIN: f64 = 50_000.0;
const ROUND_100K_MIN: f64 = 100_000.0;
const HIGH_VALUE_AMOUNT: f64 = 100_000.0;
const JITTER_SPAN: f64 = 15.0;
const WEEKEND_BONUS: f64 = 8.0;

// Offsets from the threshold for each bucket's lower bound.
const CRITICAL_OFFSET: f64 = 15.0;
const MEDIUM_OFFSET: f64 = -20.0;
const LOW_OFFSET: f64 = -40.0;

// ── Corpus statistics ────────────────────────────────────────────────────────

/// Amount distribution over all rows with a positive mapped amount.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AmountStats {
    pub avg_amount: f64,
    pub std_amount: f64,
    pub max_amount: f64,
}

impl Default for AmountStats {
    fn default() -> Self {
        Self {
            avg_amount: 0.0,
            std_amount: 1.0,
            max_amount: 0.0,
        }
    }
}

impl AmountStats {
    /// Zero, negative and unparsable amounts are left out of the
    /// statistics; the rows themselves are still scored.
    pub fn from_rows(rows: &[Row], amount_column: Option<usize>) -> Self {
        let Some(col) = amount_column else {
            return Self::default();
        };
        let amounts: Vec<f64> = rows
            .iter()
            .filter_map(|r| r.get(col))
            .map(CellValue::as_amount)
            .filter(|a| *a > 0.0)
            .collect();
        Self::from_amounts(&amounts)
    }

    pub fn from_amounts(amounts: &[f64]) -> Self {
        if amounts.is_empty() {
            return Self::default();
        }
        let n = amounts.len() as f64;
        let avg = amounts.iter().sum::<f64>() / n;
        let variance = amounts.iter().map(|a| (a - avg).powi(2)).sum::<f64>() / n;
        let max = amounts.iter().copied().fold(f64::MIN, f64::max);
        Self {
            avg_amount: avg,
            std_amount: variance.sqrt(),
            max_amount: max,
        }
    }

    /// Absolute z-score; a zero deviation is treated as 1.
    pub fn z_score(&self, amount: f64) -> f64 {
        let std = if self.std_amount == 0.0 { 1.0 } else { self.std_amount };
        ((amount - self.avg_amount) / std).abs()
    }
}

// ── Row scoring ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct RowScore {
    /// Rounded to one decimal, within [0, 100].
    pub score: f64,
    pub risk_level: RiskLevel,
    pub reason: String,
}

/// Map a score to its bucket under `threshold`. Bucket bounds keep
/// their order for any threshold, including ones that push bounds
/// below 0 or above 100.
pub fn risk_level(score: f64, threshold: f64) -> RiskLevel {
    if score >= threshold + CRITICAL_OFFSET {
        RiskLevel::Critical
    } else if score >= threshold {
        RiskLevel::High
    } else if score >= threshold + MEDIUM_OFFSET {
        RiskLevel::Medium
    } else if score >= threshold + LOW_OFFSET {
        RiskLevel::Low
    } else {
        RiskLevel::Normal
    }
}

fn amount_points(amount: f64, stats: &AmountStats) -> f64 {
    let mut points = 0.0;

    let z = stats.z_score(amount);
    if z > Z_EXTREME {
        points += 40.0;
    } else if z > Z_HIGH {
        points += 25.0;
    } else if z > Z_ELEVATED {
        points += 15.0;
    }

    if amount > stats.max_amount * MAX_RATIO_HIGH {
        points += 20.0;
    } else if amount > stats.max_amount * MAX_RATIO_ELEVATED {
        points += 10.0;
    }

    if is_round(amount, 10_000.0, ROUND_10K_MIN) {
        points += 10.0;
    }
    if is_round(amount, 100_000.0, ROUND_100K_MIN) {
        points += 15.0;
    }
    points
}

fn is_round(amount: f64, unit: f64, above: f64) -> bool {
    amount % unit == 0.0 && amount > above
}

fn is_weekend(cell: &CellValue) -> bool {
    if !cell.is_truthy() {
        return false;
    }
    let CellValue::Text(raw) = cell else {
        return false;
    };
    parse_date(raw).is_some_and(|d| matches!(d.weekday(), Weekday::Sat | Weekday::Sun))
}

/// Row-level notes plus one severity tier chosen by the final score.
pub fn reason(score: f64, amount: Option<&CellValue>) -> String {
    let mut notes: Vec<&str> = Vec::new();

    if let Some(cell) = amount.filter(|c| c.is_truthy()) {
        let amount = cell.as_amount();
        if amount > HIGH_VALUE_AMOUNT {
            notes.push("High-value transaction");
        }
        if is_round(amount, 10_000.0, ROUND_10K_MIN) {
            notes.push("Suspiciously round amount");
        }
    }

    if score >= 80.0 {
        notes.push("Multiple risk indicators detected");
    } else if score >= 60.0 {
        notes.push("Elevated risk patterns");
    } else if score >= 40.0 {
        notes.push("Moderate deviation from baseline");
    } else if score >= 20.0 {
        notes.push("Minor anomaly indicators");
    }

    if notes.is_empty() {
        "Within normal parameters".to_string()
    } else {
        notes.join("; ")
    }
}

/// Score one row. The risk bucket is taken from the rounded score so
/// the displayed score and bucket always agree.
pub fn score_row(
    row: &Row,
    columns: &ResolvedMapping,
    stats: &AmountStats,
    threshold: f64,
    jitter: &mut dyn JitterSource,
) -> RowScore {
    let mut score = 0.0;

    let amount_cell = columns.amount.and_then(|i| row.get(i));
    if let Some(cell) = amount_cell.filter(|c| !c.is_null()) {
        score += amount_points(cell.as_amount(), stats);
    }

    score += jitter.next_unit() * JITTER_SPAN;

    if let Some(cell) = columns.date.and_then(|i| row.get(i)) {
        if is_weekend(cell) {
            score += WEEKEND_BONUS;
        }
    }

    let score = (score.clamp(0.0, 100.0) * 10.0).round() / 10.0;
    RowScore {
        score,
        risk_level: risk_level(score, threshold),
        reason: reason(score, amount_cell),
    }
}

/// Mapped id when truthy, otherwise a zero-padded sequence number.
pub fn record_id(row: &Row, id_column: Option<usize>, index: usize) -> String {
    match id_column.and_then(|i| row.get(i)) {
        Some(v) if v.is_truthy() => v.to_string(),
        _ => format!("REC-{:06}", index + 1),
    }
}

/// Score every row of a table in one pass.
pub fn score_table(
    table: &ParsedTable,
    columns: &ResolvedMapping,
    threshold: f64,
    jitter: &mut dyn JitterSource,
) -> Vec<ScoredRecord> {
    let stats = AmountStats::from_rows(&table.rows, columns.amount);
    log::debug!(
        "scoring: rows={} avg={:.2} std={:.2} max={:.2} threshold={threshold}",
        table.rows.len(),
        stats.avg_amount,
        stats.std_amount,
        stats.max_amount
    );

    table
        .rows
        .iter()
        .enumerate()
        .map(|(idx, row)| {
            let scored = score_row(row, columns, &stats, threshold, jitter);
            ScoredRecord {
                values: row.clone(),
                id: record_id(row, columns.id, idx),
                anomaly_score: scored.score,
                risk_level: scored.risk_level,
                reason: scored.reason,
            }
        })
        .collect()
}
