//! Natural-language findings and recommendations built from the
//! aggregates of one analysis.

use crate::{
    aggregate::{AnalysisResults, EntityKind},
    record::ScoredBatch,
    types::RiskLevel,
};
use serde::Serialize;

const NOT_AVAILABLE: &str = "N/A";
const CURRENCY: &str = "₹";
const TOP_AREAS: usize = 3;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskArea {
    pub category: String,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HighestScore {
    pub score: f64,
    pub id: String,
}

impl Default for HighestScore {
    fn default() -> Self {
        Self {
            score: 0.0,
            id: NOT_AVAILABLE.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FlaggedEntity {
    pub name: String,
    pub count: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Default for FlaggedEntity {
    fn default() -> Self {
        Self {
            name: NOT_AVAILABLE.to_string(),
            count: 0,
            kind: "Unknown".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct AmountRange {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TrendDirection {
    Increasing,
    Decreasing,
}

/// First half vs second half of the time series, split by index.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Trend {
    pub direction: TrendDirection,
    pub change_percent: f64,
    pub earlier_anomalies: u64,
    pub recent_anomalies: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisInsights {
    pub critical_findings: Vec<String>,
    pub top_risk_areas: Vec<RiskArea>,
    pub trend_analysis: Vec<String>,
    pub recommendations: Vec<String>,
    pub highest_anomaly_score: HighestScore,
    pub most_flagged_entity: FlaggedEntity,
    pub risk_amount_range: AmountRange,
    pub peak_risk_date: String,
    pub trend: Option<Trend>,
}

impl Default for AnalysisInsights {
    fn default() -> Self {
        Self {
            critical_findings: Vec::new(),
            top_risk_areas: Vec::new(),
            trend_analysis: Vec::new(),
            recommendations: Vec::new(),
            highest_anomaly_score: HighestScore::default(),
            most_flagged_entity: FlaggedEntity::default(),
            risk_amount_range: AmountRange::default(),
            peak_risk_date: NOT_AVAILABLE.to_string(),
            trend: None,
        }
    }
}

/// Format an amount with thousands separators and at most two decimals.
pub fn format_amount(amount: f64) -> String {
    let rounded = (amount * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let abs = rounded.abs();
    let whole = abs.trunc() as u64;
    let cents = ((abs - abs.trunc()) * 100.0).round() as u64;

    let digits = whole.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let mut out = if negative { format!("-{grouped}") } else { grouped };
    if cents > 0 {
        let frac = format!("{cents:02}");
        out.push('.');
        out.push_str(frac.trim_end_matches('0'));
    }
    out
}

/// Naive trend: compare anomaly counts in the earlier and later halves
/// of the series by position. Needs at least two points.
pub fn trend(anomaly_counts: &[u64]) -> Option<Trend> {
    let n = anomaly_counts.len();
    if n < 2 {
        return None;
    }
    let recent: u64 = anomaly_counts[n - n.div_ceil(2)..].iter().sum();
    let earlier: u64 = anomaly_counts[..n / 2].iter().sum();
    let direction = if recent > earlier {
        TrendDirection::Increasing
    } else {
        TrendDirection::Decreasing
    };
    let change_percent = if earlier > 0 {
        ((recent as f64 - earlier as f64) / earlier as f64 * 100.0).abs()
    } else {
        0.0
    };
    Some(Trend {
        direction,
        change_percent,
        earlier_anomalies: earlier,
        recent_anomalies: recent,
    })
}

pub fn build_insights(batch: &ScoredBatch, results: &AnalysisResults) -> AnalysisInsights {
    let columns = batch.resolved();
    let mut insights = AnalysisInsights::default();

    // Highest score: first record wins ties.
    if let Some(top) = batch
        .records
        .iter()
        .reduce(|best, r| if r.anomaly_score > best.anomaly_score { r } else { best })
    {
        insights.highest_anomaly_score = HighestScore {
            score: top.anomaly_score,
            id: top.id.clone(),
        };
    }

    if let Some(entity) = results.top_risk_entities.first() {
        insights.most_flagged_entity = FlaggedEntity {
            name: entity.name.clone(),
            count: entity.count,
            kind: entity.kind.label().to_string(),
        };
    }

    if columns.amount.is_some() {
        let amounts: Vec<f64> = batch.flagged().map(|r| r.amount(columns.amount)).collect();
        if !amounts.is_empty() {
            insights.risk_amount_range = AmountRange {
                min: amounts.iter().copied().fold(f64::INFINITY, f64::min),
                max: amounts.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            };
        }
    }

    if let Some(peak) = results
        .time_series_data
        .iter()
        .reduce(|best, d| if d.anomaly_count > best.anomaly_count { d } else { best })
    {
        insights.peak_risk_date = peak.date.clone();
    }

    let critical = results.risk_count(RiskLevel::Critical);
    let high = results.risk_count(RiskLevel::High);

    // ── Critical findings ──────────────────────────────
    if batch.model_loaded {
        if let Some(threshold) = batch.threshold {
            insights.critical_findings.push(format!(
                "Analysis performed using uploaded ML model (threshold: {threshold}%)"
            ));
        }
    }
    if critical > 0 {
        insights
            .critical_findings
            .push(format!("{critical} transactions flagged as CRITICAL risk"));
    }
    if high > 0 {
        insights
            .critical_findings
            .push(format!("{high} transactions flagged as HIGH risk"));
    }
    if let Some(dept) = results.department_anomalies.first().filter(|d| d.anomalies > 0) {
        let mut line = format!("{} has {} suspicious transactions", dept.name, dept.anomalies);
        if columns.amount.is_some() {
            line.push_str(&format!(" ({CURRENCY}{} at risk)", format_amount(dept.risk_amount)));
        }
        insights.critical_findings.push(line);
    }
    if !batch.is_empty() {
        insights.critical_findings.push(format!(
            "Highest anomaly score: {}/100 (Transaction: {})",
            insights.highest_anomaly_score.score, insights.highest_anomaly_score.id
        ));
    }
    if let Some(entity) = results.top_risk_entities.first() {
        insights.critical_findings.push(format!(
            "{} '{}' appears in {} flagged records",
            entity.kind.label(),
            entity.name,
            entity.count
        ));
    }

    // ── Top risk areas ─────────────────────────────────
    insights.top_risk_areas = results
        .department_anomalies
        .iter()
        .take(TOP_AREAS)
        .map(|d| RiskArea {
            category: d.name.clone(),
            detail: format!("{} anomalies out of {} transactions", d.anomalies, d.total),
        })
        .collect();

    // ── Trend ──────────────────────────────────────────
    let counts: Vec<u64> = results.time_series_data.iter().map(|d| d.anomaly_count).collect();
    insights.trend = trend(&counts);
    if let Some(t) = insights.trend {
        let word = match t.direction {
            TrendDirection::Increasing => "increasing",
            TrendDirection::Decreasing => "decreasing",
        };
        insights.trend_analysis.push(format!(
            "Anomalies {word} by {:.1}% in recent data",
            t.change_percent
        ));
        insights
            .trend_analysis
            .push(format!("Peak risk identified on {}", insights.peak_risk_date));
    }

    // ── Recommendations ────────────────────────────────
    if let Some(dept) = results.department_anomalies.first().filter(|d| d.anomalies > 0) {
        insights
            .recommendations
            .push(format!("Verify transactions from {}", dept.name));
    }
    if let Some(entity) = results
        .top_risk_entities
        .first()
        .filter(|e| e.kind == EntityKind::Vendor)
    {
        insights
            .recommendations
            .push(format!("Audit {} compliance", entity.name));
    }
    if critical > 0 {
        insights.recommendations.push(format!(
            "Escalate {critical} critical-risk transactions to senior management"
        ));
    }
    insights.recommendations.push(format!(
        "Review {} high-priority outliers immediately",
        critical + high
    ));
    insights
        .recommendations
        .push("Implement continuous monitoring for flagged patterns".to_string());
    insights
        .recommendations
        .push("Cross-reference flagged vendors with approved vendor list".to_string());

    insights
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn amounts_are_grouped() {
        assert_eq!(format_amount(0.0), "0");
        assert_eq!(format_amount(1234567.0), "1,234,567");
        assert_eq!(format_amount(1234.5), "1,234.5");
        assert_eq!(format_amount(999.999), "1,000");
        assert_eq!(format_amount(-2500.25), "-2,500.25");
    }

    #[test]
    fn trend_splits_by_position() {
        assert_eq!(trend(&[3]), None);

        let t = trend(&[2, 4]).unwrap();
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(t.change_percent, 100.0);

        // Odd length: the middle point belongs to the recent half only.
        let t = trend(&[4, 1, 1]).unwrap();
        assert_eq!(t.earlier_anomalies, 4);
        assert_eq!(t.recent_anomalies, 2);
        assert_eq!(t.direction, TrendDirection::Decreasing);
        assert_eq!(t.change_percent, 50.0);
    }

    #[test]
    fn flat_trend_from_zero_reports_zero_change() {
        let t = trend(&[0, 0, 5]).unwrap();
        assert_eq!(t.direction, TrendDirection::Increasing);
        assert_eq!(t.change_percent, 0.0);
    }
}
