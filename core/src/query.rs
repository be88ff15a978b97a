//! Filtering and sorting of scored records for table views.
//!
//! Queries borrow the batch; nothing here mutates it.

use crate::{
    dates::parse_date,
    record::{ScoredBatch, ScoredRecord},
    types::{CellValue, RiskLevel},
};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortField {
    Amount,
    Date,
    #[default]
    Score,
    RiskLevel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Conditions a record must meet to be listed. Empty fields match
/// everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TransactionFilter {
    pub risk_levels: Vec<RiskLevel>,
    /// Case-insensitive substring over id, department and vendor.
    pub search: Option<String>,
    pub department: Option<String>,
    pub vendor: Option<String>,
    /// Inclusive bounds on the mapped amount.
    pub min_amount: Option<f64>,
    pub max_amount: Option<f64>,
    pub flagged_only: bool,
}

impl TransactionFilter {
    pub fn flagged() -> Self {
        Self {
            flagged_only: true,
            ..Self::default()
        }
    }

    fn matches(&self, batch: &ScoredBatch, record: &ScoredRecord) -> bool {
        let columns = batch.resolved();

        if self.flagged_only && !record.is_anomaly() {
            return false;
        }
        if !self.risk_levels.is_empty() && !self.risk_levels.contains(&record.risk_level) {
            return false;
        }

        let text = |col: Option<usize>| record.cell(col).map(CellValue::to_string).unwrap_or_default();
        if let Some(dept) = &self.department {
            if !text(columns.department).eq_ignore_ascii_case(dept) {
                return false;
            }
        }
        if let Some(vendor) = &self.vendor {
            if !text(columns.vendor).eq_ignore_ascii_case(vendor) {
                return false;
            }
        }

        let amount = record.amount(columns.amount);
        if self.min_amount.is_some_and(|min| amount < min) {
            return false;
        }
        if self.max_amount.is_some_and(|max| amount > max) {
            return false;
        }

        match self.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(term) => {
                let term = term.to_lowercase();
                [record.id.clone(), text(columns.department), text(columns.vendor)]
                    .iter()
                    .any(|field| field.to_lowercase().contains(&term))
            }
            None => true,
        }
    }
}

fn compare(batch: &ScoredBatch, field: SortField, a: &ScoredRecord, b: &ScoredRecord) -> Ordering {
    let columns = batch.resolved();
    match field {
        SortField::Amount => a.amount(columns.amount).total_cmp(&b.amount(columns.amount)),
        SortField::Score => a.anomaly_score.total_cmp(&b.anomaly_score),
        SortField::RiskLevel => a.risk_level.cmp(&b.risk_level),
        SortField::Date => {
            let date = |r: &ScoredRecord| match r.cell(columns.date) {
                Some(CellValue::Text(raw)) => parse_date(raw),
                _ => None,
            };
            // Undated records sort before every dated one.
            date(a).cmp(&date(b))
        }
    }
}

/// Records matching `filter`, stably sorted by `field`, optionally cut
/// to the first `limit`.
pub fn select<'a>(
    batch: &'a ScoredBatch,
    filter: &TransactionFilter,
    field: SortField,
    order: SortOrder,
    limit: Option<usize>,
) -> Vec<&'a ScoredRecord> {
    let mut out: Vec<&ScoredRecord> = batch
        .records
        .iter()
        .filter(|r| filter.matches(batch, r))
        .collect();

    out.sort_by(|a, b| {
        let ord = compare(batch, field, a, b);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });

    if let Some(limit) = limit {
        out.truncate(limit);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::ColumnMapping;

    fn batch() -> ScoredBatch {
        let rows = [
            ("T1", "Finance", "Acme", 500.0, "2024-03-02", 82.0, RiskLevel::High),
            ("T2", "Ops", "Globex", 90.0, "2024-03-01", 12.0, RiskLevel::Normal),
            ("T3", "finance", "Initech", 1200.0, "2024-02-28", 95.0, RiskLevel::Critical),
        ];
        let records = rows
            .iter()
            .map(|(id, dept, vendor, amount, date, score, level)| ScoredRecord {
                values: vec![
                    CellValue::Text(id.to_string()),
                    CellValue::Text(dept.to_string()),
                    CellValue::Text(vendor.to_string()),
                    CellValue::Number(*amount),
                    CellValue::Text(date.to_string()),
                ],
                id: id.to_string(),
                anomaly_score: *score,
                risk_level: *level,
                reason: String::new(),
            })
            .collect();
        ScoredBatch {
            headers: ["id", "dept", "vendor", "amount", "date"]
                .iter()
                .map(|h| h.to_string())
                .collect(),
            mapping: crate::detector::detect(
                &["id", "dept", "vendor", "amount", "date"].map(String::from),
            ),
            records,
            threshold: Some(75.0),
            model_loaded: false,
        }
    }

    fn ids(records: &[&ScoredRecord]) -> Vec<String> {
        records.iter().map(|r| r.id.clone()).collect()
    }

    #[test]
    fn flagged_only_sorted_by_amount() {
        let batch = batch();
        let out = select(
            &batch,
            &TransactionFilter::flagged(),
            SortField::Amount,
            SortOrder::Desc,
            None,
        );
        assert_eq!(ids(&out), ["T3", "T1"]);
    }

    #[test]
    fn search_spans_id_department_and_vendor() {
        let batch = batch();
        let filter = TransactionFilter {
            search: Some("GLOB".into()),
            ..TransactionFilter::default()
        };
        let out = select(&batch, &filter, SortField::Score, SortOrder::Desc, None);
        assert_eq!(ids(&out), ["T2"]);
    }

    #[test]
    fn department_match_ignores_case() {
        let batch = batch();
        let filter = TransactionFilter {
            department: Some("FINANCE".into()),
            ..TransactionFilter::default()
        };
        let out = select(&batch, &filter, SortField::Date, SortOrder::Asc, None);
        assert_eq!(ids(&out), ["T3", "T1"]);
    }

    #[test]
    fn amount_range_and_limit() {
        let batch = batch();
        let filter = TransactionFilter {
            min_amount: Some(100.0),
            ..TransactionFilter::default()
        };
        let out = select(&batch, &filter, SortField::RiskLevel, SortOrder::Desc, Some(1));
        assert_eq!(ids(&out), ["T3"]);
    }

    #[test]
    fn empty_mapping_still_filters_by_level() {
        let mut batch = batch();
        batch.mapping = ColumnMapping::default();
        let filter = TransactionFilter {
            risk_levels: vec![RiskLevel::Normal],
            ..TransactionFilter::default()
        };
        let out = select(&batch, &filter, SortField::Amount, SortOrder::Asc, None);
        assert_eq!(ids(&out), ["T2"]);
    }
}
