//! Column role detector: guesses which header plays which semantic
//! role from its name alone.
//!
//! Detection order is fixed: id → department → vendor → amount → date →
//! category. Within a role the first matching header wins.

use serde::{Deserialize, Serialize};

const ID_KEYWORDS: &[&str] = &["id", "transactionid", "txnid", "recordid", "refno", "referenceno"];
const DEPARTMENT_KEYWORDS: &[&str] = &["department", "dept", "division", "unit", "branch", "office"];
const VENDOR_KEYWORDS: &[&str] = &["vendor", "supplier", "merchant", "payee", "beneficiary", "recipient"];
const AMOUNT_KEYWORDS: &[&str] = &["amount", "value", "total", "sum", "price", "cost", "payment"];
const DATE_KEYWORDS: &[&str] = &["date", "time", "timestamp", "created", "transactiondate"];
const CATEGORY_KEYWORDS: &[&str] = &["category", "type", "scheme", "program", "project"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnRole {
    Id,
    Department,
    Vendor,
    Amount,
    Date,
    Category,
}

impl ColumnRole {
    /// Roles in detection priority order.
    pub const ALL: [ColumnRole; 6] = [
        ColumnRole::Id,
        ColumnRole::Department,
        ColumnRole::Vendor,
        ColumnRole::Amount,
        ColumnRole::Date,
        ColumnRole::Category,
    ];

    pub fn keywords(&self) -> &'static [&'static str] {
        match self {
            Self::Id => ID_KEYWORDS,
            Self::Department => DEPARTMENT_KEYWORDS,
            Self::Vendor => VENDOR_KEYWORDS,
            Self::Amount => AMOUNT_KEYWORDS,
            Self::Date => DATE_KEYWORDS,
            Self::Category => CATEGORY_KEYWORDS,
        }
    }
}

/// Whether a header already claimed by an earlier role may be claimed
/// again by a later one.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionMode {
    /// Every role scans the full header list.
    #[default]
    Independent,
    /// Later roles skip headers claimed by earlier roles.
    Exclusive,
}

/// Best-effort role → header assignment. Every assigned name is one of
/// the source headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnMapping {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub department: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl ColumnMapping {
    pub fn get(&self, role: ColumnRole) -> Option<&str> {
        self.slot(role).as_deref()
    }

    pub fn set(&mut self, role: ColumnRole, header: impl Into<String>) {
        *self.slot_mut(role) = Some(header.into());
    }

    pub fn with(mut self, role: ColumnRole, header: impl Into<String>) -> Self {
        self.set(role, header);
        self
    }

    /// Drop any assignment that does not name one of `headers`.
    pub fn retain_known(&mut self, headers: &[String]) {
        for role in ColumnRole::ALL {
            let slot = self.slot_mut(role);
            if slot.as_ref().is_some_and(|h| !headers.contains(h)) {
                log::warn!("detector: dropping {role:?} mapping to unknown header {slot:?}");
                *slot = None;
            }
        }
    }

    /// Column positions for each mapped role against `headers`.
    pub fn resolve(&self, headers: &[String]) -> ResolvedMapping {
        let index = |role: ColumnRole| {
            self.get(role)
                .and_then(|name| headers.iter().position(|h| h == name))
        };
        ResolvedMapping {
            id: index(ColumnRole::Id),
            department: index(ColumnRole::Department),
            vendor: index(ColumnRole::Vendor),
            amount: index(ColumnRole::Amount),
            date: index(ColumnRole::Date),
            category: index(ColumnRole::Category),
        }
    }

    pub fn is_empty(&self) -> bool {
        ColumnRole::ALL.iter().all(|r| self.get(*r).is_none())
    }

    fn slot(&self, role: ColumnRole) -> &Option<String> {
        match role {
            ColumnRole::Id => &self.id,
            ColumnRole::Department => &self.department,
            ColumnRole::Vendor => &self.vendor,
            ColumnRole::Amount => &self.amount,
            ColumnRole::Date => &self.date,
            ColumnRole::Category => &self.category,
        }
    }

    fn slot_mut(&mut self, role: ColumnRole) -> &mut Option<String> {
        match role {
            ColumnRole::Id => &mut self.id,
            ColumnRole::Department => &mut self.department,
            ColumnRole::Vendor => &mut self.vendor,
            ColumnRole::Amount => &mut self.amount,
            ColumnRole::Date => &mut self.date,
            ColumnRole::Category => &mut self.category,
        }
    }
}

/// A mapping resolved to column positions for one header row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ResolvedMapping {
    pub id: Option<usize>,
    pub department: Option<usize>,
    pub vendor: Option<usize>,
    pub amount: Option<usize>,
    pub date: Option<usize>,
    pub category: Option<usize>,
}

/// Lower-case and strip `_`, spaces and `-`.
pub fn normalize_header(header: &str) -> String {
    header
        .chars()
        .filter(|c| !matches!(c, '_' | ' ' | '-'))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Detect roles with the default independent matching.
pub fn detect(headers: &[String]) -> ColumnMapping {
    detect_with(headers, DetectionMode::Independent)
}

pub fn detect_with(headers: &[String], mode: DetectionMode) -> ColumnMapping {
    let normalized: Vec<String> = headers.iter().map(|h| normalize_header(h)).collect();
    let mut claimed = vec![false; headers.len()];
    let mut mapping = ColumnMapping::default();

    for role in ColumnRole::ALL {
        let hit = normalized.iter().enumerate().position(|(idx, norm)| {
            let available = mode == DetectionMode::Independent || !claimed[idx];
            available && role.keywords().iter().any(|k| norm.contains(k))
        });
        if let Some(idx) = hit {
            claimed[idx] = true;
            mapping.set(role, headers[idx].clone());
        }
    }

    log::debug!("detector: mode={mode:?} mapping={mapping:?}");
    mapping
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalization_strips_separators() {
        assert_eq!(normalize_header("Transaction_Date"), "transactiondate");
        assert_eq!(normalize_header("Ref No"), "refno");
        assert_eq!(normalize_header("vendor-name"), "vendorname");
    }

    #[test]
    fn resolve_finds_positions() {
        let h = headers(&["a", "amount", "b"]);
        let mapping = ColumnMapping::default().with(ColumnRole::Amount, "amount");
        let resolved = mapping.resolve(&h);
        assert_eq!(resolved.amount, Some(1));
        assert_eq!(resolved.id, None);
    }

    #[test]
    fn retain_known_drops_strangers() {
        let h = headers(&["amount"]);
        let mut mapping = ColumnMapping::default()
            .with(ColumnRole::Amount, "amount")
            .with(ColumnRole::Vendor, "ghost");
        mapping.retain_known(&h);
        assert_eq!(mapping.amount.as_deref(), Some("amount"));
        assert_eq!(mapping.vendor, None);
    }
}
