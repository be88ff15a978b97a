//! Integration tests: column role detection.

use fraudlens_core::detector::{detect, detect_with, ColumnMapping, ColumnRole, DetectionMode};

fn headers(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// Common ledger headers should map onto every role.
#[test]
fn typical_ledger_headers() {
    let h = headers(&["Transaction ID", "Dept", "Supplier Name", "Amount (INR)", "Txn Date", "Scheme"]);
    let mapping = detect(&h);
    assert_eq!(mapping.id.as_deref(), Some("Transaction ID"));
    assert_eq!(mapping.department.as_deref(), Some("Dept"));
    assert_eq!(mapping.vendor.as_deref(), Some("Supplier Name"));
    assert_eq!(mapping.amount.as_deref(), Some("Amount (INR)"));
    assert_eq!(mapping.date.as_deref(), Some("Txn Date"));
    assert_eq!(mapping.category.as_deref(), Some("Scheme"));
}

/// Roles with no matching header should stay unassigned.
#[test]
fn unmatched_roles_stay_empty() {
    let mapping = detect(&headers(&["foo", "bar"]));
    assert!(mapping.is_empty());
}

/// Every assigned role should point at a header that exists.
#[test]
fn every_assignment_names_a_real_header() {
    let h = headers(&["vendor_id", "payment_value", "created_at", "type"]);
    let mapping = detect(&h);
    for role in ColumnRole::ALL {
        if let Some(name) = mapping.get(role) {
            assert!(h.iter().any(|x| x == name), "{role:?} -> {name} not in headers");
        }
    }
}

/// Independent detection may assign one header to several roles.
#[test]
fn independent_mode_lets_one_header_fill_two_roles() {
    // "vendor_id" contains both "id" and "vendor".
    let h = headers(&["vendor_id", "amount"]);
    let mapping = detect(&h);
    assert_eq!(mapping.id.as_deref(), Some("vendor_id"));
    assert_eq!(mapping.vendor.as_deref(), Some("vendor_id"));
}

/// Exclusive detection should never reuse a claimed header.
#[test]
fn exclusive_mode_skips_claimed_headers() {
    let h = headers(&["vendor_id", "payee", "amount"]);
    let mapping = detect_with(&h, DetectionMode::Exclusive);
    assert_eq!(mapping.id.as_deref(), Some("vendor_id"));
    assert_eq!(mapping.vendor.as_deref(), Some("payee"));
    assert_eq!(mapping.amount.as_deref(), Some("amount"));
}

/// Unassigned roles should be omitted from the serialized mapping.
#[test]
fn mapping_serializes_camel_case_without_gaps() {
    let mapping = ColumnMapping::default()
        .with(ColumnRole::Amount, "amt")
        .with(ColumnRole::Date, "when");
    let json = serde_json::to_value(&mapping).unwrap();
    assert_eq!(json, serde_json::json!({"amount": "amt", "date": "when"}));
}
