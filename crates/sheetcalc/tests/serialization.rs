//! Reports and options as JSON (requires the `serde` feature)
#![cfg(feature = "serde")]

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use std::time::Duration;

#[test]
fn test_report_round_trips_through_json() {
    let store = MemoryStore::new();
    let sheet = store.add_sheet(WorkbookId(1), "Sheet1");
    let engine = Engine::new(store);
    let key = |a1: &str| CellKey::new(sheet, a1.parse().unwrap());

    engine.set_cell(key("B1"), "=1/A1").unwrap();
    engine.set_cell(key("C1"), "=A1&\"!\"").unwrap();
    let report = engine.set_cell(key("A1"), "0").unwrap();

    let json = serde_json::to_string(&report).unwrap();
    let back: RecalcReport = serde_json::from_str(&json).unwrap();
    assert_eq!(back, report);
    assert_eq!(back.error_count(), 1);
}

#[test]
fn test_options_from_json() {
    let options: RecalcOptions = serde_json::from_str(
        r#"{ "timeout": { "secs": 2, "nanos": 0 } }"#,
    )
    .unwrap();
    assert_eq!(options.timeout, Some(Duration::from_secs(2)));
    assert!(options.defined_names.is_empty());
}
