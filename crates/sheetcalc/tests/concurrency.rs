//! Concurrent requests against one engine

use sheetcalc::prelude::*;
use std::sync::Arc;
use std::thread;

fn key(sheet: SheetId, a1: &str) -> CellKey {
    CellKey::new(sheet, a1.parse().unwrap())
}

#[test]
fn test_independent_sheets_recalculate_concurrently() {
    let store = MemoryStore::new();
    let sheets: Vec<SheetId> = (0..4)
        .map(|i| store.add_sheet(WorkbookId(1), &format!("Sheet{i}")))
        .collect();
    let engine = Arc::new(Engine::new(store));

    for &sheet in &sheets {
        engine.set_cell(key(sheet, "B1"), "=A1*2").unwrap();
        engine.set_cell(key(sheet, "C1"), "=SUM(A1:B1)").unwrap();
    }

    let handles: Vec<_> = sheets
        .iter()
        .map(|&sheet| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 1..=50 {
                    engine.set_cell(key(sheet, "A1"), &n.to_string()).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    for &sheet in &sheets {
        assert_eq!(engine.store().value(key(sheet, "B1")), Value::Number(100.0));
        assert_eq!(engine.store().value(key(sheet, "C1")), Value::Number(150.0));
    }
}

#[test]
fn test_cross_sheet_edits_stay_consistent() {
    let store = MemoryStore::new();
    let inputs = store.add_sheet(WorkbookId(1), "Inputs");
    let summary = store.add_sheet(WorkbookId(1), "Summary");
    let engine = Arc::new(Engine::new(store));

    engine.set_cell(key(summary, "A1"), "=Inputs!A1+Inputs!A2").unwrap();

    let writers: Vec<_> = ["A1", "A2"]
        .into_iter()
        .map(|a1| {
            let engine = Arc::clone(&engine);
            thread::spawn(move || {
                for n in 1..=40 {
                    engine.set_cell(key(inputs, a1), &n.to_string()).unwrap();
                }
            })
        })
        .collect();
    for writer in writers {
        writer.join().unwrap();
    }

    // the last request to finish saw both final inputs
    assert_eq!(engine.store().value(key(summary, "A1")), Value::Number(80.0));
}
