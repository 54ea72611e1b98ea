//! End-to-end recalculation through the engine and the in-memory store

use pretty_assertions::assert_eq;
use sheetcalc::prelude::*;
use std::time::Duration;

struct Sheet {
    engine: Engine<MemoryStore>,
    id: SheetId,
}

impl Sheet {
    fn new() -> Self {
        Self::with_options(RecalcOptions::default())
    }

    fn with_options(options: RecalcOptions) -> Self {
        let store = MemoryStore::new();
        let id = store.add_sheet(WorkbookId(1), "Sheet1");
        Self {
            engine: Engine::with_options(store, options),
            id,
        }
    }

    fn key(&self, a1: &str) -> CellKey {
        CellKey::new(self.id, a1.parse().unwrap())
    }

    fn set(&self, a1: &str, input: &str) -> RecalcReport {
        self.engine.set_cell(self.key(a1), input).unwrap()
    }

    fn value(&self, a1: &str) -> Value {
        self.engine.store().value(self.key(a1))
    }
}

#[test]
fn test_vlookup_exact_and_approximate() {
    let sheet = Sheet::new();
    for (row, k, v) in [(1, "1", "a"), (2, "2", "b"), (3, "3", "c")] {
        sheet.set(&format!("A{row}"), k);
        sheet.set(&format!("B{row}"), v);
    }
    sheet.set("D1", "=VLOOKUP(2,A1:B3,2,FALSE)");
    sheet.set("D2", "=VLOOKUP(5,A1:B3,2,FALSE)");
    assert_eq!(sheet.value("D1"), Value::text("b"));
    assert_eq!(sheet.value("D2"), Value::Error(ErrorKind::NotAvailable));

    for (row, k, v) in [(1, "1", "10"), (2, "5", "20"), (3, "10", "30")] {
        sheet.set(&format!("F{row}"), k);
        sheet.set(&format!("G{row}"), v);
    }
    sheet.set("H1", "=VLOOKUP(7,F1:G3,2)");
    assert_eq!(sheet.value("H1"), Value::Number(20.0));
}

#[test]
fn test_match_exact_and_ascending() {
    let sheet = Sheet::new();
    for (row, v) in ["x", "y", "z"].iter().enumerate() {
        sheet.set(&format!("A{}", row + 1), v);
    }
    for (row, v) in ["1", "3", "5", "7"].iter().enumerate() {
        sheet.set(&format!("B{}", row + 1), v);
    }

    sheet.set("C1", "=MATCH(\"y\",A1:A3,0)");
    sheet.set("C2", "=MATCH(6,B1:B4,1)");
    assert_eq!(sheet.value("C1"), Value::Number(2.0));
    assert_eq!(sheet.value("C2"), Value::Number(3.0));
}

#[test]
fn test_circular_reference_terminates() {
    let sheet = Sheet::new();
    sheet.set("A1", "=B1");
    let report = sheet.set("B1", "=A1");

    let circular = Value::Error(ErrorKind::CircularReference);
    assert_eq!(report.value(sheet.key("A1")), Some(&circular));
    assert_eq!(report.value(sheet.key("B1")), Some(&circular));
    assert_eq!(sheet.value("A1"), circular);
    assert_eq!(sheet.value("B1"), circular);

    let cycle = sheet.engine.inspect(sheet.key("A1")).cycle;
    assert_eq!(cycle, Some(vec![sheet.key("A1"), sheet.key("B1")]));
}

#[test]
fn test_breaking_a_cycle_recovers() {
    let sheet = Sheet::new();
    sheet.set("A1", "=B1");
    sheet.set("B1", "=A1+1");
    assert_eq!(sheet.value("A1"), Value::Error(ErrorKind::CircularReference));

    let report = sheet.set("B1", "5");
    assert_eq!(report.value(sheet.key("A1")), Some(&Value::Number(5.0)));
}

#[test]
fn test_self_reference() {
    let sheet = Sheet::new();
    let report = sheet.set("A1", "=A1+1");
    assert_eq!(
        report.value(sheet.key("A1")),
        Some(&Value::Error(ErrorKind::CircularReference))
    );
}

#[test]
fn test_dependents_of_a_cycle_see_the_error() {
    let sheet = Sheet::new();
    sheet.set("A1", "=B1");
    sheet.set("C1", "=A1*2");
    sheet.set("B1", "=A1");

    assert_eq!(sheet.value("C1"), Value::Error(ErrorKind::CircularReference));
}

#[test]
fn test_long_cycle_terminates() {
    let sheet = Sheet::new();
    let n = 3000;
    for r in 2..=n {
        sheet.set(&format!("A{r}"), &format!("=A{}+1", r - 1));
    }
    sheet.set("B1", &format!("=IFERROR(A{n},-1)"));
    let report = sheet.set("A1", &format!("=A{n}"));

    let circular = Value::Error(ErrorKind::CircularReference);
    assert_eq!(report.cells.len(), n + 1);
    assert_eq!(sheet.value("A1"), circular);
    assert_eq!(sheet.value(&format!("A{n}")), circular);
    assert_eq!(sheet.value("B1"), Value::Number(-1.0));
}

#[test]
fn test_long_chain_recalculates() {
    let sheet = Sheet::new();
    let n = 3000;
    sheet.set("A1", "1");
    for r in 2..=n {
        sheet.set(&format!("A{r}"), &format!("=A{}+1", r - 1));
    }
    assert_eq!(sheet.value(&format!("A{n}")), Value::Number(n as f64));

    let report = sheet.set("A1", "10");
    assert_eq!(report.cells.len(), n - 1);
    assert_eq!(sheet.value(&format!("A{n}")), Value::Number((n + 9) as f64));
}

#[test]
fn test_overly_deep_formula_is_a_cell_error() {
    let sheet = Sheet::new();
    sheet.set("A1", &format!("={}1", "-".repeat(8000)));
    sheet.set("A2", &format!("=1{}", "+1".repeat(3999)));
    sheet.set("A3", "=--1");

    assert_eq!(sheet.value("A1"), Value::Error(ErrorKind::FormulaSyntax));
    assert_eq!(sheet.value("A2"), Value::Error(ErrorKind::FormulaSyntax));
    assert_eq!(sheet.value("A3"), Value::Number(1.0));
}

#[test]
fn test_edit_propagates_to_dependents() {
    let sheet = Sheet::new();
    sheet.set("A2", "5");
    sheet.set("B1", "=A1+1");
    sheet.set("C1", "=SUM(A1:A2)");
    sheet.set("D1", "=A10");

    let report = sheet.set("A1", "10");
    let mut keys = report.keys();
    keys.sort();
    assert_eq!(keys, vec![sheet.key("B1"), sheet.key("C1")]);
    assert_eq!(report.value(sheet.key("B1")), Some(&Value::Number(11.0)));
    assert_eq!(report.value(sheet.key("C1")), Some(&Value::Number(15.0)));
}

#[test]
fn test_chain_is_evaluated_in_depth_order() {
    let sheet = Sheet::new();
    sheet.set("A5", "=A1*2");
    sheet.set("A3", "=A5+A4");
    sheet.set("A4", "=A5+1");

    let report = sheet.set("A1", "3");
    assert_eq!(
        report.keys(),
        vec![sheet.key("A5"), sheet.key("A4"), sheet.key("A3")]
    );
    assert_eq!(sheet.value("A3"), Value::Number(13.0));
}

#[test]
fn test_recalculation_is_idempotent() {
    let sheet = Sheet::new();
    sheet.set("A1", "2");
    sheet.set("B1", "=A1*A1");
    sheet.set("C1", "=IF(B1>3,\"big\",\"small\")");

    let batch = BatchRequest::new(sheet.id, [sheet.key("A1").addr]);
    let first = sheet.engine.recalculate(batch.clone()).unwrap();
    let second = sheet.engine.recalculate(batch).unwrap();

    assert_eq!(first.cells, second.cells);
    assert_eq!(first.value(sheet.key("C1")), Some(&Value::text("big")));
}

#[test]
fn test_iferror_fallback() {
    let sheet = Sheet::new();
    sheet.set("A1", "=IFERROR(1/0,-1)");
    sheet.set("A2", "=IFERROR(5,-1)");
    sheet.set("A3", "=IFERROR(5,Missing!A1+NOSUCH(1))");
    assert_eq!(sheet.value("A1"), Value::Number(-1.0));
    assert_eq!(sheet.value("A2"), Value::Number(5.0));
    assert_eq!(sheet.value("A3"), Value::Number(5.0));
}

#[test]
fn test_missing_sheet_is_a_per_cell_error() {
    let sheet = Sheet::new();
    sheet.set("B1", "=Nowhere!A1+A1");
    sheet.set("C1", "=A1*3");

    let report = sheet.set("A1", "2");
    assert_eq!(
        report.value(sheet.key("B1")),
        Some(&Value::Error(ErrorKind::Ref))
    );
    assert_eq!(report.value(sheet.key("C1")), Some(&Value::Number(6.0)));
}

#[test]
fn test_cross_sheet_dependents() {
    let store = MemoryStore::new();
    let main = store.add_sheet(WorkbookId(1), "Main");
    let rates = store.add_sheet(WorkbookId(1), "Rate Table");
    let engine = Engine::new(store);

    let rate = CellKey::new(rates, "B2".parse().unwrap());
    let total = CellKey::new(main, "C1".parse().unwrap());
    engine.set_cell(CellKey::new(main, "A1".parse().unwrap()), "200").unwrap();
    engine.set_cell(total, "=A1*'Rate Table'!B2").unwrap();

    let report = engine.set_cell(rate, "0,5").unwrap();
    assert_eq!(report.value(total), Some(&Value::Error(ErrorKind::Value)));

    let report = engine.set_cell(rate, "0.5").unwrap();
    assert_eq!(report.value(total), Some(&Value::Number(100.0)));
}

#[test]
fn test_semicolon_formulas() {
    let sheet = Sheet::new();
    sheet.set("A1", "4");
    sheet.set("B1", "=IF(A1>3;\"hi\";\"lo\")");
    sheet.set("C1", "=SUM(A1;0,5)");
    assert_eq!(sheet.value("B1"), Value::text("hi"));
    assert_eq!(sheet.value("C1"), Value::Number(4.5));
}

#[test]
fn test_concatenate_and_comparison() {
    let sheet = Sheet::new();
    sheet.set("A1", "Widget");
    sheet.set("A2", "3");
    sheet.set("B1", "=CONCATENATE(A1,\" x\",A2)");
    sheet.set("B2", "=A1&\"-\"&(A2>2)");
    assert_eq!(sheet.value("B1"), Value::text("Widget x3"));
    assert_eq!(sheet.value("B2"), Value::text("Widget-TRUE"));
}

#[test]
fn test_defined_names() {
    let options = RecalcOptions::new().with_name("Prices", "$A$1:$B$3");
    let sheet = Sheet::with_options(options);
    for (row, k, v) in [(1, "apple", "1.5"), (2, "pear", "2"), (3, "plum", "3")] {
        sheet.set(&format!("A{row}"), k);
        sheet.set(&format!("B{row}"), v);
    }
    sheet.set("D1", "=VLOOKUP(\"pear\",prices,2,FALSE)");
    assert_eq!(sheet.value("D1"), Value::Number(2.0));

    let report = sheet.set("B2", "9");
    assert_eq!(report.value(sheet.key("D1")), Some(&Value::Number(9.0)));
}

#[test]
fn test_formatted_values_in_report() {
    let sheet = Sheet::new();
    sheet.set("B1", "=A1/4");
    let report = sheet.set("A1", "10");
    let outcome = report.get(sheet.key("B1")).unwrap();
    assert_eq!(outcome.formatted_value, "2.5");
    assert_eq!(outcome.error, None);

    let report = sheet.set("A1", "0");
    let outcome = report.get(sheet.key("B1")).unwrap();
    assert_eq!(outcome.formatted_value, "0");

    sheet.set("C1", "=1/A1");
    let outcome = sheet.set("A1", "0").cells.into_iter().find(|c| c.key == sheet.key("C1")).unwrap();
    assert_eq!(outcome.formatted_value, "#DIV/0!");
    assert_eq!(outcome.error, Some(ErrorKind::DivideByZero));
}

#[test]
fn test_timeout_reports_unevaluated_cells() {
    let sheet = Sheet::with_options(RecalcOptions::new().with_timeout(Duration::ZERO));
    sheet.set("B1", "=A1+1");
    sheet.set("C1", "=B1+1");

    let report = sheet.set("A1", "1");
    assert!(report.timed_out);
    assert!(!report.is_complete());
    assert!(report.cells.is_empty());
    assert_eq!(report.not_evaluated, vec![sheet.key("B1"), sheet.key("C1")]);
}

#[test]
fn test_store_outage_aborts_the_request() {
    let sheet = Sheet::new();
    sheet.set("B1", "=A1+1");

    sheet.engine.store().set_available(false);
    let err = sheet.engine.set_cell(sheet.key("A1"), "1").unwrap_err();
    assert!(matches!(err, Error::Store(StoreError::Unavailable(_))));
    assert!(err.is_store_unavailable());

    sheet.engine.store().set_available(true);
    let report = sheet.set("A1", "1");
    assert_eq!(report.value(sheet.key("B1")), Some(&Value::Number(2.0)));
}

#[test]
fn test_recalculate_sheet_after_external_load() {
    let store = MemoryStore::new();
    let id = store.add_sheet(WorkbookId(1), "Imported");
    let key = |a1: &str| CellKey::new(id, a1.parse().unwrap());
    store.load([
        CellRecord::literal(key("A1"), 3.0),
        CellRecord::literal(key("A2"), 4.0),
        CellRecord::formula(key("B1"), "=SUM(A1:A2)"),
        CellRecord::formula(key("B2"), "=B1*B1"),
    ]);
    let engine = Engine::new(store);

    let report = engine.recalculate_sheet(id).unwrap();
    assert_eq!(report.keys(), vec![key("B1"), key("B2")]);
    assert_eq!(engine.store().value(key("B2")), Value::Number(49.0));

    // registered formulas now follow edits
    let report = engine.set_cell(key("A1"), "6").unwrap();
    assert_eq!(report.value(key("B2")), Some(&Value::Number(100.0)));
}

#[test]
fn test_clearing_a_cell() {
    let sheet = Sheet::new();
    sheet.set("A1", "8");
    sheet.set("B1", "=A1=0");
    let report = sheet.set("A1", "");
    assert_eq!(report.value(sheet.key("B1")), Some(&Value::Boolean(true)));
    assert_eq!(sheet.value("A1"), Value::Empty);
}
