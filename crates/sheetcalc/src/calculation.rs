//! Recalculation engine
//!
//! Keeps a dependency graph of every formula it has seen and, for each
//! request, recomputes exactly the formulas that transitively depend on the
//! cells the request names.
//!
//! A request runs in four steps while holding the lock of every sheet it
//! touches:
//! 1. **Seed** - the edited (or listed) cells
//! 2. **Closure** - every formula reachable through reverse edges
//! 3. **Order** - closure cells sorted by dependency depth
//! 4. **Evaluate** - each cell in order, persisting its result
//!
//! # Example
//!
//! ```rust
//! use sheetcalc::prelude::*;
//!
//! let store = MemoryStore::new();
//! let sheet = store.add_sheet(WorkbookId(1), "Sheet1");
//! let engine = Engine::new(store);
//!
//! let a1 = CellKey::new(sheet, "A1".parse().unwrap());
//! let b1 = CellKey::new(sheet, "B1".parse().unwrap());
//! engine.set_cell(b1, "=A1*2").unwrap();
//!
//! let report = engine.set_cell(a1, "21").unwrap();
//! assert_eq!(report.value(b1), Some(&Value::Number(42.0)));
//! ```

use crate::config::RecalcOptions;
use crate::context::EvaluationContext;
use crate::error::Result;
use crate::locks::{SheetGuard, SheetLocks};
use crate::report::{CellOutcome, DependencyReport, RecalcReport};
use crate::request::{BatchRequest, CellInput, RecalcRequest};
use ahash::{AHashMap, AHashSet};
use sheetcalc_core::{CellKey, CellStore, FormulaCell, SheetId, SheetRange, Value};
use sheetcalc_formula::{CompiledFormula, DependencyGraph};
use std::collections::BTreeSet;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Instant;
use tracing::{debug, info, warn};

/// Formulas known to the engine and the edges between them
///
/// `graph` and `formulas` always hold the same set of cells.
#[derive(Debug, Default)]
struct Registry {
    graph: DependencyGraph,
    formulas: AHashMap<CellKey, Arc<CompiledFormula>>,
}

impl Registry {
    fn insert(&mut self, key: CellKey, formula: Arc<CompiledFormula>, references: Vec<SheetRange>) {
        self.graph.set_formula(key, references);
        self.formulas.insert(key, formula);
    }

    fn remove(&mut self, key: CellKey) {
        self.graph.remove_formula(key);
        self.formulas.remove(&key);
    }
}

/// An edit that has been parsed and bound but not written yet
enum Staged {
    Literal(Value),
    Formula {
        formula: Arc<CompiledFormula>,
        references: Vec<SheetRange>,
    },
}

/// The work one request has to do, read from the registry under its locks
struct Plan {
    order: Vec<CellKey>,
    formulas: AHashMap<CellKey, Arc<CompiledFormula>>,
    references: AHashMap<CellKey, Vec<SheetRange>>,
    /// Cells on a reference cycle within the closure
    cyclic: AHashSet<CellKey>,
}

/// Dependency-driven recalculation over a [`CellStore`]
pub struct Engine<S: CellStore> {
    store: S,
    options: RecalcOptions,
    registry: RwLock<Registry>,
    locks: SheetLocks,
}

impl<S: CellStore> Engine<S> {
    /// Create an engine with default options
    pub fn new(store: S) -> Self {
        Self::with_options(store, RecalcOptions::default())
    }

    pub fn with_options(store: S, options: RecalcOptions) -> Self {
        Self {
            store,
            options,
            registry: RwLock::new(Registry::default()),
            locks: SheetLocks::new(),
        }
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn options(&self) -> &RecalcOptions {
        &self.options
    }

    /// Number of formulas in the dependency graph
    pub fn formula_count(&self) -> usize {
        self.read_registry().graph.formula_count()
    }

    // === Requests ===

    /// Register every formula stored on a sheet
    ///
    /// Edits only propagate to formulas the engine knows about, so a sheet
    /// filled by an external loader must be registered before it is edited.
    /// Returns the number of formulas registered.
    pub fn load_sheet(&self, sheet: SheetId) -> Result<usize> {
        let records = self.store.formula_cells(sheet)?;

        let mut staged = Vec::with_capacity(records.len());
        for record in &records {
            let Some(source) = record.cell.formula_text() else {
                continue;
            };
            let formula = Arc::new(self.compile(source));
            let references = self.bind(record.key, &formula)?;
            staged.push((record.key, formula, references));
        }

        let mut sheets: BTreeSet<SheetId> = staged
            .iter()
            .flat_map(|(_, _, refs)| refs.iter().map(|r| r.sheet))
            .collect();
        sheets.insert(sheet);
        let _guard = self.locks.acquire(&sheets);

        let mut registry = self.write_registry();
        let stale: Vec<CellKey> = registry
            .graph
            .formulas_on(sheet)
            .into_iter()
            .filter(|key| !staged.iter().any(|(k, _, _)| k == key))
            .collect();
        for key in stale {
            registry.remove(key);
        }
        let count = staged.len();
        for (key, formula, references) in staged {
            registry.insert(key, formula, references);
        }

        info!(sheet = %sheet, formulas = count, "sheet loaded");
        Ok(count)
    }

    /// Write one cell and recalculate everything depending on it
    ///
    /// The report covers the edited cell when it holds a formula, followed by
    /// its dependents.
    pub fn apply_edit(&self, request: RecalcRequest) -> Result<RecalcReport> {
        let started = Instant::now();
        let key = request.key();

        let staged = match request.input {
            CellInput::Value(value) => Staged::Literal(value),
            CellInput::Formula(source) => {
                let formula = Arc::new(self.compile(&source));
                let references = self.bind(key, &formula)?;
                Staged::Formula { formula, references }
            }
        };

        let mut sheets = BTreeSet::from([key.sheet]);
        if let Staged::Formula { references, .. } = &staged {
            sheets.extend(references.iter().map(|r| r.sheet));
        }

        let _guard = self.lock_closure(&[key], sheets);
        self.commit(key, staged)?;
        self.run(&[key], started)
    }

    /// Shorthand for [`apply_edit`](Self::apply_edit) with typed-in text
    pub fn set_cell(&self, key: CellKey, input: &str) -> Result<RecalcReport> {
        self.apply_edit(RecalcRequest::new(key.sheet, key.addr, CellInput::parse(input)))
    }

    /// Recalculate the dependents of several cells at once
    ///
    /// Listed cells holding formulas are recalculated themselves too.
    pub fn recalculate(&self, request: BatchRequest) -> Result<RecalcReport> {
        let started = Instant::now();
        let seeds = request.keys();
        let sheets = seeds.iter().map(|k| k.sheet).collect();

        let _guard = self.lock_closure(&seeds, sheets);
        self.run(&seeds, started)
    }

    /// Reload and recalculate every formula on a sheet
    pub fn recalculate_sheet(&self, sheet: SheetId) -> Result<RecalcReport> {
        self.load_sheet(sheet)?;
        let formulas = self.read_registry().graph.formulas_on(sheet);
        self.recalculate(BatchRequest::new(sheet, formulas.into_iter().map(|k| k.addr)))
    }

    /// Describe a cell's place in the dependency graph
    pub fn inspect(&self, cell: CellKey) -> DependencyReport {
        let registry = self.read_registry();
        let graph = &registry.graph;
        let closure = graph.closure(&[cell]);

        DependencyReport {
            cell,
            precedents: graph.precedents(cell).to_vec(),
            dependents: graph.dependents(cell),
            recalc_order: graph.order(&closure),
            cycle: graph.find_cycle(cell),
        }
    }

    // === Steps ===

    fn compile(&self, source: &str) -> CompiledFormula {
        CompiledFormula::compile(source, &self.options.defined_names)
    }

    /// Resolve a formula's references to concrete sheets
    ///
    /// References to sheets that do not exist get no edge; they evaluate to
    /// `#REF!`.
    fn bind(&self, key: CellKey, formula: &CompiledFormula) -> Result<Vec<SheetRange>> {
        let mut workbook = None;
        let mut bound = Vec::with_capacity(formula.references().len());

        for reference in formula.references() {
            let sheet = match &reference.sheet {
                None => Some(key.sheet),
                Some(name) => {
                    if workbook.is_none() {
                        workbook = Some(self.store.sheet(key.sheet)?.map(|info| info.workbook));
                    }
                    match workbook.flatten() {
                        Some(wb) => self.store.resolve_sheet_id(wb, name)?,
                        None => None,
                    }
                }
            };
            match sheet {
                Some(sheet) => bound.push(reference.on(sheet)),
                None => debug!(cell = %key, sheet = ?reference.sheet, "reference to unknown sheet"),
            }
        }

        Ok(bound)
    }

    /// Sheets a request seeded with `seeds` reads or writes
    fn touched_sheets(&self, seeds: &[CellKey]) -> BTreeSet<SheetId> {
        let registry = self.read_registry();
        let graph = &registry.graph;

        let mut cells = graph.closure(seeds);
        cells.extend(seeds.iter().copied());

        let mut sheets = BTreeSet::new();
        for cell in &cells {
            sheets.insert(cell.sheet);
            sheets.extend(graph.precedents(*cell).iter().map(|r| r.sheet));
        }
        sheets
    }

    /// Lock every sheet the closure of `seeds` touches
    ///
    /// The closure can only be computed from the graph, and the graph can
    /// change until the locks are held, so the set is rechecked after each
    /// acquisition and widened until it no longer grows.
    fn lock_closure(&self, seeds: &[CellKey], mut sheets: BTreeSet<SheetId>) -> SheetGuard<'_> {
        loop {
            let guard = self.locks.acquire(&sheets);
            let needed = self.touched_sheets(seeds);
            if guard.covers(&needed) {
                return guard;
            }
            drop(guard);
            debug!(sheets = ?needed, "widening sheet locks");
            sheets.extend(needed);
        }
    }

    /// Persist an edit and bring the graph in line with it
    fn commit(&self, key: CellKey, staged: Staged) -> Result<()> {
        match staged {
            Staged::Literal(value) => {
                self.store.put_value(key, value)?;
                self.write_registry().remove(key);
            }
            Staged::Formula {
                formula,
                references,
            } => {
                let cell = FormulaCell::new(formula.source()).with_references(references.clone());
                self.store.put_formula(key, cell)?;
                self.write_registry().insert(key, formula, references);
            }
        }
        Ok(())
    }

    fn plan(&self, seeds: &[CellKey]) -> Plan {
        let registry = self.read_registry();
        let graph = &registry.graph;

        let mut cells = graph.closure(seeds);
        cells.extend(seeds.iter().copied().filter(|k| graph.is_formula(*k)));

        let order: Vec<CellKey> = graph
            .order(&cells)
            .into_iter()
            .filter(|k| registry.formulas.contains_key(k))
            .collect();
        let formulas = order
            .iter()
            .filter_map(|k| registry.formulas.get(k).map(|f| (*k, Arc::clone(f))))
            .collect();
        let references = order
            .iter()
            .map(|k| (*k, graph.precedents(*k).to_vec()))
            .collect();
        let cyclic = graph.cyclic_cells(&cells);

        Plan {
            order,
            formulas,
            references,
            cyclic,
        }
    }

    /// Evaluate the closure of `seeds` and persist every result
    fn run(&self, seeds: &[CellKey], started: Instant) -> Result<RecalcReport> {
        let mut plan = self.plan(seeds);
        debug!(seeds = seeds.len(), cells = plan.order.len(), order = ?plan.order, "recalculation order");

        let deadline = self.options.timeout.map(|timeout| started + timeout);
        let mut ctx = EvaluationContext::new(&self.store, std::mem::take(&mut plan.formulas));
        ctx.mark_cyclic(plan.cyclic.drain());
        let mut report = RecalcReport::default();

        for (i, &key) in plan.order.iter().enumerate() {
            if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
                warn!(
                    evaluated = i,
                    remaining = plan.order.len() - i,
                    "recalculation timed out"
                );
                report.timed_out = true;
                report.not_evaluated = plan.order[i..].to_vec();
                break;
            }

            let value = ctx.evaluate(key)?;
            let Some(formula) = ctx.formula(key) else {
                continue;
            };
            let cell = FormulaCell::new(formula.source())
                .with_result(value.clone())
                .with_references(plan.references.remove(&key).unwrap_or_default());
            self.store.put_formula(key, cell)?;

            report.cells.push(CellOutcome::new(key, value));
        }

        let cyclic = ctx.cyclic_cells();
        if !cyclic.is_empty() {
            warn!(count = cyclic.len(), cells = ?cyclic, "circular reference");
        }

        report.elapsed = started.elapsed();
        info!(
            cells = report.cells.len(),
            errors = report.error_count(),
            timed_out = report.timed_out,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "recalculation complete"
        );
        Ok(report)
    }

    fn read_registry(&self) -> RwLockReadGuard<'_, Registry> {
        self.registry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_registry(&self) -> RwLockWriteGuard<'_, Registry> {
        self.registry.write().unwrap_or_else(PoisonError::into_inner)
    }
}
