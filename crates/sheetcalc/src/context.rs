//! Per-request evaluation state
//!
//! An [`EvaluationContext`] lives for exactly one recalculation request. It
//! caches every value computed during the request, evaluates closure cells on
//! demand when another formula reads them before their turn, and records the
//! cells found to sit on a circular reference. Cells known to be cyclic up
//! front are never evaluated, so a cycle costs no nesting however long it is.
//! Nothing in it outlives the request: a later request evaluates cycles afresh.

use ahash::{AHashMap, AHashSet};
use sheetcalc_core::{CellKey, CellStore, ErrorKind, SheetId, SheetRange, StoreResult, Value};
use sheetcalc_formula::{
    CompiledFormula, EvalPath, FormulaError, FormulaResult, RangeValues, ReferenceResolver,
};
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// Deepest chain of on-demand evaluations before a read is treated as circular
const MAX_NESTING: usize = 128;

/// Evaluation state for one recalculation request
pub struct EvaluationContext<'s, S: ?Sized> {
    store: &'s S,
    /// Formulas of the closure
    formulas: AHashMap<CellKey, Arc<CompiledFormula>>,
    /// Closure cells not evaluated yet
    pending: AHashSet<CellKey>,
    /// Results computed during this request
    cache: AHashMap<CellKey, Value>,
    /// Cells found on a circular reference
    cyclic: AHashSet<CellKey>,
    /// Sheet names resolved so far, keyed by the referring sheet
    sheets: AHashMap<(SheetId, String), Option<SheetId>>,
}

impl<'s, S: CellStore + ?Sized> EvaluationContext<'s, S> {
    /// Context for evaluating `formulas`; all of them start out pending
    pub fn new(store: &'s S, formulas: AHashMap<CellKey, Arc<CompiledFormula>>) -> Self {
        Self {
            store,
            pending: formulas.keys().copied().collect(),
            formulas,
            cache: AHashMap::new(),
            cyclic: AHashSet::new(),
            sheets: AHashMap::new(),
        }
    }

    /// Treat `cells` as circular without evaluating them
    pub fn mark_cyclic(&mut self, cells: impl IntoIterator<Item = CellKey>) {
        self.cyclic.extend(cells);
    }

    /// Compiled formula of a closure cell
    pub fn formula(&self, key: CellKey) -> Option<&Arc<CompiledFormula>> {
        self.formulas.get(&key)
    }

    /// Value of a closure cell, evaluating it if no other formula has yet
    ///
    /// Only a store failure is an error; anything else the formula runs into
    /// is part of its value.
    pub fn evaluate(&mut self, key: CellKey) -> StoreResult<Value> {
        match self.cell_value(key, &EvalPath::root()) {
            Ok(value) => Ok(value),
            Err(FormulaError::Store(e)) => Err(e),
            Err(FormulaError::Parse(message)) => {
                warn!(cell = %key, error = %message, "formula failed during evaluation");
                let value = Value::Error(ErrorKind::FormulaSyntax);
                self.cache.insert(key, value.clone());
                Ok(value)
            }
        }
    }

    /// Check if a cell was found on a circular reference
    pub fn is_cyclic(&self, key: CellKey) -> bool {
        self.cyclic.contains(&key)
    }

    /// Cells found on circular references so far, sorted
    pub fn cyclic_cells(&self) -> Vec<CellKey> {
        let mut cells: Vec<_> = self.cyclic.iter().copied().collect();
        cells.sort_unstable();
        cells
    }

    fn evaluate_formula(&mut self, key: CellKey, path: &EvalPath<'_>) -> FormulaResult<Value> {
        self.pending.remove(&key);
        if self.cyclic.contains(&key) {
            let circular = Value::Error(ErrorKind::CircularReference);
            self.cache.insert(key, circular.clone());
            return Ok(circular);
        }
        let Some(formula) = self.formulas.get(&key).map(Arc::clone) else {
            return self.stored_value(key);
        };

        let inner = path.push(key);
        let mut value = formula.evaluate(self, key.sheet, inner)?;
        if self.cyclic.contains(&key) {
            value = Value::Error(ErrorKind::CircularReference);
        }
        trace!(cell = %key, value = %value.to_text(), depth = inner.depth(), "evaluated");

        self.cache.insert(key, value.clone());
        Ok(value)
    }

    fn stored_value(&self, key: CellKey) -> FormulaResult<Value> {
        Ok(self
            .store
            .get_cell(key)?
            .map(|record| record.value().clone())
            .unwrap_or_default())
    }

    /// Mark every cell on the path from the innermost one back to `key`
    fn mark_cycle(&mut self, key: CellKey, path: &EvalPath<'_>) {
        for cell in path.iter() {
            self.cyclic.insert(cell);
            if cell == key {
                break;
            }
        }
        debug!(cell = %key, length = path.depth(), "circular reference");
    }

    fn is_live(&self, key: &CellKey, path: &EvalPath<'_>) -> bool {
        self.cache.contains_key(key) || self.pending.contains(key) || path.contains(key)
    }
}

impl<S: CellStore + ?Sized> ReferenceResolver for EvaluationContext<'_, S> {
    fn cell_value(&mut self, key: CellKey, path: &EvalPath<'_>) -> FormulaResult<Value> {
        if let Some(value) = self.cache.get(&key) {
            return Ok(value.clone());
        }
        if path.contains(&key) {
            self.mark_cycle(key, path);
            return Ok(Value::Error(ErrorKind::CircularReference));
        }
        if self.pending.contains(&key) {
            if path.depth() >= MAX_NESTING {
                debug!(cell = %key, depth = MAX_NESTING, "evaluation nested too deeply");
                return Ok(Value::Error(ErrorKind::CircularReference));
            }
            return self.evaluate_formula(key, path);
        }
        self.stored_value(key)
    }

    fn range_values(&mut self, range: SheetRange, path: &EvalPath<'_>) -> FormulaResult<RangeValues> {
        let records = self.store.get_range(range)?;
        let mut cells = Vec::with_capacity(records.len());
        for record in records {
            let value = if self.is_live(&record.key, path) {
                self.cell_value(record.key, path)?
            } else {
                record.value().clone()
            };
            cells.push((record.key.addr, value));
        }
        Ok(RangeValues::new(range.range, cells))
    }

    fn sheet_id(&mut self, from: SheetId, name: &str) -> FormulaResult<Option<SheetId>> {
        let cache_key = (from, name.to_uppercase());
        if let Some(resolved) = self.sheets.get(&cache_key) {
            return Ok(*resolved);
        }

        let resolved = match self.store.sheet(from)? {
            Some(info) => self.store.resolve_sheet_id(info.workbook, name)?,
            None => None,
        };
        if resolved.is_none() {
            debug!(sheet = %from, name = %name, "unknown sheet");
        }
        self.sheets.insert(cache_key, resolved);
        Ok(resolved)
    }
}
