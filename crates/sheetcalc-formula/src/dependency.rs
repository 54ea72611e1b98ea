//! Dependency tracking for formula calculation
//!
//! [`extract_references`] lists what a formula reads; [`DependencyGraph`]
//! keeps the forward edges (formula → referenced ranges) and the reverse
//! edges (cell → formulas reading it) in step. Multi-cell references are
//! stored once per formula as a rectangle and tested for containment, so a
//! `SUM(A:A)`-sized reference costs one entry, not a million.

use crate::ast::FormulaExpr;
use ahash::{AHashMap, AHashSet};
use sheetcalc_core::{CellAddress, CellKey, CellRange, SheetId, SheetRange};
use std::collections::{BTreeSet, VecDeque};

/// What a reference points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReferenceTarget {
    Cell(CellAddress),
    Range(CellRange),
}

/// A reference found in formula text, sheet not yet resolved
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Reference {
    /// Sheet name as written; `None` means the formula's own sheet
    pub sheet: Option<String>,
    pub target: ReferenceTarget,
}

impl Reference {
    /// The referenced cells as a range
    pub fn range(&self) -> CellRange {
        match self.target {
            ReferenceTarget::Cell(addr) => CellRange::single(addr),
            ReferenceTarget::Range(range) => range,
        }
    }

    /// Bind to a concrete sheet
    pub fn on(&self, sheet: SheetId) -> SheetRange {
        SheetRange::new(sheet, self.range())
    }
}

/// Every cell and range reference in an expression, first occurrence first
///
/// References are collected from every branch, including IF branches that
/// may never be evaluated.
pub fn extract_references(expr: &FormulaExpr) -> Vec<Reference> {
    let mut refs = Vec::new();
    collect_references(expr, &mut refs);
    refs
}

fn collect_references(expr: &FormulaExpr, refs: &mut Vec<Reference>) {
    let found = match expr {
        FormulaExpr::CellRef(r) => Reference {
            sheet: r.sheet.clone(),
            target: ReferenceTarget::Cell(r.address),
        },
        FormulaExpr::RangeRef(r) => Reference {
            sheet: r.sheet.clone(),
            target: ReferenceTarget::Range(r.range),
        },
        FormulaExpr::BinaryOp { left, right, .. } => {
            collect_references(left, refs);
            collect_references(right, refs);
            return;
        }
        FormulaExpr::UnaryOp { operand, .. } => {
            collect_references(operand, refs);
            return;
        }
        FormulaExpr::Function { args, .. } => {
            for arg in args {
                collect_references(arg, refs);
            }
            return;
        }
        _ => return,
    };
    if !refs.contains(&found) {
        refs.push(found);
    }
}

/// Dependency graph for formula cells
#[derive(Debug, Default, Clone)]
pub struct DependencyGraph {
    /// Formula cell → ranges it references
    precedents: AHashMap<CellKey, Vec<SheetRange>>,
    /// Cell → formulas referencing exactly that cell
    cell_dependents: AHashMap<CellKey, AHashSet<CellKey>>,
    /// Per sheet: multi-cell references and the formula holding each
    range_dependents: AHashMap<SheetId, Vec<(CellRange, CellKey)>>,
    /// Per sheet: addresses of registered formulas, ordered for range scans
    formulas: AHashMap<SheetId, BTreeSet<CellAddress>>,
}

impl DependencyGraph {
    /// Create a new empty dependency graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or re-register a formula with its references
    ///
    /// Only the difference to the previous reference set is applied: stale
    /// reverse edges are removed, new ones added.
    pub fn set_formula<I>(&mut self, cell: CellKey, references: I)
    where
        I: IntoIterator<Item = SheetRange>,
    {
        let mut new: Vec<SheetRange> = Vec::new();
        for r in references {
            if !new.contains(&r) {
                new.push(r);
            }
        }

        let old = self.precedents.remove(&cell).unwrap_or_default();
        for r in old.iter().filter(|r| !new.contains(r)) {
            self.unlink(cell, r);
        }
        for r in new.iter().filter(|r| !old.contains(r)) {
            self.link(cell, r);
        }

        self.precedents.insert(cell, new);
        self.formulas.entry(cell.sheet).or_default().insert(cell.addr);
    }

    /// Forget a formula; returns whether one was registered
    pub fn remove_formula(&mut self, cell: CellKey) -> bool {
        let Some(old) = self.precedents.remove(&cell) else {
            return false;
        };
        for r in &old {
            self.unlink(cell, r);
        }
        if let Some(addrs) = self.formulas.get_mut(&cell.sheet) {
            addrs.remove(&cell.addr);
        }
        true
    }

    fn link(&mut self, cell: CellKey, r: &SheetRange) {
        if r.range.is_single() {
            self.cell_dependents
                .entry(CellKey::new(r.sheet, r.range.start))
                .or_default()
                .insert(cell);
        } else {
            self.range_dependents
                .entry(r.sheet)
                .or_default()
                .push((r.range, cell));
        }
    }

    fn unlink(&mut self, cell: CellKey, r: &SheetRange) {
        if r.range.is_single() {
            let target = CellKey::new(r.sheet, r.range.start);
            if let Some(deps) = self.cell_dependents.get_mut(&target) {
                deps.remove(&cell);
                if deps.is_empty() {
                    self.cell_dependents.remove(&target);
                }
            }
        } else if let Some(ranges) = self.range_dependents.get_mut(&r.sheet) {
            ranges.retain(|(range, dep)| !(*range == r.range && *dep == cell));
        }
    }

    /// Check if a cell is a registered formula
    pub fn is_formula(&self, cell: CellKey) -> bool {
        self.precedents.contains_key(&cell)
    }

    /// Number of registered formulas
    pub fn formula_count(&self) -> usize {
        self.precedents.len()
    }

    /// Registered formulas of one sheet, in row-major order
    pub fn formulas_on(&self, sheet: SheetId) -> Vec<CellKey> {
        self.formulas
            .get(&sheet)
            .into_iter()
            .flatten()
            .map(|addr| CellKey::new(sheet, *addr))
            .collect()
    }

    /// References held by a formula cell
    pub fn precedents(&self, cell: CellKey) -> &[SheetRange] {
        self.precedents.get(&cell).map_or(&[], Vec::as_slice)
    }

    /// Formulas reading a cell directly or through a containing range, sorted
    pub fn dependents(&self, cell: CellKey) -> Vec<CellKey> {
        let mut out: Vec<CellKey> = self
            .cell_dependents
            .get(&cell)
            .into_iter()
            .flatten()
            .copied()
            .collect();
        if let Some(ranges) = self.range_dependents.get(&cell.sheet) {
            out.extend(
                ranges
                    .iter()
                    .filter(|(range, _)| range.contains(&cell.addr))
                    .map(|(_, dep)| *dep),
            );
        }
        out.sort_unstable();
        out.dedup();
        out
    }

    /// Every formula transitively depending on any of `seeds`
    ///
    /// A seed is part of the result only if it depends on itself through a
    /// cycle.
    pub fn closure(&self, seeds: &[CellKey]) -> AHashSet<CellKey> {
        let mut visited = AHashSet::new();
        let mut queue: VecDeque<CellKey> = seeds.iter().copied().collect();

        while let Some(cell) = queue.pop_front() {
            for dep in self.dependents(cell) {
                if visited.insert(dep) {
                    queue.push_back(dep);
                }
            }
        }

        visited
    }

    /// Order cells so that each comes after its in-set precedents
    ///
    /// A cell's depth is one more than the deepest in-set cell it reads
    /// (0 when it reads none); edges that close a cycle are ignored. Ties are
    /// broken by sheet, then row, then column.
    pub fn order(&self, cells: &AHashSet<CellKey>) -> Vec<CellKey> {
        let reads = self.reads_within(cells);

        let mut sorted: Vec<CellKey> = cells.iter().copied().collect();
        sorted.sort_unstable();

        let mut depth: AHashMap<CellKey, usize> = AHashMap::with_capacity(cells.len());
        let mut on_stack: AHashSet<CellKey> = AHashSet::new();

        for &root in &sorted {
            if depth.contains_key(&root) {
                continue;
            }
            // (cell, next precedent to visit, deepest depth seen so far + 1)
            let mut stack: Vec<(CellKey, usize, usize)> = vec![(root, 0, 0)];
            on_stack.insert(root);

            while let Some(frame) = stack.last_mut() {
                let (cell, next, best) = *frame;
                match reads[&cell].get(next) {
                    Some(&pre) => {
                        frame.1 += 1;
                        if let Some(&d) = depth.get(&pre) {
                            frame.2 = best.max(d + 1);
                        } else if !on_stack.contains(&pre) {
                            on_stack.insert(pre);
                            stack.push((pre, 0, 0));
                        }
                    }
                    None => {
                        stack.pop();
                        on_stack.remove(&cell);
                        depth.insert(cell, best);
                        if let Some(parent) = stack.last_mut() {
                            parent.2 = parent.2.max(best + 1);
                        }
                    }
                }
            }
        }

        sorted.sort_by_key(|c| (depth.get(c).copied().unwrap_or(0), *c));
        sorted
    }

    /// Cells of `cells` that lie on a cycle of references within `cells`
    ///
    /// A cell reading itself counts. Cells that merely read a cyclic cell do
    /// not.
    pub fn cyclic_cells(&self, cells: &AHashSet<CellKey>) -> AHashSet<CellKey> {
        let reads = self.reads_within(cells);
        let mut sorted: Vec<CellKey> = cells.iter().copied().collect();
        sorted.sort_unstable();

        // Tarjan's strongly connected components, with an explicit stack
        let mut index: AHashMap<CellKey, usize> = AHashMap::with_capacity(cells.len());
        let mut low: AHashMap<CellKey, usize> = AHashMap::with_capacity(cells.len());
        let mut component: Vec<CellKey> = Vec::new();
        let mut on_component: AHashSet<CellKey> = AHashSet::new();
        let mut cyclic = AHashSet::new();

        for &root in &sorted {
            if index.contains_key(&root) {
                continue;
            }
            let mut stack: Vec<(CellKey, usize)> = vec![(root, 0)];
            index.insert(root, index.len());
            low.insert(root, index[&root]);
            component.push(root);
            on_component.insert(root);

            while let Some(frame) = stack.last_mut() {
                let (cell, next) = *frame;
                match reads[&cell].get(next) {
                    Some(&pre) => {
                        frame.1 += 1;
                        if !index.contains_key(&pre) {
                            index.insert(pre, index.len());
                            low.insert(pre, index[&pre]);
                            component.push(pre);
                            on_component.insert(pre);
                            stack.push((pre, 0));
                        } else if on_component.contains(&pre) {
                            let lowest = low[&cell].min(index[&pre]);
                            low.insert(cell, lowest);
                        }
                    }
                    None => {
                        stack.pop();
                        let cell_low = low[&cell];
                        if let Some(&(parent, _)) = stack.last() {
                            let lowest = low[&parent].min(cell_low);
                            low.insert(parent, lowest);
                        }
                        if cell_low != index[&cell] {
                            continue;
                        }

                        let mut members = Vec::new();
                        while let Some(member) = component.pop() {
                            on_component.remove(&member);
                            members.push(member);
                            if member == cell {
                                break;
                            }
                        }
                        if members.len() > 1 || reads[&cell].contains(&cell) {
                            cyclic.extend(members);
                        }
                    }
                }
            }
        }

        cyclic
    }

    /// For each cell of `cells`, the cells of `cells` it reads
    fn reads_within(&self, cells: &AHashSet<CellKey>) -> AHashMap<CellKey, Vec<CellKey>> {
        let mut reads: AHashMap<CellKey, Vec<CellKey>> =
            cells.iter().map(|c| (*c, Vec::new())).collect();
        for &cell in cells {
            for dep in self.dependents(cell) {
                if let Some(list) = reads.get_mut(&dep) {
                    list.push(cell);
                }
            }
        }
        reads
    }

    /// Formula cells inside the ranges a formula references
    fn formula_precedents(&self, cell: CellKey) -> Vec<CellKey> {
        let mut out = Vec::new();
        for r in self.precedents(cell) {
            if let Some(addrs) = self.formulas.get(&r.sheet) {
                out.extend(
                    addrs
                        .range(r.range.start..=r.range.end)
                        .filter(|a| r.range.contains(a))
                        .map(|a| CellKey::new(r.sheet, *a)),
                );
            }
        }
        out
    }

    /// A cycle through `start`, following references forward
    ///
    /// Returns the cells of the cycle beginning with `start`, e.g. `[A1, B1]`
    /// for `A1 = B1`, `B1 = A1`.
    pub fn find_cycle(&self, start: CellKey) -> Option<Vec<CellKey>> {
        let mut visited = AHashSet::new();
        visited.insert(start);
        let mut stack: Vec<(CellKey, Vec<CellKey>, usize)> =
            vec![(start, self.formula_precedents(start), 0)];

        loop {
            let frame = stack.last_mut()?;
            let Some(&next) = frame.1.get(frame.2) else {
                stack.pop();
                continue;
            };
            frame.2 += 1;

            if next == start {
                return Some(stack.iter().map(|(cell, _, _)| *cell).collect());
            }
            if visited.insert(next) {
                let reads = self.formula_precedents(next);
                stack.push((next, reads, 0));
            }
        }
    }

    /// Check if a cell takes part in a circular reference
    pub fn has_circular_reference(&self, cell: CellKey) -> bool {
        self.find_cycle(cell).is_some()
    }

    /// Clear the entire graph
    pub fn clear(&mut self) {
        self.precedents.clear();
        self.cell_dependents.clear();
        self.range_dependents.clear();
        self.formulas.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use pretty_assertions::assert_eq;

    const S: SheetId = SheetId(1);

    fn key(a1: &str) -> CellKey {
        CellKey::new(S, CellAddress::parse(a1).unwrap())
    }

    fn refs(a1s: &[&str]) -> Vec<SheetRange> {
        a1s.iter()
            .map(|r| SheetRange::new(S, CellRange::parse(r).unwrap()))
            .collect()
    }

    fn set(graph: &mut DependencyGraph, cell: &str, formula: &str) {
        let expr = parse_formula(formula).unwrap();
        let ranges = extract_references(&expr).iter().map(|r| r.on(S)).collect::<Vec<_>>();
        graph.set_formula(key(cell), ranges);
    }

    #[test]
    fn test_extract_references() {
        let expr = parse_formula("=IF(A1>0,SUM(B1:B10),'Other Sheet'!C3)+A1").unwrap();
        let found = extract_references(&expr);
        assert_eq!(
            found,
            vec![
                Reference {
                    sheet: None,
                    target: ReferenceTarget::Cell(CellAddress::parse("A1").unwrap()),
                },
                Reference {
                    sheet: None,
                    target: ReferenceTarget::Range(CellRange::parse("B1:B10").unwrap()),
                },
                Reference {
                    sheet: Some("Other Sheet".into()),
                    target: ReferenceTarget::Cell(CellAddress::parse("C3").unwrap()),
                },
            ]
        );
        assert!(extract_references(&parse_formula("=1+2").unwrap()).is_empty());
    }

    #[test]
    fn test_a1_does_not_match_a10() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "B1", "=A10*2");

        assert!(graph.dependents(key("A1")).is_empty());
        assert_eq!(graph.dependents(key("A10")), vec![key("B1")]);
    }

    #[test]
    fn test_range_containment() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "C1", "=SUM(A1:A2)");
        set(&mut graph, "D1", "=A1");

        assert_eq!(graph.dependents(key("A1")), vec![key("C1"), key("D1")]);
        assert_eq!(graph.dependents(key("A2")), vec![key("C1")]);
        assert!(graph.dependents(key("A3")).is_empty());
        assert!(graph.dependents(CellKey::new(SheetId(2), CellAddress::parse("A1").unwrap())).is_empty());
    }

    #[test]
    fn test_set_formula_replaces_edges() {
        let mut graph = DependencyGraph::new();
        graph.set_formula(key("B1"), refs(&["A1", "C1:C5"]));
        graph.set_formula(key("B1"), refs(&["A2", "C1:C5"]));

        assert!(graph.dependents(key("A1")).is_empty());
        assert_eq!(graph.dependents(key("A2")), vec![key("B1")]);
        assert_eq!(graph.dependents(key("C3")), vec![key("B1")]);
        assert_eq!(graph.precedents(key("B1")), refs(&["A2", "C1:C5"]).as_slice());

        assert_eq!(graph.formulas_on(S), vec![key("B1")]);
        assert!(graph.remove_formula(key("B1")));
        assert!(!graph.remove_formula(key("B1")));
        assert!(graph.formulas_on(S).is_empty());
        assert!(graph.dependents(key("A2")).is_empty());
        assert!(graph.dependents(key("C3")).is_empty());
        assert_eq!(graph.formula_count(), 0);
    }

    #[test]
    fn test_closure_and_order() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "B1", "=A1+1");
        set(&mut graph, "C1", "=SUM(A1:A2)");
        set(&mut graph, "D1", "=B1*C1");
        set(&mut graph, "E1", "=Z1");

        let closure = graph.closure(&[key("A1")]);
        let expected: AHashSet<_> = [key("B1"), key("C1"), key("D1")].into_iter().collect();
        assert_eq!(closure, expected);

        let order = graph.order(&closure);
        assert_eq!(order, vec![key("B1"), key("C1"), key("D1")]);
    }

    #[test]
    fn test_order_respects_depth_over_position() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "A5", "=A1");
        set(&mut graph, "A2", "=A5+1");
        set(&mut graph, "A3", "=A2+A5");

        let closure = graph.closure(&[key("A1")]);
        assert_eq!(graph.order(&closure), vec![key("A5"), key("A2"), key("A3")]);
    }

    #[test]
    fn test_closure_terminates_on_cycles() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "A1", "=B1");
        set(&mut graph, "B1", "=A1");
        set(&mut graph, "C1", "=A1+1");

        let closure = graph.closure(&[key("A1")]);
        assert_eq!(closure.len(), 3);
        assert!(closure.contains(&key("A1")));

        let order = graph.order(&closure);
        assert_eq!(order.len(), 3);
        assert_eq!(order.last(), Some(&key("C1")));
    }

    #[test]
    fn test_find_cycle() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "A1", "=B1");
        set(&mut graph, "B1", "=SUM(A1:A3)");
        set(&mut graph, "C1", "=A1");
        set(&mut graph, "D1", "=D1+1");

        assert_eq!(graph.find_cycle(key("A1")), Some(vec![key("A1"), key("B1")]));
        assert_eq!(graph.find_cycle(key("C1")), None);
        assert_eq!(graph.find_cycle(key("D1")), Some(vec![key("D1")]));
        assert!(graph.has_circular_reference(key("B1")));
        assert!(!graph.has_circular_reference(key("Z9")));
    }

    #[test]
    fn test_cyclic_cells() {
        let mut graph = DependencyGraph::new();
        set(&mut graph, "A1", "=B1");
        set(&mut graph, "B1", "=SUM(A1:A3)");
        set(&mut graph, "C1", "=A1");
        set(&mut graph, "D1", "=D1+1");
        set(&mut graph, "E1", "=C1+D1");

        let all: AHashSet<CellKey> = ["A1", "B1", "C1", "D1", "E1"].into_iter().map(key).collect();
        let mut cyclic: Vec<_> = graph.cyclic_cells(&all).into_iter().collect();
        cyclic.sort_unstable();
        assert_eq!(cyclic, vec![key("A1"), key("B1"), key("D1")]);

        // Edges leaving the set do not count
        let partial: AHashSet<CellKey> = [key("A1"), key("C1")].into_iter().collect();
        assert!(graph.cyclic_cells(&partial).is_empty());
    }

    #[test]
    fn test_long_ring_is_found_without_recursion() {
        let mut graph = DependencyGraph::new();
        let n = 20_000;
        for r in 2..=n {
            set(&mut graph, &format!("A{r}"), &format!("=A{}+1", r - 1));
        }
        set(&mut graph, "A1", &format!("=A{n}"));
        set(&mut graph, "B1", "=A1");

        let closure = graph.closure(&[key("A1")]);
        assert_eq!(closure.len(), n as usize + 1);
        let cyclic = graph.cyclic_cells(&closure);
        assert_eq!(cyclic.len(), n as usize);
        assert!(!cyclic.contains(&key("B1")));

        let order = graph.order(&closure);
        assert_eq!(order.len(), closure.len());
    }
}
