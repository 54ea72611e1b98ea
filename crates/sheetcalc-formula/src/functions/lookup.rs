//! Lookup functions
//!
//! Both lookups scan in stored order. Approximate matching assumes sorted
//! input and does not check it: on unsorted data the answer is whatever the
//! scan stops at.

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{to_number, Evaluator};
use sheetcalc_core::{CellAddress, ErrorKind, Value};
use std::cmp::Ordering;

/// VLOOKUP(lookup, table, col_index, [range_lookup])
///
/// Approximate matching is the default. Only a fourth argument of `FALSE` or
/// `0` asks for an exact match; an empty cell or text leaves it approximate.
pub fn fn_vlookup(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let lookup = ev.evaluate(&args[0])?;

    let table = match ev.evaluate_range(&args[1])? {
        Ok(table) => table,
        Err(e) => return Ok(Value::Error(e)),
    };

    let col_index = match to_number(&ev.evaluate(&args[2])?) {
        Ok(n) => n.trunc(),
        Err(e) => return Ok(Value::Error(e)),
    };
    if col_index < 1.0 {
        return Ok(Value::Error(ErrorKind::Value));
    }
    if col_index > f64::from(table.width()) {
        return Ok(Value::Error(ErrorKind::Ref));
    }

    let exact = match args.get(3) {
        Some(arg) => {
            let flag = ev.evaluate(arg)?;
            if let Some(e) = flag.error() {
                return Ok(Value::Error(e));
            }
            matches!(flag, Value::Boolean(false)) || matches!(flag, Value::Number(n) if n == 0.0)
        }
        None => false,
    };

    let key_col = table.range().start.col;
    let keys = table.column(key_col);
    let found = if exact {
        keys.filter(|(_, key)| key.lookup_eq(&lookup))
            .map(|(addr, _)| addr)
            .next()
    } else {
        approximate(keys, &lookup, Ordering::Greater)
    };

    Ok(match found {
        Some(addr) => table
            .get(CellAddress {
                row: addr.row,
                col: key_col + col_index as u32 - 1,
            })
            .clone(),
        None => Value::Error(ErrorKind::NotAvailable),
    })
}

/// MATCH(lookup, range, [match_type])
///
/// Returns the 1-based position within the range, counted row by row.
/// Match type 0 is exact, positive (the default) finds the largest value not
/// above the lookup in ascending data, negative the smallest value not below
/// it in descending data.
pub fn fn_match(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let lookup = ev.evaluate(&args[0])?;

    let range = match ev.evaluate_range(&args[1])? {
        Ok(range) => range,
        Err(e) => return Ok(Value::Error(e)),
    };

    let match_type = match args.get(2) {
        Some(arg) => match to_number(&ev.evaluate(arg)?) {
            Ok(n) => n,
            Err(e) => return Ok(Value::Error(e)),
        },
        None => 1.0,
    };

    let found = if match_type == 0.0 {
        range
            .iter()
            .find(|(_, v)| v.lookup_eq(&lookup))
            .map(|(addr, _)| addr)
    } else if match_type > 0.0 {
        approximate(range.iter(), &lookup, Ordering::Greater)
    } else {
        approximate(range.iter(), &lookup, Ordering::Less)
    };

    Ok(found
        .and_then(|addr| range.position(addr))
        .map(|pos| Value::Number(pos as f64))
        .unwrap_or(Value::Error(ErrorKind::NotAvailable)))
}

/// Linear scan for approximate matches
///
/// Remembers the last candidate that is not on the `stop` side of the lookup
/// and stops at the first one that is. Values that cannot be ordered against
/// the lookup (other types, empties, errors) are skipped.
fn approximate<'a>(
    candidates: impl Iterator<Item = (CellAddress, &'a Value)>,
    lookup: &Value,
    stop: Ordering,
) -> Option<CellAddress> {
    let mut best = None;
    for (addr, value) in candidates {
        match value.lookup_cmp(lookup) {
            None => continue,
            Some(ord) if ord == stop => break,
            Some(_) => best = Some(addr),
        }
    }
    best
}
