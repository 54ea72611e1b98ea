//! Logical functions

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::Evaluator;
use sheetcalc_core::Value;

/// IF function
///
/// Only the selected branch is evaluated. Without an else branch a false
/// condition yields FALSE.
pub fn fn_if(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let condition = ev.evaluate(&args[0])?;
    if condition.is_error() {
        return Ok(condition);
    }

    if condition.is_truthy() {
        ev.evaluate(&args[1])
    } else {
        match args.get(2) {
            Some(if_false) => ev.evaluate(if_false),
            None => Ok(Value::Boolean(false)),
        }
    }
}

/// IFERROR function
///
/// The fallback is only evaluated when the value is an error.
pub fn fn_iferror(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let value = ev.evaluate(&args[0])?;
    if value.is_error() {
        ev.evaluate(&args[1])
    } else {
        Ok(value)
    }
}
