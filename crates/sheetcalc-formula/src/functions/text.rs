//! Text functions

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{Arg, Evaluator};
use sheetcalc_core::{ErrorKind, Value};

/// CONCATENATE / CONCAT
///
/// Joins the text of every argument; range arguments contribute their cells
/// row by row. The first error encountered is returned.
pub fn fn_concatenate(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let mut out = String::new();

    for arg in args {
        match ev.evaluate_arg(arg)? {
            Arg::Scalar(Value::Error(e)) => return Ok(Value::Error(e)),
            Arg::Scalar(value) => out.push_str(&value.to_text()),
            Arg::Range(values) => {
                for (_, value) in values.iter() {
                    if let Value::Error(e) = value {
                        return Ok(Value::Error(*e));
                    }
                    out.push_str(&value.to_text());
                }
            }
            Arg::Unresolved => return Ok(Value::Error(ErrorKind::Ref)),
        }
    }

    Ok(Value::Text(out))
}
