//! Math functions

use crate::ast::FormulaExpr;
use crate::error::FormulaResult;
use crate::evaluator::{finite, Arg, Evaluator};
use sheetcalc_core::{ErrorKind, Value};

/// SUM function
///
/// Ranges contribute their numeric cells only; scalar arguments are coerced
/// and skipped when they are not numeric. Error values are skipped too.
pub fn fn_sum(args: &[FormulaExpr], ev: &mut Evaluator<'_, '_>) -> FormulaResult<Value> {
    let mut total = 0.0;

    for arg in args {
        match ev.evaluate_arg(arg)? {
            Arg::Range(values) => {
                total += values
                    .iter()
                    .filter_map(|(_, v)| match v {
                        Value::Number(n) => Some(*n),
                        _ => None,
                    })
                    .sum::<f64>();
            }
            Arg::Scalar(value) => {
                if let Some(n) = value.as_number() {
                    total += n;
                }
            }
            Arg::Unresolved => return Ok(Value::Error(ErrorKind::Ref)),
        }
    }

    Ok(finite(total))
}

#[cfg(test)]
mod tests {
    use crate::evaluator::tests::{eval_in, key, SHEET};
    use crate::evaluator::MapResolver;
    use sheetcalc_core::{ErrorKind, Value};

    fn sheet() -> MapResolver {
        let mut cells = MapResolver::new().with_sheet("Sheet1", SHEET);
        cells.set(key("A1"), 1.0);
        cells.set(key("A2"), "text");
        cells.set(key("A3"), 3.0);
        cells.set(key("A4"), true);
        cells.set(key("A5"), ErrorKind::NotAvailable);
        cells.set(key("B1"), "5");
        cells
    }

    #[test]
    fn test_sum_range_counts_numbers_only() {
        assert_eq!(eval_in(&mut sheet(), "=SUM(A1:A10)"), Value::Number(4.0));
    }

    #[test]
    fn test_sum_scalars_are_coerced() {
        let mut cells = sheet();
        assert_eq!(eval_in(&mut cells, "=SUM(1,\"2\",TRUE)"), Value::Number(4.0));
        assert_eq!(eval_in(&mut cells, "=SUM(B1,A2,A1)"), Value::Number(6.0));
        assert_eq!(eval_in(&mut cells, "=SUM(\"x\",#N/A,2)"), Value::Number(2.0));
        assert_eq!(eval_in(&mut cells, "=SUM(A1:A3,10)"), Value::Number(14.0));
    }

    #[test]
    fn test_sum_of_nothing_is_zero() {
        assert_eq!(eval_in(&mut sheet(), "=SUM(Z1:Z100)"), Value::Number(0.0));
    }

    #[test]
    fn test_sum_over_missing_sheet() {
        assert_eq!(
            eval_in(&mut sheet(), "=SUM(Gone!A1:A3)"),
            Value::Error(ErrorKind::Ref)
        );
    }
}
