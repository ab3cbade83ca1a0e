// Formula evaluator - evaluates the AST against a cell value provider.
//
// Evaluation is mutually recursive with the grid: reading a referenced
// cell re-enters the grid, which may evaluate another formula, and so on.
// Acyclicity of the committed reference graph bounds the recursion.

use crate::cell::CellValue;
use crate::position::Position;

use super::FormulaError;
use super::parser::{Expr, Op, UnaryOp};

/// Resolves a position to the current value of the cell there.
///
/// `None` means "no cell at this position" (never entered, or beyond the
/// grid's current extents); the evaluator coerces that to 0.
pub trait CellValueSource {
    fn cell_value(&self, pos: Position) -> Option<CellValue>;
}

/// Evaluate an expression. A `FormulaError` is produced as a value and
/// contaminates every enclosing expression.
pub fn evaluate<S: CellValueSource>(expr: &Expr, source: &S) -> Result<f64, FormulaError> {
    match expr {
        // A literal can already be non-finite: an overlong digit run
        // parses to infinity.
        Expr::Number(n) if n.is_finite() => Ok(*n),
        Expr::Number(_) => Err(FormulaError::Arithmetic),
        Expr::Ref(pos) => resolve_ref(*pos, source),
        Expr::Unary { op, operand } => {
            let v = evaluate(operand, source)?;
            Ok(match op {
                UnaryOp::Plus => v,
                UnaryOp::Minus => -v,
            })
        }
        Expr::Binary { op, left, right } => {
            let lhs = evaluate(left, source)?;
            let rhs = evaluate(right, source)?;
            let result = match op {
                Op::Add => lhs + rhs,
                Op::Sub => lhs - rhs,
                Op::Mul => lhs * rhs,
                Op::Div => {
                    if rhs == 0.0 {
                        return Err(FormulaError::Arithmetic);
                    }
                    lhs / rhs
                }
            };
            if !result.is_finite() {
                return Err(FormulaError::Arithmetic);
            }
            Ok(result)
        }
    }
}

/// Coerce a referenced cell's value to a number.
///
/// Absent cells and empty text read as 0; numeric text reads as its
/// parse; any other text is a `#VALUE!`; an errored cell propagates its
/// own error unchanged.
fn resolve_ref<S: CellValueSource>(pos: Position, source: &S) -> Result<f64, FormulaError> {
    if !pos.is_valid() {
        return Err(FormulaError::Ref);
    }
    match source.cell_value(pos) {
        None => Ok(0.0),
        Some(CellValue::Number(n)) => Ok(n),
        Some(CellValue::Text(s)) => {
            if s.is_empty() {
                Ok(0.0)
            } else {
                // "inf"/"1e999" parse, but a non-finite operand is not
                // a usable number.
                match s.parse::<f64>() {
                    Ok(n) if n.is_finite() => Ok(n),
                    _ => Err(FormulaError::Value),
                }
            }
        }
        Some(CellValue::Error(e)) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use rustc_hash::FxHashMap;

    use super::*;
    use crate::formula::parser::parse;

    /// Fixed position → value table standing in for a grid.
    #[derive(Default)]
    struct TableSource {
        values: FxHashMap<Position, CellValue>,
    }

    impl TableSource {
        fn with(mut self, pos: Position, value: CellValue) -> Self {
            self.values.insert(pos, value);
            self
        }
    }

    impl CellValueSource for TableSource {
        fn cell_value(&self, pos: Position) -> Option<CellValue> {
            self.values.get(&pos).cloned()
        }
    }

    fn eval(input: &str, source: &TableSource) -> Result<f64, FormulaError> {
        evaluate(&parse(input).unwrap(), source)
    }

    #[test]
    fn test_arithmetic() {
        let s = TableSource::default();
        assert_eq!(eval("1+2*3", &s), Ok(7.0));
        assert_eq!(eval("(1+2)*3", &s), Ok(9.0));
        assert_eq!(eval("10-4/2", &s), Ok(8.0));
        assert_eq!(eval("-3+5", &s), Ok(2.0));
        assert_eq!(eval("--4", &s), Ok(4.0));
    }

    #[test]
    fn test_division_by_zero() {
        let s = TableSource::default();
        assert_eq!(eval("1/0", &s), Err(FormulaError::Arithmetic));
        assert_eq!(eval("0/0", &s), Err(FormulaError::Arithmetic));
        assert_eq!(eval("1/(2-2)", &s), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_overflowing_literal_is_arithmetic_error() {
        let s = TableSource::default();
        let huge = "9".repeat(400);
        assert_eq!(eval(&huge, &s), Err(FormulaError::Arithmetic));
        assert_eq!(eval(&format!("-{}", huge), &s), Err(FormulaError::Arithmetic));
        assert_eq!(eval(&format!("{}+1", huge), &s), Err(FormulaError::Arithmetic));
    }

    #[test]
    fn test_non_finite_text_is_value_error() {
        let s = TableSource::default()
            .with(Position::new(0, 0), CellValue::Text("inf".to_string()))
            .with(Position::new(0, 1), CellValue::Text("1e999".to_string()));
        assert_eq!(eval("A1+1", &s), Err(FormulaError::Value));
        assert_eq!(eval("B1+1", &s), Err(FormulaError::Value));
    }

    #[test]
    fn test_ref_coercion() {
        let a1 = Position::new(0, 0);
        let b1 = Position::new(0, 1);
        let c1 = Position::new(0, 2);
        let s = TableSource::default()
            .with(a1, CellValue::Number(2.5))
            .with(b1, CellValue::Text("4".to_string()))
            .with(c1, CellValue::Text(String::new()));

        assert_eq!(eval("A1*2", &s), Ok(5.0));
        assert_eq!(eval("B1+1", &s), Ok(5.0));
        // Empty text and absent cells both read as zero.
        assert_eq!(eval("C1+1", &s), Ok(1.0));
        assert_eq!(eval("Z99+1", &s), Ok(1.0));
    }

    #[test]
    fn test_non_numeric_text_is_value_error() {
        let s = TableSource::default()
            .with(Position::new(0, 0), CellValue::Text("hello".to_string()));
        assert_eq!(eval("A1+1", &s), Err(FormulaError::Value));
    }

    #[test]
    fn test_error_contaminates_expression() {
        let s = TableSource::default()
            .with(Position::new(0, 0), CellValue::Error(FormulaError::Ref));
        assert_eq!(eval("A1+1", &s), Err(FormulaError::Ref));
        assert_eq!(eval("2*A1", &s), Err(FormulaError::Ref));
    }
}
