//! Formula engine with a deliberately narrow contract.
//!
//! The rest of the crate interacts with formulas through exactly four
//! operations: [`Formula::parse`], [`Formula::evaluate`],
//! [`Formula::referenced_cells`] and [`Formula::expression`]. Everything
//! else (tokens, AST shape, printing) is internal.

pub mod eval;
pub mod parser;

use thiserror::Error;

use crate::position::Position;
use eval::CellValueSource;
use parser::Expr;

/// Malformed expression text. Raised at parse time, before any grid
/// state is touched.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{0}")]
pub struct FormulaParseError(pub String);

/// Runtime evaluation error. This is a *value* a formula can produce,
/// not an error raised to callers; it propagates through any expression
/// that reads an errored cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormulaError {
    /// Reference to a cell that cannot be read.
    Ref,
    /// An operand could not be coerced to a number.
    Value,
    /// Division by zero or a non-finite intermediate result.
    Arithmetic,
}

impl std::fmt::Display for FormulaError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FormulaError::Ref => "#REF!",
            FormulaError::Value => "#VALUE!",
            FormulaError::Arithmetic => "#ARITHM!",
        };
        f.write_str(s)
    }
}

/// A parsed formula: opaque handle over the expression AST plus the
/// pre-computed reference list.
#[derive(Debug, Clone, PartialEq)]
pub struct Formula {
    expr: Expr,
    /// Ascending-sorted, duplicate-free. Computed once at parse time.
    refs: Vec<Position>,
}

impl Formula {
    /// Parse expression text (without the leading `=` marker).
    pub fn parse(text: &str) -> Result<Formula, FormulaParseError> {
        let expr = parser::parse(text)?;
        let mut refs = Vec::new();
        expr.collect_refs(&mut refs);
        refs.sort();
        refs.dedup();
        Ok(Formula { expr, refs })
    }

    /// Evaluate against a cell value provider. The `Err` variant is the
    /// in-band number-or-error pair of the contract, not a grid error.
    pub fn evaluate<S: CellValueSource>(&self, source: &S) -> Result<f64, FormulaError> {
        eval::evaluate(&self.expr, source)
    }

    /// Positions the expression names, ascending-sorted and duplicate-free.
    pub fn referenced_cells(&self) -> &[Position] {
        &self.refs
    }

    /// Canonical expression text: round-trips the parsed intent with
    /// minimal parentheses, not necessarily byte-identical to the input.
    pub fn expression(&self) -> String {
        self.expr.to_canonical()
    }
}
