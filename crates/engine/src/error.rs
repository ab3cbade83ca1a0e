//! Structural edit-time errors.
//!
//! These are raised synchronously by grid operations and are
//! all-or-nothing: a rejected edit leaves the grid unchanged.
//! Evaluation-time failures are *values* ([`crate::cell::CellValue::Error`]),
//! never raised through this type.

use thiserror::Error;

use crate::formula::FormulaParseError;
use crate::position::Position;

/// Errors raised by `set_cell` / `clear_cell` / `cell`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GridError {
    #[error("position {0} is outside the addressable domain")]
    InvalidPosition(Position),

    #[error("formula syntax error: {0}")]
    FormulaSyntax(#[from] FormulaParseError),

    #[error("setting cell {0} would create a circular dependency")]
    CircularDependency(Position),
}
