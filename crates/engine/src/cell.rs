use serde::{Deserialize, Serialize};

use crate::formula::{Formula, FormulaError, FormulaParseError};
use crate::grid::Grid;
use crate::position::Position;

/// Marker that classifies input as a formula (`"=A1+1"`).
pub const FORMULA_MARKER: char = '=';
/// Leading marker that keeps text literal in `value()` (`"'=not a formula"`).
/// Affects only `value()`; `text()` returns the stored text verbatim.
pub const ESCAPE_MARKER: char = '\'';

/// Cell content: a closed sum type, matched exhaustively everywhere.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub enum CellContent {
    #[default]
    Empty,
    Text(String),
    #[serde(skip)]
    Formula(Formula),
}

/// Result of evaluating a cell.
///
/// Evaluation-time failures travel inside this type as
/// [`CellValue::Error`]; they are never raised to the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Error(FormulaError),
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Text(s) => f.write_str(s),
            CellValue::Number(n) => write!(f, "{}", n),
            CellValue::Error(e) => write!(f, "{}", e),
        }
    }
}

/// One grid slot: content plus a memoized numeric cache.
///
/// The cache slot is interior-mutable so that `value()` can memoize
/// behind a shared borrow. Retrieval stays referentially transparent to
/// callers: the result cannot change until the next invalidating edit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cell {
    content: CellContent,
    #[serde(skip)]
    cache: std::cell::Cell<Option<f64>>,
}

impl Cell {
    /// An `Empty` cell, as materialized when the grid grows over a position.
    pub fn new() -> Self {
        Self::default()
    }

    /// Classify raw input into content.
    ///
    /// Empty string → `Empty`; `'='` followed by at least one character →
    /// `Formula` (marker stripped, remainder parsed); anything else,
    /// including a lone `"="`, → `Text`. A parse failure surfaces here,
    /// before the cell ever reaches a grid.
    pub fn from_input(input: &str) -> Result<Self, FormulaParseError> {
        let content = if input.is_empty() {
            CellContent::Empty
        } else if input.len() > 1 && input.starts_with(FORMULA_MARKER) {
            CellContent::Formula(Formula::parse(&input[1..])?)
        } else {
            CellContent::Text(input.to_string())
        };
        Ok(Self {
            content,
            cache: std::cell::Cell::new(None),
        })
    }

    pub fn content(&self) -> &CellContent {
        &self.content
    }

    pub fn is_formula(&self) -> bool {
        matches!(self.content, CellContent::Formula(_))
    }

    /// True if `text()` is non-empty. `Empty` is the only content kind
    /// with empty text: blank input classifies as `Empty`, never `Text("")`.
    pub fn has_text(&self) -> bool {
        !matches!(self.content, CellContent::Empty)
    }

    /// Current value, memoized.
    ///
    /// A cached number short-circuits everything. Empty/Text derive their
    /// value without touching the formula engine. A numeric formula
    /// result is cached; an error result is re-derived on every call:
    /// it may depend on neighbors that change independently of this
    /// cell's own edits.
    pub fn value(&self, grid: &Grid) -> CellValue {
        if let Some(n) = self.cache.get() {
            return CellValue::Number(n);
        }

        match &self.content {
            CellContent::Empty => CellValue::Text(String::new()),
            CellContent::Text(s) => {
                let stripped = s.strip_prefix(ESCAPE_MARKER).unwrap_or(s);
                CellValue::Text(stripped.to_string())
            }
            CellContent::Formula(formula) => match formula.evaluate(grid) {
                Ok(n) => {
                    self.cache.set(Some(n));
                    CellValue::Number(n)
                }
                Err(e) => CellValue::Error(e),
            },
        }
    }

    /// Display text: empty for `Empty`, raw stored text for `Text`
    /// (escape marker included), `'='` + canonical expression for
    /// `Formula`.
    pub fn text(&self) -> String {
        match &self.content {
            CellContent::Empty => String::new(),
            CellContent::Text(s) => s.clone(),
            CellContent::Formula(formula) => format!("{}{}", FORMULA_MARKER, formula.expression()),
        }
    }

    /// Positions this cell's formula reads from: ascending-sorted,
    /// duplicate-free; empty for Empty/Text.
    pub fn referenced_cells(&self) -> &[Position] {
        match &self.content {
            CellContent::Formula(formula) => formula.referenced_cells(),
            CellContent::Empty | CellContent::Text(_) => &[],
        }
    }

    pub fn has_cache(&self) -> bool {
        self.cache.get().is_some()
    }

    pub fn set_cache(&self, value: f64) {
        self.cache.set(Some(value));
    }

    pub fn clear_cache(&self) {
        self.cache.set(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    #[test]
    fn test_classification() {
        assert_eq!(Cell::from_input("").unwrap().content(), &CellContent::Empty);
        assert!(matches!(
            Cell::from_input("hello").unwrap().content(),
            CellContent::Text(_)
        ));
        assert!(Cell::from_input("=1+2").unwrap().is_formula());
        // A lone marker is text, not an (empty) formula.
        assert!(matches!(
            Cell::from_input("=").unwrap().content(),
            CellContent::Text(s) if s == "="
        ));
    }

    #[test]
    fn test_formula_parse_failure_surfaces() {
        assert!(Cell::from_input("=1+").is_err());
        assert!(Cell::from_input("=)(").is_err());
    }

    #[test]
    fn test_text_value_and_text() {
        let grid = Grid::new();
        let cell = Cell::from_input("plain").unwrap();
        assert_eq!(cell.value(&grid), CellValue::Text("plain".to_string()));
        assert_eq!(cell.text(), "plain");
    }

    #[test]
    fn test_escape_marker_strips_in_value_only() {
        let grid = Grid::new();
        let cell = Cell::from_input("'=5").unwrap();
        assert_eq!(cell.value(&grid), CellValue::Text("=5".to_string()));
        assert_eq!(cell.text(), "'=5");
    }

    #[test]
    fn test_empty_value() {
        let grid = Grid::new();
        let cell = Cell::new();
        assert_eq!(cell.value(&grid), CellValue::Text(String::new()));
        assert_eq!(cell.text(), "");
        assert!(!cell.has_text());
    }

    #[test]
    fn test_formula_text_is_canonical() {
        let cell = Cell::from_input("= 1 + 2*3 ").unwrap();
        assert_eq!(cell.text(), "=1+2*3");
    }

    #[test]
    fn test_constant_formula_value_is_cached() {
        let grid = Grid::new();
        let cell = Cell::from_input("=2*21").unwrap();
        assert!(!cell.has_cache());
        assert_eq!(cell.value(&grid), CellValue::Number(42.0));
        assert!(cell.has_cache());
    }

    #[test]
    fn test_error_value_is_not_cached() {
        let grid = Grid::new();
        let cell = Cell::from_input("=1/0").unwrap();
        assert_eq!(
            cell.value(&grid),
            CellValue::Error(FormulaError::Arithmetic)
        );
        assert!(!cell.has_cache());
    }

    #[test]
    fn test_referenced_cells() {
        let cell = Cell::from_input("=B1+A1+B1").unwrap();
        assert_eq!(
            cell.referenced_cells(),
            &[Position::new(0, 0), Position::new(0, 1)]
        );
        assert!(Cell::from_input("text").unwrap().referenced_cells().is_empty());
    }
}
