//! Cell coordinates and grid dimensions.
//!
//! A `Position` uniquely identifies a cell slot in the grid and is the
//! sole key used by the dependency graph. The addressable domain is
//! bounded: positions at or beyond `MAX_ROWS`/`MAX_COLS` are rejected by
//! every grid operation.

use serde::{Deserialize, Serialize};

/// Maximum number of addressable rows.
pub const MAX_ROWS: usize = 16_384;
/// Maximum number of addressable columns.
pub const MAX_COLS: usize = 16_384;

/// Zero-based (row, column) coordinate of a cell.
///
/// Ordered row-major so that sorted reference lists read top-to-bottom,
/// left-to-right.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Position {
    pub row: usize,
    pub col: usize,
}

impl Position {
    #[inline]
    pub fn new(row: usize, col: usize) -> Self {
        Self { row, col }
    }

    /// True if the position lies inside the fixed addressable domain.
    #[inline]
    pub fn is_valid(&self) -> bool {
        self.row < MAX_ROWS && self.col < MAX_COLS
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}", col_to_letters(self.col), self.row + 1)
    }
}

/// Dimensions of the printable area: `(1 + max row, 1 + max col)` over
/// non-empty cells, or `(0, 0)` for a blank grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub rows: usize,
    pub cols: usize,
}

impl Size {
    #[inline]
    pub fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }
}

/// Convert a 0-based column index to spreadsheet letters (0=A, 25=Z, 26=AA).
pub(crate) fn col_to_letters(col: usize) -> String {
    let mut result = String::new();
    let mut n = col;
    loop {
        result.insert(0, (b'A' + (n % 26) as u8) as char);
        if n < 26 {
            break;
        }
        n = n / 26 - 1;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validity_bounds() {
        assert!(Position::new(0, 0).is_valid());
        assert!(Position::new(MAX_ROWS - 1, MAX_COLS - 1).is_valid());
        assert!(!Position::new(MAX_ROWS, 0).is_valid());
        assert!(!Position::new(0, MAX_COLS).is_valid());
    }

    #[test]
    fn test_col_to_letters() {
        assert_eq!(col_to_letters(0), "A");
        assert_eq!(col_to_letters(25), "Z");
        assert_eq!(col_to_letters(26), "AA");
        assert_eq!(col_to_letters(27), "AB");
        assert_eq!(col_to_letters(701), "ZZ");
        assert_eq!(col_to_letters(702), "AAA");
    }

    #[test]
    fn test_display() {
        assert_eq!(Position::new(0, 0).to_string(), "A1");
        assert_eq!(Position::new(9, 26).to_string(), "AA10");
    }

    #[test]
    fn test_row_major_ordering() {
        let mut refs = vec![
            Position::new(1, 0),
            Position::new(0, 2),
            Position::new(0, 1),
        ];
        refs.sort();
        assert_eq!(
            refs,
            vec![
                Position::new(0, 1),
                Position::new(0, 2),
                Position::new(1, 0),
            ]
        );
    }
}
