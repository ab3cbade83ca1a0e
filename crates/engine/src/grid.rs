//! Cell ownership and the edit pipeline.
//!
//! The grid owns every cell, keyed by position in a rectangular
//! row-major array. Edits flow validate → cycle check → invalidate →
//! rewire → install, with all fallible steps before the first mutation:
//! a rejected edit leaves the grid exactly as it was.

use std::io::{self, Write};

use rustc_hash::FxHashSet;

use crate::cell::{Cell, CellValue};
use crate::dep_graph::DepGraph;
use crate::error::GridError;
use crate::formula::eval::CellValueSource;
use crate::position::{Position, Size};

/// A dynamically sized grid of cells with lazy formula evaluation.
///
/// Extents grow monotonically under edits to cover every touched
/// position, and shrink only on `clear_cell`, down to the printable
/// bounding box. Every row always has the same width.
#[derive(Debug, Default, Clone)]
pub struct Grid {
    /// Row-major slots. `None` = never entered (or cleared).
    cells: Vec<Vec<Option<Cell>>>,
    /// Width of every row in `cells`.
    width: usize,
    /// Forward/backward reference edges, keyed by position.
    deps: DepGraph,
}

impl Grid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cell at `pos` from raw input text.
    ///
    /// Classification, formula parsing and the cycle check all run
    /// against a candidate cell before any grid state changes; on any
    /// error the grid is untouched. On success the previous occupant's
    /// observers are invalidated, its outgoing edges are replaced by the
    /// candidate's, and extents grow to cover `pos` and every referenced
    /// position (materializing Empty cells at referenced slots).
    pub fn set_cell(&mut self, pos: Position, text: &str) -> Result<(), GridError> {
        if !pos.is_valid() {
            return Err(GridError::InvalidPosition(pos));
        }

        let new_cell = Cell::from_input(text)?;
        let new_refs = new_cell.referenced_cells().to_vec();
        if new_cell.is_formula() && self.deps.would_create_cycle(pos, &new_refs) {
            return Err(GridError::CircularDependency(pos));
        }

        // Commit point - nothing below can fail.

        // Whatever observed the old content may hold a stale number now.
        self.invalidate_dependents(pos);

        self.grow_to_cover(pos);
        for &reference in &new_refs {
            self.grow_to_cover(reference);
            let slot = &mut self.cells[reference.row][reference.col];
            if slot.is_none() {
                *slot = Some(Cell::new());
            }
        }

        // One atomic swap of pos's outgoing edges: old registrations out,
        // new ones in. Incoming edges (cells reading `pos`) are untouched
        // and keep pointing at the replacement cell.
        let new_preds: FxHashSet<Position> = new_refs.iter().copied().collect();
        self.deps.replace_edges(pos, new_preds);

        self.cells[pos.row][pos.col] = Some(new_cell);
        Ok(())
    }

    /// Release the cell at `pos`, shrinking extents to the printable
    /// bounding box when it contracts.
    ///
    /// Clearing an absent position is a no-op. The removed cell's
    /// outward edge registrations are retired *before* the slot is
    /// released; edges pointing at `pos` from surviving formulas remain
    /// (lookups for `pos` simply report absent from then on).
    pub fn clear_cell(&mut self, pos: Position) -> Result<(), GridError> {
        if !pos.is_valid() {
            return Err(GridError::InvalidPosition(pos));
        }

        let size_before = self.printable_size();
        if pos.row >= size_before.rows || pos.col >= size_before.cols {
            return Ok(());
        }
        if self.cells[pos.row][pos.col].is_none() {
            return Ok(());
        }

        self.invalidate_dependents(pos);
        self.deps.clear_cell(pos);
        self.cells[pos.row][pos.col] = None;

        let size_after = self.printable_size();
        if size_after.rows != size_before.rows {
            self.cells.truncate(size_after.rows);
        }
        if size_after.cols != size_before.cols {
            self.width = size_after.cols;
            for row in &mut self.cells {
                row.truncate(size_after.cols);
            }
        }
        Ok(())
    }

    /// Look up the cell at `pos`.
    ///
    /// `Ok(None)` means the position is addressable but was never
    /// entered (outside the printable area, or a released slot) - a
    /// valid outcome, not an error.
    pub fn cell(&self, pos: Position) -> Result<Option<&Cell>, GridError> {
        if !pos.is_valid() {
            return Err(GridError::InvalidPosition(pos));
        }
        let size = self.printable_size();
        if pos.row >= size.rows || pos.col >= size.cols {
            return Ok(None);
        }
        Ok(self.cells[pos.row][pos.col].as_ref())
    }

    /// Mutable form of [`Grid::cell`].
    pub fn cell_mut(&mut self, pos: Position) -> Result<Option<&mut Cell>, GridError> {
        if !pos.is_valid() {
            return Err(GridError::InvalidPosition(pos));
        }
        let size = self.printable_size();
        if pos.row >= size.rows || pos.col >= size.cols {
            return Ok(None);
        }
        Ok(self.cells[pos.row][pos.col].as_mut())
    }

    /// Bounding box over all cells with non-empty display text,
    /// anchored at (0, 0). `(0, 0)` for a blank grid.
    ///
    /// Scans from the highest row/column downward so each dimension is
    /// settled by the first populated slot encountered. Recomputed per
    /// call; callers looping over the area should hoist it.
    pub fn printable_size(&self) -> Size {
        let mut size = Size::default();
        for (row_idx, row) in self.cells.iter().enumerate().rev() {
            if let Some(col_idx) = row
                .iter()
                .rposition(|slot| slot.as_ref().is_some_and(Cell::has_text))
            {
                size.rows = size.rows.max(row_idx + 1);
                size.cols = size.cols.max(col_idx + 1);
            }
        }
        size
    }

    /// Dump evaluated values over the printable area: tab-separated
    /// columns, one line per row, absent cells rendered empty.
    pub fn print_values<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cells[row][col].as_ref() {
                    write!(out, "{}", cell.value(self))?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Dump display texts over the printable area, same shape as
    /// [`Grid::print_values`].
    pub fn print_texts<W: Write>(&self, out: &mut W) -> io::Result<()> {
        let size = self.printable_size();
        for row in 0..size.rows {
            for col in 0..size.cols {
                if col > 0 {
                    out.write_all(b"\t")?;
                }
                if let Some(cell) = self.cells[row][col].as_ref() {
                    out.write_all(cell.text().as_bytes())?;
                }
            }
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    /// Raw slot access by extent, ignoring the printable area. Used by
    /// the edit pipeline and by formula evaluation, where a backing
    /// Empty cell and an absent slot must both be reachable.
    fn slot(&self, pos: Position) -> Option<&Cell> {
        self.cells.get(pos.row)?.get(pos.col)?.as_ref()
    }

    /// Grow extents (never shrinking) so `pos` is an in-extent slot.
    fn grow_to_cover(&mut self, pos: Position) {
        if pos.col >= self.width {
            self.width = pos.col + 1;
            for row in &mut self.cells {
                row.resize_with(self.width, || None);
            }
        }
        if pos.row >= self.cells.len() {
            let width = self.width;
            self.cells
                .resize_with(pos.row + 1, || (0..width).map(|_| None).collect());
        }
    }

    /// Transitively drop the memoized values of everything that depends
    /// on `pos`, directly or through other formulas.
    ///
    /// A dependent whose cache is already empty terminates that branch:
    /// anything further out was invalidated when that cache was first
    /// cleared, or never evaluated at all. Nothing is recomputed here.
    fn invalidate_dependents(&self, pos: Position) {
        let mut work = vec![pos];
        while let Some(current) = work.pop() {
            for dependent in self.deps.dependents(current) {
                if let Some(cell) = self.slot(dependent) {
                    if cell.has_cache() {
                        cell.clear_cache();
                        work.push(dependent);
                    }
                }
            }
        }
    }

    #[cfg(test)]
    pub(crate) fn extents(&self) -> (usize, usize) {
        (self.cells.len(), self.width)
    }

    #[cfg(test)]
    pub(crate) fn dep_graph(&self) -> &DepGraph {
        &self.deps
    }
}

impl CellValueSource for Grid {
    fn cell_value(&self, pos: Position) -> Option<CellValue> {
        self.slot(pos).map(|cell| cell.value(self))
    }
}
