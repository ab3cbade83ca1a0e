//! Dependency graph for formula cells.
//!
//! Tracks precedents (cells a formula reads from) and dependents (cells
//! whose formulas read a given cell) for cycle rejection at edit time and
//! transitive cache invalidation.
//!
//! # Edge Direction
//!
//! ```text
//! A → B  means  "B depends on A"  (A is a precedent of B)
//! ```
//!
//! Edges are `Position` keys, never cell references: removing a cell
//! cannot leave anything dangling.

use rustc_hash::{FxHashMap, FxHashSet};

use crate::position::Position;

/// Persistent dependency graph over grid positions.
///
/// Maintains bidirectional adjacency for O(1) lookups:
/// - `preds[B]` = positions that B's formula reads (precedents)
/// - `succs[A]` = positions whose formulas read A (dependents)
///
/// # Invariants
///
/// 1. **Bidirectional consistency:** If A ∈ preds[B] then B ∈ succs[A], and vice versa.
/// 2. **No dangling entries:** Empty sets are removed, not stored.
/// 3. **No duplicate edges:** Set semantics enforced by FxHashSet.
/// 4. **Atomic updates:** `replace_edges` is the only mutator that touches both maps.
/// 5. **Acyclicity:** every committed edge set passed `would_create_cycle`.
#[derive(Default, Debug, Clone)]
pub struct DepGraph {
    /// Precedents: for each formula cell B, the positions A it reads.
    preds: FxHashMap<Position, FxHashSet<Position>>,

    /// Dependents: for each referenced position A, the formula cells B
    /// that read it.
    succs: FxHashMap<Position, FxHashSet<Position>>,
}

impl DepGraph {
    /// Create an empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Positions this formula cell reads (incoming edges).
    pub fn precedents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.preds
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// Positions whose formulas read this cell (outgoing edges).
    pub fn dependents(&self, cell: Position) -> impl Iterator<Item = Position> + '_ {
        self.succs
            .get(&cell)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    /// True if this position has formula edges tracked in the graph.
    pub fn is_formula_cell(&self, cell: Position) -> bool {
        self.preds.contains_key(&cell)
    }

    /// Replace all edges for a formula cell atomically.
    ///
    /// This is the primary mutation API. It:
    /// 1. Removes the cell from all its old precedents' successor sets
    /// 2. Clears the cell's precedent set
    /// 3. Adds the cell to all new precedents' successor sets
    /// 4. Sets the cell's new precedent set
    ///
    /// Pass an empty set to clear all outward edges for this cell.
    /// Incoming edges (other formulas reading this position) are
    /// untouched: they belong to those formulas.
    pub fn replace_edges(&mut self, formula_cell: Position, new_preds: FxHashSet<Position>) {
        // Step 1: Remove old edges
        if let Some(old_preds) = self.preds.remove(&formula_cell) {
            for pred in old_preds {
                if let Some(deps) = self.succs.get_mut(&pred) {
                    deps.remove(&formula_cell);
                    // Clean up empty entries (invariant: no dangling)
                    if deps.is_empty() {
                        self.succs.remove(&pred);
                    }
                }
            }
        }

        // Step 2: If no new precedents, we're done (cell is not a formula or has no refs)
        if new_preds.is_empty() {
            return;
        }

        // Step 3: Add new edges
        for pred in &new_preds {
            self.succs.entry(*pred).or_default().insert(formula_cell);
        }

        // Step 4: Store new precedents
        self.preds.insert(formula_cell, new_preds);
    }

    /// Retire a removed cell's outward edge registrations.
    ///
    /// Convenience wrapper around `replace_edges` with an empty set.
    /// Must run before the grid releases the cell at this position.
    pub fn clear_cell(&mut self, cell: Position) {
        self.replace_edges(cell, FxHashSet::default());
    }

    /// Would committing `proposed` as `edited`'s precedent set close a
    /// cycle?
    ///
    /// Depth-first walk over the *prospective* graph: `edited` contributes
    /// its proposed references, every other position its committed ones.
    /// Two marker sets do different jobs: `on_path` flags the current DFS
    /// spine (revisit = cycle), `visited` flags fully explored positions
    /// (revisit = shared ancestor in a DAG, legal). Positions without
    /// committed edges (absent cells, Empty/Text cells, formulas with no
    /// references) are leaves.
    ///
    /// Iterative (explicit frame stack) so pathological dependency chains
    /// cannot exhaust the call stack. O(V+E) over the reachable subgraph.
    pub fn would_create_cycle(&self, edited: Position, proposed: &[Position]) -> bool {
        struct DfsFrame {
            pos: Position,
            children: Vec<Position>,
            next_idx: usize,
        }

        let children_of = |pos: Position| -> Vec<Position> {
            if pos == edited {
                proposed.to_vec()
            } else {
                self.precedents(pos).collect()
            }
        };

        let mut on_path: FxHashSet<Position> = FxHashSet::default();
        let mut visited: FxHashSet<Position> = FxHashSet::default();

        on_path.insert(edited);
        let mut stack = vec![DfsFrame {
            pos: edited,
            children: children_of(edited),
            next_idx: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            if frame.next_idx < frame.children.len() {
                let child = frame.children[frame.next_idx];
                frame.next_idx += 1;

                if on_path.contains(&child) {
                    return true;
                }
                if visited.contains(&child) {
                    continue;
                }

                on_path.insert(child);
                stack.push(DfsFrame {
                    pos: child,
                    children: children_of(child),
                    next_idx: 0,
                });
            } else {
                // All children explored - retire the frame off the path.
                let finished = stack.pop().unwrap();
                on_path.remove(&finished.pos);
                visited.insert(finished.pos);
            }
        }

        false
    }
}
