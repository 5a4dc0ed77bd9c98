//! Circular dependency detection for formula cells.
//!
//! A formula such as `A1 = B1`, `B1 = C1`, `C1 = A1` can never settle on a
//! value. Before a cell is evaluated we walk its `depends_on` edges
//! depth-first; revisiting a cell on the current path means a cycle.

use std::collections::HashSet;

use super::{CellRef, Grid};

/// Detect a cycle reachable from `start`.
/// Returns the path that closes the loop (first and last entries are the
/// same cell), or None.
pub fn detect_cycle(start: &CellRef, grid: &Grid) -> Option<Vec<CellRef>> {
    let mut on_path = HashSet::new();
    let mut finished = HashSet::new();
    let mut path = Vec::new();

    if visit(*start, grid, &mut on_path, &mut finished, &mut path) {
        Some(path)
    } else {
        None
    }
}

fn visit(
    current: CellRef,
    grid: &Grid,
    on_path: &mut HashSet<CellRef>,
    finished: &mut HashSet<CellRef>,
    path: &mut Vec<CellRef>,
) -> bool {
    if on_path.contains(&current) {
        // Trim the lead-in so the path starts where the loop starts.
        if let Some(pos) = path.iter().position(|c| *c == current) {
            path.drain(..pos);
        }
        path.push(current);
        return true;
    }
    if finished.contains(&current) {
        return false;
    }

    // Copy the edges out so no map guard is held while recursing.
    let deps = match grid.get(&current) {
        Some(entry) => entry.depends_on.clone(),
        None => return false,
    };

    on_path.insert(current);
    path.push(current);

    for dep in deps {
        if visit(dep, grid, on_path, finished, path) {
            return true;
        }
    }

    path.pop();
    on_path.remove(&current);
    finished.insert(current);
    false
}
