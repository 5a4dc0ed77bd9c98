//! Recalculation ordering.
//!
//! Given the cells that just changed and the reverse dependency map
//! (cell -> cells whose formulas read it), produce every transitive
//! dependent in an order where each cell comes after everything it reads.
//! Cells that sit on a cycle, or downstream of one, cannot be ordered and
//! are reported separately.

use std::collections::{HashMap, HashSet, VecDeque};

use super::{CellRef, Grid};

/// Reverse dependency map: cell -> cells that depend on it.
pub type Dependents = HashMap<CellRef, HashSet<CellRef>>;

#[derive(Debug, Default, PartialEq)]
pub struct RecalcPlan {
    /// Cells to evaluate, in order.
    pub order: Vec<CellRef>,
    /// Cells caught in (or fed by) a cycle.
    pub cyclic: Vec<CellRef>,
}

/// Build the reverse dependency map for every cell in the grid.
pub fn build_dependents(grid: &Grid) -> Dependents {
    let mut dependents = Dependents::new();
    for entry in grid.iter() {
        for dep in &entry.value().depends_on {
            dependents.entry(*dep).or_default().insert(*entry.key());
        }
    }
    dependents
}

/// Order the transitive dependents of `changed` for re-evaluation.
/// The changed cells themselves are included only if they are formulas
/// reachable from another changed cell.
pub fn recalc_order(changed: &[CellRef], dependents: &Dependents, grid: &Grid) -> RecalcPlan {
    let affected = transitive_dependents(changed, dependents);
    order_cells(&affected, grid)
}

/// Order every formula cell in the grid (used after a load or resize).
pub fn full_recalc_order(grid: &Grid) -> RecalcPlan {
    let formulas: HashSet<CellRef> = grid
        .iter()
        .filter(|entry| entry.value().is_formula())
        .map(|entry| *entry.key())
        .collect();
    order_cells(&formulas, grid)
}

fn transitive_dependents(changed: &[CellRef], dependents: &Dependents) -> HashSet<CellRef> {
    let mut affected = HashSet::new();
    let mut queue: VecDeque<CellRef> = changed.iter().copied().collect();
    while let Some(cell) = queue.pop_front() {
        if let Some(deps) = dependents.get(&cell) {
            for dep in deps {
                if affected.insert(*dep) {
                    queue.push_back(*dep);
                }
            }
        }
    }
    affected
}

/// Kahn's algorithm restricted to `cells`. Edges from cells outside the set
/// are already settled and do not count.
fn order_cells(cells: &HashSet<CellRef>, grid: &Grid) -> RecalcPlan {
    let mut indegree: HashMap<CellRef, usize> = HashMap::new();
    let mut readers: HashMap<CellRef, Vec<CellRef>> = HashMap::new();

    for cell in cells {
        let deps = grid
            .get(cell)
            .map(|entry| entry.depends_on.clone())
            .unwrap_or_default();
        let mut count = 0;
        for dep in deps {
            if cells.contains(&dep) {
                count += 1;
                readers.entry(dep).or_default().push(*cell);
            }
        }
        indegree.insert(*cell, count);
    }

    // Sorted start set keeps the order deterministic across runs.
    let mut ready: Vec<CellRef> = indegree
        .iter()
        .filter(|(_, n)| **n == 0)
        .map(|(c, _)| *c)
        .collect();
    ready.sort();
    let mut queue: VecDeque<CellRef> = ready.into();

    let mut order = Vec::with_capacity(cells.len());
    while let Some(cell) = queue.pop_front() {
        order.push(cell);
        if let Some(next) = readers.get(&cell) {
            for reader in next {
                if let Some(n) = indegree.get_mut(reader) {
                    *n -= 1;
                    if *n == 0 {
                        queue.push_back(*reader);
                    }
                }
            }
        }
    }

    let mut cyclic: Vec<CellRef> = indegree
        .into_iter()
        .filter(|(_, n)| *n > 0)
        .map(|(c, _)| c)
        .collect();
    cyclic.sort();
    if !cyclic.is_empty() {
        tracing::debug!(cyclic = cyclic.len(), ordered = order.len(), "dependency cycle blocks recalculation");
    }

    RecalcPlan { order, cyclic }
}
