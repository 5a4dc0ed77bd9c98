use serde::Deserialize;
use std::path::PathBuf;
use testsheet_engine::engine::{Cell, CellRef, Dependents, Grid, new_grid};

use crate::error::{Result, SheetError};

/// Maximum number of undo entries to keep
pub(crate) const MAX_UNDO_STACK: usize = 100;

/// How edits propagate to formulas that read the edited cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RecalcPolicy {
    /// Re-evaluate every transitive dependent in dependency order.
    #[default]
    Cascade,
    /// Only the edited cell is evaluated; dependents keep their old values
    /// until they are re-entered or `recalculate_all` runs.
    OnEntry,
}

/// Construction options for a [`Sheet`].
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SheetOptions {
    pub rows: usize,
    pub cols: usize,
    pub recalc: RecalcPolicy,
}

impl Default for SheetOptions {
    fn default() -> Self {
        SheetOptions {
            rows: 100,
            cols: 26,
            recalc: RecalcPolicy::Cascade,
        }
    }
}

/// One undoable single-cell change.
#[derive(Clone, Debug)]
pub struct UndoAction {
    pub cell_ref: CellRef,
    pub old_cell: Option<Cell>,
    pub new_cell: Option<Cell>,
}

/// The grid/sheet store: cells, bounds, and the bookkeeping that keeps
/// formula results current.
pub struct Sheet {
    /// Sparse cell storage (DashMap behind an Arc, clones are cheap)
    pub grid: Grid,
    pub(crate) rows: usize,
    pub(crate) cols: usize,
    pub recalc: RecalcPolicy,
    /// Reverse dependency map: cell -> formula cells that read it
    pub dependents: Dependents,
    /// File backing `save_file`, if any
    pub file_path: Option<PathBuf>,
    /// Whether the sheet changed since it was loaded or saved
    pub modified: bool,
    /// Bumped on every mutation; auto-save uses it to order writes.
    pub(crate) revision: u64,
    pub undo_stack: Vec<UndoAction>,
    pub redo_stack: Vec<UndoAction>,
}

impl Sheet {
    /// An empty `rows x cols` sheet with cascading recalculation.
    pub fn new(rows: usize, cols: usize) -> Self {
        Self::with_options(SheetOptions {
            rows,
            cols,
            ..SheetOptions::default()
        })
    }

    pub fn with_options(options: SheetOptions) -> Self {
        Sheet {
            grid: new_grid(),
            rows: options.rows,
            cols: options.cols,
            recalc: options.recalc,
            dependents: Dependents::new(),
            file_path: None,
            modified: false,
            revision: 0,
            undo_stack: Vec::new(),
            redo_stack: Vec::new(),
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Number of stored cells.
    pub fn len(&self) -> usize {
        self.grid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.grid.is_empty()
    }

    pub(crate) fn parse_address(address: &str) -> Result<CellRef> {
        CellRef::from_str(address.trim())
            .ok_or_else(|| SheetError::InvalidAddress(address.to_string()))
    }

    pub(crate) fn check_bounds(&self, cell_ref: &CellRef) -> Result<()> {
        if cell_ref.within(self.rows, self.cols) {
            Ok(())
        } else {
            Err(SheetError::OutOfBounds {
                address: cell_ref.to_string(),
                rows: self.rows,
                cols: self.cols,
            })
        }
    }

    pub(crate) fn touch(&mut self) {
        self.revision += 1;
        self.modified = true;
    }

    /// Drop `cell_ref`'s edges from the reverse dependency map.
    pub(crate) fn unlink(&mut self, cell_ref: &CellRef, depends_on: &[CellRef]) {
        for dep in depends_on {
            if let Some(readers) = self.dependents.get_mut(dep) {
                readers.remove(cell_ref);
                if readers.is_empty() {
                    self.dependents.remove(dep);
                }
            }
        }
    }

    /// Record that `cell_ref` reads each of `depends_on`.
    pub(crate) fn link(&mut self, cell_ref: &CellRef, depends_on: &[CellRef]) {
        for dep in depends_on {
            self.dependents.entry(*dep).or_default().insert(*cell_ref);
        }
    }
}

impl Default for Sheet {
    fn default() -> Self {
        Self::with_options(SheetOptions::default())
    }
}
