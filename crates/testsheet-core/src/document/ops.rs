use super::{Sheet, UndoAction};
use crate::error::{Result, SheetError};
use testsheet_engine::engine::{Cell, CellRange, CellRef, CellStyle};

impl Sheet {
    /// Store raw input at an A1 address. See [`Sheet::set_cell_at`].
    pub fn set_cell(&mut self, address: &str, raw: &str) -> Result<()> {
        let cell_ref = Sheet::parse_address(address)?;
        self.set_cell_at(cell_ref, raw)
    }

    /// Store raw input at a cell.
    ///
    /// The input is classified from scratch; formulas are evaluated
    /// immediately and keep their text in `formula`, everything else is
    /// stored as a typed scalar. The cell's style survives the edit.
    /// Evaluation errors land on the cell, not in the returned `Result`.
    pub fn set_cell_at(&mut self, cell_ref: CellRef, raw: &str) -> Result<()> {
        self.check_bounds(&cell_ref)?;

        let old_cell = self.grid.get(&cell_ref).map(|r| r.clone());
        let mut cell = Cell::from_input(raw);
        cell.style = old_cell.as_ref().and_then(|c| c.style.clone());

        self.push_undo(cell_ref, old_cell, Some(cell.clone()));
        self.write_cell(cell_ref, Some(cell));
        Ok(())
    }

    /// Look up the cell at an A1 address. Invalid addresses and addresses
    /// with nothing stored both yield None.
    pub fn get_cell(&self, address: &str) -> Option<Cell> {
        let cell_ref = Sheet::parse_address(address).ok()?;
        self.get_cell_at(&cell_ref)
    }

    pub fn get_cell_at(&self, cell_ref: &CellRef) -> Option<Cell> {
        self.grid.get(cell_ref).map(|r| r.clone())
    }

    /// Cells of the rectangle spanned by two corners, row-major. Addresses
    /// with nothing stored come back as blank cells.
    pub fn get_range(&self, top_left: &str, bottom_right: &str) -> Result<Vec<Cell>> {
        let range = CellRange::new(
            Sheet::parse_address(top_left)?,
            Sheet::parse_address(bottom_right)?,
        );
        self.get_range_at(&range)
    }

    pub fn get_range_at(&self, range: &CellRange) -> Result<Vec<Cell>> {
        self.check_bounds(&range.start)?;
        self.check_bounds(&range.end)?;
        Ok(range
            .cells()
            .map(|cell_ref| self.get_cell_at(&cell_ref).unwrap_or_else(Cell::blank))
            .collect())
    }

    /// Remove the cell at an address. Returns whether anything was stored.
    pub fn clear_cell(&mut self, address: &str) -> Result<bool> {
        let cell_ref = Sheet::parse_address(address)?;
        Ok(self.clear_cell_at(&cell_ref))
    }

    pub fn clear_cell_at(&mut self, cell_ref: &CellRef) -> bool {
        let Some(old_cell) = self.get_cell_at(cell_ref) else {
            return false;
        };
        self.push_undo(*cell_ref, Some(old_cell), None);
        self.write_cell(*cell_ref, None);
        true
    }

    /// Replace the presentation attributes of a cell, creating a blank cell
    /// if nothing is stored yet. Values are untouched.
    pub fn set_style(&mut self, address: &str, style: Option<CellStyle>) -> Result<()> {
        let cell_ref = Sheet::parse_address(address)?;
        self.check_bounds(&cell_ref)?;

        let old_cell = self.get_cell_at(&cell_ref);
        let mut cell = old_cell.clone().unwrap_or_else(Cell::blank);
        cell.style = style;

        self.push_undo(cell_ref, old_cell, Some(cell.clone()));
        self.grid.insert(cell_ref, cell);
        self.touch();
        Ok(())
    }

    /// Change the sheet bounds. Refuses to cut off stored cells; formulas
    /// are re-evaluated since references may have entered or left bounds.
    pub fn resize(&mut self, rows: usize, cols: usize) -> Result<()> {
        if rows == 0 || cols == 0 {
            return Err(SheetError::InvalidBounds { rows, cols });
        }
        if let Some(outside) = self
            .grid
            .iter()
            .map(|entry| *entry.key())
            .filter(|cell_ref| !cell_ref.within(rows, cols))
            .min()
        {
            return Err(SheetError::OutOfBounds {
                address: outside.to_string(),
                rows,
                cols,
            });
        }

        self.rows = rows;
        self.cols = cols;
        self.recalculate_all();
        self.touch();
        Ok(())
    }

    /// Replace (or remove) a cell, keep the dependency map in step, and
    /// re-evaluate whatever the change affects.
    fn write_cell(&mut self, cell_ref: CellRef, state: Option<Cell>) {
        let old_deps = self
            .grid
            .get(&cell_ref)
            .map(|c| c.depends_on.clone())
            .unwrap_or_default();
        self.unlink(&cell_ref, &old_deps);

        match state {
            Some(cell) => {
                self.link(&cell_ref, &cell.depends_on);
                self.grid.insert(cell_ref, cell);
                self.evaluate_cell(&cell_ref);
            }
            None => {
                self.grid.remove(&cell_ref);
            }
        }

        self.propagate(&[cell_ref]);
        self.touch();
    }

    fn push_undo(&mut self, cell_ref: CellRef, old_cell: Option<Cell>, new_cell: Option<Cell>) {
        self.undo_stack.push(UndoAction {
            cell_ref,
            old_cell,
            new_cell,
        });
        self.redo_stack.clear();
        if self.undo_stack.len() > super::state::MAX_UNDO_STACK {
            self.undo_stack.remove(0);
        }
    }

    /// Undo the last edit. An edit to a cell that a resize has since put
    /// outside the sheet is refused and stays on the stack.
    pub fn undo(&mut self) -> Result<()> {
        let cell_ref = self
            .undo_stack
            .last()
            .map(|action| action.cell_ref)
            .ok_or(SheetError::NothingToUndo)?;
        self.check_bounds(&cell_ref)?;
        let action = self.undo_stack.pop().ok_or(SheetError::NothingToUndo)?;
        let current = self.get_cell_at(&action.cell_ref);
        self.redo_stack.push(UndoAction {
            cell_ref: action.cell_ref,
            old_cell: action.old_cell.clone(),
            new_cell: current,
        });
        self.write_cell(action.cell_ref, action.old_cell);
        Ok(())
    }

    /// Redo the last undone edit. Bounds are checked as for [`Sheet::undo`].
    pub fn redo(&mut self) -> Result<()> {
        let cell_ref = self
            .redo_stack
            .last()
            .map(|action| action.cell_ref)
            .ok_or(SheetError::NothingToRedo)?;
        self.check_bounds(&cell_ref)?;
        let action = self.redo_stack.pop().ok_or(SheetError::NothingToRedo)?;
        let current = self.get_cell_at(&action.cell_ref);
        self.undo_stack.push(UndoAction {
            cell_ref: action.cell_ref,
            old_cell: current,
            new_cell: action.new_cell.clone(),
        });
        self.write_cell(action.cell_ref, action.new_cell);
        Ok(())
    }
}
