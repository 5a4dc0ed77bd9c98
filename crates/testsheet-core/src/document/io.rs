use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use super::{Sheet, SheetOptions};
use crate::error::{Result, SheetError};
use crate::storage::{SheetDocument, read_document, write_document};
use testsheet_engine::engine::{Cell, CellRef, build_dependents, extract_dependencies, new_grid};

impl Sheet {
    /// Snapshot the sheet in its persisted shape.
    pub fn to_document(&self) -> SheetDocument {
        let cells: BTreeMap<String, Cell> = self
            .grid
            .iter()
            .map(|entry| (entry.key().to_string(), entry.value().clone()))
            .collect();
        SheetDocument {
            cells,
            rows: self.rows,
            cols: self.cols,
        }
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(self.to_document().to_json()?)
    }

    /// Build a sheet from a persisted document with default options.
    pub fn from_document(document: SheetDocument) -> Result<Sheet> {
        let mut sheet = Sheet::with_options(SheetOptions::default());
        sheet.load_document(document)?;
        Ok(sheet)
    }

    pub fn from_json(json: &str) -> Result<Sheet> {
        Sheet::from_document(SheetDocument::from_json(json)?)
    }

    /// Replace the sheet contents with a document. The document is validated
    /// in full before anything is replaced, then every formula is
    /// re-evaluated in dependency order. History is cleared. The load counts
    /// as one revision, so the revision never goes backwards and save sinks
    /// that saw earlier revisions keep accepting new ones.
    pub fn load_document(&mut self, document: SheetDocument) -> Result<()> {
        if document.rows == 0 || document.cols == 0 {
            return Err(SheetError::InvalidDocument(format!(
                "sheet bounds must be non-zero, got {}x{}",
                document.rows, document.cols
            )));
        }

        let grid = new_grid();
        for (address, mut cell) in document.cells {
            let cell_ref = CellRef::from_str(address.trim()).ok_or_else(|| {
                SheetError::InvalidDocument(format!("invalid cell address '{}'", address))
            })?;
            if !cell_ref.within(document.rows, document.cols) {
                return Err(SheetError::OutOfBounds {
                    address,
                    rows: document.rows,
                    cols: document.cols,
                });
            }

            cell.error = None;
            if cell.is_formula() {
                let formula = cell.formula.as_deref().unwrap_or_default();
                if !formula.starts_with('=') {
                    return Err(SheetError::InvalidDocument(format!(
                        "formula cell {} has no formula text",
                        cell_ref
                    )));
                }
                cell.depends_on = extract_dependencies(formula);
            } else {
                if cell.formula.is_some() {
                    tracing::warn!(cell = %cell_ref, "dropping formula text on a non-formula cell");
                    cell.formula = None;
                }
                cell.depends_on.clear();
            }
            grid.insert(cell_ref, cell);
        }

        self.dependents = build_dependents(&grid);
        self.grid = grid;
        self.rows = document.rows;
        self.cols = document.cols;
        self.recalculate_all();

        self.undo_stack.clear();
        self.redo_stack.clear();
        self.revision += 1;
        self.modified = false;
        tracing::debug!(cells = self.grid.len(), rows = self.rows, cols = self.cols, "sheet loaded");
        Ok(())
    }

    /// Save to the current file path.
    /// Returns the path saved to.
    pub fn save_file(&mut self) -> Result<PathBuf> {
        let Some(path) = self.file_path.clone() else {
            return Err(SheetError::NoFilePath);
        };
        write_document(&path, &self.to_document())?;
        self.modified = false;
        Ok(path)
    }

    /// Load from a JSON file and remember it as the save target.
    pub fn load_file(&mut self, path: &Path) -> Result<()> {
        let document = read_document(path)?;
        self.load_document(document)?;
        self.file_path = Some(path.to_path_buf());
        Ok(())
    }
}
