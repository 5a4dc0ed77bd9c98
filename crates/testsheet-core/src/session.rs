//! A sheet paired with its auto-saver.

use std::time::Instant;
use testsheet_engine::engine::CellStyle;

use crate::autosave::{AutoSaveOptions, AutoSaver, SaveOutcome, SaveSink};
use crate::document::Sheet;
use crate::error::Result;
use crate::storage::SheetDocument;

/// Routes every edit through the sheet and arms the auto-save debounce.
/// Reads go straight to [`EditSession::sheet`].
pub struct EditSession<S> {
    sheet: Sheet,
    saver: AutoSaver<S>,
}

impl<S: SaveSink> EditSession<S> {
    pub fn new(sheet: Sheet, sink: S, options: AutoSaveOptions) -> Self {
        EditSession {
            sheet,
            saver: AutoSaver::new(sink, options),
        }
    }

    pub fn sheet(&self) -> &Sheet {
        &self.sheet
    }

    pub fn saver(&self) -> &AutoSaver<S> {
        &self.saver
    }

    pub fn into_parts(self) -> (Sheet, AutoSaver<S>) {
        (self.sheet, self.saver)
    }

    pub fn set_cell(&mut self, address: &str, raw: &str, now: Instant) -> Result<()> {
        self.sheet.set_cell(address, raw)?;
        self.note_edit(now);
        Ok(())
    }

    pub fn clear_cell(&mut self, address: &str, now: Instant) -> Result<bool> {
        let cleared = self.sheet.clear_cell(address)?;
        if cleared {
            self.note_edit(now);
        }
        Ok(cleared)
    }

    pub fn set_style(
        &mut self,
        address: &str,
        style: Option<CellStyle>,
        now: Instant,
    ) -> Result<()> {
        self.sheet.set_style(address, style)?;
        self.note_edit(now);
        Ok(())
    }

    pub fn undo(&mut self, now: Instant) -> Result<()> {
        self.sheet.undo()?;
        self.note_edit(now);
        Ok(())
    }

    pub fn redo(&mut self, now: Instant) -> Result<()> {
        self.sheet.redo()?;
        self.note_edit(now);
        Ok(())
    }

    /// Replace the sheet contents. The load is saved like any other edit.
    pub fn load_document(&mut self, document: SheetDocument, now: Instant) -> Result<()> {
        self.sheet.load_document(document)?;
        self.note_edit(now);
        Ok(())
    }

    /// Drive the debounce timer; call this from the event loop.
    pub fn tick(&mut self, now: Instant) -> SaveOutcome {
        self.saver.poll(&self.sheet, now)
    }

    /// Save right away (focus lost, explicit save, shutdown).
    pub fn flush(&mut self) -> SaveOutcome {
        self.saver.flush(&self.sheet)
    }

    fn note_edit(&mut self, now: Instant) {
        self.saver.note_edit(self.sheet.revision(), now);
    }
}
