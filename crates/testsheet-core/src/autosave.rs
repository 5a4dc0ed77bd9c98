//! Debounced, revision-ordered auto-save.
//!
//! The saver never reads the clock itself: callers pass `now` in, which keeps
//! it usable from an event loop and deterministic under test.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use crate::document::Sheet;
use crate::error::PersistenceError;
use crate::storage::{SheetDocument, write_document};

/// How a sink answered a save request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveAck {
    Applied,
    /// A newer (or the same) revision was already stored; nothing was written.
    Stale { latest: u64 },
}

/// Destination for auto-saved documents.
pub trait SaveSink {
    fn save(&mut self, revision: u64, document: &SheetDocument)
    -> Result<SaveAck, PersistenceError>;
}

/// Last-writer-wins by revision: a save is applied only if its revision is
/// newer than everything applied before it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RevisionGate {
    last_applied: Option<u64>,
}

impl RevisionGate {
    pub fn is_stale(&self, revision: u64) -> bool {
        matches!(self.last_applied, Some(last) if revision <= last)
    }

    pub fn record(&mut self, revision: u64) {
        if !self.is_stale(revision) {
            self.last_applied = Some(revision);
        }
    }

    pub fn last_applied(&self) -> Option<u64> {
        self.last_applied
    }

    fn check(&self, revision: u64) -> Option<SaveAck> {
        match self.last_applied {
            Some(latest) if revision <= latest => Some(SaveAck::Stale { latest }),
            _ => None,
        }
    }
}

/// Keeps the newest document in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    gate: RevisionGate,
    latest: Option<SheetDocument>,
    save_count: usize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn latest(&self) -> Option<&SheetDocument> {
        self.latest.as_ref()
    }

    pub fn latest_revision(&self) -> Option<u64> {
        self.gate.last_applied()
    }

    /// Number of saves actually applied.
    pub fn save_count(&self) -> usize {
        self.save_count
    }
}

impl SaveSink for MemoryStore {
    fn save(
        &mut self,
        revision: u64,
        document: &SheetDocument,
    ) -> Result<SaveAck, PersistenceError> {
        if let Some(stale) = self.gate.check(revision) {
            return Ok(stale);
        }
        self.latest = Some(document.clone());
        self.gate.record(revision);
        self.save_count += 1;
        Ok(SaveAck::Applied)
    }
}

/// Writes the document to a JSON file (atomically, see [`write_document`]).
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    gate: RevisionGate,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStore {
            path: path.into(),
            gate: RevisionGate::default(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SaveSink for FileStore {
    fn save(
        &mut self,
        revision: u64,
        document: &SheetDocument,
    ) -> Result<SaveAck, PersistenceError> {
        if let Some(stale) = self.gate.check(revision) {
            return Ok(stale);
        }
        write_document(&self.path, document)?;
        self.gate.record(revision);
        tracing::debug!(path = %self.path.display(), revision, "sheet written");
        Ok(SaveAck::Applied)
    }
}

/// Auto-save settings (`[autosave]` in the config file).
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AutoSaveOptions {
    pub enabled: bool,
    pub debounce_ms: u64,
}

impl Default for AutoSaveOptions {
    fn default() -> Self {
        AutoSaveOptions {
            enabled: true,
            debounce_ms: 1500,
        }
    }
}

impl AutoSaveOptions {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }
}

/// Result of a [`AutoSaver::poll`] or [`AutoSaver::flush`].
#[derive(Debug)]
pub enum SaveOutcome {
    /// Nothing pending.
    Idle,
    /// An edit is pending; the save fires after `due_in`.
    Waiting { due_in: Duration },
    Saved { revision: u64 },
    /// The sink already held a newer revision.
    Discarded { revision: u64 },
    Failed {
        revision: u64,
        error: PersistenceError,
    },
}

/// Coalesces bursts of edits into a single save once the sheet has been
/// quiet for the debounce interval.
#[derive(Debug)]
pub struct AutoSaver<S> {
    sink: S,
    options: AutoSaveOptions,
    due: Option<Instant>,
    last_saved: Option<u64>,
}

impl<S: SaveSink> AutoSaver<S> {
    pub fn new(sink: S, options: AutoSaveOptions) -> Self {
        AutoSaver {
            sink,
            options,
            due: None,
            last_saved: None,
        }
    }

    pub fn options(&self) -> &AutoSaveOptions {
        &self.options
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    pub fn sink_mut(&mut self) -> &mut S {
        &mut self.sink
    }

    pub fn into_sink(self) -> S {
        self.sink
    }

    /// Revision of the last successful save.
    pub fn last_saved(&self) -> Option<u64> {
        self.last_saved
    }

    pub fn is_pending(&self) -> bool {
        self.due.is_some()
    }

    /// Note that the sheet changed. Each call pushes the save back to
    /// `now + debounce`.
    pub fn note_edit(&mut self, revision: u64, now: Instant) {
        if !self.options.enabled {
            return;
        }
        if self.last_saved == Some(revision) {
            return;
        }
        self.due = Some(now + self.options.debounce());
    }

    /// Save if the debounce interval has elapsed.
    pub fn poll(&mut self, sheet: &Sheet, now: Instant) -> SaveOutcome {
        match self.due {
            None => SaveOutcome::Idle,
            Some(due) if now < due => SaveOutcome::Waiting {
                due_in: due - now,
            },
            Some(_) => self.save_now(sheet),
        }
    }

    /// Save immediately, pending or not. A sheet whose current revision was
    /// already saved, or that is still untouched (revision 0), is left alone.
    pub fn flush(&mut self, sheet: &Sheet) -> SaveOutcome {
        if sheet.revision() == self.last_saved.unwrap_or(0) {
            self.due = None;
            return SaveOutcome::Idle;
        }
        self.save_now(sheet)
    }

    fn save_now(&mut self, sheet: &Sheet) -> SaveOutcome {
        self.due = None;
        let revision = sheet.revision();
        match self.sink.save(revision, &sheet.to_document()) {
            Ok(SaveAck::Applied) => {
                self.last_saved = Some(revision);
                SaveOutcome::Saved { revision }
            }
            Ok(SaveAck::Stale { latest }) => {
                tracing::debug!(revision, latest, "discarding stale save");
                SaveOutcome::Discarded { revision }
            }
            Err(error) => {
                tracing::warn!(revision, error = %error, "auto-save failed");
                SaveOutcome::Failed { revision, error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn doc(rows: usize) -> SheetDocument {
        SheetDocument {
            cells: BTreeMap::new(),
            rows,
            cols: 1,
        }
    }

    /// Fails every save.
    struct BrokenSink;

    impl SaveSink for BrokenSink {
        fn save(&mut self, _: u64, _: &SheetDocument) -> Result<SaveAck, PersistenceError> {
            Err(PersistenceError::Rejected("disk full".into()))
        }
    }

    #[test]
    fn test_revision_gate() {
        let mut gate = RevisionGate::default();
        assert!(!gate.is_stale(0));
        gate.record(3);
        assert!(gate.is_stale(2));
        assert!(gate.is_stale(3));
        assert!(!gate.is_stale(4));
        gate.record(1);
        assert_eq!(gate.last_applied(), Some(3));
    }

    #[test]
    fn test_out_of_order_saves_keep_newest() {
        let mut store = MemoryStore::new();
        assert_eq!(store.save(5, &doc(5)).unwrap(), SaveAck::Applied);
        assert_eq!(
            store.save(4, &doc(4)).unwrap(),
            SaveAck::Stale { latest: 5 }
        );
        assert_eq!(store.latest().unwrap().rows, 5);
        assert_eq!(store.save_count(), 1);
    }

    #[test]
    fn test_edits_are_debounced() {
        let mut sheet = Sheet::new(10, 10);
        let mut saver = AutoSaver::new(MemoryStore::new(), AutoSaveOptions::default());
        let t0 = Instant::now();

        sheet.set_cell("A1", "1").unwrap();
        saver.note_edit(sheet.revision(), t0);
        sheet.set_cell("A2", "2").unwrap();
        saver.note_edit(sheet.revision(), t0 + Duration::from_millis(1000));

        assert!(matches!(
            saver.poll(&sheet, t0 + Duration::from_millis(1600)),
            SaveOutcome::Waiting { due_in } if due_in == Duration::from_millis(900)
        ));
        assert!(matches!(
            saver.poll(&sheet, t0 + Duration::from_millis(2500)),
            SaveOutcome::Saved { revision: 2 }
        ));
        assert!(matches!(
            saver.poll(&sheet, t0 + Duration::from_millis(5000)),
            SaveOutcome::Idle
        ));
        assert_eq!(saver.sink().save_count(), 1);
        assert_eq!(saver.sink().latest(), Some(&sheet.to_document()));
    }

    #[test]
    fn test_flush_saves_immediately_once() {
        let mut sheet = Sheet::new(10, 10);
        let mut saver = AutoSaver::new(MemoryStore::new(), AutoSaveOptions::default());
        sheet.set_cell("A1", "=1+1").unwrap();
        saver.note_edit(sheet.revision(), Instant::now());

        assert!(matches!(saver.flush(&sheet), SaveOutcome::Saved { revision: 1 }));
        assert!(!saver.is_pending());
        assert!(matches!(saver.flush(&sheet), SaveOutcome::Idle));
        assert_eq!(saver.last_saved(), Some(1));
    }

    #[test]
    fn test_disabled_saver_only_flushes() {
        let mut sheet = Sheet::new(10, 10);
        let options = AutoSaveOptions {
            enabled: false,
            ..AutoSaveOptions::default()
        };
        let mut saver = AutoSaver::new(MemoryStore::new(), options);
        let t0 = Instant::now();
        sheet.set_cell("A1", "1").unwrap();
        saver.note_edit(sheet.revision(), t0);
        assert!(matches!(
            saver.poll(&sheet, t0 + Duration::from_secs(60)),
            SaveOutcome::Idle
        ));
        assert!(matches!(saver.flush(&sheet), SaveOutcome::Saved { .. }));
    }

    #[test]
    fn test_failed_save_leaves_sheet_alone() {
        let mut sheet = Sheet::new(10, 10);
        let mut saver = AutoSaver::new(BrokenSink, AutoSaveOptions::default());
        let t0 = Instant::now();
        sheet.set_cell("A1", "42").unwrap();
        saver.note_edit(sheet.revision(), t0);

        let outcome = saver.poll(&sheet, t0 + Duration::from_secs(2));
        assert!(matches!(
            outcome,
            SaveOutcome::Failed { revision: 1, error: PersistenceError::Rejected(_) }
        ));
        assert_eq!(sheet.display_value("A1"), "42");
        assert!(sheet.modified);
        assert_eq!(saver.last_saved(), None);

        // The next edit re-arms the timer.
        sheet.set_cell("A2", "1").unwrap();
        saver.note_edit(sheet.revision(), t0 + Duration::from_secs(3));
        assert!(saver.is_pending());
    }

    #[test]
    fn test_file_store_discards_stale_revision() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("auto.json");
        let mut store = FileStore::new(&path);
        assert_eq!(store.save(2, &doc(2)).unwrap(), SaveAck::Applied);
        assert_eq!(store.save(1, &doc(1)).unwrap(), SaveAck::Stale { latest: 2 });
        assert_eq!(crate::storage::read_document(&path).unwrap().rows, 2);
    }

    #[test]
    fn test_file_store_surfaces_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = FileStore::new(dir.path().join("nope").join("auto.json"));
        assert!(matches!(store.save(1, &doc(1)), Err(PersistenceError::Io(_))));
        // A failed write does not advance the gate.
        std::fs::create_dir(dir.path().join("nope")).unwrap();
        assert_eq!(store.save(1, &doc(1)).unwrap(), SaveAck::Applied);
    }
}
