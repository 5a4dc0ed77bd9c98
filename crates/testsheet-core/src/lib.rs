//! testsheet-core - sheet store, recalculation and persistence.

pub mod autosave;
pub mod document;
pub mod error;
pub mod session;
pub mod storage;

pub use autosave::{
    AutoSaveOptions, AutoSaver, FileStore, MemoryStore, RevisionGate, SaveAck, SaveOutcome,
    SaveSink,
};
pub use document::{RecalcPolicy, Sheet, SheetOptions, UndoAction};
pub use error::{PersistenceError, Result, SheetError};
pub use session::EditSession;
pub use storage::SheetDocument;

pub use testsheet_engine::engine::{Cell, CellRef, CellStyle, CellType, CellValue, EvalError};
