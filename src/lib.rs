//! testsheet - a sheet cell engine: type inference, formulas, a bounded
//! sheet store with recalculation, and JSON persistence with auto-save.
//!
//! The work lives in two crates, re-exported here:
//! - [`testsheet_engine`] - cell model, parser, evaluator
//! - [`testsheet_core`] - sheet store, persistence, auto-save

pub mod config;
pub mod error;

pub use testsheet_core;
pub use testsheet_engine;

pub use config::{TestsheetConfig, default_config_path};
pub use error::ConfigError;
pub use testsheet_core::{
    AutoSaveOptions, AutoSaver, Cell, CellRef, CellStyle, CellType, CellValue, EditSession,
    EvalError, FileStore, MemoryStore, PersistenceError, RecalcPolicy, RevisionGate, SaveAck,
    SaveOutcome, SaveSink, Sheet, SheetDocument, SheetError, SheetOptions,
};
