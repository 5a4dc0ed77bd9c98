//! Error types for the sheet store and its persistence.

use thiserror::Error;

/// Errors returned by sheet operations. Formula evaluation problems are not
/// here: they stay on the cell that produced them.
#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    #[error("{address} is outside the {rows}x{cols} sheet")]
    OutOfBounds {
        address: String,
        rows: usize,
        cols: usize,
    },

    #[error("Sheet bounds must be non-zero, got {rows}x{cols}")]
    InvalidBounds { rows: usize, cols: usize },

    #[error("Invalid sheet document: {0}")]
    InvalidDocument(String),

    #[error("No file path set")]
    NoFilePath,

    #[error("Nothing to undo")]
    NothingToUndo,

    #[error("Nothing to redo")]
    NothingToRedo,

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

/// Failures writing or reading the persisted sheet document.
#[derive(Error, Debug)]
pub enum PersistenceError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Save rejected: {0}")]
    Rejected(String),
}

pub type Result<T> = std::result::Result<T, SheetError>;
