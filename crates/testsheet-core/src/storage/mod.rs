//! Persisted sheet document.

pub mod json;

pub use json::{SheetDocument, read_document, write_document};
