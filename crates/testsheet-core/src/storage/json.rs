//! JSON wire format: `{ "cells": { "A1": CellData, ... }, "rows": n, "cols": n }`
//! where `CellData` is `{ value, type, formula?, style? }`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;
use std::path::Path;
use tempfile::NamedTempFile;
use testsheet_engine::engine::Cell;

use crate::error::PersistenceError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SheetDocument {
    pub cells: BTreeMap<String, Cell>,
    pub rows: usize,
    pub cols: usize,
}

impl SheetDocument {
    pub fn to_json(&self) -> Result<String, PersistenceError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(json: &str) -> Result<SheetDocument, PersistenceError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Read a document from disk.
pub fn read_document(path: &Path) -> Result<SheetDocument, PersistenceError> {
    let content = fs::read_to_string(path)?;
    SheetDocument::from_json(&content)
}

/// Write a document to disk. The content goes to a temp file in the same
/// directory and is renamed into place, so readers never see a half-written
/// file.
pub fn write_document(path: &Path, document: &SheetDocument) -> Result<(), PersistenceError> {
    let content = document.to_json()?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_wire_shape() {
        let json = r#"{
            "cells": {
                "A1": { "value": 10, "type": "number" },
                "B1": { "value": "Hello", "type": "text", "style": { "bold": true } },
                "C1": { "value": 20, "type": "formula", "formula": "=A1*2" }
            },
            "rows": 50,
            "cols": 10
        }"#;
        let doc = SheetDocument::from_json(json).unwrap();
        assert_eq!(doc.rows, 50);
        assert_eq!(doc.cols, 10);
        assert_eq!(doc.cells.len(), 3);
        assert_eq!(doc.cells["C1"].formula.as_deref(), Some("=A1*2"));

        let back = SheetDocument::from_json(&doc.to_json().unwrap()).unwrap();
        assert_eq!(back, doc);
    }

    #[test]
    fn test_rejects_malformed_json() {
        assert!(matches!(
            SheetDocument::from_json(r#"{"cells": {}, "rows": 1}"#),
            Err(PersistenceError::Json(_))
        ));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sheet.json");
        let doc = SheetDocument {
            cells: BTreeMap::from([("A1".to_string(), Cell::new_number(1.0))]),
            rows: 2,
            cols: 2,
        };
        write_document(&path, &doc).unwrap();
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
        assert_eq!(read_document(&path).unwrap(), doc);
    }

    #[test]
    fn test_write_into_missing_directory_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing").join("sheet.json");
        let doc = SheetDocument {
            cells: BTreeMap::new(),
            rows: 1,
            cols: 1,
        };
        assert!(matches!(
            write_document(&path, &doc),
            Err(PersistenceError::Io(_))
        ));
    }
}
