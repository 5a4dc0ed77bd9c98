//! Cell data structures for the sheet grid.
//!
//! - [`CellType`] - the inferred category of a cell's input
//! - [`CellValue`] - the stored/displayed scalar
//! - [`CellStyle`] - presentation attributes, no computational meaning
//! - [`Cell`] - one grid entry; doubles as the persisted `CellData` shape
//! - [`Grid`] - shared sparse storage for cells (backed by `DashMap`)

use dashmap::DashMap;
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use std::sync::Arc;

use super::cell_ref::CellRef;
use super::classify::{parse_input, parse_number};
use super::deps::extract_dependencies;
use super::error::EvalError;
use super::format::format_number;

/// The inferred category of a cell's raw input.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CellType {
    Text,
    Number,
    Date,
    Boolean,
    Formula,
}

/// A scalar cell value. Serialized as a bare JSON string, number or boolean.
/// JSON has no infinities, so non-finite numbers are written as the strings
/// `"Infinity"`, `"-Infinity"` and `"NaN"`; [`Cell`] turns them back into
/// numbers for `number` and `formula` cells.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Boolean(bool),
    Number(f64),
    Text(String),
}

impl Serialize for CellValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            CellValue::Boolean(b) => serializer.serialize_bool(*b),
            CellValue::Number(n) if n.is_finite() => serializer.serialize_f64(*n),
            CellValue::Number(n) if n.is_nan() => serializer.serialize_str("NaN"),
            CellValue::Number(n) if *n > 0.0 => serializer.serialize_str("Infinity"),
            CellValue::Number(_) => serializer.serialize_str("-Infinity"),
            CellValue::Text(s) => serializer.serialize_str(s),
        }
    }
}

impl CellValue {
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    /// Text that is empty counts as a blank cell.
    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Text(s) if s.is_empty())
    }

    pub fn display(&self) -> String {
        match self {
            CellValue::Boolean(b) => if *b { "TRUE" } else { "FALSE" }.to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Text(s) => s.clone(),
        }
    }
}

/// Presentation attributes. Keys this type does not know about are kept in
/// `extra` so a load/save cycle does not drop them.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CellStyle {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bold: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub italic: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub underline: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text_align: Option<String>,
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

/// A cell in the grid.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "CellData")]
pub struct Cell {
    pub value: CellValue,
    #[serde(rename = "type")]
    pub kind: CellType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formula: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub style: Option<CellStyle>,
    /// Last evaluation error for formula cells (not serialized).
    #[serde(skip)]
    pub error: Option<EvalError>,
    /// Addresses the formula reads (not serialized, rebuilt on load).
    #[serde(skip)]
    pub depends_on: Vec<CellRef>,
}

/// Wire form of a [`Cell`] as read from a document.
#[derive(Deserialize)]
struct CellData {
    value: CellValue,
    #[serde(rename = "type")]
    kind: CellType,
    #[serde(default)]
    formula: Option<String>,
    #[serde(default)]
    style: Option<CellStyle>,
}

impl From<CellData> for Cell {
    fn from(data: CellData) -> Cell {
        let value = match data.value {
            CellValue::Text(text) if matches!(data.kind, CellType::Number | CellType::Formula) => {
                let restored = if text == "NaN" {
                    Some(f64::NAN)
                } else {
                    parse_number(&text)
                };
                restored.map_or(CellValue::Text(text), CellValue::Number)
            }
            value => value,
        };
        Cell {
            value,
            kind: data.kind,
            formula: data.formula,
            style: data.style,
            error: None,
            depends_on: vec![],
        }
    }
}

impl Cell {
    /// A blank text cell, used for addresses with nothing stored.
    pub fn blank() -> Cell {
        Cell::new_text("")
    }

    pub fn new_text(text: &str) -> Cell {
        Cell::scalar(CellType::Text, CellValue::Text(text.to_string()))
    }

    pub fn new_number(n: f64) -> Cell {
        Cell::scalar(CellType::Number, CellValue::Number(n))
    }

    fn scalar(kind: CellType, value: CellValue) -> Cell {
        Cell {
            value,
            kind,
            formula: None,
            style: None,
            error: None,
            depends_on: vec![],
        }
    }

    /// Create an unevaluated formula cell from its full text (including `=`).
    /// Dependencies are extracted from the formula; the value stays blank
    /// until the sheet evaluates it.
    pub fn new_formula(formula: &str) -> Cell {
        Cell {
            value: CellValue::Text(String::new()),
            kind: CellType::Formula,
            depends_on: extract_dependencies(formula),
            formula: Some(formula.to_string()),
            style: None,
            error: None,
        }
    }

    /// Build a cell from raw user input. Formula cells come back unevaluated.
    pub fn from_input(raw: &str) -> Cell {
        let (kind, value) = parse_input(raw);
        if kind == CellType::Formula {
            Cell::new_formula(raw)
        } else {
            Cell::scalar(kind, value)
        }
    }

    /// Record the outcome of evaluating this cell's formula.
    pub fn set_result(&mut self, result: Result<f64, EvalError>) {
        match result {
            Ok(n) => {
                self.value = CellValue::Number(n);
                self.error = None;
            }
            Err(e) => {
                self.value = CellValue::Text(e.code().to_string());
                self.error = Some(e);
            }
        }
    }

    pub fn is_formula(&self) -> bool {
        self.kind == CellType::Formula
    }

    /// The text a user would edit: the formula for formula cells, else the value.
    pub fn to_input_string(&self) -> String {
        match (&self.kind, &self.formula) {
            (CellType::Formula, Some(f)) => f.clone(),
            (CellType::Number, _) => match self.value {
                CellValue::Number(n) => n.to_string(),
                _ => self.value.display(),
            },
            (CellType::Boolean, _) => match self.value {
                CellValue::Boolean(b) => b.to_string(),
                _ => self.value.display(),
            },
            _ => self.value.display(),
        }
    }

    /// What the grid shows for this cell.
    pub fn display(&self) -> String {
        match &self.error {
            Some(e) => e.code().to_string(),
            None => self.value.display(),
        }
    }
}

/// Shared sparse grid storage.
pub type Grid = Arc<DashMap<CellRef, Cell>>;

/// Create an empty grid.
pub fn new_grid() -> Grid {
    Arc::new(DashMap::new())
}
