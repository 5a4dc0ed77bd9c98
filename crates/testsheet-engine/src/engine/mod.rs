//! Sheet cell engine API.
//!
//! - [`Cell`], [`CellType`], [`CellValue`], [`CellStyle`], [`Grid`] - cell storage
//! - [`CellRef`], [`CellRange`] - A1 notation <-> row/col indices
//! - [`classify`] - type inference for raw input
//! - [`parse_formula`], [`evaluate`] - formula parsing and evaluation
//! - [`extract_dependencies`], [`detect_cycle`], [`recalc_order`] - dependency tracking
//! - [`format_number`] - display formatting

mod cell;
mod cell_ref;
mod classify;
mod cycle;
mod deps;
mod error;
mod eval;
mod format;
mod parser;
mod recalc;

pub use cell::{Cell, CellStyle, CellType, CellValue, Grid, new_grid};
pub use cell_ref::{CellRange, CellRef};
pub use classify::{classify, parse_input, parse_number};
pub use cycle::detect_cycle;
pub use deps::{expr_dependencies, extract_dependencies};
pub use error::{EvalError, EvalResult};
pub use eval::{CellSource, GridSource, Resolved, evaluate, evaluate_expr};
pub use format::format_number;
pub use parser::{BinaryOp, Expr, Function, parse_formula};
pub use recalc::{Dependents, RecalcPlan, build_dependents, full_recalc_order, recalc_order};
