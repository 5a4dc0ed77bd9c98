//! Formula evaluation against a grid snapshot.
//!
//! References resolve to a cell's currently computed value, never its raw
//! formula text, so formula-to-formula references see whatever the sheet
//! last stored. Ordering is the sheet's job (see [`super::recalc_order`]).

use super::cell::{CellValue, Grid};
use super::cell_ref::{CellRange, CellRef};
use super::error::{EvalError, EvalResult};
use super::parser::{BinaryOp, Expr, Function, parse_formula};

/// What an address holds, as seen by the evaluator.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Empty,
    Value(CellValue),
    Error(EvalError),
}

/// Read access to a sheet for formula evaluation.
pub trait CellSource {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn resolve(&self, at: &CellRef) -> Resolved;
}

/// [`CellSource`] over a [`Grid`] with fixed bounds.
pub struct GridSource<'a> {
    pub grid: &'a Grid,
    pub rows: usize,
    pub cols: usize,
}

impl<'a> GridSource<'a> {
    pub fn new(grid: &'a Grid, rows: usize, cols: usize) -> Self {
        GridSource { grid, rows, cols }
    }
}

impl CellSource for GridSource<'_> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn resolve(&self, at: &CellRef) -> Resolved {
        match self.grid.get(at) {
            None => Resolved::Empty,
            Some(cell) => match &cell.error {
                Some(e) => Resolved::Error(e.clone()),
                None => Resolved::Value(cell.value.clone()),
            },
        }
    }
}

/// Parse and evaluate a formula (leading `=` optional).
pub fn evaluate(formula: &str, source: &impl CellSource) -> EvalResult<f64> {
    let expr = parse_formula(formula)?;
    evaluate_expr(&expr, source)
}

/// Evaluate an already-parsed expression.
pub fn evaluate_expr(expr: &Expr, source: &impl CellSource) -> EvalResult<f64> {
    match expr {
        Expr::Number(n) => Ok(*n),
        Expr::Ref(at) => {
            check_bounds(at, source)?;
            numeric_operand(at, source.resolve(at))
        }
        Expr::Range(range) => Err(EvalError::Parse(format!(
            "range {} used outside a function",
            range
        ))),
        Expr::Neg(inner) => Ok(-evaluate_expr(inner, source)?),
        Expr::Binary { op, left, right } => {
            let l = evaluate_expr(left, source)?;
            let r = evaluate_expr(right, source)?;
            match op {
                BinaryOp::Add => Ok(l + r),
                BinaryOp::Sub => Ok(l - r),
                BinaryOp::Mul => Ok(l * r),
                BinaryOp::Div => {
                    if r == 0.0 {
                        Err(EvalError::DivisionByZero)
                    } else {
                        Ok(l / r)
                    }
                }
            }
        }
        Expr::Call { func, args } => {
            let values = collect_numbers(args, source)?;
            aggregate(*func, &values)
        }
    }
}

fn check_bounds(at: &CellRef, source: &impl CellSource) -> EvalResult<()> {
    if at.within(source.rows(), source.cols()) {
        Ok(())
    } else {
        Err(EvalError::Reference(format!(
            "{} is outside the {}x{} sheet",
            at,
            source.rows(),
            source.cols()
        )))
    }
}

fn check_range_bounds(range: &CellRange, source: &impl CellSource) -> EvalResult<()> {
    if range.within(source.rows(), source.cols()) {
        Ok(())
    } else {
        Err(EvalError::Reference(format!(
            "{} is outside the {}x{} sheet",
            range,
            source.rows(),
            source.cols()
        )))
    }
}

/// A referenced value in an arithmetic context.
fn numeric_operand(at: &CellRef, resolved: Resolved) -> EvalResult<f64> {
    match resolved {
        Resolved::Empty => Ok(0.0),
        Resolved::Error(e) => Err(e),
        Resolved::Value(CellValue::Number(n)) => Ok(n),
        Resolved::Value(v) if v.is_blank() => Ok(0.0),
        Resolved::Value(v) => Err(EvalError::Type(format!(
            "{} holds non-numeric value '{}'",
            at,
            v.display()
        ))),
    }
}

/// Numbers fed to an aggregate. Ranges contribute only their numeric cells;
/// scalar arguments are evaluated like any other expression.
fn collect_numbers(args: &[Expr], source: &impl CellSource) -> EvalResult<Vec<f64>> {
    let mut values = Vec::new();
    for arg in args {
        match arg {
            Expr::Range(range) => {
                check_range_bounds(range, source)?;
                for at in range.cells() {
                    if let Resolved::Value(CellValue::Number(n)) = source.resolve(&at) {
                        values.push(n);
                    }
                }
            }
            other => values.push(evaluate_expr(other, source)?),
        }
    }
    Ok(values)
}

fn aggregate(func: Function, values: &[f64]) -> EvalResult<f64> {
    match func {
        Function::Sum => Ok(values.iter().sum()),
        Function::Count => Ok(values.len() as f64),
        Function::Average => {
            if values.is_empty() {
                Err(EvalError::DivisionByZero)
            } else {
                Ok(values.iter().sum::<f64>() / values.len() as f64)
            }
        }
        Function::Min => Ok(values.iter().copied().reduce(f64::min).unwrap_or(0.0)),
        Function::Max => Ok(values.iter().copied().reduce(f64::max).unwrap_or(0.0)),
    }
}
