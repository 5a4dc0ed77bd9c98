//! Dependency extraction from formula text.

use std::collections::HashSet;

use super::cell_ref::CellRef;
use super::parser::{Expr, parse_formula};

const MAX_DEPENDENCY_RANGE_CELLS: usize = 1_000_000;

/// Every address a formula reads, in source order. Ranges are expanded
/// row-major; ranges above the size cap are skipped. A formula that does
/// not parse has no dependencies.
pub fn extract_dependencies(formula: &str) -> Vec<CellRef> {
    match parse_formula(formula) {
        Ok(expr) => expr_dependencies(&expr),
        Err(_) => Vec::new(),
    }
}

/// Dependencies of an already-parsed expression.
pub fn expr_dependencies(expr: &Expr) -> Vec<CellRef> {
    let mut deps = Deps::default();
    deps.collect(expr);
    deps.order
}

#[derive(Default)]
struct Deps {
    order: Vec<CellRef>,
    seen: HashSet<CellRef>,
}

impl Deps {
    fn push(&mut self, at: CellRef) {
        if self.seen.insert(at) {
            self.order.push(at);
        }
    }

    fn collect(&mut self, expr: &Expr) {
        match expr {
            Expr::Number(_) => {}
            Expr::Ref(at) => self.push(*at),
            Expr::Range(range) => {
                let Some(count) = range.len() else {
                    return;
                };
                if count > MAX_DEPENDENCY_RANGE_CELLS {
                    return;
                }
                for at in range.cells() {
                    self.push(at);
                }
            }
            Expr::Neg(inner) => self.collect(inner),
            Expr::Binary { left, right, .. } => {
                self.collect(left);
                self.collect(right);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    self.collect(arg);
                }
            }
        }
    }
}
