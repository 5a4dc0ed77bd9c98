use std::collections::BTreeMap;

use super::{RecalcPolicy, Sheet};
use testsheet_engine::engine::{
    CellRef, CellSource, EvalError, GridSource, Resolved, detect_cycle, evaluate,
    full_recalc_order, recalc_order,
};

impl CellSource for Sheet {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn resolve(&self, at: &CellRef) -> Resolved {
        GridSource::new(&self.grid, self.rows, self.cols).resolve(at)
    }
}

impl Sheet {
    /// Evaluate one formula cell against the current grid and store the
    /// result (or the error) on it. Non-formula cells are left alone.
    pub(crate) fn evaluate_cell(&mut self, cell_ref: &CellRef) {
        let formula = match self.grid.get(cell_ref) {
            Some(cell) if cell.is_formula() => cell.formula.clone().unwrap_or_default(),
            _ => return,
        };

        let result = match detect_cycle(cell_ref, &self.grid) {
            Some(path) => Err(EvalError::CircularReference(
                path.iter().map(ToString::to_string).collect(),
            )),
            None => evaluate(&formula, &GridSource::new(&self.grid, self.rows, self.cols)),
        };

        if let Err(e) = &result {
            tracing::debug!(cell = %cell_ref, error = %e, "formula evaluation failed");
        }
        if let Some(mut cell) = self.grid.get_mut(cell_ref) {
            cell.set_result(result);
        }
    }

    /// Bring the dependents of `changed` up to date, according to the
    /// sheet's recalculation policy.
    pub(crate) fn propagate(&mut self, changed: &[CellRef]) {
        if self.recalc == RecalcPolicy::OnEntry {
            return;
        }
        let plan = recalc_order(changed, &self.dependents, &self.grid);
        tracing::debug!(
            ordered = plan.order.len(),
            cyclic = plan.cyclic.len(),
            "recalculating dependents"
        );
        for cell_ref in plan.order.iter().chain(plan.cyclic.iter()) {
            self.evaluate_cell(cell_ref);
        }
    }

    /// Re-evaluate every formula in dependency order.
    pub fn recalculate_all(&mut self) {
        let plan = full_recalc_order(&self.grid);
        for cell_ref in plan.order.iter().chain(plan.cyclic.iter()) {
            self.evaluate_cell(cell_ref);
        }
    }

    /// What the grid shows at an address: the value, an error code, or an
    /// empty string for nothing stored.
    pub fn display_value(&self, address: &str) -> String {
        Sheet::parse_address(address)
            .ok()
            .and_then(|cell_ref| self.grid.get(&cell_ref).map(|cell| cell.display()))
            .unwrap_or_default()
    }

    /// Address -> displayed value for every stored cell, row-major. This is
    /// what CSV/XLSX exporters consume.
    pub fn resolved_values(&self) -> BTreeMap<CellRef, String> {
        self.grid
            .iter()
            .map(|entry| (*entry.key(), entry.value().display()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::super::{RecalcPolicy, Sheet, SheetOptions};
    use testsheet_engine::engine::{CellRef, CellValue, EvalError, evaluate};

    #[test]
    fn test_sheet_is_a_cell_source() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_cell("A2", "10").unwrap();
        sheet.set_cell("B2", "20").unwrap();
        assert_eq!(evaluate("=A2+B2", &sheet), Ok(30.0));
        assert_eq!(evaluate("=SUM(A2:B2)", &sheet), Ok(30.0));
    }

    #[test]
    fn test_cascade_updates_dependents() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_cell("A1", "2").unwrap();
        sheet.set_cell("B1", "=A1*2").unwrap();
        sheet.set_cell("C1", "=B1+A1").unwrap();
        assert_eq!(sheet.display_value("C1"), "6");

        sheet.set_cell("A1", "5").unwrap();
        assert_eq!(sheet.display_value("B1"), "10");
        assert_eq!(sheet.display_value("C1"), "15");
    }

    #[test]
    fn test_on_entry_leaves_dependents_stale() {
        let mut sheet = Sheet::with_options(SheetOptions {
            rows: 10,
            cols: 10,
            recalc: RecalcPolicy::OnEntry,
        });
        sheet.set_cell("A1", "2").unwrap();
        sheet.set_cell("B1", "=A1*2").unwrap();
        sheet.set_cell("A1", "5").unwrap();
        assert_eq!(sheet.display_value("B1"), "4");

        // Re-entering the formula picks up the new value.
        sheet.set_cell("B1", "=A1*2").unwrap();
        assert_eq!(sheet.display_value("B1"), "10");

        sheet.set_cell("A1", "7").unwrap();
        sheet.recalculate_all();
        assert_eq!(sheet.display_value("B1"), "14");
    }

    #[test]
    fn test_cycle_is_contained_and_recoverable() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_cell("A1", "=B1+1").unwrap();
        sheet.set_cell("B1", "=A1+1").unwrap();
        sheet.set_cell("C1", "3").unwrap();

        let a1 = sheet.get_cell("A1").unwrap();
        assert!(matches!(a1.error, Some(EvalError::CircularReference(_))));
        assert_eq!(sheet.display_value("B1"), "#CYCLE!");
        assert_eq!(sheet.display_value("C1"), "3");

        sheet.set_cell("B1", "4").unwrap();
        assert_eq!(sheet.display_value("A1"), "5");
        assert!(sheet.get_cell("A1").unwrap().error.is_none());
    }

    #[test]
    fn test_error_propagates_then_clears() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_cell("A1", "0").unwrap();
        sheet.set_cell("B1", "=1/A1").unwrap();
        sheet.set_cell("C1", "=B1+1").unwrap();
        assert_eq!(sheet.display_value("C1"), "#DIV/0!");

        sheet.set_cell("A1", "4").unwrap();
        assert_eq!(sheet.display_value("B1"), "0.25");
        assert_eq!(
            sheet.get_cell("C1").unwrap().value,
            CellValue::Number(1.25)
        );
    }

    #[test]
    fn test_resolved_values_are_row_major() {
        let mut sheet = Sheet::new(10, 10);
        sheet.set_cell("B2", "=1+1").unwrap();
        sheet.set_cell("A2", "x").unwrap();
        sheet.set_cell("C1", "true").unwrap();
        let resolved: Vec<(String, String)> = sheet
            .resolved_values()
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        assert_eq!(
            resolved,
            vec![
                ("C1".to_string(), "TRUE".to_string()),
                ("A2".to_string(), "x".to_string()),
                ("B2".to_string(), "2".to_string()),
            ]
        );
        assert_eq!(sheet.display_value("Z9"), "");
        assert_eq!(CellRef::new(1, 1).to_string(), "B2");
    }
}
