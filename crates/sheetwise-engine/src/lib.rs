//! sheetwise_engine - Spreadsheet formula evaluation.
//!
//! The engine knows references, coercion, formatting and evaluation order.
//! It defines no spreadsheet functions of its own; see
//! [`engine::FunctionRegistry`].

pub mod engine;

#[cfg(test)]
mod tests {
    use crate::engine::*;

    fn numbers(args: &[String], ctx: &mut dyn EvalContext) -> Result<Vec<f64>, FormulaError> {
        let mut out = Vec::new();
        for arg in args {
            if as_single_range(arg) {
                out.extend(ctx.resolve_range(arg));
            } else {
                out.push(ctx.evaluate_number(arg)?);
            }
        }
        Ok(out)
    }

    fn test_registry() -> FunctionRegistry {
        let mut registry = FunctionRegistry::new();
        registry.register("SUM", |args, ctx| {
            Ok(Value::Number(numbers(args, ctx)?.iter().sum()))
        });
        registry.register("PMT", |args, ctx| {
            let values = numbers(args, ctx)?;
            let &[rate, nper, pv] = values.as_slice() else {
                return Err(FormulaError::arity("PMT", "3", args.len()));
            };
            Ok(Value::Number(pv * rate / (1.0 - (1.0 + rate).powf(-nper))))
        });
        registry
    }

    fn evaluator() -> Evaluator {
        Evaluator::new(test_registry())
    }

    /// Annuity worksheet: a monthly payment of B2 for twelve months at
    /// annual rate B3, each period discounted in column C and totalled in B5.
    fn annuity_sheet() -> Sheet {
        let mut sheet = Sheet::new("Annuity");
        sheet.set(0, 0, Cell::new_text("Discounted annuity"));
        sheet.set(1, 0, Cell::new_text("Payment"));
        sheet.set(1, 1, Cell::new_number(1000.0).with_format("$#,##0.00"));
        sheet.set(2, 0, Cell::new_text("Annual rate"));
        sheet.set(2, 1, Cell::new_number(0.05).with_format("0.00%"));
        sheet.set(3, 0, Cell::new_text("Monthly rate"));
        sheet.set(3, 1, Cell::new_formula("B3/12"));
        sheet.set(4, 0, Cell::new_text("Present value"));
        sheet.set(4, 1, Cell::new_formula("SUM(C9:C20)").with_format("$#,##0.00"));
        sheet.set(7, 0, Cell::new_text("Period"));
        for period in 1..=12 {
            let row = 7 + period;
            let n = row + 1;
            sheet.set(row, 0, Cell::new_number(period as f64));
            sheet.set(row, 1, Cell::new_formula("$B$2"));
            sheet.set(
                row,
                2,
                Cell::new_formula(&format!("B{n}/(1+$B$4)^A{n}")).with_format("$#,##0.00"),
            );
        }
        sheet
    }

    #[test]
    fn test_annuity_total_sees_forward_references() {
        let result = evaluator().evaluate_sheet(&annuity_sheet());

        let rate = 0.05 / 12.0;
        let expected: f64 = (1..=12).map(|k| 1000.0 / (1.0f64 + rate).powi(k)).sum();

        let total = result.value_at("B5").as_number().unwrap();
        assert!(total > 0.0);
        assert!((total - expected).abs() < 1e-6, "{total} != {expected}");
        assert!((11_600.0..11_700.0).contains(&total));
        assert_eq!(
            result.display_at("B5"),
            format_value(&Value::Number(expected), Some("$#,##0.00"))
        );
    }

    #[test]
    fn test_annuity_display_strings() {
        let result = evaluator().evaluate_sheet(&annuity_sheet());
        assert_eq!(result.display_at("A1"), "Discounted annuity");
        assert_eq!(result.display_at("B2"), "$1,000.00");
        assert_eq!(result.display_at("B3"), "5.00%");
        assert_eq!(result.display_at("B9"), "1000");
        assert_eq!(result.display_at("C9"), "$995.85");
        assert_eq!(result.display_at("A21"), "");
    }

    #[test]
    fn test_evaluation_is_idempotent() {
        let workbook = Workbook::with_sheet(annuity_sheet());
        let evaluator = evaluator();
        let first = evaluator.evaluate_workbook(&workbook);
        let second = evaluator.evaluate_workbook(&workbook);
        assert_eq!(first, second);
    }

    #[test]
    fn test_source_cells_are_untouched() {
        let workbook = Workbook::with_sheet(annuity_sheet());
        let before = workbook.clone();
        evaluator().evaluate_workbook(&workbook);
        assert_eq!(workbook, before);
    }

    #[test]
    fn test_function_lookup_ignores_case() {
        let sheet = Sheet::from_inputs(
            "Sheet1",
            [
                ["", "1", "=sum(B1:B2)"],
                ["", "2", "=SUM(B1:B2)"],
                ["", "", "=Sum(B1:B2)"],
            ],
        );
        let result = evaluator().evaluate_sheet(&sheet);
        assert_eq!(result.value_at("C1"), &Value::Number(3.0));
        assert_eq!(result.value_at("C1"), result.value_at("C2"));
        assert_eq!(result.value_at("C2"), result.value_at("C3"));
    }

    #[test]
    fn test_negated_payment_keeps_sign() {
        let result = evaluator().evaluate_sheet(&Sheet::from_inputs(
            "Loan",
            [["=-PMT(0.005,360,250000)", "=PMT(0.005,360,250000)"]],
        ));
        let negated = result.value_at("A1").as_number().unwrap();
        let payment = result.value_at("B1").as_number().unwrap();
        assert!((payment - 1498.88).abs() < 0.01, "{payment}");
        assert_eq!(negated, -payment);
    }

    #[test]
    fn test_two_cell_cycle_terminates() {
        let sheet = Sheet::from_inputs("Sheet1", [["=B1", "=A1", "=A1+1", "4"]]);
        let result = evaluator().evaluate_sheet(&sheet);
        assert_eq!(result.display_at("A1"), "#CYCLE!");
        assert_eq!(result.display_at("B1"), "#CYCLE!");
        assert_eq!(result.display_at("C1"), "#CYCLE!");
        assert_eq!(result.display_at("D1"), "4");
    }

    #[test]
    fn test_self_reference_is_a_cycle() {
        let sheet = Sheet::from_inputs("Sheet1", [["=A1*2"]]);
        let result = evaluator().evaluate_sheet(&sheet);
        assert_eq!(result.value(0, 0), &Value::Error(CellError::Cycle));
    }

    #[test]
    fn test_unknown_function_keeps_formula_text() {
        let sheet = Sheet::from_inputs("Sheet1", [["=FOO(1)", "=SUM(1,"]]);
        let result = evaluator().evaluate_sheet(&sheet);
        assert_eq!(result.display_at("A1"), "=FOO(1)");
        assert_eq!(result.display_at("B1"), "=SUM(1,");
    }

    #[test]
    fn test_cross_sheet_forward_reference() {
        let workbook = Workbook {
            sheets: vec![
                Sheet::from_inputs("Summary", [["=SUM(Data!A1:A3)*'Tax Rates'!A1"]]),
                Sheet::from_inputs("Data", [["=A2+1"], ["=A3+1"], ["1"]]),
                Sheet::from_inputs("Tax Rates", [["10%"]]),
            ],
        };
        let result = evaluator().evaluate_workbook(&workbook);
        let summary = result.sheet("summary").unwrap();
        assert!((summary.value(0, 0).as_number().unwrap() - 0.6).abs() < 1e-12);
        assert_eq!(result.sheet("Data").unwrap().display_at("A1"), "3");
    }

    #[test]
    fn test_results_serialize_with_markers() {
        let sheet = Sheet::from_inputs("S", [["1", "x", "", "=A1/0", "=0/0"]]);
        let result = evaluator().evaluate_workbook(&Workbook::with_sheet(sheet));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json[0]["name"], "S");
        assert_eq!(json[0]["values"][0][0], 1.0);
        assert_eq!(json[0]["values"][0][1], "x");
        assert!(json[0]["values"][0][2].is_null());
        assert_eq!(json[0]["values"][0][3], "#DIV/0!");
        assert_eq!(json[0]["display"][0][3], "#DIV/0!");
        assert_eq!(json[0]["values"][0][4], "#NUM!");
        assert_eq!(json[0]["display"][0][4], "#NUM!");
        assert_eq!(result.sheets[0].value(0, 3), &Value::Error(CellError::DivZero));
        assert_eq!(result.sheets[0].value(0, 4), &Value::Error(CellError::Num));
    }
}
