//! `validate` — structural checks, identity on well-formed data.

use crate::cell::{Cell, Rows};
use crate::error::TransformError;
use crate::pipeline::TransformKind;
use crate::traits::{Transform, TransformContext};

const STEP: &str = "validate";

/// Rejects ragged rows (width differing from the header row) and formula
/// cells with an empty expression. Passes the rows through unchanged,
/// which makes it trivially idempotent.
pub struct Validate;

impl Transform for Validate {
    fn kind(&self) -> TransformKind {
        TransformKind::Validate
    }

    fn apply(&self, rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        let Some(header) = rows.first() else {
            return Ok(rows);
        };
        let width = header.len();

        for (r, row) in rows.iter().enumerate() {
            if row.len() != width {
                return Err(TransformError::at_row(
                    STEP,
                    r,
                    format!("row width {} differs from header width {width}", row.len()),
                ));
            }
            for (c, cell) in row.iter().enumerate() {
                if let Cell::Formula { expr, .. } = cell {
                    if expr.trim().is_empty() {
                        return Err(TransformError::at_cell(
                            STEP,
                            r,
                            c,
                            "formula cell has an empty expression",
                        ));
                    }
                }
            }
        }

        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> TransformContext {
        TransformContext {
            sheet: "s".into(),
            sheet_names: vec!["s".into()],
        }
    }

    #[test]
    fn well_formed_rows_pass_through() {
        let rows = vec![
            vec![Cell::text("a"), Cell::text("b")],
            vec![Cell::Number(1.0), Cell::Empty],
        ];
        let out = Validate.apply(rows.clone(), &ctx()).expect("valid");
        assert_eq!(out, rows);
    }

    #[test]
    fn ragged_row_is_rejected_with_row_index() {
        let rows = vec![
            vec![Cell::text("a"), Cell::text("b")],
            vec![Cell::Number(1.0)],
        ];
        let err = Validate.apply(rows, &ctx()).expect_err("ragged");
        assert_eq!(err.row, Some(1));
        assert_eq!(err.step, "validate");
    }

    #[test]
    fn empty_formula_expression_is_rejected_with_cell() {
        let rows = vec![
            vec![Cell::text("a")],
            vec![Cell::formula("  ")],
        ];
        let err = Validate.apply(rows, &ctx()).expect_err("empty formula");
        assert_eq!((err.row, err.col), (Some(1), Some(0)));
    }

    #[test]
    fn empty_sheet_is_valid() {
        assert!(Validate.apply(Vec::new(), &ctx()).is_ok());
    }
}
