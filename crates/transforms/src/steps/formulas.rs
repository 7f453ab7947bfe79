//! `flatten-formulas` / `remap-references` — the formula-phase steps.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::cell::{Cell, Rows};
use crate::error::TransformError;
use crate::pipeline::TransformKind;
use crate::steps::naming::normalize_name;
use crate::traits::{Transform, TransformContext};

/// Replaces every formula cell with its cached evaluation result.
///
/// A formula without a cached value cannot be flattened and fails the
/// step with the cell position. Idempotent: the output contains no
/// formula cells, so a second pass finds nothing to replace.
pub struct FlattenFormulas;

impl Transform for FlattenFormulas {
    fn kind(&self) -> TransformKind {
        TransformKind::FlattenFormulas
    }

    fn apply(&self, mut rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        for (r, row) in rows.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                if let Cell::Formula { cached, .. } = cell {
                    match cached.take() {
                        Some(value) => *cell = *value,
                        None => {
                            return Err(TransformError::at_cell(
                                "flatten-formulas",
                                r,
                                c,
                                "formula has no cached value to flatten to",
                            ))
                        }
                    }
                }
            }
        }
        Ok(rows)
    }
}

/// Matches a sheet qualifier inside a formula expression: either a quoted
/// `'Sheet Name'!` or a bare `sheet_name!`.
static SHEET_QUALIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"'([^']+)'!|([A-Za-z_][A-Za-z0-9_]*)!").expect("valid sheet qualifier regex")
});

/// Rewrites cross-sheet qualifiers inside formula expressions to the
/// standardized destination sheet names.
///
/// Only qualifiers naming a sheet known to the run are rewritten;
/// anything else is left alone. Normalized names never need quoting, and
/// re-normalizing a normalized name is a no-op, so the step is idempotent.
pub struct RemapReferences;

impl RemapReferences {
    fn remap_expr(expr: &str, ctx: &TransformContext) -> String {
        SHEET_QUALIFIER
            .replace_all(expr, |caps: &regex::Captures<'_>| {
                let raw = caps
                    .get(1)
                    .or_else(|| caps.get(2))
                    .map(|m| m.as_str())
                    .unwrap_or_default();
                let known = ctx
                    .sheet_names
                    .iter()
                    .any(|name| name == raw || normalize_name(name) == raw);
                if known {
                    format!("{}!", normalize_name(raw))
                } else {
                    caps[0].to_string()
                }
            })
            .into_owned()
    }
}

impl Transform for RemapReferences {
    fn kind(&self) -> TransformKind {
        TransformKind::RemapReferences
    }

    fn apply(&self, mut rows: Rows, ctx: &TransformContext) -> Result<Rows, TransformError> {
        for row in rows.iter_mut() {
            for cell in row.iter_mut() {
                if let Cell::Formula { expr, .. } = cell {
                    let remapped = Self::remap_expr(expr, ctx);
                    if remapped != *expr {
                        *expr = remapped;
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
            sheet: "orders".into(),
            sheet_names: vec!["Order Lines".into(), "Price List".into(), "orders".into()],
        }
    }

    #[test]
    fn cached_values_replace_formulas() {
        let rows = vec![vec![
            Cell::Formula {
                expr: "=A1+A2".into(),
                cached: Some(Box::new(Cell::Number(3.0))),
            },
            Cell::text("untouched"),
        ]];
        let out = FlattenFormulas.apply(rows, &ctx()).expect("apply");
        assert_eq!(out[0][0], Cell::Number(3.0));
        assert_eq!(out[0][1], Cell::text("untouched"));
    }

    #[test]
    fn missing_cached_value_fails_with_cell_position() {
        let rows = vec![
            vec![Cell::text("h")],
            vec![Cell::Empty, Cell::formula("=B2*2")],
        ];
        let err = FlattenFormulas.apply(rows, &ctx()).expect_err("no cache");
        assert_eq!((err.row, err.col), (Some(1), Some(1)));
    }

    #[test]
    fn known_sheet_qualifiers_are_rewritten() {
        let rows = vec![vec![Cell::formula("=SUM('Order Lines'!B2:B9)+'Price List'!C1")]];
        let out = RemapReferences.apply(rows, &ctx()).expect("apply");
        match &out[0][0] {
            Cell::Formula { expr, .. } => {
                assert_eq!(expr, "=SUM(order_lines!B2:B9)+price_list!C1");
            }
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn unknown_qualifiers_are_left_alone() {
        let rows = vec![vec![Cell::formula("='External Doc'!A1+orders!A1")]];
        let out = RemapReferences.apply(rows, &ctx()).expect("apply");
        match &out[0][0] {
            Cell::Formula { expr, .. } => {
                assert_eq!(expr, "='External Doc'!A1+orders!A1");
            }
            other => panic!("expected formula, got {other:?}"),
        }
    }

    #[test]
    fn both_steps_are_idempotent() {
        let rows = vec![vec![
            Cell::Formula {
                expr: "=SUM('Order Lines'!B2:B9)".into(),
                cached: Some(Box::new(Cell::Number(12.0))),
            },
            Cell::formula("='Price List'!C1"),
        ]];

        let once = RemapReferences.apply(rows.clone(), &ctx()).expect("once");
        let twice = RemapReferences.apply(once.clone(), &ctx()).expect("twice");
        assert_eq!(once, twice);

        let once = FlattenFormulas
            .apply(vec![vec![rows[0][0].clone()]], &ctx())
            .expect("once");
        let twice = FlattenFormulas.apply(once.clone(), &ctx()).expect("twice");
        assert_eq!(once, twice);
    }
}
