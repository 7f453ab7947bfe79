//! `standardize-naming` — header normalization.

use crate::cell::{Cell, Rows};
use crate::error::TransformError;
use crate::pipeline::TransformKind;
use crate::traits::{Transform, TransformContext};

/// Normalize a header or sheet name: trim, lowercase, collapse whitespace
/// runs to a single `_`, drop everything outside `[a-z0-9_]`.
///
/// Normalizing an already-normalized name is a no-op, which is what makes
/// both this step and `remap-references` idempotent.
pub fn normalize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_sep = false;

    for ch in name.trim().chars() {
        if ch.is_whitespace() {
            pending_sep = !out.is_empty();
            continue;
        }
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_alphanumeric() || ch == '_' {
            if pending_sep {
                out.push('_');
                pending_sep = false;
            }
            out.push(ch);
        }
    }

    out
}

/// Rewrites every text cell of the header row to its normalized form.
/// A header cell that normalizes to nothing becomes `Empty`.
pub struct StandardizeNaming;

impl Transform for StandardizeNaming {
    fn kind(&self) -> TransformKind {
        TransformKind::StandardizeNaming
    }

    fn apply(&self, mut rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        if let Some(header) = rows.first_mut() {
            for cell in header.iter_mut() {
                if let Cell::Text(s) = cell {
                    let normalized = normalize_name(s);
                    *cell = if normalized.is_empty() {
                        Cell::Empty
                    } else {
                        Cell::Text(normalized)
                    };
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
    fn names_are_normalized() {
        assert_eq!(normalize_name("  Total Sales (EUR)  "), "total_sales_eur");
        assert_eq!(normalize_name("Already_ok_2"), "already_ok_2");
        assert_eq!(normalize_name("Über-Sheet"), "bersheet");
        assert_eq!(normalize_name("   "), "");
    }

    #[test]
    fn normalization_is_idempotent() {
        for raw in ["Total Sales (EUR)", "a  b\tc", "MiXeD", "x_1"] {
            let once = normalize_name(raw);
            assert_eq!(normalize_name(&once), once, "raw input: {raw:?}");
        }
    }

    #[test]
    fn only_the_header_row_is_rewritten() {
        let rows = vec![
            vec![Cell::text("Col A"), Cell::text(" ")],
            vec![Cell::text("Keep Me As-Is")],
        ];
        let out = StandardizeNaming.apply(rows, &ctx()).expect("apply");
        assert_eq!(out[0], vec![Cell::text("col_a"), Cell::Empty]);
        assert_eq!(out[1], vec![Cell::text("Keep Me As-Is")]);
    }

    #[test]
    fn step_is_idempotent() {
        let rows = vec![vec![Cell::text("Col A"), Cell::Number(1.0)]];
        let once = StandardizeNaming.apply(rows, &ctx()).expect("once");
        let twice = StandardizeNaming.apply(once.clone(), &ctx()).expect("twice");
        assert_eq!(once, twice);
    }
}
