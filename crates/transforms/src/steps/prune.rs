//! `remove-empty-rows` / `remove-empty-columns`.

use crate::cell::{row_is_blank, Cell, Rows};
use crate::error::TransformError;
use crate::pipeline::TransformKind;
use crate::traits::{Transform, TransformContext};

/// Drops every data row whose cells are all blank. The header row is
/// never dropped, even when blank.
pub struct RemoveEmptyRows;

impl Transform for RemoveEmptyRows {
    fn kind(&self) -> TransformKind {
        TransformKind::RemoveEmptyRows
    }

    fn apply(&self, mut rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        if rows.len() <= 1 {
            return Ok(rows);
        }
        let header = rows.remove(0);
        rows.retain(|row| !row_is_blank(row));
        rows.insert(0, header);
        Ok(rows)
    }
}

/// Drops every column that is blank in all rows, header included.
pub struct RemoveEmptyColumns;

impl Transform for RemoveEmptyColumns {
    fn kind(&self) -> TransformKind {
        TransformKind::RemoveEmptyColumns
    }

    fn apply(&self, mut rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        if width == 0 {
            return Ok(rows);
        }

        let keep: Vec<bool> = (0..width)
            .map(|c| {
                rows.iter()
                    .any(|row| row.get(c).is_some_and(|cell| !cell.is_blank()))
            })
            .collect();

        if keep.iter().all(|k| *k) {
            return Ok(rows);
        }

        for row in rows.iter_mut() {
            let cells = std::mem::take(row);
            *row = cells
                .into_iter()
                .enumerate()
                .filter_map(|(c, cell)| keep[c].then_some(cell))
                .collect();
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

    fn sample() -> Rows {
        vec![
            vec![Cell::text("a"), Cell::Empty, Cell::text("c")],
            vec![Cell::Number(1.0), Cell::text("  "), Cell::Number(2.0)],
            vec![Cell::Empty, Cell::Empty, Cell::Empty],
            vec![Cell::Number(3.0), Cell::Empty, Cell::Number(4.0)],
        ]
    }

    #[test]
    fn blank_rows_are_dropped_but_header_survives() {
        let out = RemoveEmptyRows.apply(sample(), &ctx()).expect("apply");
        assert_eq!(out.len(), 3);

        let all_blank_header = vec![
            vec![Cell::Empty, Cell::Empty],
            vec![Cell::Empty, Cell::Empty],
        ];
        let out = RemoveEmptyRows.apply(all_blank_header, &ctx()).expect("apply");
        assert_eq!(out.len(), 1, "header row is kept even when blank");
    }

    #[test]
    fn blank_columns_are_dropped() {
        let out = RemoveEmptyColumns.apply(sample(), &ctx()).expect("apply");
        // The middle column was blank everywhere (header Empty, data blank).
        assert_eq!(out[0], vec![Cell::text("a"), Cell::text("c")]);
        assert_eq!(out[1], vec![Cell::Number(1.0), Cell::Number(2.0)]);
    }

    #[test]
    fn both_steps_are_idempotent() {
        let once = RemoveEmptyRows.apply(sample(), &ctx()).expect("once");
        let twice = RemoveEmptyRows.apply(once.clone(), &ctx()).expect("twice");
        assert_eq!(once, twice);

        let once = RemoveEmptyColumns.apply(sample(), &ctx()).expect("once");
        let twice = RemoveEmptyColumns.apply(once.clone(), &ctx()).expect("twice");
        assert_eq!(once, twice);
    }

    #[test]
    fn ragged_rows_do_not_panic() {
        let rows = vec![
            vec![Cell::text("a"), Cell::Empty],
            vec![Cell::Number(1.0)],
        ];
        let out = RemoveEmptyColumns.apply(rows, &ctx()).expect("apply");
        assert_eq!(out[0], vec![Cell::text("a")]);
        assert_eq!(out[1], vec![Cell::Number(1.0)]);
    }
}
