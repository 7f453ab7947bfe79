//! The tabular data model shared by the whole workspace.
//!
//! A sheet is a `Rows` — a vector of rows of [`Cell`]s, where the first
//! row is the header row. Cells carry the value read from the source
//! document; formula cells keep the expression together with the last
//! value the source document evaluated it to.

use serde::{Deserialize, Serialize};

/// A single cell of a sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Empty,
    Text(String),
    Number(f64),
    Bool(bool),
    /// A formula cell: the raw expression plus the cached evaluation
    /// result carried over from the source document, if any.
    Formula {
        expr: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cached: Option<Box<Cell>>,
    },
}

impl Cell {
    /// Convenience constructor for text cells.
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    /// Convenience constructor for formula cells without a cached value.
    pub fn formula(expr: impl Into<String>) -> Self {
        Self::Formula {
            expr: expr.into(),
            cached: None,
        }
    }

    /// True for `Empty` and for text that is empty or whitespace-only.
    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

/// One row of cells.
pub type Row = Vec<Cell>;

/// A whole sheet; `rows[0]` is the header row.
pub type Rows = Vec<Row>;

/// Row and column counts of a sheet: `(row_count, col_count)`.
///
/// The column count is the widest row, so the result is meaningful even
/// for ragged data that has not passed through `validate`.
pub fn dimensions(rows: &Rows) -> (usize, usize) {
    let cols = rows.iter().map(Vec::len).max().unwrap_or(0);
    (rows.len(), cols)
}

/// True when every cell of the row is blank.
pub fn row_is_blank(row: &Row) -> bool {
    row.iter().all(Cell::is_blank)
}
