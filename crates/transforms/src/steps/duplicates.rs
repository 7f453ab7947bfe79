//! `remove-duplicates` — exact duplicate data rows, first occurrence wins.

use std::collections::HashSet;

use crate::cell::Rows;
use crate::error::TransformError;
use crate::pipeline::TransformKind;
use crate::traits::{Transform, TransformContext};

const STEP: &str = "remove-duplicates";

/// Drops data rows that are exact duplicates of an earlier data row.
/// The header row never participates in the comparison.
///
/// Rows are compared by their serialized form, which sidesteps the lack
/// of `Eq`/`Hash` on floating-point cells while keeping the comparison
/// exact (a `Number(1.0)` only matches another `Number(1.0)`).
pub struct RemoveDuplicates;

impl Transform for RemoveDuplicates {
    fn kind(&self) -> TransformKind {
        TransformKind::RemoveDuplicates
    }

    fn apply(&self, mut rows: Rows, _ctx: &TransformContext) -> Result<Rows, TransformError> {
        if rows.len() <= 1 {
            return Ok(rows);
        }

        let header = rows.remove(0);
        let mut seen: HashSet<String> = HashSet::with_capacity(rows.len());
        let mut out = Vec::with_capacity(rows.len() + 1);
        out.push(header);

        for (r, row) in rows.into_iter().enumerate() {
            let key = serde_json::to_string(&row)
                .map_err(|e| TransformError::at_row(STEP, r + 1, e.to_string()))?;
            if seen.insert(key) {
                out.push(row);
            }
        }

        Ok(out)
    }
}
