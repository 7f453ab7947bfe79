//! Transform-level error type.

use thiserror::Error;

/// Error raised by a transform step, carrying the step name and the
/// row/column the step was looking at when it rejected the data.
///
/// Row and column indices are zero-based and include the header row.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct TransformError {
    /// Name of the step that failed (kebab-case, e.g. `flatten-formulas`).
    pub step: &'static str,
    pub row: Option<usize>,
    pub col: Option<usize>,
    pub message: String,
}

impl TransformError {
    pub fn new(step: &'static str, message: impl Into<String>) -> Self {
        Self {
            step,
            row: None,
            col: None,
            message: message.into(),
        }
    }

    pub fn at_row(step: &'static str, row: usize, message: impl Into<String>) -> Self {
        Self {
            step,
            row: Some(row),
            col: None,
            message: message.into(),
        }
    }

    pub fn at_cell(
        step: &'static str,
        row: usize,
        col: usize,
        message: impl Into<String>,
    ) -> Self {
        Self {
            step,
            row: Some(row),
            col: Some(col),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for TransformError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "step '{}' failed", self.step)?;
        match (self.row, self.col) {
            (Some(r), Some(c)) => write!(f, " at row {r}, column {c}")?,
            (Some(r), None) => write!(f, " at row {r}")?,
            _ => {}
        }
        write!(f, ": {}", self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_context() {
        let err = TransformError::at_cell("flatten-formulas", 3, 1, "no cached value");
        assert_eq!(
            err.to_string(),
            "step 'flatten-formulas' failed at row 3, column 1: no cached value"
        );

        let err = TransformError::new("validate", "empty sheet");
        assert_eq!(err.to_string(), "step 'validate' failed: empty sheet");
    }
}
