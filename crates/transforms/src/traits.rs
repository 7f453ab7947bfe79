//! The `Transform` trait — the contract every preprocessing step must fulfil.

use crate::cell::Rows;
use crate::error::TransformError;
use crate::pipeline::TransformKind;

/// Shared context passed to every step during a pipeline run.
///
/// Defined here so both the engine and individual step implementations can
/// import it without a circular dependency.
#[derive(Debug, Clone)]
pub struct TransformContext {
    /// Name of the sheet the rows were read from.
    pub sheet: String,
    /// Every sheet name known to the run, in inventory order. Steps that
    /// rewrite cross-sheet references use this to recognise qualifiers.
    pub sheet_names: Vec<String>,
}

/// The core step trait.
///
/// Each step is a pure function over the rows and must be idempotent:
/// applying a step to its own output yields that output unchanged. The
/// pipeline relies on this to make any selected subset of steps
/// order-independent.
pub trait Transform: Send + Sync {
    /// Which built-in step this is; determines its canonical position.
    fn kind(&self) -> TransformKind;

    /// Apply the step. Takes the rows by value and returns the transformed
    /// rows, or a [`TransformError`] with row/column context.
    fn apply(&self, rows: Rows, ctx: &TransformContext) -> Result<Rows, TransformError>;
}
