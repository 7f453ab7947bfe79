//! Engine-level error types.
//!
//! Per-sheet failures (transform rejections, store write errors,
//! validation mismatches) are *not* represented here — they are recorded
//! on the sheet's state and the driver moves on. `EngineError` covers
//! what actually stops a run: invalid input at `start`, checkpoint I/O,
//! and misuse of the API.

use std::collections::BTreeSet;

use thiserror::Error;
use uuid::Uuid;

use crate::state::SheetStatus;

#[derive(Debug, Error)]
pub enum EngineError {
    // ------ Validation errors (at `start`) ------

    /// Two or more sheets in the inventory share a name.
    #[error("duplicate sheet name: '{0}'")]
    DuplicateSheet(String),

    /// A dependency edge references a sheet missing from the inventory.
    #[error("dependency references unknown sheet '{sheet}' ({side} side)")]
    UnknownSheetReference { sheet: String, side: &'static str },

    /// `CyclePolicy::Strict` and the graph has cycles.
    #[error("dependency graph contains cycles: {cycles:?}")]
    CycleDetected { cycles: Vec<BTreeSet<String>> },

    /// The configuration cannot start a run (empty source, empty
    /// destination, no sheets, …).
    #[error("invalid config: {0}")]
    InvalidConfig(String),

    // ------ Lifecycle errors ------

    /// A state change outside the sheet transition table was attempted.
    #[error("sheet '{sheet}' cannot move from {from} to {to}")]
    InvalidTransition {
        sheet: String,
        from: SheetStatus,
        to: SheetStatus,
    },

    /// Retry of a sheet that is not in a retryable state.
    #[error("sheet '{sheet}' is {status}; only failed or skipped sheets can be retried")]
    RetryNotAllowed { sheet: String, status: SheetStatus },

    /// The run ID is not registered with this engine.
    #[error("unknown run {0}")]
    UnknownRun(Uuid),

    /// The named sheet is not part of the run.
    #[error("sheet '{0}' is not part of this run")]
    UnknownSheet(String),

    // ------ Persistence errors ------

    /// No checkpoint exists for the run.
    #[error("no checkpoint found for run {0}")]
    CheckpointNotFound(Uuid),

    /// A checkpoint snapshot failed to (de)serialize.
    #[error("checkpoint serialization: {0}")]
    CorruptCheckpoint(#[from] serde_json::Error),

    /// Checkpoint store I/O failed — fatal, progress can no longer be
    /// persisted.
    #[error("checkpoint store error: {0}")]
    Checkpoint(#[source] store::StoreError),

    /// A sheet store call failed outside the per-sheet loop (destination
    /// creation at `start`).
    #[error("sheet store error: {0}")]
    Store(#[source] store::StoreError),
}
