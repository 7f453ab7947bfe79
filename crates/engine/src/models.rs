//! Core domain models for the migration engine.
//!
//! These types are the source of truth for what a migration run looks
//! like in memory. `MigrationRun` serializes as-is into the checkpoint
//! record, so every field here must stay `serde`-round-trippable.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use transforms::TransformKind;
use uuid::Uuid;

use crate::graph::DependencyGraph;
use crate::state::SheetMigrationState;

/// Sheets are addressed by name throughout the engine.
pub type SheetName = String;

// ---------------------------------------------------------------------------
// Structural Analyzer input
// ---------------------------------------------------------------------------

/// One sheet as reported by the structural analyzer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetMeta {
    pub name: SheetName,
    pub row_count: usize,
    pub col_count: usize,
}

/// A raw reference pair: `from` reads data produced by `to`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceEdge {
    pub from: SheetName,
    pub to: SheetName,
}

/// The structural analyzer's output, consumed once at `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetInventory {
    pub sheets: Vec<SheetMeta>,
    pub dependencies: Vec<ReferenceEdge>,
}

// ---------------------------------------------------------------------------
// MigrationConfig
// ---------------------------------------------------------------------------

/// Where migrated sheets land.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Destination {
    /// Write into a document that already exists.
    Existing { document_id: String },
    /// Create a fresh destination document at `start`.
    Create { title: String },
}

/// What the driver does when a sheet fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorPolicy {
    /// Keep processing the remaining sheets after a failure.
    pub continue_on_failure: bool,
    /// Skip a sheet whose direct providers failed or were skipped.
    pub block_dependents_on_failure: bool,
}

impl Default for ErrorPolicy {
    fn default() -> Self {
        Self {
            continue_on_failure: true,
            block_dependents_on_failure: true,
        }
    }
}

/// What to do with sheets caught in a reference cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CyclePolicy {
    /// Refuse to start while the graph has cycles.
    Strict,
    /// Mark cyclic sheets as skipped and migrate the rest.
    #[default]
    Skip,
    /// Attempt cyclic sheets too, in inventory order.
    BestEffort,
}

/// Immutable run configuration, fixed at `start`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Source document ID.
    pub source_id: String,
    pub destination: Destination,
    /// Selected preprocessing steps; order carries no meaning.
    #[serde(default)]
    pub transforms: Vec<TransformKind>,
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    #[serde(default)]
    pub cycle_policy: CyclePolicy,
}

// ---------------------------------------------------------------------------
// MigrationRun
// ---------------------------------------------------------------------------

/// Overall status of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Running,
    /// A checkpoint exists but no driver currently owns the run
    /// (interrupted or loaded, awaiting a resume decision).
    Paused,
    /// No more work to do. Individual sheets may still have failed or
    /// been skipped.
    Completed,
    Cancelled,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Terminal-state tallies over all sheets of a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunCounts {
    pub completed: usize,
    pub failed: usize,
    pub skipped: usize,
    pub total: usize,
}

impl RunCounts {
    /// Recompute the tallies from the sheet map. Called after every
    /// mutation so the counts can never drift from the states.
    pub fn tally(sheets: &BTreeMap<SheetName, SheetMigrationState>) -> Self {
        use crate::state::SheetStatus;

        let mut counts = Self {
            total: sheets.len(),
            ..Self::default()
        };
        for sheet in sheets.values() {
            match sheet.status {
                SheetStatus::Completed => counts.completed += 1,
                SheetStatus::Failed => counts.failed += 1,
                SheetStatus::Skipped => counts.skipped += 1,
                _ => {}
            }
        }
        counts
    }
}

/// The aggregate state of one migration run.
///
/// Owned for writing exclusively by the execution driver; observers get
/// cloned snapshots. The whole struct is the checkpoint payload.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MigrationRun {
    pub id: Uuid,
    pub config: MigrationConfig,
    pub graph: DependencyGraph,
    /// Resolver output: the processing sequence (acyclic prefix, plus
    /// cyclic sheets appended under `CyclePolicy::BestEffort`).
    pub order: Vec<SheetName>,
    /// Cyclic clusters the resolver could not order.
    pub cycles: Vec<BTreeSet<SheetName>>,
    /// Resolved destination document ID.
    pub target_id: String,
    pub sheets: BTreeMap<SheetName, SheetMigrationState>,
    pub counts: RunCounts,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
}

impl MigrationRun {
    /// Re-tally `counts` from the sheet states.
    pub fn refresh_counts(&mut self) {
        self.counts = RunCounts::tally(&self.sheets);
    }
}

/// What `run` hands back once the loop exits.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub run_id: Uuid,
    pub status: RunStatus,
    pub counts: RunCounts,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{SheetStatus, SkipReason};

    #[test]
    fn tally_covers_terminal_states_only() {
        let mut sheets = BTreeMap::new();
        sheets.insert("a".to_string(), SheetMigrationState::new("a"));

        let mut done = SheetMigrationState::new("b");
        for status in [
            SheetStatus::Preprocessing,
            SheetStatus::Copying,
            SheetStatus::Transforming,
            SheetStatus::Validating,
            SheetStatus::Completed,
        ] {
            done.transition(status).expect("valid transition");
        }
        sheets.insert("b".to_string(), done);

        let mut skipped = SheetMigrationState::new("c");
        skipped.skip(SkipReason::Cyclic).expect("skippable");
        sheets.insert("c".to_string(), skipped);

        let counts = RunCounts::tally(&sheets);
        assert_eq!(counts.completed, 1);
        assert_eq!(counts.failed, 0);
        assert_eq!(counts.skipped, 1);
        assert_eq!(counts.total, 3);
    }

    #[test]
    fn default_policies_continue_and_block() {
        let policy = ErrorPolicy::default();
        assert!(policy.continue_on_failure);
        assert!(policy.block_dependents_on_failure);
        assert_eq!(CyclePolicy::default(), CyclePolicy::Skip);
    }
}
