//! Migration execution engine.
//!
//! `MigrationEngine` is the central orchestrator:
//! 1. Validates the inventory, builds the dependency graph, and resolves
//!    a deterministic processing order.
//! 2. Walks the order one sheet at a time, driving each through
//!    preprocessing → copy → transform → validate.
//! 3. Applies the error policy (continue on failure, block dependents).
//! 4. Persists a checkpoint after every sheet state transition, so an
//!    interrupted run resumes losing at most the in-flight sheet.
//! 5. Exposes status snapshots, cooperative cancellation, and targeted
//!    per-sheet retry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use parking_lot::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};

use store::{CheckpointStore, SheetStore};
use transforms::{dimensions, Phase, Pipeline, TransformContext};

use crate::error::EngineError;
use crate::graph::DependencyGraph;
use crate::models::{
    CyclePolicy, Destination, MigrationConfig, MigrationRun, RunCounts, RunReport, RunStatus,
    SheetInventory,
};
use crate::order::resolve;
use crate::state::{SheetErrorCode, SheetMigrationState, SheetStatus, SkipReason};

// ---------------------------------------------------------------------------
// Run registry
// ---------------------------------------------------------------------------

/// A registered run: shared state plus its cancellation token.
///
/// The lock is only ever held for short, await-free sections; observers
/// read cloned snapshots.
#[derive(Clone)]
struct RunHandle {
    run: Arc<RwLock<MigrationRun>>,
    cancel: CancellationToken,
}

/// How a single sheet attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SheetOutcome {
    Completed,
    Failed,
    Skipped,
}

// ---------------------------------------------------------------------------
// MigrationEngine
// ---------------------------------------------------------------------------

/// The engine facade: owns the run registry and drives runs to
/// completion. Generic over the two ports, so tests run fully in memory
/// and the CLI runs against files.
pub struct MigrationEngine<S, C> {
    store: Arc<S>,
    checkpoints: Arc<C>,
    runs: Mutex<HashMap<uuid::Uuid, RunHandle>>,
}

impl<S: SheetStore, C: CheckpointStore> MigrationEngine<S, C> {
    pub fn new(store: Arc<S>, checkpoints: Arc<C>) -> Self {
        Self {
            store,
            checkpoints,
            runs: Mutex::new(HashMap::new()),
        }
    }

    // -----------------------------------------------------------------------
    // start
    // -----------------------------------------------------------------------

    /// Validate the config and inventory, resolve the order, create the
    /// destination, and register a new run in `running` state.
    ///
    /// Every run-level fatal condition surfaces here, before any sheet
    /// is touched. The returned ID is then passed to [`Self::run`].
    pub async fn start(
        &self,
        config: MigrationConfig,
        inventory: SheetInventory,
    ) -> Result<uuid::Uuid, EngineError> {
        if config.source_id.trim().is_empty() {
            return Err(EngineError::InvalidConfig("source document id is empty".into()));
        }
        match &config.destination {
            Destination::Existing { document_id } if document_id.trim().is_empty() => {
                return Err(EngineError::InvalidConfig("destination document id is empty".into()));
            }
            Destination::Create { title } if title.trim().is_empty() => {
                return Err(EngineError::InvalidConfig("destination title is empty".into()));
            }
            _ => {}
        }
        if inventory.sheets.is_empty() {
            return Err(EngineError::InvalidConfig("inventory contains no sheets".into()));
        }

        let graph = DependencyGraph::build(&inventory)?;
        let resolved = resolve(&graph);

        if config.cycle_policy == CyclePolicy::Strict && !resolved.is_acyclic() {
            return Err(EngineError::CycleDetected {
                cycles: resolved.cycles,
            });
        }

        let target_id = match &config.destination {
            Destination::Existing { document_id } => document_id.clone(),
            Destination::Create { title } => self
                .store
                .create_destination(title)
                .await
                .map_err(EngineError::Store)?,
        };

        // Under best-effort, cyclic sheets are appended in inventory
        // order and attempted like any other.
        let mut order = resolved.order.clone();
        if config.cycle_policy == CyclePolicy::BestEffort {
            for name in graph.nodes() {
                if resolved.cycles.iter().any(|c| c.contains(name)) {
                    order.push(name.clone());
                }
            }
        }

        let mut sheets = std::collections::BTreeMap::new();
        for meta in &inventory.sheets {
            sheets.insert(meta.name.clone(), SheetMigrationState::new(&meta.name));
        }

        // Under the skip policy, cyclic sheets reach their terminal
        // state before the loop even starts.
        if config.cycle_policy == CyclePolicy::Skip {
            for cluster in &resolved.cycles {
                for name in cluster {
                    if let Some(sheet) = sheets.get_mut(name) {
                        sheet.skip(SkipReason::Cyclic)?;
                    }
                }
            }
        }

        let mut run = MigrationRun {
            id: uuid::Uuid::new_v4(),
            config,
            graph,
            order,
            cycles: resolved.cycles,
            target_id,
            sheets,
            counts: RunCounts::default(),
            status: RunStatus::Running,
            started_at: Utc::now(),
            ended_at: None,
        };
        run.refresh_counts();

        self.save_checkpoint(&run).await?;

        let run_id = run.id;
        info!(
            %run_id,
            sheets = run.counts.total,
            ordered = run.order.len(),
            cyclic_clusters = run.cycles.len(),
            "migration run registered"
        );

        self.register(run);
        Ok(run_id)
    }

    // -----------------------------------------------------------------------
    // run
    // -----------------------------------------------------------------------

    /// Drive the run to a terminal status.
    ///
    /// # Errors
    /// Only run-level fatal conditions abort the loop: checkpoint I/O
    /// failure or an unknown run ID. Per-sheet failures are recorded on
    /// the sheet and the loop continues, subject to the error policy.
    #[instrument(skip(self))]
    pub async fn run(&self, run_id: uuid::Uuid) -> Result<RunReport, EngineError> {
        let handle = self.handle(run_id)?;

        let (order, config, target_id) = {
            let run = handle.run.read();
            (run.order.clone(), run.config.clone(), run.target_id.clone())
        };
        let sheet_names: Vec<String> = {
            let run = handle.run.read();
            run.graph.nodes().to_vec()
        };
        let pipeline = Pipeline::from_kinds(&config.transforms);

        let mut aborted = false;

        for (position, name) in order.iter().enumerate() {
            if handle.cancel.is_cancelled() {
                info!(%run_id, sheet = %name, "cancellation observed between sheets");
                return self.finalize(&handle, RunStatus::Cancelled).await;
            }

            let current = {
                let run = handle.run.read();
                run.sheets
                    .get(name)
                    .ok_or_else(|| EngineError::UnknownSheet(name.clone()))?
                    .status
            };
            // Resumed runs keep prior terminal results as-is.
            if current.is_terminal() {
                continue;
            }

            if aborted {
                self.skip_sheet(&handle, name, SkipReason::RunAborted).await?;
                continue;
            }

            if config.error_policy.block_dependents_on_failure
                && self.has_unmet_providers(&handle, name)
            {
                self.skip_sheet(&handle, name, SkipReason::BlockedDependency).await?;
                continue;
            }

            info!(%run_id, sheet = %name, position, of = order.len(), "migrating sheet");
            let outcome = self
                .migrate_sheet(&handle, &config, &pipeline, &target_id, name, &sheet_names)
                .await?;

            if outcome == SheetOutcome::Failed && !config.error_policy.continue_on_failure {
                warn!(%run_id, sheet = %name, "stopping run after failure (continue_on_failure = false)");
                aborted = true;
            }
        }

        let report = self.finalize(&handle, RunStatus::Completed).await?;
        info!(
            %run_id,
            completed = report.counts.completed,
            failed = report.counts.failed,
            skipped = report.counts.skipped,
            "migration run finished"
        );
        Ok(report)
    }

    // -----------------------------------------------------------------------
    // Observation & control
    // -----------------------------------------------------------------------

    /// A consistent snapshot of the run, for concurrent observers.
    pub fn status(&self, run_id: uuid::Uuid) -> Option<MigrationRun> {
        let runs = self.runs.lock();
        runs.get(&run_id).map(|h| h.run.read().clone())
    }

    /// Request cooperative cancellation: the driver exits before the
    /// next sheet; the in-flight sheet finishes its current step.
    pub fn cancel(&self, run_id: uuid::Uuid) -> Result<(), EngineError> {
        let handle = self.handle(run_id)?;
        info!(%run_id, "cancellation requested");
        handle.cancel.cancel();
        Ok(())
    }

    /// Re-attempt a single `failed` or `skipped` sheet.
    ///
    /// The blocked-dependency policy is re-evaluated against the
    /// *current* state of the sheet's providers, so retrying a fixed
    /// provider first unblocks its dependents.
    pub async fn retry(&self, run_id: uuid::Uuid, sheet: &str) -> Result<(), EngineError> {
        let handle = self.handle(run_id)?;

        let (config, target_id, sheet_names) = {
            let mut run = handle.run.write();
            let state = run
                .sheets
                .get_mut(sheet)
                .ok_or_else(|| EngineError::UnknownSheet(sheet.to_string()))?;
            state.reset_for_retry()?;
            run.refresh_counts();
            (run.config.clone(), run.target_id.clone(), run.graph.nodes().to_vec())
        };
        self.checkpoint(&handle).await?;

        info!(%run_id, sheet, "retrying sheet");

        if config.error_policy.block_dependents_on_failure
            && self.has_unmet_providers(&handle, sheet)
        {
            self.skip_sheet(&handle, sheet, SkipReason::BlockedDependency).await?;
            return Ok(());
        }

        let pipeline = Pipeline::from_kinds(&config.transforms);
        self.migrate_sheet(&handle, &config, &pipeline, &target_id, sheet, &sheet_names)
            .await?;
        Ok(())
    }

    /// Load a checkpointed run back into the registry.
    ///
    /// Prior terminal sheets keep their results; a sheet interrupted
    /// mid-flight restarts from `pending`. The caller decides whether to
    /// resume at all — a checkpoint written under a different config is
    /// the caller's hazard to weigh.
    pub async fn resume(&self, run_id: uuid::Uuid) -> Result<uuid::Uuid, EngineError> {
        // Re-registering replaces any prior handle (and its possibly
        // already-cancelled token); the checkpoint is the authority.
        self.runs.lock().remove(&run_id);

        let snapshot = self
            .checkpoints
            .load(run_id)
            .await
            .map_err(EngineError::Checkpoint)?
            .ok_or(EngineError::CheckpointNotFound(run_id))?;
        let mut run: MigrationRun = serde_json::from_value(snapshot)?;

        // An in-flight sheet loses its partial progress and starts over.
        for sheet in run.sheets.values_mut() {
            if !sheet.status.is_terminal() && sheet.status != SheetStatus::Pending {
                *sheet = SheetMigrationState::new(std::mem::take(&mut sheet.name));
            }
        }
        run.status = RunStatus::Running;
        run.ended_at = None;
        run.refresh_counts();

        self.save_checkpoint(&run).await?;
        info!(%run_id, completed = run.counts.completed, total = run.counts.total, "run resumed from checkpoint");
        self.register(run);
        Ok(run_id)
    }

    /// Inspect a run without registering it: the live snapshot if the
    /// run is loaded, otherwise its checkpoint (reported as `paused`,
    /// since no driver owns it).
    pub async fn peek(&self, run_id: uuid::Uuid) -> Result<Option<MigrationRun>, EngineError> {
        if let Some(snapshot) = self.status(run_id) {
            return Ok(Some(snapshot));
        }
        let Some(value) = self
            .checkpoints
            .load(run_id)
            .await
            .map_err(EngineError::Checkpoint)?
        else {
            return Ok(None);
        };
        let mut run: MigrationRun = serde_json::from_value(value)?;
        if run.status == RunStatus::Running {
            run.status = RunStatus::Paused;
        }
        Ok(Some(run))
    }

    // -----------------------------------------------------------------------
    // Internal: one sheet, pending → terminal
    // -----------------------------------------------------------------------

    async fn migrate_sheet(
        &self,
        handle: &RunHandle,
        config: &MigrationConfig,
        pipeline: &Pipeline,
        target_id: &str,
        name: &str,
        sheet_names: &[String],
    ) -> Result<SheetOutcome, EngineError> {
        let ctx = TransformContext {
            sheet: name.to_string(),
            sheet_names: sheet_names.to_vec(),
        };

        // --- preprocessing: read the source, run the cleaning steps ---
        self.transition(handle, name, SheetStatus::Preprocessing).await?;

        let rows = match self.store.read_sheet(&config.source_id, name).await {
            Ok(rows) => rows,
            Err(e) => {
                return self
                    .fail_sheet(handle, name, SheetErrorCode::Write, format!("reading source sheet: {e}"))
                    .await;
            }
        };

        let cleaned = match pipeline.run_phase(Phase::Cleaning, rows, &ctx) {
            Ok(rows) => rows,
            Err(e) => {
                return self
                    .fail_sheet(handle, name, SheetErrorCode::Preprocessing, e.to_string())
                    .await;
            }
        };

        // --- copying: land the cleaned rows in the destination ---
        self.transition(handle, name, SheetStatus::Copying).await?;

        if let Err(e) = self.store.write_sheet(target_id, name, &cleaned).await {
            return self
                .fail_sheet(handle, name, SheetErrorCode::Write, e.to_string())
                .await;
        }

        // --- transforming: formula flattening/remapping, rewrite if changed ---
        self.transition(handle, name, SheetStatus::Transforming).await?;

        let transformed = match pipeline.run_phase(Phase::Formula, cleaned.clone(), &ctx) {
            Ok(rows) => rows,
            Err(e) => {
                return self
                    .fail_sheet(handle, name, SheetErrorCode::Preprocessing, e.to_string())
                    .await;
            }
        };
        if transformed != cleaned {
            if let Err(e) = self.store.write_sheet(target_id, name, &transformed).await {
                return self
                    .fail_sheet(handle, name, SheetErrorCode::Write, e.to_string())
                    .await;
            }
        }

        // --- validating: compare destination counts with what we wrote ---
        self.transition(handle, name, SheetStatus::Validating).await?;

        let summary = match self.store.sheet_summary(target_id, name).await {
            Ok(summary) => summary,
            Err(e) => {
                return self
                    .fail_sheet(handle, name, SheetErrorCode::Write, format!("reading summary: {e}"))
                    .await;
            }
        };
        let (expected_rows, expected_cols) = dimensions(&transformed);
        if summary.row_count != expected_rows || summary.col_count != expected_cols {
            return self
                .fail_sheet(
                    handle,
                    name,
                    SheetErrorCode::ValidationMismatch,
                    format!(
                        "destination reports {}x{}, expected {expected_rows}x{expected_cols}",
                        summary.row_count, summary.col_count
                    ),
                )
                .await;
        }

        self.transition(handle, name, SheetStatus::Completed).await?;
        Ok(SheetOutcome::Completed)
    }

    // -----------------------------------------------------------------------
    // Internal: state mutation + checkpointing
    // -----------------------------------------------------------------------

    /// True when any direct provider of `name` failed or was skipped.
    fn has_unmet_providers(&self, handle: &RunHandle, name: &str) -> bool {
        let run = handle.run.read();
        run.graph.providers_of(name).into_iter().any(|provider| {
            run.sheets
                .get(provider)
                .is_some_and(|s| matches!(s.status, SheetStatus::Failed | SheetStatus::Skipped))
        })
    }

    async fn transition(
        &self,
        handle: &RunHandle,
        name: &str,
        to: SheetStatus,
    ) -> Result<(), EngineError> {
        {
            let mut run = handle.run.write();
            let sheet = run
                .sheets
                .get_mut(name)
                .ok_or_else(|| EngineError::UnknownSheet(name.to_string()))?;
            sheet.transition(to)?;
            run.refresh_counts();
        }
        self.checkpoint(handle).await
    }

    async fn fail_sheet(
        &self,
        handle: &RunHandle,
        name: &str,
        code: SheetErrorCode,
        message: String,
    ) -> Result<SheetOutcome, EngineError> {
        error!(sheet = %name, ?code, %message, "sheet failed");
        {
            let mut run = handle.run.write();
            let sheet = run
                .sheets
                .get_mut(name)
                .ok_or_else(|| EngineError::UnknownSheet(name.to_string()))?;
            sheet.fail(code, message)?;
            run.refresh_counts();
        }
        self.checkpoint(handle).await?;
        Ok(SheetOutcome::Failed)
    }

    async fn skip_sheet(
        &self,
        handle: &RunHandle,
        name: &str,
        reason: SkipReason,
    ) -> Result<SheetOutcome, EngineError> {
        warn!(sheet = %name, ?reason, "sheet skipped");
        {
            let mut run = handle.run.write();
            let sheet = run
                .sheets
                .get_mut(name)
                .ok_or_else(|| EngineError::UnknownSheet(name.to_string()))?;
            sheet.skip(reason)?;
            run.refresh_counts();
        }
        self.checkpoint(handle).await?;
        Ok(SheetOutcome::Skipped)
    }

    async fn finalize(
        &self,
        handle: &RunHandle,
        status: RunStatus,
    ) -> Result<RunReport, EngineError> {
        let report = {
            let mut run = handle.run.write();
            run.status = status;
            run.ended_at = Some(Utc::now());
            run.refresh_counts();
            RunReport {
                run_id: run.id,
                status: run.status,
                counts: run.counts,
            }
        };
        self.checkpoint(handle).await?;
        Ok(report)
    }

    async fn checkpoint(&self, handle: &RunHandle) -> Result<(), EngineError> {
        let (run_id, snapshot) = {
            let run = handle.run.read();
            (run.id, serde_json::to_value(&*run)?)
        };
        self.checkpoints
            .save(run_id, &snapshot)
            .await
            .map_err(EngineError::Checkpoint)
    }

    async fn save_checkpoint(&self, run: &MigrationRun) -> Result<(), EngineError> {
        let snapshot = serde_json::to_value(run)?;
        self.checkpoints
            .save(run.id, &snapshot)
            .await
            .map_err(EngineError::Checkpoint)
    }

    fn register(&self, run: MigrationRun) {
        let handle = RunHandle {
            run: Arc::new(RwLock::new(run)),
            cancel: CancellationToken::new(),
        };
        self.runs.lock().insert(handle.run.read().id, handle.clone());
    }

    fn handle(&self, run_id: uuid::Uuid) -> Result<RunHandle, EngineError> {
        self.runs
            .lock()
            .get(&run_id)
            .cloned()
            .ok_or(EngineError::UnknownRun(run_id))
    }
}
