//! `sheetporter` CLI entry-point.
//!
//! Available sub-commands:
//! - `plan`   — resolve and print the migration order for an inventory.
//! - `run`    — start a migration and drive it to completion.
//! - `resume` — pick a checkpointed run back up.
//! - `retry`  — re-attempt a single failed or skipped sheet.
//! - `status` — print a run's per-sheet state from its checkpoint.
//!
//! Documents live as JSON files in `--data-dir`; checkpoints as JSON
//! files in `--checkpoint-dir`. A remote sheet service would slot in
//! behind the same store port.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use tracing::info;

use engine::{
    CyclePolicy, Destination, MigrationConfig, MigrationEngine, MigrationRun, SheetInventory,
};
use store::{JsonFileCheckpointStore, LocalSheetStore};
use transforms::TransformKind;

#[derive(Parser)]
#[command(
    name = "sheetporter",
    about = "Dependency-ordered sheet migration engine",
    version
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Args)]
struct StoreArgs {
    /// Directory holding document JSON files.
    #[arg(long, default_value = "./data")]
    data_dir: PathBuf,
    /// Directory holding run checkpoints.
    #[arg(long, default_value = "./checkpoints")]
    checkpoint_dir: PathBuf,
}

#[derive(Subcommand)]
enum Command {
    /// Resolve and print the migration order for an inventory file.
    Plan {
        /// Path to the structural analyzer's inventory JSON.
        inventory: PathBuf,
    },
    /// Start a new migration run and drive it to completion.
    Run {
        /// Path to the structural analyzer's inventory JSON.
        inventory: PathBuf,
        /// Source document ID.
        #[arg(long)]
        source: String,
        /// Title for a freshly created destination document.
        #[arg(long, conflicts_with = "target", default_value = "Migrated")]
        title: String,
        /// Write into an existing destination document instead.
        #[arg(long)]
        target: Option<String>,
        /// Preprocessing steps to apply (comma-separated).
        #[arg(long, value_delimiter = ',')]
        transforms: Vec<TransformKind>,
        /// Stop the whole run at the first failed sheet.
        #[arg(long)]
        stop_on_failure: bool,
        /// Attempt sheets even when a provider failed or was skipped.
        #[arg(long)]
        no_block_dependents: bool,
        /// Cycle handling: strict, skip, or best-effort.
        #[arg(long, default_value = "skip")]
        cycles: String,
        #[command(flatten)]
        stores: StoreArgs,
    },
    /// Resume an interrupted run from its checkpoint.
    Resume {
        run_id: uuid::Uuid,
        #[command(flatten)]
        stores: StoreArgs,
    },
    /// Re-attempt a single failed or skipped sheet.
    Retry {
        run_id: uuid::Uuid,
        sheet: String,
        #[command(flatten)]
        stores: StoreArgs,
    },
    /// Print a run's status from its checkpoint.
    Status {
        run_id: uuid::Uuid,
        #[command(flatten)]
        stores: StoreArgs,
    },
}

type LocalEngine = MigrationEngine<LocalSheetStore, JsonFileCheckpointStore>;

fn local_engine(stores: &StoreArgs) -> LocalEngine {
    MigrationEngine::new(
        Arc::new(LocalSheetStore::new(&stores.data_dir)),
        Arc::new(JsonFileCheckpointStore::new(&stores.checkpoint_dir)),
    )
}

fn load_inventory(path: &PathBuf) -> anyhow::Result<SheetInventory> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("cannot read inventory file {}", path.display()))?;
    serde_json::from_str(&content).context("invalid inventory JSON")
}

fn parse_cycle_policy(s: &str) -> anyhow::Result<CyclePolicy> {
    match s {
        "strict" => Ok(CyclePolicy::Strict),
        "skip" => Ok(CyclePolicy::Skip),
        "best-effort" => Ok(CyclePolicy::BestEffort),
        other => anyhow::bail!("unknown cycle policy '{other}' (strict|skip|best-effort)"),
    }
}

fn print_run(run: &MigrationRun) {
    println!("run {} — {}", run.id, run.status);
    for sheet in run.sheets.values() {
        let detail = match (&sheet.error, &sheet.skip_reason) {
            (Some(error), _) => format!(" ({:?}: {})", error.code, error.message),
            (None, Some(reason)) => format!(" ({reason:?})"),
            _ => String::new(),
        };
        println!("  {:<24} {:>3}%  {}{}", sheet.name, sheet.progress, sheet.status, detail);
    }
    let c = &run.counts;
    println!(
        "completed {} / failed {} / skipped {} of {}",
        c.completed, c.failed, c.skipped, c.total
    );
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    match cli.command {
        Command::Plan { inventory } => {
            let inventory = load_inventory(&inventory)?;
            let graph = engine::DependencyGraph::build(&inventory)?;
            let resolved = engine::resolve(&graph);

            println!("order: {:?}", resolved.order);
            if !resolved.is_acyclic() {
                println!("cyclic clusters (cannot be ordered):");
                for cluster in &resolved.cycles {
                    println!("  {cluster:?}");
                }
            }
        }

        Command::Run {
            inventory,
            source,
            title,
            target,
            transforms,
            stop_on_failure,
            no_block_dependents,
            cycles,
            stores,
        } => {
            let inventory = load_inventory(&inventory)?;
            let config = MigrationConfig {
                source_id: source,
                destination: match target {
                    Some(document_id) => Destination::Existing { document_id },
                    None => Destination::Create { title },
                },
                transforms,
                error_policy: engine::ErrorPolicy {
                    continue_on_failure: !stop_on_failure,
                    block_dependents_on_failure: !no_block_dependents,
                },
                cycle_policy: parse_cycle_policy(&cycles)?,
            };

            let engine = local_engine(&stores);
            let run_id = engine.start(config, inventory).await?;
            info!(%run_id, "run started");
            engine.run(run_id).await?;

            let run = engine.status(run_id).context("run just finished")?;
            print_run(&run);
        }

        Command::Resume { run_id, stores } => {
            let engine = local_engine(&stores);
            engine.resume(run_id).await?;
            engine.run(run_id).await?;

            let run = engine.status(run_id).context("run just finished")?;
            print_run(&run);
        }

        Command::Retry { run_id, sheet, stores } => {
            let engine = local_engine(&stores);
            engine.resume(run_id).await?;
            engine.retry(run_id, &sheet).await?;

            let run = engine.status(run_id).context("run is registered")?;
            print_run(&run);
        }

        Command::Status { run_id, stores } => {
            let engine = local_engine(&stores);
            match engine.peek(run_id).await? {
                Some(run) => print_run(&run),
                None => println!("no checkpoint found for run {run_id}"),
            }
        }
    }

    Ok(())
}
