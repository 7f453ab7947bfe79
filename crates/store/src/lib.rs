//! `store` crate — pure persistence layer.
//!
//! Defines the two ports the engine drives — [`SheetStore`] for the remote
//! document service and [`CheckpointStore`] for run-state snapshots — plus
//! the bundled implementations: in-memory stores for tests and
//! JSON-file-backed stores for local end-to-end use. No business logic
//! lives here.

pub mod checkpoint;
pub mod error;
pub mod local;
pub mod memory;
pub mod traits;

pub use checkpoint::JsonFileCheckpointStore;
pub use error::StoreError;
pub use local::LocalSheetStore;
pub use memory::{MemoryCheckpointStore, MemorySheetStore};
pub use traits::{CheckpointStore, SheetStore, SheetSummary};
