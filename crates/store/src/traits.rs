//! The two ports the migration engine is generic over.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use transforms::Rows;
use uuid::Uuid;

use crate::StoreError;

/// Row/column counts of a destination sheet, used for post-write
/// validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SheetSummary {
    pub row_count: usize,
    pub col_count: usize,
}

/// The remote document service port.
///
/// Implementations decide the medium (HTTP API, local files, memory);
/// the engine only sees these four calls. Timeouts are the
/// implementation's business — the engine treats a timed-out call like
/// any other failed call.
#[async_trait]
pub trait SheetStore: Send + Sync {
    /// Create a new, empty destination document and return its ID.
    async fn create_destination(&self, title: &str) -> Result<String, StoreError>;

    /// Read a named sheet's full cell range.
    async fn read_sheet(&self, document_id: &str, sheet: &str) -> Result<Rows, StoreError>;

    /// Write a named sheet's full cell range, replacing prior content.
    async fn write_sheet(
        &self,
        document_id: &str,
        sheet: &str,
        rows: &Rows,
    ) -> Result<(), StoreError>;

    /// Read back row/column counts for a named sheet.
    async fn sheet_summary(
        &self,
        document_id: &str,
        sheet: &str,
    ) -> Result<SheetSummary, StoreError>;
}

/// Run-state snapshot persistence.
///
/// One record per run ID; `save` is last-write-wins. The payload is an
/// opaque JSON value so this crate stays free of engine domain types.
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    async fn save(&self, run_id: Uuid, snapshot: &Value) -> Result<(), StoreError>;

    /// Returns `None` when no checkpoint exists for the run.
    async fn load(&self, run_id: Uuid) -> Result<Option<Value>, StoreError>;

    /// Remove a run's checkpoint. Removing a missing record is not an error.
    async fn delete(&self, run_id: Uuid) -> Result<(), StoreError>;
}
