//! In-memory store implementations — test doubles for both ports.
//!
//! `MemorySheetStore` supports programmable failures plus call
//! recording, so driver tests can simulate a flaky remote service
//! without any network.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;
use transforms::{dimensions, Rows};
use uuid::Uuid;

use crate::traits::{CheckpointStore, SheetStore, SheetSummary};
use crate::StoreError;

type Document = BTreeMap<String, Rows>;
type WriteHook = Box<dyn Fn(&str) + Send + Sync>;

/// In-memory implementation of [`SheetStore`].
#[derive(Default)]
pub struct MemorySheetStore {
    documents: Mutex<HashMap<String, Document>>,
    /// sheet name → number of writes left to reject.
    fail_writes: Mutex<HashMap<String, usize>>,
    /// sheet name → summary to report instead of the real one.
    summary_overrides: Mutex<HashMap<String, SheetSummary>>,
    /// Called after every successful write with the sheet name.
    write_hook: Mutex<Option<WriteHook>>,
    /// Sheet names in write order, for ordering assertions.
    writes: Mutex<Vec<String>>,
    next_doc: AtomicUsize,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a source document with the given sheets.
    pub fn insert_document(&self, document_id: impl Into<String>, sheets: Vec<(&str, Rows)>) {
        let doc: Document = sheets
            .into_iter()
            .map(|(name, rows)| (name.to_string(), rows))
            .collect();
        self.documents
            .lock()
            .unwrap()
            .insert(document_id.into(), doc);
    }

    /// Reject the next `times` writes to `sheet` with a `WriteRejected`.
    pub fn fail_writes(&self, sheet: impl Into<String>, times: usize) {
        self.fail_writes.lock().unwrap().insert(sheet.into(), times);
    }

    /// Report a fixed summary for `sheet` instead of the real counts.
    pub fn override_summary(&self, sheet: impl Into<String>, summary: SheetSummary) {
        self.summary_overrides
            .lock()
            .unwrap()
            .insert(sheet.into(), summary);
    }

    /// Run `hook` after every successful write (e.g. to trigger
    /// cancellation at a deterministic point in a driver test).
    pub fn set_write_hook(&self, hook: impl Fn(&str) + Send + Sync + 'static) {
        *self.write_hook.lock().unwrap() = Some(Box::new(hook));
    }

    /// Sheet names in the order they were successfully written.
    pub fn write_log(&self) -> Vec<String> {
        self.writes.lock().unwrap().clone()
    }

    /// Current contents of a sheet, if present.
    pub fn sheet(&self, document_id: &str, sheet: &str) -> Option<Rows> {
        self.documents
            .lock()
            .unwrap()
            .get(document_id)
            .and_then(|doc| doc.get(sheet))
            .cloned()
    }
}

#[async_trait]
impl SheetStore for MemorySheetStore {
    async fn create_destination(&self, title: &str) -> Result<String, StoreError> {
        let n = self.next_doc.fetch_add(1, Ordering::SeqCst);
        let id = format!("doc-{n}");
        tracing::debug!(%id, title, "created in-memory destination");
        self.documents.lock().unwrap().insert(id.clone(), Document::new());
        Ok(id)
    }

    async fn read_sheet(&self, document_id: &str, sheet: &str) -> Result<Rows, StoreError> {
        let documents = self.documents.lock().unwrap();
        let doc = documents
            .get(document_id)
            .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_string()))?;
        doc.get(sheet)
            .cloned()
            .ok_or_else(|| StoreError::SheetNotFound {
                document: document_id.to_string(),
                sheet: sheet.to_string(),
            })
    }

    async fn write_sheet(
        &self,
        document_id: &str,
        sheet: &str,
        rows: &Rows,
    ) -> Result<(), StoreError> {
        if let Some(left) = self.fail_writes.lock().unwrap().get_mut(sheet) {
            if *left > 0 {
                *left -= 1;
                return Err(StoreError::WriteRejected(format!(
                    "injected failure writing sheet '{sheet}'"
                )));
            }
        }

        {
            let mut documents = self.documents.lock().unwrap();
            let doc = documents
                .get_mut(document_id)
                .ok_or_else(|| StoreError::DocumentNotFound(document_id.to_string()))?;
            doc.insert(sheet.to_string(), rows.clone());
        }

        self.writes.lock().unwrap().push(sheet.to_string());
        if let Some(hook) = self.write_hook.lock().unwrap().as_ref() {
            hook(sheet);
        }
        Ok(())
    }

    async fn sheet_summary(
        &self,
        document_id: &str,
        sheet: &str,
    ) -> Result<SheetSummary, StoreError> {
        if let Some(summary) = self.summary_overrides.lock().unwrap().get(sheet) {
            return Ok(*summary);
        }
        let rows = self.read_sheet(document_id, sheet).await?;
        let (row_count, col_count) = dimensions(&rows);
        Ok(SheetSummary {
            row_count,
            col_count,
        })
    }
}

/// In-memory implementation of [`CheckpointStore`].
#[derive(Default)]
pub struct MemoryCheckpointStore {
    snapshots: Mutex<HashMap<Uuid, Value>>,
    saves: AtomicUsize,
}

impl MemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of `save` calls, across all runs.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CheckpointStore for MemoryCheckpointStore {
    async fn save(&self, run_id: Uuid, snapshot: &Value) -> Result<(), StoreError> {
        self.snapshots
            .lock()
            .unwrap()
            .insert(run_id, snapshot.clone());
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Value>, StoreError> {
        Ok(self.snapshots.lock().unwrap().get(&run_id).cloned())
    }

    async fn delete(&self, run_id: Uuid) -> Result<(), StoreError> {
        self.snapshots.lock().unwrap().remove(&run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transforms::Cell;

    fn rows() -> Rows {
        vec![
            vec![Cell::text("h")],
            vec![Cell::Number(1.0)],
        ]
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let store = MemorySheetStore::new();
        let doc = store.create_destination("t").await.expect("create");
        store.write_sheet(&doc, "a", &rows()).await.expect("write");

        assert_eq!(store.read_sheet(&doc, "a").await.expect("read"), rows());
        assert_eq!(store.write_log(), vec!["a"]);

        let summary = store.sheet_summary(&doc, "a").await.expect("summary");
        assert_eq!(summary, SheetSummary { row_count: 2, col_count: 1 });
    }

    #[tokio::test]
    async fn injected_failures_are_consumed() {
        let store = MemorySheetStore::new();
        let doc = store.create_destination("t").await.expect("create");
        store.fail_writes("a", 1);

        assert!(matches!(
            store.write_sheet(&doc, "a", &rows()).await,
            Err(StoreError::WriteRejected(_))
        ));
        assert!(store.write_sheet(&doc, "a", &rows()).await.is_ok());
    }

    #[tokio::test]
    async fn missing_sheet_and_document_are_distinct_errors() {
        let store = MemorySheetStore::new();
        let doc = store.create_destination("t").await.expect("create");

        assert!(matches!(
            store.read_sheet("nope", "a").await,
            Err(StoreError::DocumentNotFound(_))
        ));
        assert!(matches!(
            store.read_sheet(&doc, "a").await,
            Err(StoreError::SheetNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn checkpoint_store_counts_saves_and_overwrites() {
        let store = MemoryCheckpointStore::new();
        let id = Uuid::new_v4();

        assert_eq!(store.load(id).await.expect("load"), None);

        store.save(id, &serde_json::json!({"v": 1})).await.expect("save");
        store.save(id, &serde_json::json!({"v": 2})).await.expect("save");

        assert_eq!(store.save_count(), 2);
        assert_eq!(
            store.load(id).await.expect("load"),
            Some(serde_json::json!({"v": 2}))
        );

        store.delete(id).await.expect("delete");
        assert_eq!(store.load(id).await.expect("load"), None);
    }
}
