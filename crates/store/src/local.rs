//! Directory-backed implementation of [`SheetStore`].
//!
//! Each document is one JSON file named `<document_id>.json` holding a
//! map of sheet name → rows. This is the medium the CLI runs against;
//! a real deployment would swap in an HTTP-backed implementation of the
//! same port.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;
use transforms::{dimensions, Rows};
use uuid::Uuid;

use crate::traits::{SheetStore, SheetSummary};
use crate::StoreError;

type Document = BTreeMap<String, Rows>;

pub struct LocalSheetStore {
    dir: PathBuf,
}

impl LocalSheetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn document_path(&self, document_id: &str) -> PathBuf {
        self.dir.join(format!("{document_id}.json"))
    }

    async fn load_document(&self, document_id: &str) -> Result<Document, StoreError> {
        let path = self.document_path(document_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::DocumentNotFound(document_id.to_string()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn save_document(&self, document_id: &str, doc: &Document) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.document_path(document_id);
        write_atomic(&path, &serde_json::to_vec_pretty(doc)?).await
    }
}

/// Write via a temp file in the same directory plus rename, so readers
/// never observe a torn file.
pub(crate) async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), StoreError> {
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, bytes).await?;
    tokio::fs::rename(&tmp, path).await?;
    Ok(())
}

#[async_trait]
impl SheetStore for LocalSheetStore {
    async fn create_destination(&self, title: &str) -> Result<String, StoreError> {
        let document_id = Uuid::new_v4().to_string();
        debug!(%document_id, title, "creating local destination document");
        self.save_document(&document_id, &Document::new()).await?;
        Ok(document_id)
    }

    async fn read_sheet(&self, document_id: &str, sheet: &str) -> Result<Rows, StoreError> {
        let doc = self.load_document(document_id).await?;
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
        let mut doc = self.load_document(document_id).await?;
        doc.insert(sheet.to_string(), rows.clone());
        self.save_document(document_id, &doc).await
    }

    async fn sheet_summary(
        &self,
        document_id: &str,
        sheet: &str,
    ) -> Result<SheetSummary, StoreError> {
        let rows = self.read_sheet(document_id, sheet).await?;
        let (row_count, col_count) = dimensions(&rows);
        Ok(SheetSummary {
            row_count,
            col_count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use transforms::Cell;

    #[tokio::test]
    async fn documents_round_trip_through_the_filesystem() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalSheetStore::new(dir.path());

        let doc = store.create_destination("Report").await.expect("create");
        let rows = vec![
            vec![Cell::text("name"), Cell::text("qty")],
            vec![Cell::text("bolt"), Cell::Number(12.0)],
        ];
        store.write_sheet(&doc, "parts", &rows).await.expect("write");

        assert_eq!(store.read_sheet(&doc, "parts").await.expect("read"), rows);
        assert_eq!(
            store.sheet_summary(&doc, "parts").await.expect("summary"),
            SheetSummary { row_count: 2, col_count: 2 }
        );
    }

    #[tokio::test]
    async fn missing_document_is_reported() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = LocalSheetStore::new(dir.path());

        assert!(matches!(
            store.read_sheet("ghost", "a").await,
            Err(StoreError::DocumentNotFound(_))
        ));
        assert!(matches!(
            store.write_sheet("ghost", "a", &Vec::new()).await,
            Err(StoreError::DocumentNotFound(_))
        ));
    }
}
