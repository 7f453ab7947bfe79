//! JSON-file implementation of [`CheckpointStore`].
//!
//! One `<run_id>.json` per run under a configurable directory. Saves are
//! atomic (temp file + rename) and last-write-wins, so a crash can never
//! leave a torn checkpoint behind — the previous snapshot survives
//! until the rename lands.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;
use uuid::Uuid;

use crate::local::write_atomic;
use crate::traits::CheckpointStore;
use crate::StoreError;

pub struct JsonFileCheckpointStore {
    dir: PathBuf,
}

impl JsonFileCheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, run_id: Uuid) -> PathBuf {
        self.dir.join(format!("{run_id}.json"))
    }

    /// Directory the checkpoints live in.
    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

#[async_trait]
impl CheckpointStore for JsonFileCheckpointStore {
    async fn save(&self, run_id: Uuid, snapshot: &Value) -> Result<(), StoreError> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.path(run_id);
        debug!(%run_id, path = %path.display(), "saving checkpoint");
        write_atomic(&path, &serde_json::to_vec_pretty(snapshot)?).await
    }

    async fn load(&self, run_id: Uuid) -> Result<Option<Value>, StoreError> {
        match tokio::fs::read(self.path(run_id)).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn delete(&self, run_id: Uuid) -> Result<(), StoreError> {
        match tokio::fs::remove_file(self.path(run_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
