//! Typed error type for the store crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("document '{0}' not found")]
    DocumentNotFound(String),

    #[error("sheet '{sheet}' not found in document '{document}'")]
    SheetNotFound { document: String, sheet: String },

    #[error("write rejected: {0}")]
    WriteRejected(String),
}
