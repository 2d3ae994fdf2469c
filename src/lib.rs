use thiserror::Error;

pub type Result<T> = std::result::Result<T, SyncError>;

/// Error taxonomy for the embedding sync pipeline.
///
/// `SourceRead`, `IndexRead`, and `DimensionMismatch` are fatal to a run;
/// the remaining variants are recorded per item (or per batch) in the run
/// report while the run continues.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Source database read failed: {0}")]
    SourceRead(String),

    #[error("Vector store index read failed: {0}")]
    IndexRead(String),

    #[error("No embeddable text content for {0}")]
    EmptyContent(String),

    #[error("Embedding provider error: {0}")]
    EmbeddingProvider(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector store write failed: {0}")]
    StoreWrite(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl SyncError {
    /// True for errors that abort the whole run rather than a single item.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            SyncError::Config(_)
                | SyncError::SourceRead(_)
                | SyncError::IndexRead(_)
                | SyncError::DimensionMismatch { .. }
                | SyncError::Io(_)
        )
    }
}

pub mod commands;
pub mod config;
pub mod database;
pub mod embeddings;
pub mod fingerprint;
pub mod search;
pub mod sync;
