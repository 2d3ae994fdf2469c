// LanceDB vector database module
// One table per collection kind; documents are upserted whole and keyed by
// their namespaced document id

pub mod vector_store;

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub use vector_store::VectorStore;

/// One document in a vector-store collection: the embedding, the exact text
/// that was embedded, and the metadata used for change detection and
/// filtered search.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingDocument {
    /// Namespaced document id (`feature_123` / `screenshot_456`); the store
    /// primary key, stable across runs so upsert overwrites.
    pub id: String,
    /// Must match the collection's configured dimension.
    pub vector: Vec<f32>,
    /// The concatenated text the vector was generated from.
    pub document: String,
    pub metadata: DocumentMetadata,
}

/// Metadata stored alongside each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// Primary key of the source row.
    pub source_id: i64,
    /// Owning game, for filtered search.
    pub game_id: String,
    /// Fingerprint of the embedded text at generation time; compared against
    /// freshly computed fingerprints to detect change.
    pub content_hash: String,
    /// Source row's `updated_at` (RFC 3339), when it had one.
    pub updated_at: Option<String>,
    /// Embedding model that produced the vector.
    pub model: String,
    /// Vector dimension, recorded for diagnostics.
    pub dimension: u32,
    /// Provider-reported prompt tokens consumed generating this embedding.
    pub token_count: u32,
    /// When the embedding was generated (RFC 3339).
    pub generated_at: String,
}

/// Prior state of one document, as read by the index scan. Everything the
/// change classifier needs and nothing else (no vectors).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    pub content_hash: String,
    pub updated_at: Option<String>,
}

/// Mapping from document id to its stored state.
pub type StoreIndex = HashMap<String, IndexEntry>;

/// One hit from a similarity search, ordered by ascending cosine distance.
#[derive(Debug, Clone)]
pub struct SearchResult {
    pub document_id: String,
    /// Cosine distance in `[0, 2]`; lower is more similar.
    pub distance: f32,
    pub document: String,
    pub metadata: DocumentMetadata,
}
