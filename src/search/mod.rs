#[cfg(test)]
mod tests;

use crate::database::lancedb::{DocumentMetadata, SearchResult, VectorStore};
use crate::embeddings::OpenAiClient;
use crate::{Result, SyncError};
use std::sync::Arc;
use tracing::debug;

/// A ranked match from a semantic query, ascending cosine distance.
#[derive(Debug, Clone)]
pub struct SearchHit {
    pub document_id: String,
    pub source_id: i64,
    pub distance: f32,
    pub document: String,
    pub metadata: DocumentMetadata,
}

impl From<SearchResult> for SearchHit {
    fn from(result: SearchResult) -> Self {
        Self {
            document_id: result.document_id,
            source_id: result.metadata.source_id,
            distance: result.distance,
            document: result.document,
            metadata: result.metadata,
        }
    }
}

/// Semantic search over one collection: embeds the query with the same
/// model and dimension the collection was built with, then runs a filtered
/// nearest-neighbour scan.
pub struct SearchInterface {
    client: Arc<OpenAiClient>,
    store: VectorStore,
}

impl SearchInterface {
    pub fn new(client: OpenAiClient, store: VectorStore) -> Self {
        Self {
            client: Arc::new(client),
            store,
        }
    }

    pub async fn search(
        &self,
        query: &str,
        limit: usize,
        game_id: Option<&str>,
    ) -> Result<Vec<SearchHit>> {
        if query.trim().is_empty() {
            return Err(SyncError::EmptyContent("search query".to_string()));
        }

        debug!(
            "searching {} for {:?} (limit {}, game: {:?})",
            self.store.collection_name(),
            query,
            limit,
            game_id
        );

        let client = Arc::clone(&self.client);
        let query = query.to_string();
        let embedding = tokio::task::spawn_blocking(move || client.embed(&query))
            .await
            .map_err(|e| SyncError::Other(anyhow::anyhow!("query embedding task failed: {e}")))??;

        let results = self
            .store
            .search(&embedding.vector, limit, game_id)
            .await?;

        Ok(results.into_iter().map(SearchHit::from).collect())
    }
}
