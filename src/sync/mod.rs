#[cfg(test)]
mod tests;

use crate::config::settings::SyncConfig;
use crate::database::lancedb::{DocumentMetadata, EmbeddingDocument, StoreIndex, VectorStore};
use crate::database::postgres::{RecordKind, SourceRecord};
use crate::embeddings::OpenAiClient;
use crate::{Result, SyncError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Read access to the source of truth. `Database` is the production
/// implementation; tests substitute in-memory fixtures.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn fetch(
        &self,
        kind: RecordKind,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> anyhow::Result<Vec<SourceRecord>>;
}

/// How a run decides which source records need re-embedding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChangePolicy {
    /// Re-embed when the stored content hash differs. The default.
    #[default]
    ContentHash,
    /// Re-embed when the source row is strictly newer than the stored copy.
    Timestamp,
    /// Re-embed everything.
    ForceAll,
    /// Append-only: never touch an id that already exists, even if stale.
    SkipExisting,
}

impl ChangePolicy {
    pub const ALL: [ChangePolicy; 4] = [
        ChangePolicy::ContentHash,
        ChangePolicy::Timestamp,
        ChangePolicy::ForceAll,
        ChangePolicy::SkipExisting,
    ];
}

impl fmt::Display for ChangePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ChangePolicy::ContentHash => "content_hash",
            ChangePolicy::Timestamp => "timestamp",
            ChangePolicy::ForceAll => "force_all",
            ChangePolicy::SkipExisting => "skip_existing",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ChangePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "content_hash" | "content-hash" | "hash" => Ok(ChangePolicy::ContentHash),
            "timestamp" => Ok(ChangePolicy::Timestamp),
            "force_all" | "force-all" | "force" => Ok(ChangePolicy::ForceAll),
            "skip_existing" | "skip-existing" | "skip" => Ok(ChangePolicy::SkipExisting),
            other => Err(format!(
                "Unknown change policy '{other}' (expected one of: content_hash, timestamp, force_all, skip_existing)"
            )),
        }
    }
}

/// Disjoint partition of the deduplicated input set: every input id lands in
/// exactly one of the three buckets.
#[derive(Debug, Default)]
pub struct Classification {
    pub new: Vec<SourceRecord>,
    pub changed: Vec<SourceRecord>,
    pub unchanged: Vec<SourceRecord>,
}

impl Classification {
    /// Records that need (re-)embedding, new first.
    pub fn pending(self) -> Vec<SourceRecord> {
        let mut pending = self.new;
        pending.extend(self.changed);
        pending
    }
}

/// Partition `records` against the store index under `policy`.
///
/// Duplicate document ids in the input shadow earlier entries (later wins);
/// a well-formed source never produces them, but a stale read must not make
/// one row count twice.
pub fn classify(
    records: Vec<SourceRecord>,
    index: &StoreIndex,
    policy: ChangePolicy,
) -> Classification {
    let records = dedupe_later_wins(records);
    let mut classification = Classification::default();

    for record in records {
        match index.get(&record.document_id()) {
            None => classification.new.push(record),
            Some(entry) => {
                let changed = match policy {
                    ChangePolicy::ForceAll => true,
                    ChangePolicy::SkipExisting => false,
                    ChangePolicy::ContentHash => entry.content_hash != record.fingerprint(),
                    ChangePolicy::Timestamp => is_newer_than_stored(&record, entry.updated_at.as_deref()),
                };
                if changed {
                    classification.changed.push(record);
                } else {
                    classification.unchanged.push(record);
                }
            }
        }
    }

    classification
}

fn dedupe_later_wins(records: Vec<SourceRecord>) -> Vec<SourceRecord> {
    let mut slots: std::collections::HashMap<String, usize> = std::collections::HashMap::new();
    let mut deduped: Vec<SourceRecord> = Vec::with_capacity(records.len());

    for record in records {
        let id = record.document_id();
        match slots.get(&id) {
            Some(&slot) => {
                warn!("duplicate document id {id} in source read, keeping later row");
                deduped[slot] = record;
            }
            None => {
                slots.insert(id, deduped.len());
                deduped.push(record);
            }
        }
    }

    deduped
}

/// A record with no timestamp of its own cannot be shown stale, so it stays
/// Unchanged; a stored timestamp that is missing or unparseable is treated
/// as stale.
fn is_newer_than_stored(record: &SourceRecord, stored: Option<&str>) -> bool {
    let Some(record_ts) = record.updated_at else {
        return false;
    };

    match stored.and_then(|s| DateTime::parse_from_rfc3339(s).ok()) {
        Some(stored_ts) => record_ts > stored_ts.with_timezone(&Utc),
        None => true,
    }
}

/// One document that could not be embedded or written this run.
#[derive(Debug, Clone)]
pub struct SyncFailure {
    pub id: i64,
    pub document_id: String,
    pub error: String,
}

/// Outcome of one sync run.
#[derive(Debug, Default)]
pub struct SyncReport {
    pub new_count: usize,
    pub changed_count: usize,
    pub unchanged_count: usize,
    pub written: usize,
    pub failed: Vec<SyncFailure>,
    /// Pre-call estimate for everything that needed embedding, at roughly
    /// four characters per token.
    pub tokens_estimated: u64,
    /// Prompt tokens the provider actually billed.
    pub tokens_used: u64,
    pub elapsed: Duration,
}

impl SyncReport {
    pub fn total(&self) -> usize {
        self.new_count + self.changed_count + self.unchanged_count
    }
}

/// Drives one collection through read → classify → embed → upsert.
pub struct SyncEngine {
    reader: Arc<dyn SourceReader>,
    client: Arc<OpenAiClient>,
    store: VectorStore,
    kind: RecordKind,
    settings: SyncConfig,
}

impl SyncEngine {
    pub fn new(
        reader: Arc<dyn SourceReader>,
        client: OpenAiClient,
        store: VectorStore,
        kind: RecordKind,
        settings: SyncConfig,
    ) -> Self {
        Self {
            reader,
            client: Arc::new(client),
            store,
            kind,
            settings,
        }
    }

    /// Run a full sync pass. Per-item embedding failures are collected into
    /// the report; source-read, index-read, and dimension errors abort the
    /// run before any write of the failing stage.
    pub async fn run(
        &self,
        policy: ChangePolicy,
        limit: Option<i64>,
        game_id: Option<&str>,
    ) -> Result<SyncReport> {
        let started = Instant::now();
        info!(
            "syncing {} (policy: {}, limit: {:?}, game: {:?})",
            self.kind, policy, limit, game_id
        );

        let (records, index) = tokio::try_join!(
            async {
                self.reader
                    .fetch(self.kind, limit, game_id)
                    .await
                    .map_err(|e| SyncError::SourceRead(e.to_string()))
            },
            self.store.load_index(),
        )?;

        debug!(
            "fetched {} source rows, index holds {} documents",
            records.len(),
            index.len()
        );

        let classification = classify(records, &index, policy);
        let mut report = SyncReport {
            new_count: classification.new.len(),
            changed_count: classification.changed.len(),
            unchanged_count: classification.unchanged.len(),
            ..SyncReport::default()
        };

        info!(
            "classified: {} new, {} changed, {} unchanged",
            report.new_count, report.changed_count, report.unchanged_count
        );

        let pending = classification.pending();
        if pending.is_empty() {
            report.elapsed = started.elapsed();
            return Ok(report);
        }

        let documents = self.embed_records(pending, &mut report).await?;

        let outcome = self
            .store
            .upsert_documents(&documents, self.settings.upsert_batch_size)
            .await?;
        report.written = outcome.written;
        for (document_id, error) in outcome.failed {
            let id = documents
                .iter()
                .find(|d| d.id == document_id)
                .map_or(0, |d| d.metadata.source_id);
            report.failed.push(SyncFailure {
                id,
                document_id,
                error,
            });
        }

        if report.written > 0 {
            self.store.optimize().await?;
        }

        report.elapsed = started.elapsed();
        info!(
            "sync of {} finished: {} written, {} failed, {} tokens, {:.1}s",
            self.kind,
            report.written,
            report.failed.len(),
            report.tokens_used,
            report.elapsed.as_secs_f64()
        );
        Ok(report)
    }

    /// Embed records on blocking worker threads with bounded concurrency.
    /// The HTTP client applies its own retry and rate-limit pacing per call.
    async fn embed_records(
        &self,
        records: Vec<SourceRecord>,
        report: &mut SyncReport,
    ) -> Result<Vec<EmbeddingDocument>> {
        let concurrency = self.settings.embedding_concurrency.max(1);

        let results: Vec<_> = futures::stream::iter(records.into_iter().map(|record| {
            let client = Arc::clone(&self.client);
            async move {
                let id = record.id;
                let document_id = record.document_id();
                let estimated = crate::embeddings::estimate_token_count(&record.combined_text());
                debug!("embedding {document_id} (~{estimated} tokens)");
                let outcome =
                    match tokio::task::spawn_blocking(move || build_document(&client, &record))
                        .await
                    {
                        Ok(outcome) => outcome,
                        Err(join_err) => Err(SyncError::Other(anyhow::anyhow!(
                            "embedding task failed: {join_err}"
                        ))),
                    };
                (id, document_id, estimated, outcome)
            }
        }))
        .buffer_unordered(concurrency)
        .collect()
        .await;

        let mut documents = Vec::with_capacity(results.len());
        for (id, document_id, estimated, outcome) in results {
            report.tokens_estimated += estimated as u64;
            match outcome {
                Ok((document, tokens)) => {
                    report.tokens_used += u64::from(tokens);
                    documents.push(document);
                }
                Err(e) if e.is_fatal() => return Err(e),
                Err(e) => {
                    warn!("skipping {document_id}: {e}");
                    report.failed.push(SyncFailure {
                        id,
                        document_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        Ok(documents)
    }
}

/// Embed one record and package it as a store document. Runs on a blocking
/// thread; the returned token count is the provider's prompt usage.
fn build_document(
    client: &OpenAiClient,
    record: &SourceRecord,
) -> Result<(EmbeddingDocument, u32)> {
    if record.is_empty() {
        return Err(SyncError::EmptyContent(record.document_id()));
    }

    let text = record.combined_text();
    let content_hash = record.fingerprint();
    let embedding = client.embed(&text)?;

    let document = EmbeddingDocument {
        id: record.document_id(),
        vector: embedding.vector,
        document: text,
        metadata: DocumentMetadata {
            source_id: record.id,
            game_id: record.game_id.clone(),
            content_hash,
            updated_at: record.updated_at.map(|ts| ts.to_rfc3339()),
            model: client.model().to_string(),
            dimension: client.dimension(),
            token_count: embedding.token_count,
            generated_at: Utc::now().to_rfc3339(),
        },
    };

    Ok((document, embedding.token_count))
}
