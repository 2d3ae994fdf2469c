
use super::{DocumentMetadata, EmbeddingDocument, IndexEntry, SearchResult, StoreIndex};
use crate::config::Config;
use crate::database::postgres::RecordKind;
use crate::{Result, SyncError};
use arrow::array::{
    Array, FixedSizeListArray, Float32Array, Int64Array, RecordBatchIterator, StringArray,
    UInt32Array,
};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use futures::TryStreamExt;
use lancedb::{
    Connection, DistanceType,
    query::{ExecutableQuery, QueryBase, Select},
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Per-batch outcome of an upsert run. Committed batches stay committed even
/// when a later batch fails.
#[derive(Debug, Default)]
pub struct UpsertOutcome {
    pub written: usize,
    /// Document ids from failed batches, with the batch error message.
    pub failed: Vec<(String, String)>,
}

/// Vector store for one collection, backed by a LanceDB table.
///
/// Single writer per collection per run; concurrent runs against different
/// collections are independent.
pub struct VectorStore {
    connection: Connection,
    table_name: String,
    dimension: usize,
}

impl VectorStore {
    /// Open (or create) the collection for `kind` under the configured
    /// vector database path.
    ///
    /// An existing table whose vector dimension disagrees with the
    /// configured dimension is a fatal `DimensionMismatch`: mixing
    /// dimensions in one collection is unrecoverable without a rebuild, so
    /// this fails before any work is attempted.
    #[inline]
    pub async fn open(config: &Config, kind: RecordKind) -> Result<Self> {
        let store = Self::connect(config, kind).await?;
        store.initialize_table().await?;

        info!(
            "vector store ready: collection={} dimension={}",
            store.table_name, store.dimension
        );
        Ok(store)
    }

    /// Open the collection for `kind` only if it already exists. Unlike
    /// [`open`](Self::open) this never creates a table, so read-only
    /// callers (status reporting) do not mutate the store as a side
    /// effect. Returns `None` when the collection has never been synced.
    #[inline]
    pub async fn open_existing(config: &Config, kind: RecordKind) -> Result<Option<Self>> {
        let store = Self::connect(config, kind).await?;

        let table_names = store
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SyncError::IndexRead(format!("Failed to list tables: {e}")))?;

        if !table_names.contains(&store.table_name) {
            return Ok(None);
        }

        let existing = store.detect_existing_dimension().await?;
        if existing != store.dimension {
            return Err(SyncError::DimensionMismatch {
                expected: store.dimension,
                actual: existing,
            });
        }

        Ok(Some(store))
    }

    async fn connect(config: &Config, kind: RecordKind) -> Result<Self> {
        let db_path = config.vector_database_path();
        debug!("initializing LanceDB at {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to connect to LanceDB: {e}")))?;

        Ok(Self {
            connection,
            table_name: kind.collection_name().to_string(),
            dimension: config.embeddings.dimension as usize,
        })
    }

    #[inline]
    pub fn collection_name(&self) -> &str {
        &self.table_name
    }

    #[inline]
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    async fn initialize_table(&self) -> Result<()> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to list tables: {e}")))?;

        if table_names.contains(&self.table_name) {
            let existing = self.detect_existing_dimension().await?;
            if existing != self.dimension {
                return Err(SyncError::DimensionMismatch {
                    expected: self.dimension,
                    actual: existing,
                });
            }
            debug!(
                "collection {} exists with dimension {}",
                self.table_name, existing
            );
            return Ok(());
        }

        info!(
            "creating collection {} with dimension {}",
            self.table_name, self.dimension
        );

        let schema = self.create_schema();
        self.connection
            .create_empty_table(&self.table_name, schema)
            .execute()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to create table: {e}")))?;

        Ok(())
    }

    async fn detect_existing_dimension(&self) -> Result<usize> {
        let table = self.open_table().await?;

        let schema = table
            .schema()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to get table schema: {e}")))?;

        for field in schema.fields() {
            if field.name() == "vector" {
                if let DataType::FixedSizeList(_, size) = field.data_type() {
                    return Ok(*size as usize);
                }
            }
        }

        Err(SyncError::StoreWrite(format!(
            "Collection {} has no vector column",
            self.table_name
        )))
    }

    fn create_schema(&self) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    self.dimension as i32,
                ),
                false,
            ),
            Field::new("document", DataType::Utf8, false),
            Field::new("source_id", DataType::Int64, false),
            Field::new("game_id", DataType::Utf8, false),
            Field::new("content_hash", DataType::Utf8, false),
            Field::new("updated_at", DataType::Utf8, true),
            Field::new("model", DataType::Utf8, false),
            Field::new("dimension", DataType::UInt32, false),
            Field::new("token_count", DataType::UInt32, false),
            Field::new("generated_at", DataType::Utf8, false),
        ]))
    }

    async fn open_table(&self) -> Result<lancedb::Table> {
        self.connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| {
                SyncError::StoreWrite(format!(
                    "Failed to open collection {}: {e}",
                    self.table_name
                ))
            })
    }

    /// Load the change-detection index: document id mapped to the stored
    /// content hash and source timestamp. Reads metadata columns only, no
    /// vectors; batches stream from the store and merge into one map, so
    /// large collections do not need a single giant read.
    #[inline]
    pub async fn load_index(&self) -> Result<StoreIndex> {
        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await;

        let table = match table {
            Ok(table) => table,
            Err(lancedb::Error::TableNotFound { .. }) => {
                // First-run bootstrap: no prior state
                debug!("collection {} not found, empty index", self.table_name);
                return Ok(StoreIndex::new());
            }
            Err(e) => {
                return Err(SyncError::IndexRead(format!(
                    "Failed to open collection {}: {e}",
                    self.table_name
                )));
            }
        };

        let mut stream = table
            .query()
            .select(Select::Columns(vec![
                "id".to_string(),
                "content_hash".to_string(),
                "updated_at".to_string(),
            ]))
            .execute()
            .await
            .map_err(|e| SyncError::IndexRead(format!("Failed to scan index: {e}")))?;

        let mut index = StoreIndex::new();

        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| SyncError::IndexRead(format!("Failed to read index stream: {e}")))?
        {
            let ids = string_column(&batch, "id").map_err(SyncError::IndexRead)?;
            let hashes = string_column(&batch, "content_hash").map_err(SyncError::IndexRead)?;
            let updated_ats = string_column(&batch, "updated_at").map_err(SyncError::IndexRead)?;

            for row in 0..batch.num_rows() {
                index.insert(
                    ids.value(row).to_string(),
                    IndexEntry {
                        content_hash: hashes.value(row).to_string(),
                        updated_at: if updated_ats.is_null(row) {
                            None
                        } else {
                            Some(updated_ats.value(row).to_string())
                        },
                    },
                );
            }
        }

        debug!(
            "loaded index for {}: {} documents",
            self.table_name,
            index.len()
        );
        Ok(index)
    }

    /// Upsert documents in fixed-size batches.
    ///
    /// Each document is written atomically as one store row; a document id
    /// that already exists is overwritten entirely (vector, text, and
    /// metadata). A batch that fails reports its members in the outcome and
    /// the remaining batches still run. Vector dimensions are validated up
    /// front so a mismatch fails the run before anything is written.
    #[inline]
    pub async fn upsert_documents(
        &self,
        documents: &[EmbeddingDocument],
        batch_size: usize,
    ) -> Result<UpsertOutcome> {
        if documents.is_empty() {
            return Ok(UpsertOutcome::default());
        }

        for document in documents {
            if document.vector.len() != self.dimension {
                return Err(SyncError::DimensionMismatch {
                    expected: self.dimension,
                    actual: document.vector.len(),
                });
            }
        }

        let table = self.open_table().await?;
        let mut outcome = UpsertOutcome::default();

        for batch in documents.chunks(batch_size.max(1)) {
            match self.upsert_batch(&table, batch).await {
                Ok(()) => outcome.written += batch.len(),
                Err(e) => {
                    warn!(
                        "upsert batch of {} failed for {}: {}",
                        batch.len(),
                        self.table_name,
                        e
                    );
                    let message = e.to_string();
                    outcome
                        .failed
                        .extend(batch.iter().map(|d| (d.id.clone(), message.clone())));
                }
            }
        }

        info!(
            "upserted {} documents into {} ({} failed)",
            outcome.written,
            self.table_name,
            outcome.failed.len()
        );
        Ok(outcome)
    }

    async fn upsert_batch(
        &self,
        table: &lancedb::Table,
        documents: &[EmbeddingDocument],
    ) -> Result<()> {
        let record_batch = self.create_record_batch(documents)?;
        let schema = record_batch.schema();
        let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);

        let mut merge = table.merge_insert(&["id"]);
        merge
            .when_matched_update_all(None)
            .when_not_matched_insert_all();
        merge
            .execute(Box::new(reader))
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to upsert batch: {e}")))?;

        Ok(())
    }

    fn create_record_batch(&self, documents: &[EmbeddingDocument]) -> Result<RecordBatch> {
        let len = documents.len();

        let mut ids = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * self.dimension);
        let mut texts = Vec::with_capacity(len);
        let mut source_ids = Vec::with_capacity(len);
        let mut game_ids = Vec::with_capacity(len);
        let mut content_hashes = Vec::with_capacity(len);
        let mut updated_ats = Vec::with_capacity(len);
        let mut models = Vec::with_capacity(len);
        let mut dimensions = Vec::with_capacity(len);
        let mut token_counts = Vec::with_capacity(len);
        let mut generated_ats = Vec::with_capacity(len);

        for document in documents {
            ids.push(document.id.as_str());
            flat_values.extend_from_slice(&document.vector);
            texts.push(document.document.as_str());
            source_ids.push(document.metadata.source_id);
            game_ids.push(document.metadata.game_id.as_str());
            content_hashes.push(document.metadata.content_hash.as_str());
            updated_ats.push(document.metadata.updated_at.as_deref());
            models.push(document.metadata.model.as_str());
            dimensions.push(document.metadata.dimension);
            token_counts.push(document.metadata.token_count);
            generated_ats.push(document.metadata.generated_at.as_str());
        }

        let values_array = Float32Array::from(flat_values);
        let item_field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array = FixedSizeListArray::try_new(
            item_field,
            self.dimension as i32,
            Arc::new(values_array),
            None,
        )
        .map_err(|e| SyncError::StoreWrite(format!("Failed to create vector array: {e}")))?;

        let arrays: Vec<Arc<dyn Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(texts)),
            Arc::new(Int64Array::from(source_ids)),
            Arc::new(StringArray::from(game_ids)),
            Arc::new(StringArray::from(content_hashes)),
            Arc::new(StringArray::from(updated_ats)),
            Arc::new(StringArray::from(models)),
            Arc::new(UInt32Array::from(dimensions)),
            Arc::new(UInt32Array::from(token_counts)),
            Arc::new(StringArray::from(generated_ats)),
        ];

        RecordBatch::try_new(self.create_schema(), arrays)
            .map_err(|e| SyncError::StoreWrite(format!("Failed to create record batch: {e}")))
    }

    /// Nearest-neighbour search by cosine distance, optionally restricted to
    /// one game. The filter is applied by the store before ranking, so a
    /// filtered query still returns up to `limit` matching documents.
    #[inline]
    pub async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
        game_id: Option<&str>,
    ) -> Result<Vec<SearchResult>> {
        if query_vector.len() != self.dimension {
            return Err(SyncError::DimensionMismatch {
                expected: self.dimension,
                actual: query_vector.len(),
            });
        }

        debug!(
            "searching {} (limit {}, game filter: {:?})",
            self.table_name, limit, game_id
        );

        let table = self.open_table().await?;

        let mut query = table
            .vector_search(query_vector)
            .map_err(|e| SyncError::StoreWrite(format!("Failed to create vector search: {e}")))?
            .column("vector")
            .distance_type(DistanceType::Cosine)
            .limit(limit);

        if let Some(game_id) = game_id {
            // Predicate filter runs store-side, before ranking
            query = query.only_if(format!("game_id = '{}'", game_id.replace('\'', "''")));
        }

        let mut stream = query
            .execute()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to execute search: {e}")))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to read result stream: {e}")))?
        {
            results.extend(parse_search_batch(&batch).map_err(SyncError::StoreWrite)?);
        }

        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!("search returned {} results", results.len());
        Ok(results)
    }

    /// Total number of documents in the collection.
    #[inline]
    pub async fn count(&self) -> Result<usize> {
        let table = self.open_table().await?;

        table
            .count_rows(None)
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to count rows: {e}")))
    }

    /// Compact and reorganize the table after a large write run.
    #[inline]
    pub async fn optimize(&self) -> Result<()> {
        let table = self.open_table().await?;

        table
            .optimize(lancedb::table::OptimizeAction::All)
            .await
            .map_err(|e| SyncError::StoreWrite(format!("Failed to optimize table: {e}")))?;

        debug!("optimized collection {}", self.table_name);
        Ok(())
    }
}

fn string_column<'a>(
    batch: &'a RecordBatch,
    name: &str,
) -> std::result::Result<&'a StringArray, String> {
    batch
        .column_by_name(name)
        .ok_or_else(|| format!("Missing {name} column"))?
        .as_any()
        .downcast_ref::<StringArray>()
        .ok_or_else(|| format!("Invalid {name} column type"))
}

fn parse_search_batch(batch: &RecordBatch) -> std::result::Result<Vec<SearchResult>, String> {
    let ids = string_column(batch, "id")?;
    let documents = string_column(batch, "document")?;
    let game_ids = string_column(batch, "game_id")?;
    let content_hashes = string_column(batch, "content_hash")?;
    let updated_ats = string_column(batch, "updated_at")?;
    let models = string_column(batch, "model")?;
    let generated_ats = string_column(batch, "generated_at")?;

    let source_ids = batch
        .column_by_name("source_id")
        .ok_or("Missing source_id column")?
        .as_any()
        .downcast_ref::<Int64Array>()
        .ok_or("Invalid source_id column type")?;

    let dimensions = batch
        .column_by_name("dimension")
        .ok_or("Missing dimension column")?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or("Invalid dimension column type")?;

    let token_counts = batch
        .column_by_name("token_count")
        .ok_or("Missing token_count column")?
        .as_any()
        .downcast_ref::<UInt32Array>()
        .ok_or("Invalid token_count column type")?;

    let distances = batch
        .column_by_name("_distance")
        .and_then(|col| col.as_any().downcast_ref::<Float32Array>());

    let mut results = Vec::with_capacity(batch.num_rows());
    for row in 0..batch.num_rows() {
        let distance = distances.map_or(0.0, |d| if d.is_null(row) { 0.0 } else { d.value(row) });

        results.push(SearchResult {
            document_id: ids.value(row).to_string(),
            distance,
            document: documents.value(row).to_string(),
            metadata: DocumentMetadata {
                source_id: source_ids.value(row),
                game_id: game_ids.value(row).to_string(),
                content_hash: content_hashes.value(row).to_string(),
                updated_at: if updated_ats.is_null(row) {
                    None
                } else {
                    Some(updated_ats.value(row).to_string())
                },
                model: models.value(row).to_string(),
                dimension: dimensions.value(row),
                token_count: token_counts.value(row),
                generated_at: generated_ats.value(row).to_string(),
            },
        });
    }

    Ok(results)
}
