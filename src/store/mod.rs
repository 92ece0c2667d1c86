
use arrow::array::{Array, FixedSizeListArray, Float32Array, RecordBatchIterator, StringArray};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::{
    Connection,
    query::{ExecutableQuery, QueryBase},
};
use std::sync::Arc;
use tracing::{debug, info};

use crate::config::Config;
use crate::{RagError, Result};

/// Name of the persisted collection holding complaint chunks
pub const COLLECTION_NAME: &str = "complaints";

/// Metadata attached to every stored chunk, copied from the parent
/// complaint record. Keys are fixed by the ingestion contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkMetadata {
    pub complaint_id: String,
    pub product: String,
    pub issue: String,
    pub date_received: String,
}

/// A chunk ready to be written to the vector store
#[derive(Debug, Clone)]
pub struct StoredChunk {
    pub id: String,
    pub content: String,
    pub vector: Vec<f32>,
    pub metadata: ChunkMetadata,
}

/// A chunk returned from nearest-neighbor search
#[derive(Debug, Clone)]
pub struct RetrievedChunk {
    pub id: String,
    pub content: String,
    pub metadata: ChunkMetadata,
    pub distance: f32,
}

/// Storage seam for the retrieval and ingestion components.
///
/// Production uses [`VectorStore`] (LanceDB); tests substitute in-memory
/// fakes.
#[async_trait]
pub trait ChunkStore: Send + Sync {
    async fn add_chunks(&mut self, chunks: Vec<StoredChunk>) -> Result<()>;

    /// Nearest-neighbor search, results ordered by non-decreasing distance.
    /// A store with no collection yet returns an empty result set.
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>>;

    async fn count(&self) -> Result<u64>;

    /// Discard the whole collection. Ingestion runs from scratch, so ids
    /// stay unique within the collection across reruns.
    async fn reset(&mut self) -> Result<()>;
}

/// Vector database store using LanceDB for similarity search
pub struct VectorStore {
    connection: Connection,
    table_name: String,
}

impl VectorStore {
    /// Open (or create) the store directory configured in `config`.
    ///
    /// The `complaints` table itself is only created on first insert, when
    /// the embedding dimension is known; searching before that yields empty
    /// results rather than an error.
    #[inline]
    pub async fn open(config: &Config) -> Result<Self> {
        let db_path = config.vector_store_path();
        debug!("Initializing LanceDB at path: {:?}", db_path);

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                RagError::Store(format!("Failed to create vector store directory: {}", e))
            })?;
        }

        let uri = format!("file://{}", db_path.display());
        let connection = lancedb::connect(&uri)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to connect to LanceDB: {}", e)))?;

        Ok(Self {
            connection,
            table_name: COLLECTION_NAME.to_string(),
        })
    }

    async fn table_exists(&self) -> Result<bool> {
        let table_names = self
            .connection
            .table_names()
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to list tables: {}", e)))?;
        Ok(table_names.contains(&self.table_name))
    }

    fn create_schema(vector_dim: usize) -> Arc<Schema> {
        Arc::new(Schema::new(vec![
            Field::new("id", DataType::Utf8, false),
            Field::new(
                "vector",
                DataType::FixedSizeList(
                    Arc::new(Field::new("item", DataType::Float32, false)),
                    vector_dim as i32,
                ),
                false,
            ),
            Field::new("content", DataType::Utf8, false),
            Field::new("complaint_id", DataType::Utf8, false),
            Field::new("product", DataType::Utf8, false),
            Field::new("issue", DataType::Utf8, false),
            Field::new("date_received", DataType::Utf8, false),
            Field::new("ingested_at", DataType::Utf8, false),
        ]))
    }

    fn create_record_batch(chunks: &[StoredChunk], vector_dim: usize) -> Result<RecordBatch> {
        let len = chunks.len();
        let ingested_at = chrono::Utc::now().to_rfc3339();

        let mut ids = Vec::with_capacity(len);
        let mut contents = Vec::with_capacity(len);
        let mut complaint_ids = Vec::with_capacity(len);
        let mut products = Vec::with_capacity(len);
        let mut issues = Vec::with_capacity(len);
        let mut dates_received = Vec::with_capacity(len);
        let mut ingested_ats = Vec::with_capacity(len);
        let mut flat_values = Vec::with_capacity(len * vector_dim);

        for chunk in chunks {
            if chunk.vector.len() != vector_dim {
                return Err(RagError::Store(format!(
                    "Embedding dimension mismatch: expected {}, got {} for chunk {}",
                    vector_dim,
                    chunk.vector.len(),
                    chunk.id
                )));
            }
            ids.push(chunk.id.as_str());
            contents.push(chunk.content.as_str());
            complaint_ids.push(chunk.metadata.complaint_id.as_str());
            products.push(chunk.metadata.product.as_str());
            issues.push(chunk.metadata.issue.as_str());
            dates_received.push(chunk.metadata.date_received.as_str());
            ingested_ats.push(ingested_at.as_str());
            flat_values.extend_from_slice(&chunk.vector);
        }

        let schema = Self::create_schema(vector_dim);

        let values_array = Float32Array::from(flat_values);
        let field = Arc::new(Field::new("item", DataType::Float32, false));
        let vector_array =
            FixedSizeListArray::try_new(field, vector_dim as i32, Arc::new(values_array), None)
                .map_err(|e| RagError::Store(format!("Failed to create vector array: {}", e)))?;

        let arrays: Vec<Arc<dyn arrow::array::Array>> = vec![
            Arc::new(StringArray::from(ids)),
            Arc::new(vector_array),
            Arc::new(StringArray::from(contents)),
            Arc::new(StringArray::from(complaint_ids)),
            Arc::new(StringArray::from(products)),
            Arc::new(StringArray::from(issues)),
            Arc::new(StringArray::from(dates_received)),
            Arc::new(StringArray::from(ingested_ats)),
        ];

        RecordBatch::try_new(schema, arrays)
            .map_err(|e| RagError::Store(format!("Failed to create record batch: {}", e)))
    }

    fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
        batch
            .column_by_name(name)
            .ok_or_else(|| RagError::Shape(format!("Missing {} column", name)))?
            .as_any()
            .downcast_ref::<StringArray>()
            .ok_or_else(|| RagError::Shape(format!("Invalid {} column type", name)))
    }

    fn parse_search_batch(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
        let num_rows = batch.num_rows();

        let ids = Self::string_column(batch, "id")?;
        let contents = Self::string_column(batch, "content")?;
        let complaint_ids = Self::string_column(batch, "complaint_id")?;
        let products = Self::string_column(batch, "product")?;
        let issues = Self::string_column(batch, "issue")?;
        let dates_received = Self::string_column(batch, "date_received")?;

        let distances = batch
            .column_by_name("_distance")
            .ok_or_else(|| RagError::Shape("Missing _distance column".to_string()))?
            .as_any()
            .downcast_ref::<Float32Array>()
            .ok_or_else(|| RagError::Shape("Invalid _distance column type".to_string()))?;

        let mut results = Vec::with_capacity(num_rows);
        for row in 0..num_rows {
            if distances.is_null(row) {
                // A row without a distance cannot be ranked
                return Err(RagError::Shape(format!(
                    "Null _distance for row {}",
                    ids.value(row)
                )));
            }
            results.push(RetrievedChunk {
                id: ids.value(row).to_string(),
                content: contents.value(row).to_string(),
                metadata: ChunkMetadata {
                    complaint_id: complaint_ids.value(row).to_string(),
                    product: products.value(row).to_string(),
                    issue: issues.value(row).to_string(),
                    date_received: dates_received.value(row).to_string(),
                },
                distance: distances.value(row),
            });
        }

        Ok(results)
    }
}

#[async_trait]
impl ChunkStore for VectorStore {
    #[inline]
    async fn add_chunks(&mut self, chunks: Vec<StoredChunk>) -> Result<()> {
        if chunks.is_empty() {
            debug!("No chunks to store");
            return Ok(());
        }

        let vector_dim = chunks[0].vector.len();
        let record_batch = Self::create_record_batch(&chunks, vector_dim)?;
        let schema = record_batch.schema();

        if self.table_exists().await? {
            let table = self
                .connection
                .open_table(&self.table_name)
                .execute()
                .await
                .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
            table
                .add(reader)
                .execute()
                .await
                .map_err(|e| RagError::Store(format!("Failed to insert chunks: {}", e)))?;
        } else {
            info!(
                "Creating {} table with {} dimensions",
                self.table_name, vector_dim
            );
            let reader = RecordBatchIterator::new(std::iter::once(Ok(record_batch)), schema);
            self.connection
                .create_table(&self.table_name, reader)
                .execute()
                .await
                .map_err(|e| RagError::Store(format!("Failed to create table: {}", e)))?;
        }

        debug!("Stored batch of {} chunks", chunks.len());
        Ok(())
    }

    #[inline]
    async fn search(&self, query_vector: &[f32], limit: usize) -> Result<Vec<RetrievedChunk>> {
        debug!("Searching for nearest chunks with limit: {}", limit);

        // An absent collection is a valid "no data" outcome, not an error
        if !self.table_exists().await? {
            debug!("Collection {} does not exist yet", self.table_name);
            return Ok(Vec::new());
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let query = table
            .vector_search(query_vector)
            .map_err(|e| RagError::Store(format!("Failed to create vector search: {}", e)))?
            .column("vector")
            .limit(limit);

        let mut stream = query
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to execute search: {}", e)))?;

        let mut results = Vec::new();
        while let Some(batch) = stream
            .try_next()
            .await
            .map_err(|e| RagError::Store(format!("Failed to read result stream: {}", e)))?
        {
            results.extend(Self::parse_search_batch(&batch)?);
        }

        // LanceDB returns results in distance order already; enforce the
        // ordering contract regardless
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));

        debug!("Search returned {} chunks", results.len());
        Ok(results)
    }

    #[inline]
    async fn reset(&mut self) -> Result<()> {
        if self.table_exists().await? {
            info!("Dropping existing {} table", self.table_name);
            self.connection
                .drop_table(&self.table_name)
                .await
                .map_err(|e| RagError::Store(format!("Failed to drop table: {}", e)))?;
        }
        Ok(())
    }

    #[inline]
    async fn count(&self) -> Result<u64> {
        if !self.table_exists().await? {
            return Ok(0);
        }

        let table = self
            .connection
            .open_table(&self.table_name)
            .execute()
            .await
            .map_err(|e| RagError::Store(format!("Failed to open table: {}", e)))?;

        let count = table
            .count_rows(None)
            .await
            .map_err(|e| RagError::Store(format!("Failed to count rows: {}", e)))?;

        Ok(count as u64)
    }
}
