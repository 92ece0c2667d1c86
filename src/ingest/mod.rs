
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::chunking::{ChunkingConfig, split_narrative};
use crate::ollama::Embedder;
use crate::store::{ChunkMetadata, ChunkStore, StoredChunk};
use crate::{RagError, Result};

/// Rows read from the source CSV per processing batch, to cap peak memory
const DEFAULT_ROW_BATCH_SIZE: usize = 1000;

/// One row of the complaint CSV. Extra columns are ignored; the complaint
/// identifier is the zero-based row position.
#[derive(Debug, Deserialize)]
struct ComplaintRow {
    #[serde(rename = "Consumer complaint narrative")]
    narrative: Option<String>,
    #[serde(rename = "Product")]
    product: Option<String>,
    #[serde(rename = "Issue")]
    issue: Option<String>,
    #[serde(rename = "Date received")]
    date_received: Option<String>,
}

/// Summary of a completed ingestion run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IngestStats {
    pub rows_read: u64,
    pub rows_skipped: u64,
    pub chunks_stored: u64,
}

/// Offline batch job that turns a complaint CSV into the persisted
/// vector-store collection.
///
/// Blank or malformed narratives are skipped; any embedding or store
/// failure is fatal and the job is rerun from scratch.
pub struct Ingester {
    embedder: Box<dyn Embedder>,
    store: Box<dyn ChunkStore>,
    chunking: ChunkingConfig,
    row_batch_size: usize,
    expected_dimension: Option<usize>,
    chunk_counter: u64,
}

struct PendingChunk {
    id: String,
    content: String,
    metadata: ChunkMetadata,
}

impl Ingester {
    #[inline]
    pub fn new(
        embedder: Box<dyn Embedder>,
        store: Box<dyn ChunkStore>,
        chunking: ChunkingConfig,
    ) -> Self {
        Self {
            embedder,
            store,
            chunking,
            row_batch_size: DEFAULT_ROW_BATCH_SIZE,
            expected_dimension: None,
            chunk_counter: 0,
        }
    }

    #[inline]
    pub fn with_row_batch_size(mut self, row_batch_size: usize) -> Self {
        self.row_batch_size = row_batch_size.max(1);
        self
    }

    /// Require every embedding to have exactly `dimension` components.
    /// Catches a misconfigured embedding model on the first batch.
    #[inline]
    pub fn with_expected_dimension(mut self, dimension: usize) -> Self {
        self.expected_dimension = Some(dimension);
        self
    }

    /// Run the ingestion stage over `csv_path`.
    #[inline]
    pub async fn run(&mut self, csv_path: &Path) -> Result<IngestStats> {
        info!("Ingesting complaints from {}", csv_path.display());

        let mut reader = csv::ReaderBuilder::new()
            .has_headers(true)
            .from_path(csv_path)
            .with_context(|| format!("Failed to open CSV file: {}", csv_path.display()))?;

        // The run replaces whatever a previous run stored; appending would
        // duplicate chunk ids, which must stay unique within the collection
        self.store.reset().await?;
        self.chunk_counter = 0;

        let progress = ProgressBar::new_spinner();
        progress.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        progress.enable_steady_tick(Duration::from_millis(120));

        let mut stats = IngestStats::default();
        let mut pending: Vec<PendingChunk> = Vec::new();

        for (row_index, record) in reader.deserialize::<ComplaintRow>().enumerate() {
            let row = match record {
                Ok(row) => row,
                Err(e) => {
                    // Malformed rows are treated like rows with no narrative
                    warn!("Skipping malformed row {}: {}", row_index, e);
                    stats.rows_read += 1;
                    stats.rows_skipped += 1;
                    continue;
                }
            };
            stats.rows_read += 1;

            let narrative = row.narrative.as_deref().unwrap_or("");
            let chunks = split_narrative(narrative, &self.chunking);
            if chunks.is_empty() {
                stats.rows_skipped += 1;
                continue;
            }

            let metadata = ChunkMetadata {
                complaint_id: row_index.to_string(),
                product: row.product.unwrap_or_default(),
                issue: row.issue.unwrap_or_default(),
                date_received: row.date_received.unwrap_or_default(),
            };

            for content in chunks {
                pending.push(PendingChunk {
                    id: format!("chunk_{}", self.chunk_counter),
                    content,
                    metadata: metadata.clone(),
                });
                self.chunk_counter += 1;
            }

            if stats.rows_read % self.row_batch_size as u64 == 0 {
                stats.chunks_stored += self.flush(&mut pending).await?;
                progress.set_message(format!(
                    "{} rows read, {} chunks stored",
                    stats.rows_read, stats.chunks_stored
                ));
            }
        }

        stats.chunks_stored += self.flush(&mut pending).await?;
        progress.finish_and_clear();

        info!(
            "Ingestion complete: {} rows read, {} skipped, {} chunks stored",
            stats.rows_read, stats.rows_skipped, stats.chunks_stored
        );

        Ok(stats)
    }

    /// Embed and store everything accumulated for the current row batch.
    /// Any failure here is fatal for the run.
    async fn flush(&mut self, pending: &mut Vec<PendingChunk>) -> Result<u64> {
        if pending.is_empty() {
            return Ok(0);
        }

        debug!("Embedding batch of {} chunks", pending.len());

        let texts: Vec<String> = pending.iter().map(|c| c.content.clone()).collect();
        let vectors = self.embedder.embed(&texts)?;

        if vectors.len() != pending.len() {
            return Err(RagError::Embedding(format!(
                "Embedder returned {} vectors for {} chunks",
                vectors.len(),
                pending.len()
            )));
        }

        if let Some(expected) = self.expected_dimension {
            if let Some(vector) = vectors.iter().find(|v| v.len() != expected) {
                return Err(RagError::Embedding(format!(
                    "Embedding dimension mismatch: model produced {}, configured {}",
                    vector.len(),
                    expected
                )));
            }
        }

        let stored: Vec<StoredChunk> = pending
            .drain(..)
            .zip(vectors)
            .map(|(chunk, vector)| StoredChunk {
                id: chunk.id,
                content: chunk.content,
                vector,
                metadata: chunk.metadata,
            })
            .collect();

        let count = stored.len() as u64;
        self.store.add_chunks(stored).await?;

        Ok(count)
    }
}
