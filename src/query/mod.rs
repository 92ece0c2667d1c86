#[cfg(test)]
mod tests;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::RagError;
use crate::config::RetrievalConfig;
use crate::ollama::{Embedder, Generator};
use crate::store::{ChunkMetadata, ChunkStore, RetrievedChunk};

/// Answer used when retrieval finds no matching context
pub const NO_MATCH_ANSWER: &str = "No relevant information found.";

/// Answer used when a system failure prevents answering
pub const FAILURE_ANSWER: &str = "An error occurred.";

/// Why a query could not be served. Distinguishes "the system is broken"
/// from the ordinary "no data matched" outcome, which is not a failure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueryFailure {
    #[error("vector store unavailable: {0}")]
    StoreUnavailable(String),
    #[error("unexpected result shape: {0}")]
    ShapeMismatch(String),
    #[error("model invocation failed: {0}")]
    ModelFailure(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AnswerOutcome {
    /// The generation model produced an answer from retrieved context
    Answered,
    /// Retrieval found no matching chunks; the corpus may simply not cover
    /// the question
    NoMatch,
    Failed(QueryFailure),
}

/// Result of answering one question
#[derive(Debug, Clone)]
pub struct Answer {
    pub text: String,
    pub sources: Vec<String>,
    pub metadata: Vec<ChunkMetadata>,
    pub distances: Vec<f32>,
    pub outcome: AnswerOutcome,
}

/// Render the fixed prompt template from the question and retrieved chunks
#[inline]
pub fn build_prompt(question: &str, context_chunks: &[String]) -> String {
    let context = context_chunks.join("\n");
    format!(
        "You are a financial analyst assistant for CrediTrust. \
         Your task is to answer questions about customer complaints. \
         Use the following retrieved complaint excerpts to formulate your answer. \
         If the context doesn't contain the answer, state that you don't have \
         enough information.\n\n\
         Context:\n{context}\n\nQuestion: {question}\n\nAnswer:"
    )
}

/// Retrieval-and-generation engine over injected model and store
/// dependencies.
///
/// The embedder must be the same one used at ingestion time; mismatched
/// embedding spaces make the distances meaningless.
pub struct RagEngine {
    embedder: Box<dyn Embedder>,
    generator: Box<dyn Generator>,
    store: Box<dyn ChunkStore>,
    retrieval: RetrievalConfig,
}

impl RagEngine {
    #[inline]
    pub fn new(
        embedder: Box<dyn Embedder>,
        generator: Box<dyn Generator>,
        store: Box<dyn ChunkStore>,
        retrieval: RetrievalConfig,
    ) -> Self {
        Self {
            embedder,
            generator,
            store,
            retrieval,
        }
    }

    /// Embed the question and return the k nearest chunks, best match
    /// first. An empty result is a valid outcome, not a failure.
    #[inline]
    pub async fn retrieve(
        &self,
        question: &str,
        k: usize,
    ) -> Result<Vec<RetrievedChunk>, QueryFailure> {
        let query_vector = self
            .embedder
            .embed_one(question)
            .map_err(|e| QueryFailure::ModelFailure(e.to_string()))?;

        let chunks = self
            .store
            .search(&query_vector, k)
            .await
            .map_err(|e| match e {
                RagError::Shape(msg) => QueryFailure::ShapeMismatch(msg),
                other => QueryFailure::StoreUnavailable(other.to_string()),
            })?;

        debug!("Retrieved {} chunks for question", chunks.len());
        Ok(chunks)
    }

    /// Answer a question end to end. Never panics and never returns an
    /// error; failures are folded into [`Answer::outcome`] with a
    /// plain-text message substituted for the answer.
    #[inline]
    pub async fn answer(&self, question: &str, k: Option<usize>) -> Answer {
        let k = k.unwrap_or(self.retrieval.top_k);
        info!("Answering question with top-k {}", k);

        let chunks = match self.retrieve(question, k).await {
            Ok(chunks) => chunks,
            Err(failure) => {
                error!("Query failed during retrieval: {}", failure);
                return Answer {
                    text: FAILURE_ANSWER.to_string(),
                    sources: Vec::new(),
                    metadata: Vec::new(),
                    distances: Vec::new(),
                    outcome: AnswerOutcome::Failed(failure),
                };
            }
        };

        if chunks.is_empty() {
            // Short-circuit: the generation model is not invoked without
            // context
            debug!("No matching chunks; returning canned answer");
            return Answer {
                text: NO_MATCH_ANSWER.to_string(),
                sources: Vec::new(),
                metadata: Vec::new(),
                distances: Vec::new(),
                outcome: AnswerOutcome::NoMatch,
            };
        }

        let sources: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let metadata: Vec<ChunkMetadata> = chunks.iter().map(|c| c.metadata.clone()).collect();
        let distances: Vec<f32> = chunks.iter().map(|c| c.distance).collect();

        let prompt = build_prompt(question, &sources);
        match self
            .generator
            .generate(&prompt, self.retrieval.max_output_tokens)
        {
            Ok(text) => Answer {
                text,
                sources,
                metadata,
                distances,
                outcome: AnswerOutcome::Answered,
            },
            Err(e) => {
                error!("Generation failed: {}", e);
                Answer {
                    text: FAILURE_ANSWER.to_string(),
                    sources: Vec::new(),
                    metadata: Vec::new(),
                    distances: Vec::new(),
                    outcome: AnswerOutcome::Failed(QueryFailure::ModelFailure(e.to_string())),
                }
            }
        }
    }
}
