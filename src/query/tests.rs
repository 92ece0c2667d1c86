use super::*;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::store::StoredChunk;

struct FakeEmbedder;

impl Embedder for FakeEmbedder {
    fn embed(&self, texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|t| vec![t.len() as f32, 1.0, 0.0])
            .collect())
    }
}

struct FailingEmbedder;

impl Embedder for FailingEmbedder {
    fn embed(&self, _texts: &[String]) -> crate::Result<Vec<Vec<f32>>> {
        Err(RagError::Embedding("embedding server down".to_string()))
    }
}

#[derive(Default)]
struct EchoGenerator {
    calls: Arc<AtomicUsize>,
}

impl Generator for EchoGenerator {
    fn generate(&self, prompt: &str, _max_tokens: u32) -> crate::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(format!("answer derived from {} prompt chars", prompt.len()))
    }
}

struct FailingGenerator;

impl Generator for FailingGenerator {
    fn generate(&self, _prompt: &str, _max_tokens: u32) -> crate::Result<String> {
        Err(RagError::Generation("generation server down".to_string()))
    }
}

/// In-memory store performing exact L2 nearest-neighbor search
#[derive(Clone, Default)]
struct MemoryStore {
    chunks: Vec<StoredChunk>,
}

impl MemoryStore {
    fn with_chunks(chunks: Vec<StoredChunk>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl ChunkStore for MemoryStore {
    async fn add_chunks(&mut self, chunks: Vec<StoredChunk>) -> crate::Result<()> {
        self.chunks.extend(chunks);
        Ok(())
    }

    async fn search(
        &self,
        query_vector: &[f32],
        limit: usize,
    ) -> crate::Result<Vec<RetrievedChunk>> {
        let mut results: Vec<RetrievedChunk> = self
            .chunks
            .iter()
            .map(|c| {
                let distance = c
                    .vector
                    .iter()
                    .zip(query_vector)
                    .map(|(a, b)| (a - b) * (a - b))
                    .sum::<f32>()
                    .sqrt();
                RetrievedChunk {
                    id: c.id.clone(),
                    content: c.content.clone(),
                    metadata: c.metadata.clone(),
                    distance,
                }
            })
            .collect();
        results.sort_by(|a, b| a.distance.total_cmp(&b.distance));
        results.truncate(limit);
        Ok(results)
    }

    async fn count(&self) -> crate::Result<u64> {
        Ok(self.chunks.len() as u64)
    }

    async fn reset(&mut self) -> crate::Result<()> {
        self.chunks.clear();
        Ok(())
    }
}

struct BrokenStore;

#[async_trait]
impl ChunkStore for BrokenStore {
    async fn add_chunks(&mut self, _chunks: Vec<StoredChunk>) -> crate::Result<()> {
        Err(RagError::Store("store directory missing".to_string()))
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _limit: usize,
    ) -> crate::Result<Vec<RetrievedChunk>> {
        Err(RagError::Store("store directory missing".to_string()))
    }

    async fn count(&self) -> crate::Result<u64> {
        Err(RagError::Store("store directory missing".to_string()))
    }

    async fn reset(&mut self) -> crate::Result<()> {
        Err(RagError::Store("store directory missing".to_string()))
    }
}

struct MalformedStore;

#[async_trait]
impl ChunkStore for MalformedStore {
    async fn add_chunks(&mut self, _chunks: Vec<StoredChunk>) -> crate::Result<()> {
        Ok(())
    }

    async fn search(
        &self,
        _query_vector: &[f32],
        _limit: usize,
    ) -> crate::Result<Vec<RetrievedChunk>> {
        Err(RagError::Shape("Missing _distance column".to_string()))
    }

    async fn count(&self) -> crate::Result<u64> {
        Ok(0)
    }

    async fn reset(&mut self) -> crate::Result<()> {
        Ok(())
    }
}

fn complaint_chunk(id: u64, content: &str, vector: Vec<f32>) -> StoredChunk {
    StoredChunk {
        id: format!("chunk_{}", id),
        content: content.to_string(),
        vector,
        metadata: ChunkMetadata {
            complaint_id: id.to_string(),
            product: "Credit card".to_string(),
            issue: "Billing dispute".to_string(),
            date_received: "2024-01-01".to_string(),
        },
    }
}

fn populated_store() -> MemoryStore {
    MemoryStore::with_chunks(vec![
        complaint_chunk(0, "The card was charged twice.", vec![20.0, 1.0, 0.0]),
        complaint_chunk(1, "The dispute was never resolved.", vec![30.0, 1.0, 0.0]),
        complaint_chunk(2, "Loan terms changed after signing.", vec![90.0, 1.0, 0.0]),
    ])
}

fn create_engine(store: Box<dyn ChunkStore>) -> RagEngine {
    RagEngine::new(
        Box::new(FakeEmbedder),
        Box::new(EchoGenerator::default()),
        store,
        RetrievalConfig::default(),
    )
}

#[test]
fn prompt_contains_context_and_question() {
    let chunks = vec!["first excerpt".to_string(), "second excerpt".to_string()];
    let prompt = build_prompt("Why are people unhappy with BNPL?", &chunks);

    assert!(prompt.contains("financial analyst assistant"));
    assert!(prompt.contains("first excerpt\nsecond excerpt"));
    assert!(prompt.contains("Question: Why are people unhappy with BNPL?"));
    assert!(prompt.ends_with("Answer:"));
    assert!(prompt.contains("enough information"));
}

#[tokio::test]
async fn empty_store_yields_canned_answer_without_generation() {
    let generator = EchoGenerator::default();
    let calls = Arc::clone(&generator.calls);
    let engine = RagEngine::new(
        Box::new(FakeEmbedder),
        Box::new(generator),
        Box::new(MemoryStore::default()),
        RetrievalConfig::default(),
    );

    let answer = engine.answer("Why are fees so high?", None).await;

    assert_eq!(answer.text, NO_MATCH_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(answer.distances.is_empty());
    assert_eq!(answer.outcome, AnswerOutcome::NoMatch);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn answered_question_carries_sources_in_distance_order() {
    let engine = create_engine(Box::new(populated_store()));

    // 26-char question embeds to [26, 1, 0]: distance 4 to chunk_1,
    // 6 to chunk_0, 64 to chunk_2
    let answer = engine.answer("What happened with my card", Some(2)).await;

    assert_eq!(answer.outcome, AnswerOutcome::Answered);
    assert!(answer.text.starts_with("answer derived from"));
    assert_eq!(answer.sources, vec![
        "The dispute was never resolved.".to_string(),
        "The card was charged twice.".to_string(),
    ]);
    assert_eq!(answer.metadata.len(), 2);
    assert!(answer.distances[0] <= answer.distances[1]);
}

#[tokio::test]
async fn retrieval_is_deterministic() {
    let engine = create_engine(Box::new(populated_store()));

    let first = engine
        .retrieve("What happened with my card", 3)
        .await
        .expect("retrieve should succeed");
    let second = engine
        .retrieve("What happened with my card", 3)
        .await
        .expect("retrieve should succeed");

    let first_ids: Vec<&str> = first.iter().map(|c| c.id.as_str()).collect();
    let second_ids: Vec<&str> = second.iter().map(|c| c.id.as_str()).collect();
    assert_eq!(first_ids, second_ids);
}

#[tokio::test]
async fn broken_store_surfaces_store_unavailable() {
    let engine = create_engine(Box::new(BrokenStore));

    let answer = engine.answer("any question", None).await;

    assert_eq!(answer.text, FAILURE_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(matches!(
        answer.outcome,
        AnswerOutcome::Failed(QueryFailure::StoreUnavailable(_))
    ));
}

#[tokio::test]
async fn malformed_results_surface_shape_mismatch() {
    let engine = create_engine(Box::new(MalformedStore));

    let result = engine.retrieve("any question", 5).await;

    assert!(matches!(result, Err(QueryFailure::ShapeMismatch(_))));
}

#[tokio::test]
async fn embedding_failure_surfaces_model_failure() {
    let engine = RagEngine::new(
        Box::new(FailingEmbedder),
        Box::new(EchoGenerator::default()),
        Box::new(populated_store()),
        RetrievalConfig::default(),
    );

    let answer = engine.answer("any question", None).await;

    assert_eq!(answer.text, FAILURE_ANSWER);
    assert!(matches!(
        answer.outcome,
        AnswerOutcome::Failed(QueryFailure::ModelFailure(_))
    ));
}

#[tokio::test]
async fn generation_failure_surfaces_model_failure() {
    let engine = RagEngine::new(
        Box::new(FakeEmbedder),
        Box::new(FailingGenerator),
        Box::new(populated_store()),
        RetrievalConfig::default(),
    );

    let answer = engine.answer("What happened with my card", None).await;

    assert_eq!(answer.text, FAILURE_ANSWER);
    assert!(answer.sources.is_empty());
    assert!(matches!(
        answer.outcome,
        AnswerOutcome::Failed(QueryFailure::ModelFailure(_))
    ));
}
