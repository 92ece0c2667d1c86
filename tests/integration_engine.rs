#![expect(
    clippy::tests_outside_test_module,
    reason = "integration tests are only compiled in test mode"
)]

/// End-to-end tests running the question-answering engine over a real
/// on-disk vector store, with deterministic stand-ins for the models.
use complaint_rag::chunking::ChunkingConfig;
use complaint_rag::config::{Config, RetrievalConfig};
use complaint_rag::ingest::Ingester;
use complaint_rag::ollama::{Embedder, Generator};
use complaint_rag::query::{AnswerOutcome, NO_MATCH_ANSWER, RagEngine};
use complaint_rag::store::{ChunkStore, VectorStore};
use std::io::Write;
use tempfile::{NamedTempFile, TempDir};

const DIM: usize = 768;

/// Maps each text onto one of a few fixed directions based on keywords,
/// so nearest-neighbor search behaves like a crude topic match.
struct KeywordEmbedder;

impl KeywordEmbedder {
    fn direction(text: &str) -> usize {
        let lower = text.to_lowercase();
        if lower.contains("card") {
            0
        } else if lower.contains("loan") {
            1
        } else if lower.contains("transfer") {
            2
        } else {
            3
        }
    }
}

impl Embedder for KeywordEmbedder {
    fn embed(&self, texts: &[String]) -> complaint_rag::Result<Vec<Vec<f32>>> {
        Ok(texts
            .iter()
            .map(|text| {
                let mut vector = vec![0.01_f32; DIM];
                vector[Self::direction(text)] = 10.0;
                vector
            })
            .collect())
    }
}

/// Returns the prompt length so tests can confirm a prompt was built
struct StubGenerator;

impl Generator for StubGenerator {
    fn generate(&self, prompt: &str, _max_tokens: u32) -> complaint_rag::Result<String> {
        Ok(format!("generated from {} prompt chars", prompt.len()))
    }
}

fn create_test_config() -> (Config, TempDir) {
    let temp_dir = TempDir::new().expect("should create temp dir");
    let config = Config {
        base_dir: temp_dir.path().to_path_buf(),
        ..Config::default()
    };
    (config, temp_dir)
}

fn write_complaint_csv() -> NamedTempFile {
    let mut file = NamedTempFile::new().expect("should create temp csv");
    writeln!(
        file,
        ",Consumer complaint narrative,Product,Issue,Date received"
    )
    .expect("should write header");
    writeln!(
        file,
        "0,My credit card was charged twice for one purchase.,Credit card,Billing dispute,2024-01-05"
    )
    .expect("should write row");
    writeln!(
        file,
        "1,The loan interest rate changed after I signed the agreement.,Personal loan,Loan terms,2024-02-10"
    )
    .expect("should write row");
    writeln!(
        file,
        "2,My money transfer has been pending for two weeks.,Money transfer,Delayed transfer,2024-03-20"
    )
    .expect("should write row");
    writeln!(file, "3,,Savings account,Account access,2024-04-01").expect("should write row");
    file
}

async fn ingest_fixture(config: &Config) {
    let csv = write_complaint_csv();
    let store = VectorStore::open(config)
        .await
        .expect("should open vector store");

    let mut ingester = Ingester::new(
        Box::new(KeywordEmbedder),
        Box::new(store),
        ChunkingConfig::default(),
    );
    let stats = ingester
        .run(csv.path())
        .await
        .expect("ingestion should succeed");

    assert_eq!(stats.rows_read, 4);
    assert_eq!(stats.rows_skipped, 1);
    assert_eq!(stats.chunks_stored, 3);
}

async fn create_engine(config: &Config) -> RagEngine {
    let store = VectorStore::open(config)
        .await
        .expect("should open vector store");
    RagEngine::new(
        Box::new(KeywordEmbedder),
        Box::new(StubGenerator),
        Box::new(store),
        RetrievalConfig::default(),
    )
}

#[tokio::test]
async fn ingested_complaints_are_answerable() {
    let (config, _temp_dir) = create_test_config();
    ingest_fixture(&config).await;

    let engine = create_engine(&config).await;
    let answer = engine
        .answer("What problems do people report with their card?", Some(1))
        .await;

    assert_eq!(answer.outcome, AnswerOutcome::Answered);
    assert!(answer.text.starts_with("generated from"));
    assert_eq!(answer.sources.len(), 1);
    assert!(answer.sources[0].contains("credit card was charged twice"));
    assert_eq!(answer.metadata[0].product, "Credit card");
    assert_eq!(answer.metadata[0].complaint_id, "0");
}

#[tokio::test]
async fn retrieval_ranks_the_matching_topic_first() {
    let (config, _temp_dir) = create_test_config();
    ingest_fixture(&config).await;

    let engine = create_engine(&config).await;

    let loan_answer = engine
        .answer("Why do customers complain about loan terms?", Some(3))
        .await;
    assert_eq!(loan_answer.outcome, AnswerOutcome::Answered);
    assert!(loan_answer.sources[0].contains("loan interest rate"));

    let transfer_answer = engine
        .answer("How long does a transfer take?", Some(3))
        .await;
    assert_eq!(transfer_answer.outcome, AnswerOutcome::Answered);
    assert!(transfer_answer.sources[0].contains("transfer has been pending"));
}

#[tokio::test]
async fn reingestion_does_not_duplicate_chunks() {
    let (config, _temp_dir) = create_test_config();
    ingest_fixture(&config).await;
    ingest_fixture(&config).await;

    let store = VectorStore::open(&config)
        .await
        .expect("should open vector store");
    assert_eq!(store.count().await.expect("count should succeed"), 3);

    // Retrieval must see exactly one chunk per topic, not two
    let engine = create_engine(&config).await;
    let answer = engine
        .answer("What problems do people report with their card?", Some(5))
        .await;
    assert_eq!(answer.outcome, AnswerOutcome::Answered);
    assert_eq!(answer.sources.len(), 3);
    let card_sources = answer
        .sources
        .iter()
        .filter(|s| s.contains("credit card was charged twice"))
        .count();
    assert_eq!(card_sources, 1);
}

#[tokio::test]
async fn empty_store_produces_no_match_answer() {
    let (config, _temp_dir) = create_test_config();

    let engine = create_engine(&config).await;
    let answer = engine.answer("Why are fees so high?", None).await;

    assert_eq!(answer.text, NO_MATCH_ANSWER);
    assert_eq!(answer.outcome, AnswerOutcome::NoMatch);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn answers_are_deterministic_across_sessions() {
    let (config, _temp_dir) = create_test_config();
    ingest_fixture(&config).await;

    let first = create_engine(&config)
        .await
        .answer("What happened to my card?", Some(2))
        .await;
    let second = create_engine(&config)
        .await
        .answer("What happened to my card?", Some(2))
        .await;

    assert_eq!(first.sources, second.sources);
    assert_eq!(first.text, second.text);
}
