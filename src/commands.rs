use anyhow::{Context, Result};
use console::style;
use std::path::Path;
use tracing::info;

use crate::chat;
use crate::config::Config;
use crate::ingest::Ingester;
use crate::ollama::OllamaClient;
use crate::provision;
use crate::query::{AnswerOutcome, RagEngine};
use crate::store::{ChunkStore, VectorStore};

/// Questions used for qualitative evaluation of the pipeline
const EVALUATION_QUESTIONS: &[&str] = &[
    "Why are people unhappy with BNPL?",
    "What issues are being reported with personal loans?",
    "How can CrediTrust improve its savings account product?",
    "What are common issues with money transfers?",
    "What are the top complaints about credit cards?",
];

/// Wire the production engine: one Ollama client shared by embedding and
/// generation, one LanceDB store, no globals.
async fn build_engine(config: &Config) -> Result<RagEngine> {
    let client = OllamaClient::new(config).context("Failed to initialize Ollama client")?;
    let store = VectorStore::open(config)
        .await
        .context("Failed to open vector store")?;

    Ok(RagEngine::new(
        Box::new(client.clone()),
        Box::new(client),
        Box::new(store),
        config.retrieval.clone(),
    ))
}

/// Run the offline ingestion stage over a complaint CSV
#[inline]
pub async fn run_ingest(
    csv_path: &Path,
    chunk_size: Option<usize>,
    overlap: Option<usize>,
) -> Result<()> {
    let mut config = Config::load_default()?;
    if let Some(size) = chunk_size {
        config.chunking.chunk_size = size;
    }
    if let Some(overlap) = overlap {
        config.chunking.chunk_overlap = overlap;
    }
    config
        .validate()
        .context("Invalid chunking configuration")?;

    let client = OllamaClient::new(&config).context("Failed to initialize Ollama client")?;
    client
        .ping()
        .context("Ollama server is not reachable; start it before ingesting")?;

    let store = VectorStore::open(&config)
        .await
        .context("Failed to open vector store")?;

    info!("Starting ingestion of {}", csv_path.display());

    let mut ingester = Ingester::new(Box::new(client), Box::new(store), config.chunking.clone())
        .with_expected_dimension(config.ollama.embedding_dimension as usize);
    let stats = ingester.run(csv_path).await?;

    println!("Ingestion completed successfully!");
    println!("  Rows read: {}", stats.rows_read);
    println!("  Rows skipped (no narrative): {}", stats.rows_skipped);
    println!("  Chunks stored: {}", stats.chunks_stored);
    println!("  Store: {}", config.vector_store_path().display());

    Ok(())
}

/// Answer a single question and print the answer with its sources
#[inline]
pub async fn run_ask(question: &str, top_k: Option<usize>) -> Result<()> {
    let config = Config::load_default()?;
    let engine = build_engine(&config).await?;

    let answer = engine.answer(question, top_k).await;

    println!("{} {}", style("Answer:").bold().green(), answer.text);

    if let AnswerOutcome::Failed(failure) = &answer.outcome {
        println!("{} {}", style("Failure:").bold().red(), failure);
    }

    if !answer.sources.is_empty() {
        println!();
        println!("{}", style("Sources:").bold());
        for (i, (source, metadata)) in answer
            .sources
            .iter()
            .zip(answer.metadata.iter())
            .enumerate()
        {
            println!(
                "  [{}] ({}, {}, received {}, distance {:.4})",
                i + 1,
                metadata.product,
                metadata.issue,
                metadata.date_received,
                answer.distances.get(i).copied().unwrap_or(0.0)
            );
            println!("      {}", source);
        }
    }

    Ok(())
}

/// Start the interactive chat session
#[inline]
pub async fn run_chat() -> Result<()> {
    let config = Config::load_default()?;
    let engine = build_engine(&config).await?;
    chat::run_chat(&engine).await
}

/// Run the canned evaluation questions and print answers for manual review
#[inline]
pub async fn run_eval() -> Result<()> {
    let config = Config::load_default()?;
    let engine = build_engine(&config).await?;

    for question in EVALUATION_QUESTIONS {
        let answer = engine.answer(question, None).await;

        println!("{} {}", style("Question:").bold(), question);
        println!("{} {}", style("Answer:").bold().green(), answer.text);
        for source in answer.sources.iter().take(2) {
            println!("  {} {}", style("Source:").dim(), source);
        }
        println!();
    }

    Ok(())
}

/// Provision the vector store from a prebuilt archive
#[inline]
pub fn run_fetch(url: &str) -> Result<()> {
    let config = Config::load_default()?;
    provision::fetch_store(url, &config.vector_store_path())
}

/// Show configuration and vector store status
#[inline]
pub async fn show_status() -> Result<()> {
    let config = Config::load_default()?;

    println!("{}", style("Complaint RAG Status").bold().cyan());
    println!();
    println!(
        "Embedding model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    println!(
        "Generation model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    println!(
        "Chunking: {} chars, {} overlap",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );
    println!("Top-k: {}", config.retrieval.top_k);
    println!();

    let store_path = config.vector_store_path();
    if store_path.exists() {
        let store = VectorStore::open(&config)
            .await
            .context("Failed to open vector store")?;
        let count = store.count().await.context("Failed to count chunks")?;
        println!("Vector store: {}", store_path.display());
        println!("Stored chunks: {}", count);
        if count == 0 {
            println!(
                "Run 'complaint-rag ingest <csv>' or 'complaint-rag fetch <url>' to populate it."
            );
        }
    } else {
        println!("Vector store: {} (not created yet)", store_path.display());
        println!("Run 'complaint-rag ingest <csv>' or 'complaint-rag fetch <url>' to create it.");
    }

    Ok(())
}
