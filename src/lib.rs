use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Vector store error: {0}")]
    Store(String),

    #[error("Unexpected result shape: {0}")]
    Shape(String),

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Generation error: {0}")]
    Generation(String),

    #[error("Ingestion error: {0}")]
    Ingest(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

pub mod chat;
pub mod chunking;
pub mod commands;
pub mod config;
pub mod ingest;
pub mod ollama;
pub mod provision;
pub mod query;
pub mod store;
