use clap::{Parser, Subcommand};
use complaint_rag::commands::{run_ask, run_chat, run_eval, run_fetch, run_ingest, show_status};
use complaint_rag::config::{run_interactive_config, show_config};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "complaint-rag")]
#[command(about = "Retrieval-augmented chatbot over customer complaint narratives")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure Ollama connection, chunking, and retrieval settings
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
    },
    /// Ingest a complaint CSV into the vector store
    Ingest {
        /// Path to the complaint CSV file
        csv: PathBuf,
        /// Override the chunk window size in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Override the overlap between consecutive chunks in characters
        #[arg(long)]
        overlap: Option<usize>,
    },
    /// Ask a single question and print the answer with sources
    Ask {
        /// The question to answer
        question: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        top_k: Option<usize>,
    },
    /// Start an interactive chat session
    Chat,
    /// Answer the built-in evaluation questions for manual review
    Eval,
    /// Download and unpack a prebuilt vector-store archive
    Fetch {
        /// URL of the vector-store zip archive
        url: String,
    },
    /// Show configuration and vector store status
    Status,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Config { show } => {
            if show {
                show_config()?;
            } else {
                run_interactive_config()?;
            }
        }
        Commands::Ingest {
            csv,
            chunk_size,
            overlap,
        } => {
            run_ingest(&csv, chunk_size, overlap).await?;
        }
        Commands::Ask { question, top_k } => {
            run_ask(&question, top_k).await?;
        }
        Commands::Chat => {
            run_chat().await?;
        }
        Commands::Eval => {
            run_eval().await?;
        }
        Commands::Fetch { url } => {
            run_fetch(&url)?;
        }
        Commands::Status => {
            show_status().await?;
        }
    }

    Ok(())
}
