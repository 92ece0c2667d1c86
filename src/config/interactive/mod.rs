use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input, Select};

use super::{Config, OllamaConfig};
use crate::ollama::OllamaClient;

#[inline]
pub fn run_interactive_config() -> Result<()> {
    eprintln!("{}", style("🔧 Complaint RAG Configuration").bold().cyan());
    eprintln!();

    let mut config = load_existing_config()?;

    eprintln!("{}", style("Ollama Configuration").bold().yellow());
    eprintln!("Configure the local Ollama instance used for embeddings and answer generation.");
    eprintln!();

    configure_ollama(&mut config.ollama)?;

    eprintln!();
    eprintln!("{}", style("Chunking Settings").bold().yellow());
    configure_chunking(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Retrieval Settings").bold().yellow());
    configure_retrieval(&mut config)?;

    eprintln!();
    eprintln!("{}", style("Testing configuration...").yellow());

    if test_ollama_connection(&config)? {
        eprintln!("{}", style("✓ Ollama connection successful!").green());
    } else {
        eprintln!(
            "{}",
            style("⚠ Warning: Could not connect to Ollama").yellow()
        );
        eprintln!("You can continue, but make sure Ollama is running before ingesting or asking.");
    }

    eprintln!();
    if Confirm::new()
        .with_prompt("Save configuration?")
        .default(true)
        .interact()?
    {
        config.save().context("Failed to save configuration")?;
        eprintln!("{}", style("✓ Configuration saved successfully!").green());
        eprintln!(
            "Configuration saved to: {}",
            style(config.config_file_path().display()).cyan()
        );
    } else {
        eprintln!("Configuration not saved.");
    }

    Ok(())
}

#[inline]
pub fn show_config() -> Result<()> {
    let config = Config::load_default().context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();

    eprintln!("{}", style("Ollama Settings:").bold().yellow());
    eprintln!("  Host: {}", style(&config.ollama.host).cyan());
    eprintln!("  Port: {}", style(config.ollama.port).cyan());
    eprintln!(
        "  Embedding model: {}",
        style(&config.ollama.embedding_model).cyan()
    );
    eprintln!(
        "  Generation model: {}",
        style(&config.ollama.generation_model).cyan()
    );
    eprintln!("  Batch size: {}", style(config.ollama.batch_size).cyan());
    eprintln!(
        "  Embedding dimension: {}",
        style(config.ollama.embedding_dimension).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Chunking:").bold().yellow());
    eprintln!(
        "  Window: {} chars, overlap {} chars",
        style(config.chunking.chunk_size).cyan(),
        style(config.chunking.chunk_overlap).cyan()
    );

    eprintln!();
    eprintln!("{}", style("Retrieval:").bold().yellow());
    eprintln!("  Top-k: {}", style(config.retrieval.top_k).cyan());
    eprintln!(
        "  Max output tokens: {}",
        style(config.retrieval.max_output_tokens).cyan()
    );

    eprintln!();
    match config.ollama_url() {
        Ok(url) => eprintln!("  Ollama URL: {}", style(url).cyan()),
        Err(e) => eprintln!("  Ollama URL: {} ({})", style("Invalid").red(), e),
    }

    eprintln!();
    eprintln!(
        "Config file: {}",
        style(config.config_file_path().display()).dim()
    );
    eprintln!(
        "Vector store: {}",
        style(config.vector_store_path().display()).dim()
    );

    Ok(())
}

fn load_existing_config() -> Result<Config> {
    Config::load_default().map_or_else(
        |_| {
            eprintln!(
                "{}",
                style("No existing configuration found. Using defaults.").yellow()
            );
            let base_dir = super::get_config_dir()?;
            Ok(Config {
                base_dir,
                ..Config::default()
            })
        },
        |config| {
            eprintln!("{}", style("Found existing configuration.").green());
            Ok(config)
        },
    )
}

fn configure_ollama(ollama: &mut OllamaConfig) -> Result<()> {
    let protocols = &["http", "https"];
    let default_index = protocols
        .iter()
        .position(|&p| p == ollama.protocol)
        .unwrap_or(0);

    let protocol_index = Select::new()
        .with_prompt("Ollama protocol")
        .default(default_index)
        .items(protocols)
        .interact()?;
    ollama.protocol = protocols[protocol_index].to_string();

    ollama.host = Input::new()
        .with_prompt("Ollama host")
        .default(ollama.host.clone())
        .interact_text()?;

    ollama.port = Input::new()
        .with_prompt("Ollama port")
        .default(ollama.port)
        .interact_text()?;

    ollama.embedding_model = Input::new()
        .with_prompt("Embedding model")
        .default(ollama.embedding_model.clone())
        .interact_text()?;

    ollama.generation_model = Input::new()
        .with_prompt("Generation model")
        .default(ollama.generation_model.clone())
        .interact_text()?;

    ollama.batch_size = Input::new()
        .with_prompt("Embedding batch size")
        .default(ollama.batch_size)
        .interact_text()?;

    Ok(())
}

fn configure_chunking(config: &mut Config) -> Result<()> {
    config.chunking.chunk_size = Input::new()
        .with_prompt("Chunk window size (characters)")
        .default(config.chunking.chunk_size)
        .interact_text()?;

    let chunk_size = config.chunking.chunk_size;
    config.chunking.chunk_overlap = Input::new()
        .with_prompt("Overlap between consecutive chunks (characters)")
        .default(config.chunking.chunk_overlap.min(chunk_size.saturating_sub(1)))
        .validate_with(move |overlap: &usize| {
            if *overlap < chunk_size {
                Ok(())
            } else {
                Err("overlap must be smaller than the chunk window")
            }
        })
        .interact_text()?;

    Ok(())
}

fn configure_retrieval(config: &mut Config) -> Result<()> {
    config.retrieval.top_k = Input::new()
        .with_prompt("Chunks retrieved per question (top-k)")
        .default(config.retrieval.top_k)
        .interact_text()?;

    config.retrieval.max_output_tokens = Input::new()
        .with_prompt("Max answer tokens")
        .default(config.retrieval.max_output_tokens)
        .interact_text()?;

    Ok(())
}

fn test_ollama_connection(config: &Config) -> Result<bool> {
    let Ok(client) = OllamaClient::new(config) else {
        return Ok(false);
    };
    Ok(client.ping().is_ok())
}
