// Configuration management module
// TOML configuration under the platform config directory

pub mod interactive;
pub mod settings;

pub use interactive::{run_interactive_config, show_config};
pub use settings::{Config, ConfigError, OllamaConfig, RetrievalConfig};

/// Get the configuration directory path
#[inline]
pub fn get_config_dir() -> Result<std::path::PathBuf, ConfigError> {
    dirs::config_dir()
        .map(|dir| dir.join("complaint-rag"))
        .ok_or(ConfigError::DirectoryError)
}
