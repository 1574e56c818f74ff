//! Configuration management for the CLI.

use crate::error::{CliError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use wayfarer_stream::StreamConfig;

/// CLI configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Model provider settings
    #[serde(default)]
    pub ollama: OllamaSettings,

    /// Chat storage settings
    #[serde(default)]
    pub storage: StorageSettings,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Streaming engine settings
    #[serde(default)]
    pub stream: StreamConfig,
}

/// Ollama connection and model selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    /// Ollama API endpoint
    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Model that writes the replies
    #[serde(default = "default_model")]
    pub chat_model: String,

    /// Model that answers landmark lookups
    #[serde(default = "default_model")]
    pub enrichment_model: String,

    /// Attempts per lookup request
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Timeout for a single lookup request
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Where chats are stored.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    /// SQLite database file (defaults to `~/.wayfarer/wayfarer.db`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<PathBuf>,
}

/// Global CLI settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Enable colored output
    #[serde(default = "default_true")]
    pub color: bool,

    /// Default output format
    #[serde(default = "default_format")]
    pub format: OutputFormat,

    /// REPL history size
    #[serde(default = "default_history_size")]
    pub history_size: usize,
}

/// Output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable text and tables
    Text,
    /// JSON format
    Json,
}

impl Config {
    /// Directory holding config, history and the default database.
    pub fn home_dir() -> Result<PathBuf> {
        let home = dirs::home_dir()
            .ok_or_else(|| CliError::Config("Could not find home directory".into()))?;
        Ok(home.join(".wayfarer"))
    }

    /// Get the default configuration file path.
    pub fn path() -> Result<PathBuf> {
        Ok(Self::home_dir()?.join("config.toml"))
    }

    /// Load configuration from `path` (or the default path), falling back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::path()?,
        };

        let config = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            toml::from_str::<Config>(&contents)?
        } else {
            Self::default()
        };

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path` (or the default path).
    pub fn save(&self, path: Option<&Path>) -> Result<PathBuf> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => Self::path()?,
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&path, self.to_toml()?)?;
        Ok(path)
    }

    /// Render as TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| CliError::Config(format!("Failed to serialize config: {}", e)))
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        if self.ollama.endpoint.trim().is_empty() {
            return Err(CliError::Config("ollama.endpoint must not be empty".into()));
        }
        if self.ollama.chat_model.trim().is_empty() || self.ollama.enrichment_model.trim().is_empty() {
            return Err(CliError::Config("model names must not be empty".into()));
        }
        self.stream
            .validate()
            .map_err(|e| CliError::Config(format!("stream: {}", e)))
    }

    /// Resolved database location.
    pub fn database_path(&self) -> Result<PathBuf> {
        match &self.storage.database {
            Some(path) => Ok(path.clone()),
            None => Ok(Self::home_dir()?.join("wayfarer.db")),
        }
    }

    /// Lookup request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.ollama.request_timeout_secs)
    }
}

impl Default for OllamaSettings {
    fn default() -> Self {
        Self {
            endpoint: default_endpoint(),
            chat_model: default_model(),
            enrichment_model: default_model(),
            max_retries: default_max_retries(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            color: true,
            format: OutputFormat::Text,
            history_size: 1000,
        }
    }
}

fn default_endpoint() -> String {
    "http://localhost:11434".to_string()
}

fn default_model() -> String {
    "llama3.2".to_string()
}

fn default_max_retries() -> u32 {
    3
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

fn default_format() -> OutputFormat {
    OutputFormat::Text
}

fn default_history_size() -> usize {
    1000
}
