//! Error types for the CLI application.

use thiserror::Error;

/// Result type alias for CLI operations.
pub type Result<T> = std::result::Result<T, CliError>;

/// CLI-specific errors.
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model provider error
    #[error("Model error: {0}")]
    Llm(#[from] wayfarer_llm::LlmError),

    /// Turn failed
    #[error("Turn failed: {0}")]
    Turn(#[from] wayfarer_stream::TurnError),

    /// Storage error
    #[error("Storage error: {0}")]
    Store(#[from] wayfarer_store::StoreError),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line editor error
    #[error("Editor error: {0}")]
    Readline(#[from] rustyline::error::ReadlineError),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Unknown chat id
    #[error("Chat not found: {0}")]
    ChatNotFound(String),
}
