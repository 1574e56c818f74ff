//! Wayfarer CLI library.
//!
//! This library provides the core functionality for the Wayfarer command-line
//! travel assistant: configuration management, the chat session wiring,
//! command execution, and live rendering of a streaming turn.

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod output;
pub mod repl;
pub mod session;

pub use cli::{Cli, Command};
pub use config::Config;
pub use error::{CliError, Result};
pub use output::{Formatter, TurnRenderer};
pub use session::Session;
