//! CLI command definitions and argument parsing.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Wayfarer - a streaming travel assistant that looks up the places it mentions.
#[derive(Debug, Parser)]
#[command(name = "wayfarer")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Output format
    #[arg(short, long, value_enum, global = true)]
    pub format: Option<CliFormat>,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Configuration file path
    #[arg(short, long, global = true, env = "WAYFARER_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log engine activity to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Ollama endpoint, overriding the config file
    #[arg(long, global = true, env = "OLLAMA_HOST")]
    pub endpoint: Option<String>,

    /// Chat model, overriding the config file
    #[arg(short, long, global = true)]
    pub model: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Output format options.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum CliFormat {
    /// Text and tables (default)
    Text,
    /// JSON format
    Json,
}

/// CLI commands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Enter interactive chat mode
    Chat(ChatArgs),

    /// Ask a single question and exit
    Ask(AskArgs),

    /// List saved chats
    Chats(ChatsArgs),

    /// Print the messages of a saved chat
    Show(ShowArgs),

    /// Manage the configuration file
    Config(ConfigArgs),
}

/// Arguments for the chat command.
#[derive(Debug, Default, Parser)]
pub struct ChatArgs {
    /// Continue an existing chat
    #[arg(short, long)]
    pub resume: Option<String>,
}

/// Arguments for the ask command.
#[derive(Debug, Parser)]
pub struct AskArgs {
    /// The question
    #[arg(required = true)]
    pub message: Vec<String>,

    /// Ask inside an existing chat
    #[arg(short, long)]
    pub resume: Option<String>,
}

impl AskArgs {
    /// Question words joined back into one message.
    pub fn text(&self) -> String {
        self.message.join(" ")
    }
}

/// Arguments for the chats command.
#[derive(Debug, Parser)]
pub struct ChatsArgs {
    /// Maximum number of chats
    #[arg(short, long, default_value = "20")]
    pub limit: usize,
}

/// Arguments for the show command.
#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Chat id
    pub chat_id: String,
}

/// Arguments for configuration management.
#[derive(Debug, Parser)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Configuration actions.
#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,

    /// Print the configuration file location
    Path,

    /// Write a configuration file with default values
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

impl From<CliFormat> for crate::config::OutputFormat {
    fn from(format: CliFormat) -> Self {
        match format {
            CliFormat::Text => crate::config::OutputFormat::Text,
            CliFormat::Json => crate::config::OutputFormat::Json,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_subcommand_means_chat() {
        let cli = Cli::parse_from(["wayfarer"]);
        assert!(cli.command.is_none());
        assert!(!cli.verbose);
    }

    #[test]
    fn test_ask_command_joins_words() {
        let cli = Cli::parse_from(["wayfarer", "ask", "Where", "is", "the", "Louvre?"]);
        match cli.command {
            Some(Command::Ask(args)) => {
                assert_eq!(args.text(), "Where is the Louvre?");
                assert!(args.resume.is_none());
            }
            _ => panic!("Expected Ask command"),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::parse_from(["wayfarer", "chats", "--limit", "5", "-f", "json", "--verbose"]);
        assert!(cli.verbose);
        assert!(matches!(cli.format, Some(CliFormat::Json)));
        match cli.command {
            Some(Command::Chats(args)) => assert_eq!(args.limit, 5),
            _ => panic!("Expected Chats command"),
        }
    }

    #[test]
    fn test_config_init_force() {
        let cli = Cli::parse_from(["wayfarer", "config", "init", "--force"]);
        match cli.command {
            Some(Command::Config(ConfigArgs {
                action: ConfigAction::Init { force },
            })) => assert!(force),
            _ => panic!("Expected Config Init"),
        }
    }

    #[test]
    fn test_ask_requires_message() {
        assert!(Cli::try_parse_from(["wayfarer", "ask"]).is_err());
    }
}
