//! Wayfarer CLI - streaming travel assistant in the terminal.

use clap::Parser;
use tracing_subscriber::EnvFilter;
use wayfarer_cli::commands;
use wayfarer_cli::repl;
use wayfarer_cli::{Cli, Command, Config, Formatter, Session};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with a streamed reply on stdout
    let default_filter = if cli.verbose { "wayfarer=debug" } else { "wayfarer=warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> wayfarer_cli::Result<()> {
    let mut config = Config::load(cli.config.as_deref())?;

    if let Some(endpoint) = cli.endpoint {
        config.ollama.endpoint = endpoint;
    }
    if let Some(model) = cli.model {
        config.ollama.chat_model = model;
    }

    let format = cli.format.map(Into::into).unwrap_or(config.settings.format);
    let color_enabled = !cli.no_color && config.settings.color;
    let formatter = Formatter::new(format, color_enabled);

    match cli.command {
        Some(Command::Config(args)) => {
            commands::execute_config(args, &config, cli.config.as_deref(), &formatter)?;
        }
        None => {
            let session = Session::open(config)?;
            repl::run_repl(&session, None, &formatter).await?;
        }
        Some(Command::Chat(args)) => {
            let session = Session::open(config)?;
            repl::run_repl(&session, args.resume.as_deref(), &formatter).await?;
        }
        Some(Command::Ask(args)) => {
            let session = Session::open(config)?;
            commands::execute_ask(args, &session, &formatter).await?;
        }
        Some(Command::Chats(args)) => {
            commands::execute_chats(args, &Session::open(config)?, &formatter)?;
        }
        Some(Command::Show(args)) => {
            commands::execute_show(args, &Session::open(config)?, &formatter)?;
        }
    }

    Ok(())
}
