//! Ask command implementation.

use crate::cli::AskArgs;
use crate::config::OutputFormat;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::session::Session;
use std::io;

/// Execute the ask command.
pub async fn execute_ask(args: AskArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let message = args.text();
    if message.trim().is_empty() {
        return Err(CliError::InvalidInput("Message must not be empty".to_string()));
    }

    let mut conversation = session.conversation(args.resume.as_deref())?;

    match formatter.format() {
        OutputFormat::Text => {
            let mut stdout = io::stdout();
            session
                .exchange(&mut conversation, &message, formatter, &mut stdout)
                .await?;
            println!(
                "{}",
                formatter.info(&format!("Chat {}", conversation.chat().id))
            );
        }
        OutputFormat::Json => {
            // Render into a sink; only the final record is printed
            let outcome = session
                .exchange(&mut conversation, &message, formatter, &mut io::sink())
                .await?;
            let json = serde_json::json!({
                "chat_id": conversation.chat().id.to_string(),
                "message": outcome.record,
                "enrichment": outcome.enrichment,
            });
            println!("{}", serde_json::to_string_pretty(&json)?);
        }
    }

    Ok(())
}
