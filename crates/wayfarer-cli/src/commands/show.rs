//! Show command implementation.

use crate::cli::ShowArgs;
use crate::error::Result;
use crate::output::Formatter;
use crate::session::Session;

/// Execute the show command.
pub fn execute_show(args: ShowArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let conversation = session.conversation(Some(&args.chat_id))?;
    println!("{}", formatter.format_messages(&conversation.display_messages())?);
    Ok(())
}
