//! Chats command implementation.

use crate::cli::ChatsArgs;
use crate::error::Result;
use crate::output::Formatter;
use crate::session::Session;

/// Execute the chats command.
pub fn execute_chats(args: ChatsArgs, session: &Session, formatter: &Formatter) -> Result<()> {
    let chats = session.list_chats(args.limit)?;
    println!("{}", formatter.format_chats(&chats)?);
    Ok(())
}
