//! Interactive chat mode.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::Formatter;
use crate::session::Session;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use std::io;
use std::path::PathBuf;

/// Run the interactive chat loop.
pub async fn run_repl(session: &Session, resume: Option<&str>, formatter: &Formatter) -> Result<()> {
    let mut conversation = session.conversation(resume)?;

    println!(
        "{}",
        formatter.info("Wayfarer - ask about a destination, 'help' for commands, 'exit' to quit")
    );
    if resume.is_some() {
        println!("{}", formatter.format_messages(&conversation.display_messages())?);
    }
    println!();

    let editor_config = rustyline::Config::builder()
        .max_history_size(session.config().settings.history_size)?
        .auto_add_history(false)
        .build();
    let mut editor = DefaultEditor::with_config(editor_config)?;

    let history_path = get_history_path()?;
    let _ = editor.load_history(&history_path);

    loop {
        match editor.readline("you> ") {
            Ok(line) => {
                let line = line.trim();

                if line.is_empty() {
                    continue;
                }

                editor.add_history_entry(line).ok();

                match parse_repl_command(line) {
                    ReplCommand::Exit => {
                        println!("{}", formatter.info("Goodbye!"));
                        break;
                    }
                    ReplCommand::Help => {
                        print_help(formatter);
                    }
                    ReplCommand::History => {
                        println!("{}", formatter.format_messages(&conversation.display_messages())?);
                    }
                    ReplCommand::New => {
                        conversation = session.conversation(None)?;
                        println!("{}", formatter.success("Started a new chat"));
                    }
                    ReplCommand::Chats => match session.list_chats(20) {
                        Ok(chats) => println!("{}", formatter.format_chats(&chats)?),
                        Err(e) => eprintln!("{}", formatter.error(&e.to_string())),
                    },
                    ReplCommand::Message(message) => {
                        let mut stdout = io::stdout();
                        if let Err(e) = session
                            .exchange(&mut conversation, &message, formatter, &mut stdout)
                            .await
                        {
                            eprintln!("{}", formatter.error(&e.to_string()));
                        }
                        println!();
                    }
                }
            }
            Err(ReadlineError::Interrupted) => {
                println!("{}", formatter.info("Use 'exit' to quit"));
            }
            Err(ReadlineError::Eof) => {
                break;
            }
            Err(err) => {
                eprintln!("{}", formatter.error(&format!("Error: {}", err)));
                break;
            }
        }
    }

    editor.save_history(&history_path).ok();

    if !conversation.history().is_empty() {
        println!(
            "{}",
            formatter.info(&format!("Resume with: wayfarer chat --resume {}", conversation.chat().id))
        );
    }

    Ok(())
}

/// REPL command type.
#[derive(Debug, PartialEq, Eq)]
enum ReplCommand {
    Exit,
    Help,
    History,
    New,
    Chats,
    Message(String),
}

/// Parse a REPL line; anything that is not a command is a chat message.
fn parse_repl_command(line: &str) -> ReplCommand {
    match line {
        "exit" | "quit" | "q" => ReplCommand::Exit,
        "help" | "?" => ReplCommand::Help,
        "history" => ReplCommand::History,
        "new" => ReplCommand::New,
        "chats" => ReplCommand::Chats,
        _ => ReplCommand::Message(line.to_string()),
    }
}

fn get_history_path() -> Result<PathBuf> {
    let dir = Config::home_dir()?;
    std::fs::create_dir_all(&dir).map_err(CliError::Io)?;
    Ok(dir.join("history.txt"))
}

fn print_help(formatter: &Formatter) {
    println!("{}", formatter.info("Available commands:"));
    println!();
    println!("  <message>                      - Ask Wayfarer");
    println!("  history                        - Show this chat so far");
    println!("  new                            - Start a new chat");
    println!("  chats                          - List saved chats");
    println!("  help, ?                        - Show this help");
    println!("  exit, quit, q                  - Exit");
    println!();
}
