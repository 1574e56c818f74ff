//! Output formatting for the CLI.

use crate::config::OutputFormat;
use crate::error::Result;
use colored::*;
use tabled::{
    builder::Builder,
    settings::{object::Rows, Alignment, Modify, Style},
};
use wayfarer_domain::{Chat, Enrichment, Role};
use wayfarer_stream::{ChannelEvent, DisplayMessage, SpanStatus, TurnEvent};

/// Output formatter.
#[derive(Debug, Clone)]
pub struct Formatter {
    format: OutputFormat,
    color_enabled: bool,
}

impl Formatter {
    /// Create a new formatter.
    pub fn new(format: OutputFormat, color_enabled: bool) -> Self {
        Self {
            format,
            color_enabled,
        }
    }

    /// Selected output format.
    pub fn format(&self) -> OutputFormat {
        self.format
    }

    /// Format a chat listing.
    pub fn format_chats(&self, chats: &[Chat]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = chats
                    .iter()
                    .map(|c| {
                        serde_json::json!({
                            "id": c.id.to_string(),
                            "title": c.title,
                            "path": c.path,
                            "created_at": c.created_at,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Text => Ok(self.format_chats_table(chats)),
        }
    }

    fn format_chats_table(&self, chats: &[Chat]) -> String {
        if chats.is_empty() {
            return self.colorize("No chats found.", "yellow");
        }

        let mut builder = Builder::default();
        builder.push_record(["ID", "Title", "Created"]);

        for chat in chats {
            builder.push_record([
                chat.id.to_string(),
                truncate(&chat.title, 60),
                chat.created_at.to_string(),
            ]);
        }

        let mut table = builder.build();
        table
            .with(Style::rounded())
            .with(Modify::new(Rows::first()).with(Alignment::center()));

        table.to_string()
    }

    /// Format the messages of one chat.
    pub fn format_messages(&self, messages: &[DisplayMessage]) -> Result<String> {
        match self.format {
            OutputFormat::Json => {
                let json: Vec<serde_json::Value> = messages
                    .iter()
                    .map(|m| {
                        serde_json::json!({
                            "id": m.id,
                            "role": m.role.as_str(),
                            "text": m.text,
                            "location": m.location,
                            "landmark": m.landmark,
                        })
                    })
                    .collect();
                Ok(serde_json::to_string_pretty(&json)?)
            }
            OutputFormat::Text => {
                if messages.is_empty() {
                    return Ok(self.colorize("No messages.", "yellow"));
                }
                let blocks: Vec<String> = messages.iter().map(|m| self.message_block(m)).collect();
                Ok(blocks.join("\n\n"))
            }
        }
    }

    fn message_block(&self, message: &DisplayMessage) -> String {
        let speaker = match message.role {
            Role::User => self.colorize("you", "cyan"),
            Role::Assistant => self.colorize("wayfarer", "magenta"),
            Role::System => self.colorize("system", "dimmed"),
        };
        let mut block = format!("{}: {}", speaker, message.text);
        if let Some(location) = &message.location {
            block.push_str(&format!("\n  {} {}", self.colorize("📍", "dimmed"), location));
        }
        if let Some(landmark) = &message.landmark {
            block.push_str(&format!("\n  {} {}", self.colorize("🏛", "dimmed"), landmark.info));
            block.push_str(&format!("\n  {}", self.colorize(&landmark.url, "blue")));
        }
        block
    }

    /// Card shown below a reply for its enrichment.
    pub fn enrichment_card(&self, enrichment: &Enrichment) -> String {
        match enrichment {
            Enrichment::Resolved { .. } => self.colorize(&format!("📍 {}", enrichment), "green"),
            Enrichment::Degraded { reason, .. } => self.colorize(
                &format!("📍 {} (no landmark found: {})", enrichment, reason),
                "yellow",
            ),
        }
    }

    /// Format a success message.
    pub fn success(&self, message: &str) -> String {
        self.colorize(&format!("✓ {}", message), "green")
    }

    /// Format an error message.
    pub fn error(&self, message: &str) -> String {
        self.colorize(&format!("✗ {}", message), "red")
    }

    /// Format an info message.
    pub fn info(&self, message: &str) -> String {
        self.colorize(&format!("ℹ {}", message), "blue")
    }

    /// Format a warning message.
    pub fn warning(&self, message: &str) -> String {
        self.colorize(&format!("⚠ {}", message), "yellow")
    }

    /// Apply color to text if color is enabled.
    pub fn colorize(&self, text: &str, color: &str) -> String {
        if !self.color_enabled {
            return text.to_string();
        }

        match color {
            "red" => text.red().to_string(),
            "green" => text.green().to_string(),
            "yellow" => text.yellow().to_string(),
            "blue" => text.blue().to_string(),
            "cyan" => text.cyan().to_string(),
            "magenta" => text.magenta().to_string(),
            "dimmed" => text.dimmed().to_string(),
            _ => text.to_string(),
        }
    }
}

/// Turns the event timeline of one turn into terminal output
///
/// Text prints as it arrives and a sealed span is echoed inline. The
/// enrichment card is held until the text channel is done so it never
/// interrupts the reply.
#[derive(Debug)]
pub struct TurnRenderer {
    formatter: Formatter,
    card: Option<String>,
    printed: bool,
}

impl TurnRenderer {
    /// Create a renderer for one turn.
    pub fn new(formatter: Formatter) -> Self {
        Self {
            formatter,
            card: None,
            printed: false,
        }
    }

    /// Output for one event, if any.
    pub fn render(&mut self, event: &TurnEvent) -> Option<String> {
        match event {
            TurnEvent::Text(ChannelEvent::Append(text)) => {
                self.printed = true;
                Some(text.clone())
            }
            TurnEvent::Text(ChannelEvent::Done(_)) => {
                let mut out = String::new();
                if self.printed {
                    out.push('\n');
                }
                if let Some(card) = self.card.take() {
                    out.push_str(&card);
                    out.push('\n');
                }
                (!out.is_empty()).then_some(out)
            }
            TurnEvent::SpanStatus(ChannelEvent::Done(Some(SpanStatus::Sealed(content)))) => {
                self.printed = true;
                Some(self.formatter.colorize(&format!("[{}]", content), "dimmed"))
            }
            TurnEvent::SpanStatus(_) => None,
            TurnEvent::Enrichment(ChannelEvent::Done(Some(enrichment)))
            | TurnEvent::Enrichment(ChannelEvent::Append(enrichment)) => {
                self.card = Some(self.formatter.enrichment_card(enrichment));
                None
            }
            TurnEvent::Enrichment(ChannelEvent::Done(None)) => None,
        }
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }
    let mut short: String = text.chars().take(max_chars.saturating_sub(1)).collect();
    short.push('…');
    short
}
