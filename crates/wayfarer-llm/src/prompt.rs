//! Prompts sent to the model
//!
//! The chat prompt asks the model to wrap every place name in double
//! brackets; the enrichment prompts ask for a landmark of a place and for a
//! picture of that landmark as JSON objects.

use serde::Serialize;
use wayfarer_domain::{Role, TurnRecord};

/// System prompt for the travel conversation
pub const SYSTEM_PROMPT: &str = r#"You are a helpful travel conversation bot and you can help users by giving advice on places.
You and the user can chat about their travel interests (e.g. historical sites, beach, culture etc) and you may give interesting ideas to them based on their likes.

When providing responses, it is **crucial** that you clearly enclose location names in double brackets like this: [[location name]]. For example:
- "I recommend visiting [[New York City]]."
- "The Eiffel Tower is a must-see when you're in [[Paris]]."
- "If you go to [[Tokyo]], make sure to check out Shibuya Crossing."

Ensure that **every** location name is enclosed in double brackets. Do not use any other formatting like bold or italics for location names. This is important to ensure they are detected and processed correctly."#;

/// One message of a chat request
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatMessage {
    /// `system`, `user` or `assistant`
    pub role: String,
    /// Message text
    pub content: String,
}

impl ChatMessage {
    /// Create a message
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role: role.as_str().to_string(),
            content: content.into(),
        }
    }
}

/// Build the request messages: system prompt first, then the history
///
/// Assistant records are replayed with their place mention re-bracketed so
/// the model keeps seeing the convention it is asked to follow.
pub fn chat_messages(history: &[TurnRecord]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() + 1);
    messages.push(ChatMessage::new(Role::System, SYSTEM_PROMPT));

    for record in history {
        let content = match (&record.role, &record.location) {
            (Role::Assistant, Some(location)) => {
                format!("{} [[{}]]", record.text, location)
            }
            _ => record.text.clone(),
        };
        messages.push(ChatMessage::new(record.role, content));
    }

    messages
}

/// Prompt asking for a landmark of a location
pub fn describe_prompt(location: &str) -> String {
    format!(
        r#"Provide a landmark for {location} and a short description of the landmark.

Output format (JSON object only, no additional text):
{{
  "landmark": "name of the landmark",
  "info": "short description of the landmark and how it is significant for {location}"
}}"#
    )
}

/// Prompt asking for a picture of a named landmark
pub fn reference_prompt(name: &str) -> String {
    format!(
        r#"Provide a URL to a picture of {name}.

Output format (JSON object only, no additional text):
{{
  "url": "https://..."
}}"#
    )
}

/// Extract JSON from a model response, handling markdown code blocks
pub fn extract_json(response: &str) -> &str {
    let trimmed = response.trim();

    if let Some(rest) = trimmed.strip_prefix("```") {
        // Skip the fence line (```json or ```) and the closing fence
        let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
        return body.trim_end().trim_end_matches("```").trim();
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;
    use wayfarer_domain::MessageId;

    #[test]
    fn test_chat_messages_start_with_system_prompt() {
        let history = vec![TurnRecord::user("Somewhere warm?")];
        let messages = chat_messages(&history);

        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert!(messages[0].content.contains("[[location name]]"));
        assert_eq!(messages[1].role, "user");
        assert_eq!(messages[1].content, "Somewhere warm?");
    }

    #[test]
    fn test_assistant_location_is_rebracketed() {
        let mut record = TurnRecord::new(MessageId::new(), Role::Assistant, "Try the beaches in .");
        record.location = Some("Lisbon".to_string());

        let messages = chat_messages(&[record]);
        assert!(messages[1].content.ends_with("[[Lisbon]]"));
    }

    #[test]
    fn test_describe_prompt_mentions_location() {
        let prompt = describe_prompt("Kyoto");
        assert!(prompt.contains("landmark for Kyoto"));
        assert!(prompt.contains("\"info\""));
    }

    #[test]
    fn test_extract_json_plain() {
        assert_eq!(extract_json(" {\"url\": \"x\"} "), "{\"url\": \"x\"}");
    }

    #[test]
    fn test_extract_json_from_markdown() {
        let response = "```json\n{\"url\": \"x\"}\n```";
        assert_eq!(extract_json(response), "{\"url\": \"x\"}");
    }

    #[test]
    fn test_extract_json_from_markdown_without_language() {
        let response = "```\n{\"key\": \"value\"}\n```";
        assert!(extract_json(response).contains("key"));
    }
}
