//! Ollama Provider Implementation
//!
//! Integration with Ollama's local LLM API.
//!
//! # Features
//!
//! - Streaming chat (`/api/chat`, newline-delimited JSON) exposed as a
//!   [`FragmentSource`]
//! - Landmark description and picture lookups (`/api/generate` in JSON mode)
//!   exposed as [`Describer`] and [`ReferenceResolver`]
//! - Retry logic with exponential backoff for the one-shot lookups
//!
//! # Examples
//!
//! ```no_run
//! use wayfarer_llm::OllamaProvider;
//! use wayfarer_llm::prompt::chat_messages;
//! use wayfarer_domain::TurnRecord;
//!
//! # async fn example() -> Result<(), wayfarer_llm::LlmError> {
//! let provider = OllamaProvider::new("http://localhost:11434", "llama3")?;
//! let source = provider.chat_stream(&chat_messages(&[TurnRecord::user("Beaches?")])).await?;
//! # Ok(())
//! # }
//! ```

use crate::prompt::{self, ChatMessage};
use crate::LlmError;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, warn};
use wayfarer_domain::traits::{Describer, FragmentSource, ReferenceResolver};
use wayfarer_domain::{EntityDescription, Fragment};

/// Default Ollama API endpoint
pub const DEFAULT_ENDPOINT: &str = "http://localhost:11434";

/// Default timeout for one-shot requests (30 seconds)
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default connect timeout (5 seconds)
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 5;

/// Default number of retry attempts
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Ollama API provider for local LLM inference
#[derive(Debug, Clone)]
pub struct OllamaProvider {
    endpoint: String,
    model: String,
    client: reqwest::Client,
    max_retries: u32,
    request_timeout: Duration,
}

/// Request body for Ollama chat API
#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// One line of the chat stream
#[derive(Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

/// Request body for Ollama generate API
#[derive(Serialize)]
struct OllamaGenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'a str>,
}

/// Response from Ollama generate API
#[derive(Deserialize)]
struct OllamaGenerateResponse {
    response: String,
}

/// Landmark description requested from the model
#[derive(Deserialize)]
struct LandmarkInfo {
    landmark: String,
    info: String,
}

/// Picture reference requested from the model
#[derive(Deserialize)]
struct PictureReference {
    url: String,
}

impl OllamaProvider {
    /// Create a new Ollama provider
    ///
    /// # Parameters
    ///
    /// - `endpoint`: Ollama API endpoint (e.g., "http://localhost:11434")
    /// - `model`: Model to use (e.g., "llama3", "mistral")
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, LlmError> {
        // No overall timeout: a chat stream may legitimately run for minutes.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| LlmError::Other(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            model: model.into(),
            client,
            max_retries: DEFAULT_MAX_RETRIES,
            request_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    /// Create a provider against the default local endpoint
    pub fn default_endpoint(model: impl Into<String>) -> Result<Self, LlmError> {
        Self::new(DEFAULT_ENDPOINT, model)
    }

    /// Set the maximum number of retry attempts
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }

    /// Set the timeout for one-shot requests
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Model name this provider talks to
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Start a streaming chat completion
    ///
    /// # Errors
    ///
    /// Fails before any fragment is produced if Ollama is unreachable, the
    /// model is missing, or the server answers with an error status.
    pub async fn chat_stream(&self, messages: &[ChatMessage]) -> Result<OllamaChatSource, LlmError> {
        let url = format!("{}/api/chat", self.endpoint);
        let body = OllamaChatRequest {
            model: &self.model,
            messages,
            stream: true,
        };

        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Communication(format!("Request failed: {}", e)))?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(LlmError::ModelNotAvailable(self.model.clone()));
        }
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(LlmError::Communication(format!("HTTP {}: {}", status, error_text)));
        }

        debug!(model = %self.model, "Chat stream opened");
        Ok(OllamaChatSource::new(response))
    }

    /// Generate text using Ollama API
    ///
    /// When `json` is set, Ollama is asked to constrain the output to JSON.
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - Ollama is not running
    /// - Model is not available
    /// - Network communication fails after all retries
    /// - Response format is invalid
    pub async fn generate(&self, prompt: &str, json: bool) -> Result<String, LlmError> {
        let url = format!("{}/api/generate", self.endpoint);

        let request_body = OllamaGenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            format: json.then_some("json"),
        };

        // Retry logic with exponential backoff
        let mut attempts = 0;
        let mut last_error = None;

        while attempts < self.max_retries {
            match self
                .client
                .post(&url)
                .timeout(self.request_timeout)
                .json(&request_body)
                .send()
                .await
            {
                Ok(response) => {
                    if response.status().is_success() {
                        return response
                            .json::<OllamaGenerateResponse>()
                            .await
                            .map(|r| r.response)
                            .map_err(|e| {
                                LlmError::InvalidResponse(format!("Failed to parse response: {}", e))
                            });
                    } else if response.status() == reqwest::StatusCode::NOT_FOUND {
                        return Err(LlmError::ModelNotAvailable(self.model.clone()));
                    } else {
                        let status = response.status();
                        let error_text = response
                            .text()
                            .await
                            .unwrap_or_else(|_| "Unknown error".to_string());
                        last_error = Some(LlmError::Communication(format!(
                            "HTTP {}: {}",
                            status, error_text
                        )));
                    }
                }
                Err(e) => {
                    last_error = Some(LlmError::Communication(format!("Request failed: {}", e)));
                }
            }

            attempts += 1;
            if attempts < self.max_retries {
                // Exponential backoff: 1s, 2s, 4s, etc.
                let delay = Duration::from_secs(2u64.pow(attempts - 1));
                warn!(attempt = attempts, ?delay, "Ollama request failed, retrying");
                tokio::time::sleep(delay).await;
            }
        }

        Err(last_error
            .unwrap_or_else(|| LlmError::Communication("Max retries exceeded".to_string())))
    }

    /// Generate and deserialize a JSON object
    pub async fn generate_structured<T>(&self, prompt: &str) -> Result<T, LlmError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self.generate(prompt, true).await?;

        serde_json::from_str(prompt::extract_json(&response)).map_err(|e| {
            LlmError::InvalidResponse(format!("Failed to parse structured response: {}", e))
        })
    }
}

impl Describer for OllamaProvider {
    type Error = LlmError;

    async fn describe(&self, entity: &str) -> Result<EntityDescription, LlmError> {
        let info: LandmarkInfo = self
            .generate_structured(&prompt::describe_prompt(entity))
            .await?;

        if info.landmark.trim().is_empty() || info.info.trim().is_empty() {
            return Err(LlmError::EmptyResult(format!("No landmark found for '{}'", entity)));
        }

        Ok(EntityDescription {
            name: info.landmark.trim().to_string(),
            fact: info.info.trim().to_string(),
        })
    }
}

impl ReferenceResolver for OllamaProvider {
    type Error = LlmError;

    async fn resolve_reference(&self, name: &str) -> Result<String, LlmError> {
        let reference: PictureReference = self
            .generate_structured(&prompt::reference_prompt(name))
            .await?;

        let url = reference.url.trim();
        if url.is_empty() {
            return Err(LlmError::EmptyResult(format!("No picture found for '{}'", name)));
        }
        if !(url.starts_with("https://") || url.starts_with("http://")) {
            return Err(LlmError::InvalidResponse(format!("Not a URL: {}", url)));
        }

        Ok(url.to_string())
    }
}

/// Incremental decoder for the newline-delimited JSON of `/api/chat`
///
/// Bytes are buffered until a newline completes a line, so a line (or a
/// multibyte character) may straddle any number of network chunks.
#[derive(Debug, Default)]
struct ChatStreamDecoder {
    line_buffer: Vec<u8>,
    pending: VecDeque<Fragment>,
    accumulated: String,
    done: bool,
}

impl ChatStreamDecoder {
    /// Buffer one network chunk and decode every line it completes
    fn push(&mut self, bytes: &[u8]) -> Result<(), LlmError> {
        self.line_buffer.extend_from_slice(bytes);
        while let Some(pos) = self.line_buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.line_buffer.drain(..=pos).collect();
            self.decode_line(&line)?;
        }
        Ok(())
    }

    /// End of the body: decode a trailing line that had no newline
    fn finish(&mut self) -> Result<(), LlmError> {
        let rest = std::mem::take(&mut self.line_buffer);
        self.decode_line(&rest)
    }

    fn next(&mut self) -> Option<Fragment> {
        self.pending.pop_front()
    }

    /// Whether the model sent its `done` chunk
    fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line: &[u8]) -> Result<(), LlmError> {
        if self.done || line.iter().all(u8::is_ascii_whitespace) {
            return Ok(());
        }

        let chunk: OllamaChatChunk = serde_json::from_slice(line)
            .map_err(|e| LlmError::InvalidResponse(format!("Malformed stream line: {}", e)))?;

        if let Some(error) = chunk.error {
            return Err(LlmError::Communication(error));
        }

        if let Some(message) = chunk.message {
            if !message.content.is_empty() {
                self.accumulated.push_str(&message.content);
                self.pending.push_back(Fragment::Delta(message.content));
            }
        }

        if chunk.done {
            self.done = true;
            self.pending
                .push_back(Fragment::done(std::mem::take(&mut self.accumulated)));
        }

        Ok(())
    }
}

/// Fragment source over a streaming Ollama chat response
pub struct OllamaChatSource {
    response: reqwest::Response,
    decoder: ChatStreamDecoder,
    finished: bool,
}

impl OllamaChatSource {
    fn new(response: reqwest::Response) -> Self {
        Self {
            response,
            decoder: ChatStreamDecoder::default(),
            finished: false,
        }
    }
}

impl FragmentSource for OllamaChatSource {
    type Error = LlmError;

    async fn next_fragment(&mut self) -> Result<Option<Fragment>, LlmError> {
        loop {
            if let Some(fragment) = self.decoder.next() {
                return Ok(Some(fragment));
            }
            if self.finished || self.decoder.is_done() {
                return Ok(None);
            }

            match self.response.chunk().await {
                Ok(Some(bytes)) => {
                    if let Err(e) = self.decoder.push(&bytes) {
                        self.finished = true;
                        return Err(e);
                    }
                }
                Ok(None) => {
                    self.finished = true;
                    self.decoder.finish()?;
                }
                Err(e) => {
                    self.finished = true;
                    return Err(LlmError::Communication(format!("Stream interrupted: {}", e)));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ollama_provider_creation() {
        let provider = OllamaProvider::new("http://localhost:11434/", "llama3").unwrap();
        assert_eq!(provider.endpoint, "http://localhost:11434");
        assert_eq!(provider.model(), "llama3");
        assert_eq!(provider.max_retries, DEFAULT_MAX_RETRIES);
    }

    #[test]
    fn test_ollama_provider_default_endpoint() {
        let provider = OllamaProvider::default_endpoint("mistral").unwrap();
        assert_eq!(provider.endpoint, DEFAULT_ENDPOINT);
    }

    #[test]
    fn test_ollama_provider_with_max_retries() {
        let provider = OllamaProvider::default_endpoint("llama3")
            .unwrap()
            .with_max_retries(5);
        assert_eq!(provider.max_retries, 5);

        let provider = provider.with_max_retries(0);
        assert_eq!(provider.max_retries, 1);
    }

    #[test]
    fn test_chat_request_shape() {
        let messages = vec![ChatMessage {
            role: "user".to_string(),
            content: "hi".to_string(),
        }];
        let body = OllamaChatRequest {
            model: "llama3",
            messages: &messages,
            stream: true,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["stream"], true);
        assert_eq!(json["messages"][0]["role"], "user");
    }

    #[test]
    fn test_generate_request_omits_format_when_plain() {
        let body = OllamaGenerateRequest {
            model: "llama3",
            prompt: "p",
            stream: false,
            format: None,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("format").is_none());
    }

    fn drain(decoder: &mut ChatStreamDecoder) -> Vec<Fragment> {
        std::iter::from_fn(|| decoder.next()).collect()
    }

    #[test]
    fn test_decoder_joins_line_split_across_chunks() {
        let mut decoder = ChatStreamDecoder::default();
        decoder.push(br#"{"message":{"content":"Vis"#).unwrap();
        assert!(drain(&mut decoder).is_empty());

        decoder.push(b"it \"}}\n").unwrap();
        assert_eq!(drain(&mut decoder), vec![Fragment::delta("Visit ")]);
    }

    #[test]
    fn test_decoder_multibyte_char_split_mid_line() {
        let line = "{\"message\":{\"content\":\"Zürich\"}}\n".as_bytes();
        let cut = line.iter().position(|b| *b == 0xC3).unwrap() + 1;

        let mut decoder = ChatStreamDecoder::default();
        decoder.push(&line[..cut]).unwrap();
        decoder.push(&line[cut..]).unwrap();
        assert_eq!(drain(&mut decoder), vec![Fragment::delta("Zürich")]);
    }

    #[test]
    fn test_decoder_done_carries_accumulated_text() {
        let mut decoder = ChatStreamDecoder::default();
        decoder
            .push(
                b"{\"message\":{\"content\":\"Go to \"}}\n\
                  {\"message\":{\"content\":\"[[Rome]]\"}}\n\
                  {\"message\":{\"content\":\"\"},\"done\":true}\n",
            )
            .unwrap();

        assert!(decoder.is_done());
        assert_eq!(
            drain(&mut decoder),
            vec![
                Fragment::delta("Go to "),
                Fragment::delta("[[Rome]]"),
                Fragment::done("Go to [[Rome]]"),
            ]
        );

        // Lines after the done chunk are ignored
        decoder.push(b"{\"message\":{\"content\":\"late\"}}\n").unwrap();
        assert!(drain(&mut decoder).is_empty());
    }

    #[test]
    fn test_decoder_error_chunk() {
        let mut decoder = ChatStreamDecoder::default();
        let result = decoder.push(b"{\"error\":\"model not found\"}\n");
        assert!(matches!(result, Err(LlmError::Communication(m)) if m == "model not found"));
    }

    #[test]
    fn test_decoder_malformed_line() {
        let mut decoder = ChatStreamDecoder::default();
        let result = decoder.push(b"{\"message\": oops}\n");
        assert!(matches!(result, Err(LlmError::InvalidResponse(_))));
    }

    #[test]
    fn test_decoder_trailing_line_without_newline() {
        let mut decoder = ChatStreamDecoder::default();
        decoder.push(b"\n{\"message\":{\"content\":\"Hi\"},\"done\":true}").unwrap();
        assert!(drain(&mut decoder).is_empty());

        decoder.finish().unwrap();
        assert_eq!(
            drain(&mut decoder),
            vec![Fragment::delta("Hi"), Fragment::done("Hi")]
        );
    }

    // Integration tests (requires running Ollama)
    #[tokio::test]
    #[ignore] // Only run when Ollama is available
    async fn test_ollama_chat_stream_integration() {
        let provider = OllamaProvider::default_endpoint("llama3").unwrap();
        let messages = prompt::chat_messages(&[wayfarer_domain::TurnRecord::user(
            "Name one city in Italy.",
        )]);
        let mut source = provider.chat_stream(&messages).await.unwrap();

        let mut saw_done = false;
        while let Some(fragment) = source.next_fragment().await.unwrap() {
            if fragment.is_final() {
                saw_done = true;
                assert!(!fragment.text().is_empty());
            }
        }
        assert!(saw_done);
    }

    #[tokio::test]
    async fn test_ollama_error_handling() {
        // Invalid port triggers a communication error
        let provider = OllamaProvider::new("http://localhost:99999", "llama3")
            .unwrap()
            .with_max_retries(1);

        let result = provider.generate("test", false).await;
        assert!(matches!(result, Err(LlmError::Communication(_))));
    }
}
