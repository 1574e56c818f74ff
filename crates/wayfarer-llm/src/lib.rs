//! Wayfarer LLM Provider Layer
//!
//! Implementations of the collaborator traits from `wayfarer-domain` that talk
//! to a language model.
//!
//! # Providers
//!
//! - [`ScriptedSource`]: deterministic fragment source for tests
//! - [`MockEnricher`]: deterministic describe / resolve collaborator for tests
//! - [`OllamaProvider`]: local Ollama API integration (streaming chat and
//!   landmark lookups)
//!
//! # Examples
//!
//! ```
//! use wayfarer_llm::{MockEnricher, ScriptedSource};
//!
//! let source = ScriptedSource::new(["Visit ", "[[Rome]]", "."]);
//! let enricher = MockEnricher::new().with_reference("Rome", "https://example.com/rome.jpg");
//! assert_eq!(enricher.resolve_calls(), 0);
//! ```

#![warn(missing_docs)]

pub mod ollama;
pub mod prompt;

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use wayfarer_domain::traits::{Describer, FragmentSource, ReferenceResolver};
use wayfarer_domain::{EntityDescription, Fragment};

pub use ollama::{OllamaChatSource, OllamaProvider};

/// Errors that can occur during LLM operations
#[derive(Error, Debug)]
pub enum LlmError {
    /// Network or API communication error
    #[error("Communication error: {0}")]
    Communication(String),

    /// Invalid response from LLM
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// The model answered, but with nothing usable
    #[error("Empty result: {0}")]
    EmptyResult(String),

    /// Model not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Generic error
    #[error("LLM error: {0}")]
    Other(String),
}

/// One step of a scripted turn
#[derive(Debug, Clone)]
enum Step {
    Delta(String),
    Fail(String),
    Disconnect,
}

/// Fragment source that replays a fixed list of chunks
///
/// After the last chunk it yields [`Fragment::Done`] carrying the concatenation
/// of everything it produced. Failures and disconnects can be injected at any
/// position.
///
/// # Examples
///
/// ```
/// use wayfarer_llm::ScriptedSource;
///
/// // Three chunks, then the completion signal
/// let source = ScriptedSource::new(["The ", "[[Paris]]", "."]);
///
/// // Error after the first chunk
/// let source = ScriptedSource::new(["The ", "[[Paris]]"]).failing_after(1, "upstream reset");
/// ```
#[derive(Debug, Clone)]
pub struct ScriptedSource {
    steps: VecDeque<Step>,
    accumulated: String,
    finished: bool,
}

impl ScriptedSource {
    /// Create a source from the chunks it should yield
    pub fn new<I, S>(chunks: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            steps: chunks.into_iter().map(|c| Step::Delta(c.into())).collect(),
            accumulated: String::new(),
            finished: false,
        }
    }

    /// Fail with `message` after `count` chunks have been yielded
    pub fn failing_after(mut self, count: usize, message: impl Into<String>) -> Self {
        self.truncate_to(count);
        self.steps.push_back(Step::Fail(message.into()));
        self
    }

    /// End without a completion signal after `count` chunks
    pub fn disconnect_after(mut self, count: usize) -> Self {
        self.truncate_to(count);
        self.steps.push_back(Step::Disconnect);
        self
    }

    fn truncate_to(&mut self, count: usize) {
        self.steps.truncate(count);
    }
}

impl FragmentSource for ScriptedSource {
    type Error = LlmError;

    async fn next_fragment(&mut self) -> Result<Option<Fragment>, LlmError> {
        if self.finished {
            return Ok(None);
        }

        match self.steps.pop_front() {
            Some(Step::Delta(text)) => {
                self.accumulated.push_str(&text);
                Ok(Some(Fragment::Delta(text)))
            }
            Some(Step::Fail(message)) => {
                self.finished = true;
                Err(LlmError::Communication(message))
            }
            Some(Step::Disconnect) => {
                self.finished = true;
                Ok(None)
            }
            None => {
                self.finished = true;
                Ok(Some(Fragment::done(std::mem::take(&mut self.accumulated))))
            }
        }
    }
}

/// Mock enrichment collaborator for deterministic testing
///
/// Unknown entities get a generated description and locator. Specific
/// responses, failures and an artificial delay can be configured.
///
/// # Examples
///
/// ```
/// use wayfarer_llm::MockEnricher;
///
/// let enricher = MockEnricher::new()
///     .with_description("Paris", "Eiffel Tower", "Wrought-iron tower on the Champ de Mars")
///     .with_reference("Eiffel Tower", "https://example.com/eiffel.jpg")
///     .failing_describe("Atlantis");
/// assert_eq!(enricher.describe_calls(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct MockEnricher {
    descriptions: HashMap<String, EntityDescription>,
    references: HashMap<String, String>,
    failing_describe: HashSet<String>,
    failing_resolve: HashSet<String>,
    delay: Option<Duration>,
    describe_calls: Arc<AtomicUsize>,
    resolve_calls: Arc<AtomicUsize>,
}

impl MockEnricher {
    /// Create a mock with generated responses for every entity
    pub fn new() -> Self {
        Self::default()
    }

    /// Fixed description for an entity
    pub fn with_description(
        mut self,
        entity: impl Into<String>,
        name: impl Into<String>,
        fact: impl Into<String>,
    ) -> Self {
        self.descriptions.insert(
            entity.into(),
            EntityDescription {
                name: name.into(),
                fact: fact.into(),
            },
        );
        self
    }

    /// Fixed locator for a name
    pub fn with_reference(mut self, name: impl Into<String>, locator: impl Into<String>) -> Self {
        self.references.insert(name.into(), locator.into());
        self
    }

    /// Make `describe` fail for an entity
    pub fn failing_describe(mut self, entity: impl Into<String>) -> Self {
        self.failing_describe.insert(entity.into());
        self
    }

    /// Make `resolve_reference` fail for a name
    pub fn failing_resolve(mut self, name: impl Into<String>) -> Self {
        self.failing_resolve.insert(name.into());
        self
    }

    /// Sleep before answering each call
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of times `describe` was called (shared between clones)
    pub fn describe_calls(&self) -> usize {
        self.describe_calls.load(Ordering::SeqCst)
    }

    /// Number of times `resolve_reference` was called (shared between clones)
    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }
}

impl Describer for MockEnricher {
    type Error = LlmError;

    async fn describe(&self, entity: &str) -> Result<EntityDescription, LlmError> {
        self.describe_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_describe.contains(entity) {
            return Err(LlmError::Other("Mock error".to_string()));
        }

        Ok(self
            .descriptions
            .get(entity)
            .cloned()
            .unwrap_or_else(|| EntityDescription {
                name: entity.to_string(),
                fact: format!("A notable landmark of {}", entity),
            }))
    }
}

impl ReferenceResolver for MockEnricher {
    type Error = LlmError;

    async fn resolve_reference(&self, name: &str) -> Result<String, LlmError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.failing_resolve.contains(name) {
            return Err(LlmError::Other("Mock error".to_string()));
        }

        Ok(self.references.get(name).cloned().unwrap_or_else(|| {
            let slug: String = name
                .chars()
                .map(|c| if c.is_alphanumeric() { c.to_ascii_lowercase() } else { '-' })
                .collect();
            format!("https://example.com/{}.jpg", slug)
        }))
    }
}
