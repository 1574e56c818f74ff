//! Wiring between the configuration, the model provider and the chat store.

use crate::config::Config;
use crate::error::{CliError, Result};
use crate::output::{Formatter, TurnRenderer};
use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::debug;
use wayfarer_domain::traits::{ChatStore, Describer, FragmentSource, ReferenceResolver};
use wayfarer_domain::{Chat, ChatId};
use wayfarer_llm::prompt::chat_messages;
use wayfarer_llm::OllamaProvider;
use wayfarer_store::SqliteStore;
use wayfarer_stream::{Conversation, TurnChannels, TurnContext, TurnError, TurnOutcome, TurnRunner};

/// Conversation type used by the command-line front end.
pub type WayfarerConversation = Conversation<OllamaProvider, OllamaProvider, SqliteStore>;

/// Everything one CLI invocation needs to run turns
pub struct Session {
    config: Config,
    chat_model: OllamaProvider,
    enricher: Arc<OllamaProvider>,
    store: Arc<Mutex<SqliteStore>>,
}

impl Session {
    /// Connect the providers and open the chat database.
    pub fn open(config: Config) -> Result<Self> {
        let chat_model = OllamaProvider::new(&config.ollama.endpoint, &config.ollama.chat_model)?;
        let enricher = OllamaProvider::new(&config.ollama.endpoint, &config.ollama.enrichment_model)?
            .with_max_retries(config.ollama.max_retries)
            .with_request_timeout(config.request_timeout());

        let database = config.database_path()?;
        if let Some(parent) = database.parent() {
            fs::create_dir_all(parent)?;
        }
        debug!(
            "Opening chat database at {} (chat model: {})",
            database.display(),
            chat_model.model()
        );
        let store = SqliteStore::new(&database)?;

        Ok(Self {
            config,
            chat_model,
            enricher: Arc::new(enricher),
            store: Arc::new(Mutex::new(store)),
        })
    }

    /// Effective configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// A new conversation, or a saved one when `resume` names it.
    pub fn conversation(&self, resume: Option<&str>) -> Result<WayfarerConversation> {
        let runner = TurnRunner::from_shared(
            Arc::clone(&self.enricher),
            Arc::clone(&self.enricher),
            Arc::clone(&self.store),
            self.config.stream.clone(),
        )?;

        match resume {
            None => Ok(Conversation::new(runner)),
            Some(id) => Conversation::load(runner, &ChatId::from_string(id))?
                .ok_or_else(|| CliError::ChatNotFound(id.to_string())),
        }
    }

    /// Send `message` and stream the reply to `out`.
    pub async fn exchange<W: Write>(
        &self,
        conversation: &mut WayfarerConversation,
        message: &str,
        formatter: &Formatter,
        out: &mut W,
    ) -> Result<TurnOutcome> {
        let (turn, channels) = conversation.begin_turn(message)?;
        let source = self
            .chat_model
            .chat_stream(&chat_messages(conversation.history()))
            .await?;
        play_turn(conversation, turn, channels, source, formatter, out).await
    }

    /// Saved chats, newest first.
    pub fn list_chats(&self, limit: usize) -> Result<Vec<Chat>> {
        let mut chats = self.lock()?.list_chats()?;
        chats.truncate(limit);
        Ok(chats)
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteStore>> {
        self.store
            .lock()
            .map_err(|_| TurnError::Persistence("store lock poisoned".to_string()).into())
    }
}

/// Complete `turn` from `source` while rendering its timeline to `out`
pub async fn play_turn<D, R, S, F, W>(
    conversation: &mut Conversation<D, R, S>,
    turn: TurnContext<D, R, S>,
    mut channels: TurnChannels,
    source: F,
    formatter: &Formatter,
    out: &mut W,
) -> Result<TurnOutcome>
where
    D: Describer + 'static,
    R: ReferenceResolver + 'static,
    S: ChatStore,
    S::Error: Display,
    F: FragmentSource,
    W: Write,
{
    let mut renderer = TurnRenderer::new(formatter.clone());
    let render = async {
        while let Some(event) = channels.timeline.recv().await {
            if let Some(chunk) = renderer.render(&event) {
                write!(out, "{}", chunk)?;
                out.flush()?;
            }
        }
        Ok::<(), std::io::Error>(())
    };

    let (outcome, rendered) = tokio::join!(conversation.complete_turn(turn, source), render);
    rendered?;
    let outcome = outcome?;

    if outcome.record.aborted {
        writeln!(out, "{}", formatter.warning("Reply was cut off"))?;
    }
    debug!("Rendered turn {}", outcome.record.id);
    Ok(outcome)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutputFormat;
    use wayfarer_llm::{MockEnricher, ScriptedSource};
    use wayfarer_store::MemoryStore;
    use wayfarer_stream::StreamConfig;

    fn conversation() -> Conversation<MockEnricher, MockEnricher, MemoryStore> {
        let enricher = MockEnricher::new()
            .with_description("Paris", "Eiffel Tower", "Iron tower")
            .with_reference("Eiffel Tower", "https://example.com/e.jpg");
        let runner = TurnRunner::new(
            enricher.clone(),
            enricher,
            MemoryStore::new(),
            StreamConfig::default(),
        )
        .unwrap();
        Conversation::new(runner)
    }

    fn plain() -> Formatter {
        Formatter::new(OutputFormat::Text, false)
    }

    #[tokio::test]
    async fn test_play_turn_renders_reply_then_card() {
        let mut conversation = conversation();
        let (turn, channels) = conversation.begin_turn("Where is the tower?").unwrap();
        let source = ScriptedSource::new(["It is in [[Par", "is]]", " today."]);

        let mut out = Vec::new();
        let outcome = play_turn(&mut conversation, turn, channels, source, &plain(), &mut out)
            .await
            .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert_eq!(
            printed,
            "It is in [Paris] today.\n📍 Paris: https://example.com/e.jpg : Iron tower\n"
        );
        assert_eq!(outcome.record.text, "It is in  today.");
        assert_eq!(conversation.history().len(), 2);
    }

    #[tokio::test]
    async fn test_play_turn_reports_cut_off_reply() {
        let mut conversation = conversation();
        let (turn, channels) = conversation.begin_turn("Tell me more").unwrap();
        let source = ScriptedSource::new(["Try ", "[[Lis"]).disconnect_after(2);

        let mut out = Vec::new();
        let outcome = play_turn(&mut conversation, turn, channels, source, &plain(), &mut out)
            .await
            .unwrap();

        let printed = String::from_utf8(out).unwrap();
        assert!(outcome.record.aborted);
        assert!(printed.starts_with("Try \n"));
        assert!(printed.ends_with("⚠ Reply was cut off\n"));
    }

    #[tokio::test]
    async fn test_play_turn_source_failure() {
        let mut conversation = conversation();
        let (turn, channels) = conversation.begin_turn("Anyone there?").unwrap();
        let source = ScriptedSource::new(["unused"]).failing_after(0, "connection refused");

        let mut out = Vec::new();
        let result = play_turn(&mut conversation, turn, channels, source, &plain(), &mut out).await;

        assert!(matches!(result, Err(CliError::Turn(TurnError::Source(_)))));
        assert!(out.is_empty());
        assert_eq!(conversation.history().len(), 1);
    }

    #[test]
    fn test_session_against_temp_database() {
        let dir = tempfile::TempDir::new().unwrap();
        let mut config = Config::default();
        config.storage.database = Some(dir.path().join("nested").join("chats.db"));

        let session = Session::open(config).unwrap();
        assert!(session.list_chats(10).unwrap().is_empty());
        assert!(matches!(
            session.conversation(Some("missing")),
            Err(CliError::ChatNotFound(_))
        ));
        assert!(session.conversation(None).is_ok());
    }
}
