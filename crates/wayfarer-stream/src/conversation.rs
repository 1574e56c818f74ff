//! Multi-turn conversation state owned by one caller

use crate::error::TurnError;
use crate::multiplexer::TurnChannels;
use crate::turn::{TurnContext, TurnOutcome, TurnRunner};
use std::fmt::Display;
use std::sync::MutexGuard;
use tracing::info;
use wayfarer_domain::traits::{ChatStore, Describer, FragmentSource, ReferenceResolver};
use wayfarer_domain::{Chat, ChatId, Landmark, Role, TurnRecord};

/// A message as a rendering layer shows it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisplayMessage {
    /// `"{chat_id}-{index}"`, indexed over visible messages
    pub id: String,
    /// Author
    pub role: Role,
    /// Message text
    pub text: String,
    /// Sealed span of an assistant turn
    pub location: Option<String>,
    /// Enrichment of the span
    pub landmark: Option<Landmark>,
}

/// A chat plus the runner that produces its assistant turns
///
/// Turns run one at a time: complete the context returned by
/// [`Conversation::begin_turn`] before beginning the next turn, otherwise the
/// history sent to the model misses the earlier reply.
pub struct Conversation<D, R, S> {
    runner: TurnRunner<D, R, S>,
    chat: Chat,
}

impl<D, R, S> Conversation<D, R, S>
where
    D: Describer + 'static,
    R: ReferenceResolver + 'static,
    S: ChatStore,
    S::Error: Display,
{
    /// Start a new, empty chat
    pub fn new(runner: TurnRunner<D, R, S>) -> Self {
        Self::resume(runner, Chat::new(ChatId::new()))
    }

    /// Continue an existing chat
    pub fn resume(runner: TurnRunner<D, R, S>, chat: Chat) -> Self {
        Self { runner, chat }
    }

    /// Load a chat from the runner's store
    pub fn load(runner: TurnRunner<D, R, S>, chat_id: &ChatId) -> Result<Option<Self>, TurnError> {
        let chat = lock(&runner)?
            .load_chat(chat_id)
            .map_err(|e| TurnError::Persistence(e.to_string()))?;
        Ok(chat.map(|chat| Self::resume(runner, chat)))
    }

    /// The chat snapshot
    pub fn chat(&self) -> &Chat {
        &self.chat
    }

    /// Messages in chronological order
    pub fn history(&self) -> &[TurnRecord] {
        &self.chat.messages
    }

    /// Record a user message and open the assistant turn that answers it
    ///
    /// Build the fragment source from [`Conversation::history`] after this
    /// call so the new message is included.
    pub fn begin_turn(
        &mut self,
        content: impl Into<String>,
    ) -> Result<(TurnContext<D, R, S>, TurnChannels), TurnError> {
        let message = TurnRecord::user(content);
        let title = self.chat.title.clone();
        self.chat.push(message.clone());

        if let Err(e) = self.save_user_message(&message) {
            self.chat.messages.pop();
            self.chat.title = title;
            return Err(e);
        }
        Ok(self.runner.start(self.chat.id.clone()))
    }

    fn save_user_message(&self, message: &TurnRecord) -> Result<(), TurnError> {
        let mut store = lock(&self.runner)?;
        store
            .save_turn(&self.chat.id, message)
            .map_err(|e| TurnError::Persistence(e.to_string()))?;
        store
            .save_chat(&self.chat)
            .map_err(|e| TurnError::Persistence(e.to_string()))
    }

    /// Run the assistant turn and append its record
    pub async fn complete_turn<F>(
        &mut self,
        ctx: TurnContext<D, R, S>,
        source: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FragmentSource,
    {
        let outcome = ctx.run(source).await?;
        self.chat.push(outcome.record.clone());
        lock(&self.runner)?
            .save_chat(&self.chat)
            .map_err(|e| TurnError::Persistence(e.to_string()))?;
        info!(
            "Chat {} now has {} messages",
            self.chat.id,
            self.chat.messages.len()
        );
        Ok(outcome)
    }

    /// One full exchange for callers that do not observe the channels
    pub async fn submit_user_message<F>(
        &mut self,
        content: impl Into<String>,
        source: F,
    ) -> Result<TurnOutcome, TurnError>
    where
        F: FragmentSource,
    {
        let (ctx, _channels) = self.begin_turn(content)?;
        self.complete_turn(ctx, source).await
    }

    /// Rendering list rebuilt from the stored messages, system messages hidden
    pub fn display_messages(&self) -> Vec<DisplayMessage> {
        self.chat
            .visible_messages()
            .map(|(index, message)| DisplayMessage {
                id: format!("{}-{}", self.chat.id, index),
                role: message.role,
                text: message.text.clone(),
                location: message.location.clone(),
                landmark: message.landmark.clone(),
            })
            .collect()
    }
}

fn lock<D, R, S>(runner: &TurnRunner<D, R, S>) -> Result<MutexGuard<'_, S>, TurnError> {
    runner
        .store()
        .lock()
        .map_err(|_| TurnError::Persistence("store lock poisoned".to_string()))
}
