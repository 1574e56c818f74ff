//! Turn finalizer: builds the durable record and writes it exactly once

use crate::error::TurnError;
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};
use wayfarer_domain::traits::TurnStore;
use wayfarer_domain::{ChatId, Enrichment, MessageId, Role, SealedSpan, TurnRecord};

/// What the fragment loop hands to the finalizer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnDraft {
    /// Identity of the assistant message
    pub id: MessageId,
    /// Delimiter-stripped text
    pub text: String,
    /// The sealed span, if any
    pub span: Option<SealedSpan>,
    /// The source ended early
    pub aborted: bool,
}

/// Writes one [`TurnRecord`] per turn to the persistence collaborator
pub struct TurnFinalizer<S> {
    chat_id: ChatId,
    store: Arc<Mutex<S>>,
    finalize_timeout: Duration,
    finalized: bool,
}

impl<S> TurnFinalizer<S>
where
    S: TurnStore,
    S::Error: Display,
{
    /// Create a finalizer for one turn of `chat_id`
    pub fn new(chat_id: ChatId, store: Arc<Mutex<S>>, finalize_timeout: Duration) -> Self {
        Self {
            chat_id,
            store,
            finalize_timeout,
            finalized: false,
        }
    }

    /// Whether the record has been written (or a write was attempted)
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Wait for a live enrichment task, bounded by the finalize timeout
    ///
    /// A task that does not settle in time is cancelled; cancelling it closes
    /// the enrichment channel with a degraded payload.
    pub async fn await_enrichment(
        &self,
        mut handle: JoinHandle<Enrichment>,
        entity: &str,
    ) -> Enrichment {
        let degraded = |reason: String| {
            warn!("Enrichment for '{}' not available: {}", entity, reason);
            Enrichment::Degraded {
                entity: entity.to_string(),
                reason,
            }
        };

        match timeout(self.finalize_timeout, &mut handle).await {
            Ok(Ok(enrichment)) => enrichment,
            Ok(Err(e)) => degraded(format!("enrichment task failed: {}", e)),
            Err(_) => {
                handle.abort();
                match handle.await {
                    Ok(enrichment) => enrichment,
                    Err(_) => degraded(format!(
                        "enrichment did not settle within {:?}",
                        self.finalize_timeout
                    )),
                }
            }
        }
    }

    /// Build and persist the record
    ///
    /// A second call returns [`TurnError::AlreadyFinalized`] and writes nothing.
    pub fn finalize(
        &mut self,
        draft: TurnDraft,
        enrichment: Option<&Enrichment>,
    ) -> Result<TurnRecord, TurnError> {
        if self.finalized {
            warn!("Turn {} finalized twice; ignoring", draft.id);
            return Err(TurnError::AlreadyFinalized);
        }
        self.finalized = true;

        let mut record = TurnRecord::new(draft.id, Role::Assistant, draft.text);
        record.location = draft
            .span
            .as_ref()
            .map(|span| span.entity().to_string())
            .filter(|entity| !entity.is_empty());
        record.landmark = enrichment.and_then(Enrichment::landmark);
        record.aborted = draft.aborted;

        let mut store = self
            .store
            .lock()
            .map_err(|_| TurnError::Persistence("store lock poisoned".to_string()))?;
        store
            .save_turn(&self.chat_id, &record)
            .map_err(|e| TurnError::Persistence(e.to_string()))?;

        info!(
            "Persisted turn {} in chat {} (location: {:?}, aborted: {})",
            record.id, self.chat_id, record.location, record.aborted
        );
        Ok(record)
    }
}
