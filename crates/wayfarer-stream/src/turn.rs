//! Per-turn driver: source → parser → multiplexer, enrichment, finalizer

use crate::config::StreamConfig;
use crate::enrichment::EnrichmentTask;
use crate::error::TurnError;
use crate::finalizer::{TurnDraft, TurnFinalizer};
use crate::metrics::TurnMetrics;
use crate::multiplexer::{OutputMultiplexer, TurnChannels};
use crate::parser::{strip_markup, DeltaParser, ParseEvent};
use std::fmt::Display;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};
use wayfarer_domain::traits::{Describer, FragmentSource, ReferenceResolver, TurnStore};
use wayfarer_domain::{ChatId, Enrichment, Fragment, MessageId, SealedSpan, TurnRecord};

/// Result of a completed turn
#[derive(Debug, Clone)]
pub struct TurnOutcome {
    /// The persisted record
    pub record: TurnRecord,
    /// Enrichment of the sealed span, if there was one
    pub enrichment: Option<Enrichment>,
    /// Counters collected while streaming
    pub metrics: TurnMetrics,
}

/// Creates turn contexts that share collaborators and configuration
pub struct TurnRunner<D, R, S> {
    config: StreamConfig,
    task: EnrichmentTask<D, R>,
    store: Arc<Mutex<S>>,
}

impl<D, R, S> TurnRunner<D, R, S>
where
    D: Describer + 'static,
    R: ReferenceResolver + 'static,
    S: TurnStore,
    S::Error: Display,
{
    /// Create a runner that owns its collaborators
    pub fn new(describer: D, resolver: R, store: S, config: StreamConfig) -> Result<Self, TurnError> {
        Self::from_shared(
            Arc::new(describer),
            Arc::new(resolver),
            Arc::new(Mutex::new(store)),
            config,
        )
    }

    /// Create a runner from collaborators shared with other components
    pub fn from_shared(
        describer: Arc<D>,
        resolver: Arc<R>,
        store: Arc<Mutex<S>>,
        config: StreamConfig,
    ) -> Result<Self, TurnError> {
        config.validate().map_err(TurnError::Config)?;
        let task = EnrichmentTask::new(describer, resolver, config.enrichment_timeout());
        Ok(Self {
            config,
            task,
            store,
        })
    }

    /// Open the channels for a new assistant turn in `chat_id`
    ///
    /// Dropping the returned context without running it closes every channel
    /// empty.
    pub fn start(&self, chat_id: ChatId) -> (TurnContext<D, R, S>, TurnChannels) {
        let (mux, channels) = OutputMultiplexer::new();
        let id = MessageId::new();
        debug!("Starting turn {} in chat {}", id, chat_id);

        let ctx = TurnContext {
            id,
            parser: DeltaParser::new(&self.config),
            mux,
            task: self.task.clone(),
            finalizer: TurnFinalizer::new(
                chat_id,
                Arc::clone(&self.store),
                self.config.finalize_timeout(),
            ),
            config: self.config.clone(),
            sealed: None,
            enrichment: None,
            metrics: TurnMetrics::new(),
        };
        (ctx, channels)
    }
}

impl<D, R, S> TurnRunner<D, R, S> {
    /// Stream configuration
    pub fn config(&self) -> &StreamConfig {
        &self.config
    }

    /// Shared persistence collaborator
    pub fn store(&self) -> &Arc<Mutex<S>> {
        &self.store
    }
}

/// Everything one turn owns while it streams
pub struct TurnContext<D, R, S> {
    id: MessageId,
    parser: DeltaParser,
    mux: OutputMultiplexer,
    task: EnrichmentTask<D, R>,
    finalizer: TurnFinalizer<S>,
    config: StreamConfig,
    sealed: Option<SealedSpan>,
    enrichment: Option<JoinHandle<Enrichment>>,
    metrics: TurnMetrics,
}

impl<D, R, S> TurnContext<D, R, S>
where
    D: Describer + 'static,
    R: ReferenceResolver + 'static,
    S: TurnStore,
    S::Error: Display,
{
    /// Identity the assistant record will carry
    pub fn id(&self) -> MessageId {
        self.id
    }

    /// Consume `source` to completion and persist the turn
    ///
    /// A source failure before the first fragment is returned as
    /// [`TurnError::Source`] with every channel closed empty and nothing
    /// persisted. A failure or disconnect after that aborts the turn: an open
    /// span is dropped and a partial record is persisted.
    pub async fn run<F>(mut self, mut source: F) -> Result<TurnOutcome, TurnError>
    where
        F: FragmentSource,
    {
        let started = Instant::now();
        let mut received = false;
        let mut aborted = false;
        let mut completion = None;

        loop {
            match source.next_fragment().await {
                Ok(Some(Fragment::Delta(text))) => {
                    received = true;
                    self.metrics.record_fragment();
                    let events = self.parser.feed(&text);
                    self.apply(events);
                }
                Ok(Some(Fragment::Done { content })) => {
                    completion = Some(content);
                    break;
                }
                Ok(None) if received => {
                    warn!("Fragment source disconnected during turn {}", self.id);
                    aborted = true;
                    break;
                }
                Ok(None) => {
                    return Err(self.fail("source ended before producing a fragment".to_string()))
                }
                Err(e) if received => {
                    warn!("Fragment source failed during turn {}: {}", self.id, e);
                    aborted = true;
                    break;
                }
                Err(e) => return Err(self.fail(e.to_string())),
            }
        }

        if let Some(content) = completion.as_deref() {
            if !received && !content.is_empty() {
                debug!("Turn {} completed without deltas; parsing completion text", self.id);
                let events = self.parser.feed(content);
                self.apply(events);
            }
        }
        let tail = self.parser.finish();
        self.apply(tail);

        if let Some(content) = completion.as_deref() {
            if strip_markup(content, &self.config) != self.mux.emitted() {
                warn!(
                    "Completion text of turn {} differs from the streamed text; keeping the streamed text",
                    self.id
                );
            }
        }

        let enrichment = match (self.enrichment.take(), self.sealed.as_ref()) {
            (Some(handle), Some(span)) => {
                let enrichment = self.finalizer.await_enrichment(handle, span.entity()).await;
                self.metrics.record_enrichment(enrichment.is_degraded());
                Some(enrichment)
            }
            _ => None,
        };
        self.mux.close_unused();

        let text = self.mux.finish_text();
        self.metrics.channel_violations = self.mux.violations();

        let draft = TurnDraft {
            id: self.id,
            text,
            span: self.sealed.take(),
            aborted,
        };
        let record = self.finalizer.finalize(draft, enrichment.as_ref())?;

        self.metrics.elapsed = started.elapsed();
        info!("Turn {} complete: {}", record.id, self.metrics.summary());

        Ok(TurnOutcome {
            record,
            enrichment,
            metrics: self.metrics,
        })
    }

    /// Apply parser decisions in order
    fn apply(&mut self, events: Vec<ParseEvent>) {
        for event in events {
            match event {
                ParseEvent::Text(text) => {
                    self.metrics.record_text(text.len());
                    self.mux.emit_text(&text);
                }
                ParseEvent::SpanOpened { id } => {
                    debug!("Turn {}: span {} pending", self.id, id);
                    self.metrics.spans_opened += 1;
                    self.mux.open_span();
                }
                ParseEvent::SpanSealed(span) => {
                    info!("Turn {}: span {} sealed as '{}'", self.id, span.id, span.entity());
                    self.metrics.spans_sealed += 1;
                    if let Some(sink) = self.mux.seal_span(&span) {
                        self.enrichment = Some(self.task.spawn(span.clone(), sink));
                    }
                    self.sealed = Some(span);
                }
                ParseEvent::SpanDiscarded { id } => {
                    debug!("Turn {}: span {} discarded", self.id, id);
                    self.metrics.spans_discarded += 1;
                    self.mux.discard_span();
                }
            }
        }
    }

    /// Fatal source error: close everything empty, persist nothing
    fn fail(mut self, reason: String) -> TurnError {
        error!("Turn {} failed before any fragment: {}", self.id, reason);
        self.mux.close_unused();
        TurnError::Source(reason)
    }
}
