//! Output multiplexer: applies parser decisions to the three channels

use crate::channel::{channel, ChannelReceiver, ChannelWriter, SpanStatus, TurnEvent};
use crate::enrichment::EnrichmentSink;
use crate::error::{ChannelError, ChannelName};
use tokio::sync::mpsc;
use tracing::warn;
use wayfarer_domain::{Enrichment, SealedSpan};

/// Consumer side of a turn's channels
#[derive(Debug)]
pub struct TurnChannels {
    /// Primary text
    pub text: ChannelReceiver<String>,
    /// Span placeholder and final span text
    pub span_status: ChannelReceiver<SpanStatus>,
    /// Enrichment payload
    pub enrichment: ChannelReceiver<Enrichment>,
    /// All events of the turn in write order
    pub timeline: mpsc::UnboundedReceiver<TurnEvent>,
}

/// Owns the producing ends of a turn's channels
///
/// Channel-discipline violations are logged, counted and suppressed; they
/// never stop the fragment loop.
#[derive(Debug)]
pub struct OutputMultiplexer {
    // Field order is drop order: side channels close before text.
    span_status: ChannelWriter<SpanStatus>,
    enrichment: Option<ChannelWriter<Enrichment>>,
    text: ChannelWriter<String>,
    emitted: String,
    violations: usize,
}

impl OutputMultiplexer {
    /// Create the channels for one turn
    pub fn new() -> (Self, TurnChannels) {
        let (timeline_tx, timeline) = mpsc::unbounded_channel();
        let (text, text_rx) = channel(ChannelName::Text, timeline_tx.clone(), TurnEvent::Text);
        let (span_status, span_rx) = channel(
            ChannelName::SpanStatus,
            timeline_tx.clone(),
            TurnEvent::SpanStatus,
        );
        let (enrichment, enrichment_rx) =
            channel(ChannelName::Enrichment, timeline_tx, TurnEvent::Enrichment);

        let mux = Self {
            span_status,
            enrichment: Some(enrichment),
            text,
            emitted: String::new(),
            violations: 0,
        };
        let channels = TurnChannels {
            text: text_rx,
            span_status: span_rx,
            enrichment: enrichment_rx,
            timeline,
        };
        (mux, channels)
    }

    /// Plain content for the text channel
    pub fn emit_text(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        match self.text.append(text.to_string()) {
            Ok(()) => self.emitted.push_str(text),
            Err(e) => self.violation(e),
        }
    }

    /// A span opened: show the pending placeholder
    pub fn open_span(&mut self) {
        if let Err(e) = self.span_status.append(SpanStatus::Pending) {
            self.violation(e);
        }
    }

    /// A span sealed: publish its final text, then hand out the enrichment channel
    ///
    /// Span-status is done before the enrichment writer leaves the
    /// multiplexer, so enrichment can never resolve first.
    pub fn seal_span(&mut self, span: &SealedSpan) -> Option<EnrichmentSink> {
        if let Err(e) = self
            .span_status
            .finish(Some(SpanStatus::Sealed(span.content.clone())))
        {
            self.violation(e);
        }
        match self.enrichment.take() {
            Some(writer) => Some(EnrichmentSink::new(writer, span.entity())),
            None => {
                self.violation(ChannelError::AlreadyFinalized(ChannelName::Enrichment));
                None
            }
        }
    }

    /// An open span was dropped: close both span channels empty
    pub fn discard_span(&mut self) {
        if let Err(e) = self.span_status.finish(None) {
            self.violation(e);
        }
        if let Some(mut writer) = self.enrichment.take() {
            if let Err(e) = writer.finish(None) {
                self.violation(e);
            }
        }
    }

    /// Close span-status and enrichment if nothing claimed them
    pub fn close_unused(&mut self) {
        if !self.span_status.is_done() {
            if let Err(e) = self.span_status.finish(None) {
                self.violation(e);
            }
        }
        if let Some(mut writer) = self.enrichment.take() {
            if let Err(e) = writer.finish(None) {
                self.violation(e);
            }
        }
    }

    /// Mark the text channel done with the full delimiter-stripped text
    pub fn finish_text(&mut self) -> String {
        if let Err(e) = self.text.finish(Some(self.emitted.clone())) {
            self.violation(e);
        }
        self.emitted.clone()
    }

    /// Text delivered so far
    pub fn emitted(&self) -> &str {
        &self.emitted
    }

    /// Suppressed channel-discipline violations
    pub fn violations(&self) -> usize {
        self.violations
    }

    fn violation(&mut self, error: ChannelError) {
        self.violations += 1;
        warn!("Channel discipline violation suppressed: {}", error);
    }
}
