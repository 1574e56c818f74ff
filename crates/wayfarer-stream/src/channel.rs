//! Write-once-terminable output channels
//!
//! Every channel moves `open → append* → done` exactly once. Writes after
//! `done` are rejected with [`ChannelError::AlreadyFinalized`]; a writer that
//! is dropped without finishing closes its channel with an empty payload so
//! no consumer waits on a signal that will never arrive.
//!
//! Besides its own receiver, each writer mirrors its events into a shared
//! [`TurnEvent`] timeline that preserves the global order of the turn.

use crate::error::{ChannelError, ChannelName};
use tokio::sync::mpsc;
use tracing::debug;
use wayfarer_domain::Enrichment;

/// One event on a channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent<T> {
    /// Incremental value
    Append(T),
    /// Terminal value; `None` means "nothing to show"
    Done(Option<T>),
}

impl<T> ChannelEvent<T> {
    /// Whether this event terminates the channel
    pub fn is_done(&self) -> bool {
        matches!(self, ChannelEvent::Done(_))
    }
}

/// Payload of the span-status channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpanStatus {
    /// A span is open; its text is still arriving
    Pending,
    /// Final text of the sealed span
    Sealed(String),
}

/// Channel events of a turn in the order they were written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnEvent {
    /// Text channel event
    Text(ChannelEvent<String>),
    /// Span-status channel event
    SpanStatus(ChannelEvent<SpanStatus>),
    /// Enrichment channel event
    Enrichment(ChannelEvent<Enrichment>),
}

impl TurnEvent {
    /// Channel the event belongs to
    pub fn channel(&self) -> ChannelName {
        match self {
            TurnEvent::Text(_) => ChannelName::Text,
            TurnEvent::SpanStatus(_) => ChannelName::SpanStatus,
            TurnEvent::Enrichment(_) => ChannelName::Enrichment,
        }
    }

    /// Whether the event terminates its channel
    pub fn is_done(&self) -> bool {
        match self {
            TurnEvent::Text(e) => e.is_done(),
            TurnEvent::SpanStatus(e) => e.is_done(),
            TurnEvent::Enrichment(e) => e.is_done(),
        }
    }
}

/// Producing end of a channel
#[derive(Debug)]
pub struct ChannelWriter<T: Clone> {
    name: ChannelName,
    tx: mpsc::UnboundedSender<ChannelEvent<T>>,
    timeline: mpsc::UnboundedSender<TurnEvent>,
    wrap: fn(ChannelEvent<T>) -> TurnEvent,
    done: bool,
}

impl<T: Clone> ChannelWriter<T> {
    /// Channel name
    pub fn name(&self) -> ChannelName {
        self.name
    }

    /// Whether the channel has been marked done
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Append a value
    pub fn append(&mut self, value: T) -> Result<(), ChannelError> {
        if self.done {
            return Err(ChannelError::AlreadyFinalized(self.name));
        }
        self.send(ChannelEvent::Append(value));
        Ok(())
    }

    /// Mark the channel done with an optional final value
    pub fn finish(&mut self, value: Option<T>) -> Result<(), ChannelError> {
        if self.done {
            return Err(ChannelError::AlreadyFinalized(self.name));
        }
        self.done = true;
        debug!("Channel '{}' done (payload: {})", self.name, value.is_some());
        self.send(ChannelEvent::Done(value));
        Ok(())
    }

    fn send(&self, event: ChannelEvent<T>) {
        // Consumers may stop listening at any time; that never affects the turn.
        let _ = self.timeline.send((self.wrap)(event.clone()));
        let _ = self.tx.send(event);
    }
}

impl<T: Clone> Drop for ChannelWriter<T> {
    fn drop(&mut self) {
        if !self.done {
            debug!("Channel '{}' dropped while open; closing empty", self.name);
            self.done = true;
            self.send(ChannelEvent::Done(None));
        }
    }
}

/// Consuming end of a channel
#[derive(Debug)]
pub struct ChannelReceiver<T> {
    name: ChannelName,
    rx: mpsc::UnboundedReceiver<ChannelEvent<T>>,
}

impl<T> ChannelReceiver<T> {
    /// Channel name
    pub fn name(&self) -> ChannelName {
        self.name
    }

    /// Next event, or `None` once the writer is gone and everything was read
    pub async fn recv(&mut self) -> Option<ChannelEvent<T>> {
        self.rx.recv().await
    }

    /// Read until the channel is done
    pub async fn collect(mut self) -> ChannelLog<T> {
        let mut log = ChannelLog {
            appended: Vec::new(),
            done: None,
            finished: false,
        };
        while let Some(event) = self.rx.recv().await {
            match event {
                ChannelEvent::Append(value) => log.appended.push(value),
                ChannelEvent::Done(value) => {
                    log.done = value;
                    log.finished = true;
                    break;
                }
            }
        }
        log
    }
}

/// Everything a consumer observed on one channel
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelLog<T> {
    /// Appended values in order
    pub appended: Vec<T>,
    /// Terminal payload
    pub done: Option<T>,
    /// Whether a terminal event was seen
    pub finished: bool,
}

/// Create a channel that also mirrors into `timeline`
pub(crate) fn channel<T: Clone>(
    name: ChannelName,
    timeline: mpsc::UnboundedSender<TurnEvent>,
    wrap: fn(ChannelEvent<T>) -> TurnEvent,
) -> (ChannelWriter<T>, ChannelReceiver<T>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (
        ChannelWriter {
            name,
            tx,
            timeline,
            wrap,
            done: false,
        },
        ChannelReceiver { name, rx },
    )
}
