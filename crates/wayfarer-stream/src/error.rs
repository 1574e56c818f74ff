//! Error types for the streaming engine

use std::fmt;
use thiserror::Error;

/// The three output channels of a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelName {
    /// Primary text stream
    Text,
    /// Span placeholder / final span text
    SpanStatus,
    /// Enrichment payload
    Enrichment,
}

impl fmt::Display for ChannelName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ChannelName::Text => "text",
            ChannelName::SpanStatus => "span-status",
            ChannelName::Enrichment => "enrichment",
        })
    }
}

/// Channel-discipline violations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ChannelError {
    /// A write was attempted after the channel was marked done
    #[error("Channel '{0}' already finalized")]
    AlreadyFinalized(ChannelName),
}

/// Turn-level failures
#[derive(Error, Debug)]
pub enum TurnError {
    /// The fragment source failed before producing any fragment
    #[error("Fragment source error: {0}")]
    Source(String),

    /// The turn's record was already written
    #[error("Turn already finalized")]
    AlreadyFinalized,

    /// The persistence collaborator rejected the record
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// Invalid stream configuration
    #[error("Configuration error: {0}")]
    Config(String),
}
