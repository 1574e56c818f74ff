//! Wayfarer Stream
//!
//! Incremental delta parsing and dual-stream coordination for one
//! conversational turn.
//!
//! # Overview
//!
//! A model streams its reply as text fragments. Place names in the reply are
//! marked with a delimiter pair (`[[Paris]]`). This crate consumes the
//! fragments one at a time, recognises the marked span even when a delimiter
//! straddles two fragments, and fans the turn out over three channels:
//!
//! - **text**: the reply with every delimiter and the span removed
//! - **span-status**: a pending placeholder, then the final span text
//! - **enrichment**: a landmark description and picture locator for the span,
//!   looked up concurrently while the text keeps flowing
//!
//! Once the source completes and enrichment has settled, the turn finalizer
//! writes exactly one [`TurnRecord`](wayfarer_domain::TurnRecord) to the store.
//!
//! # Architecture
//!
//! ```text
//! FragmentSource → DeltaParser → OutputMultiplexer → text / span-status
//!                                       │
//!                                       └─ EnrichmentTask → enrichment
//!                                                 │
//!                                                 └─ JoinHandle → TurnFinalizer → TurnStore
//! ```
//!
//! # Channel lifecycle
//!
//! Every channel goes `open → append* → done` exactly once. Span-status is
//! done before enrichment, and both are done before text. A turn that never
//! opens a span closes both side channels with an empty payload.
//!
//! # Example Usage
//!
//! ```no_run
//! use wayfarer_llm::{MockEnricher, ScriptedSource};
//! use wayfarer_store::MemoryStore;
//! use wayfarer_stream::{StreamConfig, TurnRunner};
//! use wayfarer_domain::ChatId;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let enricher = MockEnricher::new();
//! let runner = TurnRunner::new(
//!     enricher.clone(),
//!     enricher,
//!     MemoryStore::new(),
//!     StreamConfig::default(),
//! )?;
//!
//! let (turn, mut channels) = runner.start(ChatId::new());
//! let source = ScriptedSource::new(["The Eiffel Tower is in [[", "Paris", "]]."]);
//! let outcome = turn.run(source).await?;
//!
//! while let Some(event) = channels.timeline.recv().await {
//!     println!("{:?}", event);
//! }
//! println!("{}", outcome.record.text);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

pub mod channel;
mod config;
mod conversation;
mod enrichment;
mod error;
mod finalizer;
mod metrics;
mod multiplexer;
pub mod parser;
mod turn;

#[cfg(test)]
mod tests;

pub use channel::{ChannelEvent, ChannelLog, ChannelReceiver, ChannelWriter, SpanStatus, TurnEvent};
pub use config::StreamConfig;
pub use conversation::{Conversation, DisplayMessage};
pub use enrichment::{enrich, EnrichmentSink, EnrichmentTask};
pub use error::{ChannelError, ChannelName, TurnError};
pub use finalizer::{TurnDraft, TurnFinalizer};
pub use metrics::TurnMetrics;
pub use multiplexer::{OutputMultiplexer, TurnChannels};
pub use parser::{strip_markup, DeltaParser, ParseEvent, ParserState};
pub use turn::{TurnContext, TurnOutcome, TurnRunner};
