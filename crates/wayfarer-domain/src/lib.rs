//! Wayfarer Domain Layer
//!
//! Value types and collaborator traits shared by every other Wayfarer crate.
//! Nothing here performs I/O: the model provider, the enrichment lookups and
//! the persistence layer are all described as traits and implemented elsewhere.
//!
//! ## Key Concepts
//!
//! - **Fragment**: one incremental chunk of generated text, or the terminal
//!   completion signal carrying the full turn text
//! - **Span**: text enclosed between an opening and a closing delimiter,
//!   denoting a place mention
//! - **Enrichment**: the landmark fact and picture locator found for a span
//! - **TurnRecord**: the durable representation of one message in a chat
//!
//! ## Architecture
//!
//! ```text
//! FragmentSource → (wayfarer-stream) → TurnStore
//!                        ↘ Describer + ReferenceResolver
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod chat;
pub mod enrichment;
pub mod fragment;
pub mod span;
pub mod traits;
pub mod turn;

// Re-exports for convenience
pub use chat::{Chat, ChatId};
pub use enrichment::{Enrichment, EnrichmentResult, EntityDescription};
pub use fragment::Fragment;
pub use span::{SealedSpan, Span};
pub use turn::{Landmark, MessageId, Role, TurnRecord};
