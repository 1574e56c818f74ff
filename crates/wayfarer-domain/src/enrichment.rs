//! Enrichment - supplementary information found for a sealed span

use crate::turn::Landmark;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Result of the describe collaborator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityDescription {
    /// Display name of the described entity (e.g. a landmark)
    pub name: String,
    /// Short descriptive fact
    pub fact: String,
}

/// A complete enrichment: description plus a resolved locator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnrichmentResult {
    /// Display name
    pub name: String,
    /// Supplementary fact
    pub fact: String,
    /// Resolved reference (e.g. a picture URL)
    pub locator: String,
}

impl EnrichmentResult {
    /// Combine a description with its resolved locator
    pub fn from_parts(description: EntityDescription, locator: String) -> Self {
        Self {
            name: description.name,
            fact: description.fact,
            locator,
        }
    }
}

/// What the enrichment task produced for one span
///
/// Produced exactly once per sealed span and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Enrichment {
    /// Both lookups succeeded
    Resolved {
        /// Span text the lookup was made for
        entity: String,
        /// Lookup result
        result: EnrichmentResult,
    },

    /// A lookup failed; only the entity name is available
    Degraded {
        /// Span text the lookup was made for
        entity: String,
        /// Why the lookup failed
        reason: String,
    },
}

impl Enrichment {
    /// Span text the enrichment belongs to
    pub fn entity(&self) -> &str {
        match self {
            Enrichment::Resolved { entity, .. } | Enrichment::Degraded { entity, .. } => entity,
        }
    }

    /// Whether the lookup degraded
    pub fn is_degraded(&self) -> bool {
        matches!(self, Enrichment::Degraded { .. })
    }

    /// Landmark fields for the durable record
    pub fn landmark(&self) -> Option<Landmark> {
        match self {
            Enrichment::Resolved { result, .. } => Some(Landmark {
                info: result.fact.clone(),
                url: result.locator.clone(),
            }),
            Enrichment::Degraded { .. } => None,
        }
    }
}

impl fmt::Display for Enrichment {
    /// Rendered composite: `"{entity}: {locator} : {fact}"`, or the entity alone
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Enrichment::Resolved { entity, result } => {
                write!(f, "{}: {} : {}", entity, result.locator, result.fact)
            }
            Enrichment::Degraded { entity, .. } => f.write_str(entity),
        }
    }
}
