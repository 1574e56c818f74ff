//! Enrichment task: describe a sealed span and resolve a locator for it
//!
//! The task runs on its own tokio task so the fragment loop never waits for
//! it. Its result travels two ways: written to the enrichment channel through
//! an [`EnrichmentSink`], and returned through the task's `JoinHandle` to the
//! turn finalizer. Failures never escape; they become a degraded payload.

use crate::channel::ChannelWriter;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{info, warn};
use wayfarer_domain::traits::{Describer, ReferenceResolver};
use wayfarer_domain::{Enrichment, EnrichmentResult, SealedSpan};

/// Producing end of the enrichment channel, bound to one entity
///
/// Dropping the sink without delivering (e.g. the task was cancelled) closes
/// the channel with a degraded payload for the entity.
#[derive(Debug)]
pub struct EnrichmentSink {
    writer: ChannelWriter<Enrichment>,
    entity: String,
}

impl EnrichmentSink {
    pub(crate) fn new(writer: ChannelWriter<Enrichment>, entity: &str) -> Self {
        Self {
            writer,
            entity: entity.to_string(),
        }
    }

    /// Write the final payload and close the channel
    pub fn deliver(mut self, enrichment: Enrichment) {
        if let Err(e) = self.writer.finish(Some(enrichment)) {
            warn!("Enrichment payload dropped: {}", e);
        }
    }
}

impl Drop for EnrichmentSink {
    fn drop(&mut self) {
        if !self.writer.is_done() {
            let degraded = Enrichment::Degraded {
                entity: std::mem::take(&mut self.entity),
                reason: "enrichment cancelled".to_string(),
            };
            let _ = self.writer.finish(Some(degraded));
        }
    }
}

/// Look up a description and a locator for `entity`
///
/// Each collaborator call is bounded by `call_timeout`. An error, a timeout
/// or an empty answer from either call yields [`Enrichment::Degraded`].
pub async fn enrich<D, R>(
    describer: &D,
    resolver: &R,
    entity: &str,
    call_timeout: Duration,
) -> Enrichment
where
    D: Describer,
    R: ReferenceResolver,
{
    let degraded = |reason: String| {
        warn!("Enrichment for '{}' degraded: {}", entity, reason);
        Enrichment::Degraded {
            entity: entity.to_string(),
            reason,
        }
    };

    let description = match timeout(call_timeout, describer.describe(entity)).await {
        Ok(Ok(description)) => description,
        Ok(Err(e)) => return degraded(format!("describe failed: {}", e)),
        Err(_) => return degraded(format!("describe timed out after {:?}", call_timeout)),
    };
    if description.name.trim().is_empty() {
        return degraded("describe returned no name".to_string());
    }

    let locator = match timeout(call_timeout, resolver.resolve_reference(&description.name)).await
    {
        Ok(Ok(locator)) if locator.trim().is_empty() => {
            return degraded("resolver returned an empty locator".to_string())
        }
        Ok(Ok(locator)) => locator,
        Ok(Err(e)) => return degraded(format!("resolve failed: {}", e)),
        Err(_) => return degraded(format!("resolve timed out after {:?}", call_timeout)),
    };

    Enrichment::Resolved {
        entity: entity.to_string(),
        result: EnrichmentResult::from_parts(description, locator),
    }
}

/// Spawns one enrichment per sealed span
pub struct EnrichmentTask<D, R> {
    describer: Arc<D>,
    resolver: Arc<R>,
    call_timeout: Duration,
}

impl<D, R> Clone for EnrichmentTask<D, R> {
    fn clone(&self) -> Self {
        Self {
            describer: Arc::clone(&self.describer),
            resolver: Arc::clone(&self.resolver),
            call_timeout: self.call_timeout,
        }
    }
}

impl<D, R> EnrichmentTask<D, R>
where
    D: Describer + 'static,
    R: ReferenceResolver + 'static,
{
    /// Create a task factory from shared collaborators
    pub fn new(describer: Arc<D>, resolver: Arc<R>, call_timeout: Duration) -> Self {
        Self {
            describer,
            resolver,
            call_timeout,
        }
    }

    /// Start enriching `span` in the background
    ///
    /// Empty spans are still attempted.
    pub fn spawn(&self, span: SealedSpan, sink: EnrichmentSink) -> JoinHandle<Enrichment> {
        let describer = Arc::clone(&self.describer);
        let resolver = Arc::clone(&self.resolver);
        let call_timeout = self.call_timeout;

        tokio::spawn(async move {
            let entity = span.entity().to_string();
            info!("Enrichment started for span {} ('{}')", span.id, entity);

            let enrichment = enrich(describer.as_ref(), resolver.as_ref(), &entity, call_timeout).await;

            info!(
                "Enrichment finished for span {} ({})",
                span.id,
                if enrichment.is_degraded() { "degraded" } else { "resolved" }
            );
            sink.deliver(enrichment.clone());
            enrichment
        })
    }
}
