//! Metrics collected while a turn streams

use std::time::Duration;

/// Counters for one turn
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TurnMetrics {
    /// Fragments consumed from the source
    pub fragments: usize,

    /// Bytes delivered on the text channel
    pub text_bytes: usize,

    /// Spans opened
    pub spans_opened: usize,

    /// Spans sealed (and handed to enrichment)
    pub spans_sealed: usize,

    /// Spans dropped unclosed or as runaways
    pub spans_discarded: usize,

    /// Enrichments that produced a full result
    pub enrichments_resolved: usize,

    /// Enrichments that fell back to the entity name
    pub enrichments_degraded: usize,

    /// Writes rejected because their channel was already done
    pub channel_violations: usize,

    /// Wall-clock duration of the turn
    pub elapsed: Duration,
}

impl TurnMetrics {
    /// Create new empty metrics
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one consumed fragment
    pub fn record_fragment(&mut self) {
        self.fragments += 1;
    }

    /// Record text delivered to the text channel
    pub fn record_text(&mut self, bytes: usize) {
        self.text_bytes += bytes;
    }

    /// Record the outcome of an enrichment
    pub fn record_enrichment(&mut self, degraded: bool) {
        if degraded {
            self.enrichments_degraded += 1;
        } else {
            self.enrichments_resolved += 1;
        }
    }

    /// One-line report for the turn log
    pub fn summary(&self) -> String {
        let mut parts = vec![
            format!("{} fragments", self.fragments),
            format!("{} bytes", self.text_bytes),
            format!("{} span(s) sealed", self.spans_sealed),
        ];
        if self.spans_discarded > 0 {
            parts.push(format!("{} discarded", self.spans_discarded));
        }
        if self.enrichments_resolved + self.enrichments_degraded > 0 {
            parts.push(format!(
                "enrichment {} resolved / {} degraded",
                self.enrichments_resolved, self.enrichments_degraded
            ));
        }
        if self.channel_violations > 0 {
            parts.push(format!("{} channel violation(s)", self.channel_violations));
        }
        parts.push(format!("{}ms", self.elapsed.as_millis()));
        parts.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_creation() {
        let metrics = TurnMetrics::new();
        assert_eq!(metrics.fragments, 0);
        assert_eq!(metrics.spans_sealed, 0);
        assert_eq!(metrics.elapsed, Duration::ZERO);
    }

    #[test]
    fn test_record_enrichment() {
        let mut metrics = TurnMetrics::new();
        metrics.record_enrichment(false);
        metrics.record_enrichment(true);
        metrics.record_enrichment(true);

        assert_eq!(metrics.enrichments_resolved, 1);
        assert_eq!(metrics.enrichments_degraded, 2);
    }

    #[test]
    fn test_summary() {
        let mut metrics = TurnMetrics::new();
        metrics.record_fragment();
        metrics.record_fragment();
        metrics.record_text(12);
        metrics.spans_sealed = 1;
        metrics.record_enrichment(false);
        metrics.elapsed = Duration::from_millis(42);

        let summary = metrics.summary();
        assert!(summary.contains("2 fragments"));
        assert!(summary.contains("12 bytes"));
        assert!(summary.contains("1 resolved / 0 degraded"));
        assert!(summary.ends_with("42ms"));
        assert!(!summary.contains("violation"));
    }
}
