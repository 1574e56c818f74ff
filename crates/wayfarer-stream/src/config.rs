//! Configuration for the streaming engine

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for delimiter detection and enrichment
///
/// # Examples
///
/// ```
/// use wayfarer_stream::StreamConfig;
///
/// let config = StreamConfig::default();
/// assert_eq!(config.open_delimiter, "[[");
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Marker that opens a span
    #[serde(default = "default_open")]
    pub open_delimiter: String,

    /// Marker that closes a span
    #[serde(default = "default_close")]
    pub close_delimiter: String,

    /// Bound on each enrichment lookup (seconds)
    #[serde(default = "default_enrichment_timeout")]
    pub enrichment_timeout_secs: u64,

    /// Bound on how long finalization waits for a live enrichment task (seconds)
    #[serde(default = "default_finalize_timeout")]
    pub finalize_timeout_secs: u64,

    /// A span longer than this many characters is abandoned as plain text
    #[serde(default = "default_max_span_chars")]
    pub max_span_chars: usize,
}

fn default_open() -> String {
    "[[".to_string()
}

fn default_close() -> String {
    "]]".to_string()
}

fn default_enrichment_timeout() -> u64 {
    30
}

fn default_finalize_timeout() -> u64 {
    60
}

fn default_max_span_chars() -> usize {
    200
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            open_delimiter: default_open(),
            close_delimiter: default_close(),
            enrichment_timeout_secs: default_enrichment_timeout(),
            finalize_timeout_secs: default_finalize_timeout(),
            max_span_chars: default_max_span_chars(),
        }
    }
}

impl StreamConfig {
    /// Strict preset: short lookups, short spans
    pub fn strict() -> Self {
        Self {
            enrichment_timeout_secs: 10,
            finalize_timeout_secs: 20,
            max_span_chars: 80,
            ..Self::default()
        }
    }

    /// Lenient preset: slow local models, long place names
    pub fn lenient() -> Self {
        Self {
            enrichment_timeout_secs: 120,
            finalize_timeout_secs: 300,
            max_span_chars: 500,
            ..Self::default()
        }
    }

    /// Get the enrichment timeout as a Duration
    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_secs(self.enrichment_timeout_secs)
    }

    /// Get the finalization timeout as a Duration
    pub fn finalize_timeout(&self) -> Duration {
        Duration::from_secs(self.finalize_timeout_secs)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.open_delimiter.is_empty() || self.close_delimiter.is_empty() {
            return Err("delimiters must not be empty".to_string());
        }
        if self.open_delimiter == self.close_delimiter {
            return Err("open and close delimiters must differ".to_string());
        }
        if self.enrichment_timeout_secs == 0 {
            return Err("enrichment_timeout_secs must be greater than 0".to_string());
        }
        if self.finalize_timeout_secs < self.enrichment_timeout_secs {
            return Err("finalize_timeout_secs cannot be shorter than enrichment_timeout_secs".to_string());
        }
        if self.max_span_chars == 0 {
            return Err("max_span_chars must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Load configuration from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self, String> {
        toml::from_str(toml_str).map_err(|e| format!("Failed to parse TOML: {}", e))
    }

    /// Serialize configuration to TOML string
    pub fn to_toml(&self) -> Result<String, String> {
        toml::to_string_pretty(self).map_err(|e| format!("Failed to serialize to TOML: {}", e))
    }
}
