//! Validation configuration types
//!
//! Bounds and time-handling strictness used by the validator. Defaults match
//! the limits the HTTP API publishes; deployments may tighten them.

use serde::{Deserialize, Serialize};

/// Configuration for the event validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationConfig {
    /// Reject timestamps without timezone information unless the payload
    /// carries a `timezone` field
    #[serde(default = "default_true")]
    pub strict_time: bool,

    /// Maximum entity length in characters
    #[serde(default = "default_max_entity_chars")]
    pub max_entity_chars: usize,

    /// Maximum message length in characters
    #[serde(default = "default_max_message_chars")]
    pub max_message_chars: usize,

    /// Serialized metadata size above which a warning is logged
    #[serde(default = "default_metadata_warn_bytes")]
    pub metadata_warn_bytes: usize,

    /// Serialized metadata size above which the event is rejected
    #[serde(default = "default_metadata_max_bytes")]
    pub metadata_max_bytes: usize,
}

fn default_true() -> bool {
    true
}

fn default_max_entity_chars() -> usize {
    100
}

fn default_max_message_chars() -> usize {
    500
}

fn default_metadata_warn_bytes() -> usize {
    3000
}

fn default_metadata_max_bytes() -> usize {
    4000
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            strict_time: default_true(),
            max_entity_chars: default_max_entity_chars(),
            max_message_chars: default_max_message_chars(),
            metadata_warn_bytes: default_metadata_warn_bytes(),
            metadata_max_bytes: default_metadata_max_bytes(),
        }
    }
}

impl ValidationConfig {
    /// Create a new validation configuration with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method: enable or disable strict time parsing
    pub fn with_strict_time(mut self, strict: bool) -> Self {
        self.strict_time = strict;
        self
    }

    /// Builder method: set the entity length bound
    pub fn with_max_entity_chars(mut self, max: usize) -> Self {
        self.max_entity_chars = max;
        self
    }

    /// Builder method: set the message length bound
    pub fn with_max_message_chars(mut self, max: usize) -> Self {
        self.max_message_chars = max;
        self
    }

    /// Builder method: set the metadata warning and rejection thresholds
    pub fn with_metadata_limits(mut self, warn_bytes: usize, max_bytes: usize) -> Self {
        self.metadata_warn_bytes = warn_bytes;
        self.metadata_max_bytes = max_bytes;
        self
    }
}
