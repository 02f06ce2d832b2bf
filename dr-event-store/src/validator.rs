//! Event validation
//!
//! Turns a raw [`EventPayload`] into an [`EventDraft`] or reports the first
//! failing field. Checks run in a fixed order and stop at the first failure:
//!
//! 1. presence of `start_time`, `end_time`, `entity`
//! 2. `timezone` is a known IANA identifier
//! 3. `start_time` and `end_time` parse
//! 4. `start_time <= end_time`
//! 5. `entity` non-empty and within bounds
//! 6. `message` within bounds
//! 7. `metadata` scalar-valued and within the size bound
//! 8. an explicit `id`, if present, is non-empty
//!
//! Validation never touches the store.

use crate::config::ValidationConfig;
use crate::time::{parse_timezone, TimeCodec};
use crate::types::{EventDraft, EventId, EventPayload, Metadata, ValidationError};

/// Outcome of the metadata size check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataSize {
    /// Compact JSON size in bytes
    pub bytes: usize,
    /// True if the size is above the warning threshold
    pub oversized: bool,
}

/// Validates raw event fields
#[derive(Debug, Clone, Default)]
pub struct EventValidator {
    config: ValidationConfig,
    codec: TimeCodec,
}

impl EventValidator {
    pub fn new(config: ValidationConfig) -> Self {
        let codec = TimeCodec::new(config.strict_time);
        Self { config, codec }
    }

    /// Validate a payload into a draft ready for the store
    pub fn validate(&self, payload: &EventPayload) -> Result<EventDraft, ValidationError> {
        let start_raw = required(&payload.start_time, "start_time")?;
        let end_raw = required(&payload.end_time, "end_time")?;
        let entity_raw = required(&payload.entity, "entity")?;

        let timezone = payload
            .timezone
            .as_deref()
            .map(parse_timezone)
            .transpose()
            .map_err(|e| ValidationError::new("timezone", e.to_string()))?;

        let start_time = self
            .codec
            .parse(start_raw, timezone)
            .map_err(|e| ValidationError::new("start_time", e.to_string()))?;
        let end_time = self
            .codec
            .parse(end_raw, timezone)
            .map_err(|e| ValidationError::new("end_time", e.to_string()))?;

        if start_time > end_time {
            return Err(ValidationError::new(
                "start_time",
                "start_time must not be after end_time",
            ));
        }

        let entity = entity_raw.trim();
        if entity.is_empty() {
            return Err(ValidationError::new("entity", "entity is required"));
        }
        if entity.chars().count() > self.config.max_entity_chars {
            return Err(ValidationError::new(
                "entity",
                format!(
                    "entity must be at most {} characters",
                    self.config.max_entity_chars
                ),
            ));
        }

        let message = payload.message.clone().unwrap_or_default();
        if message.chars().count() > self.config.max_message_chars {
            return Err(ValidationError::new(
                "message",
                format!(
                    "message must be at most {} characters",
                    self.config.max_message_chars
                ),
            ));
        }

        let metadata = payload.metadata.clone().unwrap_or_default();
        let size = self.check_metadata(&metadata)?;
        if size.oversized {
            log::warn!(
                "Large metadata payload (~{} bytes) for entity: {}",
                size.bytes,
                entity
            );
        }

        let id = match payload.id.as_deref() {
            Some(raw) if raw.trim().is_empty() => {
                return Err(ValidationError::new("id", "id must not be empty"));
            }
            Some(raw) => Some(EventId::from(raw.trim())),
            None => None,
        };

        Ok(EventDraft {
            id,
            start_time,
            end_time,
            entity: entity.to_string(),
            timezone,
            message,
            metadata,
        })
    }

    /// Check metadata values and serialized size against the configured bounds
    pub fn check_metadata(&self, metadata: &Metadata) -> Result<MetadataSize, ValidationError> {
        if let Some((key, _)) = metadata
            .iter()
            .find(|(_, v)| v.is_array() || v.is_object())
        {
            return Err(ValidationError::new(
                "metadata",
                format!("metadata value for {:?} must be a scalar", key),
            ));
        }

        let bytes = serde_json::to_string(metadata)
            .map(|s| s.len())
            .map_err(|e| ValidationError::new("metadata", e.to_string()))?;

        if bytes > self.config.metadata_max_bytes {
            return Err(ValidationError::new(
                "metadata",
                format!(
                    "metadata must be at most {} bytes (got {})",
                    self.config.metadata_max_bytes, bytes
                ),
            ));
        }

        Ok(MetadataSize {
            bytes,
            oversized: bytes > self.config.metadata_warn_bytes,
        })
    }
}

fn required<'a>(
    value: &'a Option<String>,
    field: &'static str,
) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .ok_or_else(|| ValidationError::new(field, format!("{} is required", field)))
}
