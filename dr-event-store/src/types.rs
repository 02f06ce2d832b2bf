//! Core types for the demand response event store
//!
//! This module defines the record the store owns, the raw payload it is built
//! from, and the error taxonomy shared by every operation. Records handed out
//! by the store are always owned copies.

use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fmt;

/// Timestamp type used throughout the store (always UTC)
pub type Timestamp = DateTime<Utc>;

/// Result type for store operations
pub type Result<T> = std::result::Result<T, EventError>;

/// Free-form metadata attached to an event
pub type Metadata = Map<String, Value>;

/// Opaque event identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EventId(String);

impl EventId {
    /// Generate a fresh random identifier
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for EventId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for EventId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// A stored demand response event
#[derive(Debug, Clone, PartialEq)]
pub struct EventRecord {
    /// Immutable once assigned
    pub id: EventId,
    /// Start of the event (UTC, whole seconds)
    pub start_time: Timestamp,
    /// End of the event (UTC, whole seconds), never before `start_time`
    pub end_time: Timestamp,
    /// Issuing party, e.g. a grid operator
    pub entity: String,
    /// Display timezone supplied with the event, if any
    pub timezone: Option<Tz>,
    /// Free-text annotation
    pub message: String,
    /// Scalar key/value annotations
    pub metadata: Metadata,
}

impl EventRecord {
    /// Build a record from a validated draft and its assigned id
    pub fn from_draft(id: EventId, draft: EventDraft) -> Self {
        Self {
            id,
            start_time: draft.start_time,
            end_time: draft.end_time,
            entity: draft.entity,
            timezone: draft.timezone,
            message: draft.message,
            metadata: draft.metadata,
        }
    }
}

/// A validated event that has not been stored yet
///
/// Produced only by the validator, so every draft already satisfies the
/// record invariants. `id` carries an explicitly requested identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct EventDraft {
    pub id: Option<EventId>,
    pub start_time: Timestamp,
    pub end_time: Timestamp,
    pub entity: String,
    pub timezone: Option<Tz>,
    pub message: String,
    pub metadata: Metadata,
}

/// Raw event fields as received from a client
///
/// Every field is optional here; presence is checked by the validator.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct EventPayload {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
    #[serde(default)]
    pub entity: Option<String>,
    #[serde(default)]
    pub timezone: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub metadata: Option<Metadata>,
}

/// A single failed field check
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {reason}")]
pub struct ValidationError {
    /// Name of the offending input field
    pub field: &'static str,
    /// Human readable reason
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// Errors that can occur during store operations
#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Event not found: {0}")]
    NotFound(EventId),

    #[error("Event already exists: {0}")]
    Conflict(EventId),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl From<rusqlite::Error> for EventError {
    fn from(e: rusqlite::Error) -> Self {
        EventError::Storage(e.to_string())
    }
}
