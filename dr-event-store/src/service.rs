//! Event service
//!
//! The entry point a transport calls into: validates payloads, applies them
//! to the store, runs queries against a single `now`, and renders records for
//! output.

use crate::query::EventQuery;
use crate::store::EventStore;
use crate::time::TimeCodec;
use crate::types::{EventId, EventPayload, EventRecord, Metadata, Result, Timestamp};
use crate::validator::EventValidator;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Validating façade over an [`EventStore`]
#[derive(Clone)]
pub struct EventService {
    store: Arc<dyn EventStore>,
    validator: EventValidator,
}

impl EventService {
    pub fn new(store: Arc<dyn EventStore>, validator: EventValidator) -> Self {
        Self { store, validator }
    }

    /// Validate and store a new event
    pub fn create(&self, payload: &EventPayload) -> Result<EventId> {
        let draft = self.validator.validate(payload)?;
        let id = self.store.create(draft)?;
        log::info!("Event {} created", id);
        Ok(id)
    }

    pub fn get(&self, id: &EventId) -> Result<EventRecord> {
        self.store.get(id)
    }

    /// Run a query against the current instant
    pub fn list(&self, query: &EventQuery) -> Result<Vec<EventRecord>> {
        self.list_at(query, Utc::now())
    }

    /// Run a query against an explicit instant
    pub fn list_at(&self, query: &EventQuery, now: Timestamp) -> Result<Vec<EventRecord>> {
        self.store.list(query, now)
    }

    /// Replace an existing event; an invalid payload leaves the store untouched
    ///
    /// The path id always wins, so any `id` in the payload is ignored.
    pub fn update(&self, id: &EventId, payload: &EventPayload) -> Result<EventRecord> {
        let payload = EventPayload {
            id: None,
            ..payload.clone()
        };
        let draft = self.validator.validate(&payload)?;
        let record = self.store.update(id, draft)?;
        log::info!("Event {} updated", id);
        Ok(record)
    }

    pub fn delete(&self, id: &EventId) -> Result<()> {
        self.store.delete(id)?;
        log::info!("Event {} deleted", id);
        Ok(())
    }

    pub fn len(&self) -> Result<usize> {
        self.store.len()
    }

    pub fn is_empty(&self) -> Result<bool> {
        self.store.is_empty()
    }
}

/// Output representation of an event
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventView {
    pub id: String,
    pub start_time: String,
    pub end_time: String,
    pub entity: String,
    pub message: String,
    pub metadata: Metadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timezone: Option<String>,
}

impl EventView {
    /// Render a record, reprojecting times into `display_tz` (UTC if absent or unknown)
    pub fn render(record: &EventRecord, display_tz: Option<&str>) -> Self {
        Self {
            id: record.id.to_string(),
            start_time: TimeCodec::render(record.start_time, display_tz),
            end_time: TimeCodec::render(record.end_time, display_tz),
            entity: record.entity.clone(),
            message: record.message.clone(),
            metadata: record.metadata.clone(),
            timezone: record.timezone.map(|tz| tz.name().to_string()),
        }
    }
}
