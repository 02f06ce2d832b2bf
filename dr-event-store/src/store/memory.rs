//! In-memory event store
//!
//! A single read/write lock guards the id map together with the insertion
//! order, so readers see either the state before or after any write.

use crate::query::{EventQuery, QueryEngine};
use crate::store::EventStore;
use crate::types::{EventDraft, EventError, EventId, EventRecord, Result, Timestamp};
use parking_lot::RwLock;
use std::collections::HashMap;

#[derive(Default)]
struct Inner {
    records: HashMap<EventId, EventRecord>,
    /// Ids in insertion order
    order: Vec<EventId>,
}

/// Event store kept entirely in process memory
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EventStore for MemoryStore {
    fn create(&self, draft: EventDraft) -> Result<EventId> {
        let mut inner = self.inner.write();

        let id = match draft.id.clone() {
            Some(id) if inner.records.contains_key(&id) => return Err(EventError::Conflict(id)),
            Some(id) => id,
            None => EventId::generate(),
        };

        inner.order.push(id.clone());
        inner
            .records
            .insert(id.clone(), EventRecord::from_draft(id.clone(), draft));

        log::debug!("Stored event {} in memory ({} total)", id, inner.records.len());
        Ok(id)
    }

    fn get(&self, id: &EventId) -> Result<EventRecord> {
        self.inner
            .read()
            .records
            .get(id)
            .cloned()
            .ok_or_else(|| EventError::NotFound(id.clone()))
    }

    fn list(&self, query: &EventQuery, now: Timestamp) -> Result<Vec<EventRecord>> {
        let inner = self.inner.read();
        let ordered = inner.order.iter().filter_map(|id| inner.records.get(id));
        Ok(QueryEngine::filter(ordered, query, now))
    }

    fn update(&self, id: &EventId, draft: EventDraft) -> Result<EventRecord> {
        let mut inner = self.inner.write();
        let slot = inner
            .records
            .get_mut(id)
            .ok_or_else(|| EventError::NotFound(id.clone()))?;

        let record = EventRecord::from_draft(id.clone(), draft);
        *slot = record.clone();
        Ok(record)
    }

    fn delete(&self, id: &EventId) -> Result<()> {
        let mut inner = self.inner.write();
        if inner.records.remove(id).is_none() {
            return Err(EventError::NotFound(id.clone()));
        }
        inner.order.retain(|existing| existing != id);
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.inner.read().records.len())
    }
}
