//! Event storage backends
//!
//! Every backend implements [`EventStore`]. Each operation is atomic with
//! respect to concurrent callers and hands out owned copies of records, so a
//! reader never observes a partially applied write.

use crate::query::EventQuery;
use crate::types::{EventDraft, EventId, EventRecord, Result, Timestamp};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Common trait for all event stores
pub trait EventStore: Send + Sync {
    /// Store a new event and return its id
    ///
    /// Uses the draft's explicit id if present, failing with
    /// `EventError::Conflict` if it is taken; otherwise generates one.
    fn create(&self, draft: EventDraft) -> Result<EventId>;

    /// Fetch a copy of one event
    fn get(&self, id: &EventId) -> Result<EventRecord>;

    /// Return the events matching `query`, judged against `now`
    ///
    /// Results are in insertion order unless the query asks for sorting.
    fn list(&self, query: &EventQuery, now: Timestamp) -> Result<Vec<EventRecord>>;

    /// Replace the body of an existing event, keeping its id
    fn update(&self, id: &EventId, draft: EventDraft) -> Result<EventRecord>;

    /// Remove an event
    fn delete(&self, id: &EventId) -> Result<()>;

    /// Number of stored events
    fn len(&self) -> Result<usize>;

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}
