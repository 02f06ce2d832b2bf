//! Demand Response Event Store
//!
//! A reusable library for recording demand response events: time-bounded
//! notices from an issuing entity (e.g. a grid operator) that a consumer
//! should reduce or shift energy usage.
//!
//! # Architecture
//!
//! - [`time`] parses user supplied timestamps into UTC and renders them back
//! - [`validator`] turns raw payloads into validated drafts
//! - [`store`] owns the records (in memory or SQLite) with atomic operations
//! - [`query`] classifies events as past/active/future and filters them
//! - [`service`] ties the above together for a transport layer
//!
//! The library does NOT:
//! - Serve HTTP (see dr-event-cli)
//! - Push events to consumers
//! - Authenticate callers
//!
//! # Example Usage
//!
//! ```no_run
//! use dr_event_store::{
//!     EventPayload, EventQuery, EventService, EventStatus, EventValidator, MemoryStore,
//! };
//! use std::sync::Arc;
//!
//! let service = EventService::new(Arc::new(MemoryStore::new()), EventValidator::default());
//!
//! let id = service.create(&EventPayload {
//!     start_time: Some("2025-06-01T14:00:00+02:00".to_string()),
//!     end_time: Some("2025-06-01T16:00:00+02:00".to_string()),
//!     entity: Some("GridOperator1".to_string()),
//!     ..Default::default()
//! }).unwrap();
//!
//! let active = service.list(&EventQuery::new().with_status(EventStatus::Active)).unwrap();
//! println!("{} active, created {}", active.len(), id);
//! ```

// Public modules
pub mod config;
pub mod query;
pub mod service;
pub mod store;
pub mod time;
pub mod types;
pub mod validator;

// Re-export main types for convenience
pub use config::ValidationConfig;
pub use query::{EventQuery, EventStatus, MetadataFilter, QueryEngine, SortKey, StatusFilter};
pub use service::{EventService, EventView};
pub use store::{EventStore, MemoryStore, SqliteStore};
pub use time::{TimeCodec, TimeError};
pub use types::{
    EventDraft, EventError, EventId, EventPayload, EventRecord, Metadata, Result, Timestamp,
    ValidationError,
};
pub use validator::{EventValidator, MetadataSize};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
