//! Temporal classification and filtering
//!
//! A query is evaluated against a single `now` captured by the caller, so
//! every record in one response is judged against the same instant. Filters
//! compose conjunctively: status, then entity, then metadata.

use crate::types::{EventError, EventRecord, Result, Timestamp};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

/// Temporal status of an event relative to a reference instant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventStatus {
    /// `end_time < now`
    Past,
    /// `start_time <= now <= end_time`
    Active,
    /// `start_time > now`
    Future,
}

impl fmt::Display for EventStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventStatus::Past => write!(f, "past"),
            EventStatus::Active => write!(f, "active"),
            EventStatus::Future => write!(f, "future"),
        }
    }
}

/// Status selector of a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusFilter {
    #[default]
    All,
    Only(EventStatus),
}

impl FromStr for StatusFilter {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(StatusFilter::All),
            "active" => Ok(StatusFilter::Only(EventStatus::Active)),
            "future" => Ok(StatusFilter::Only(EventStatus::Future)),
            "past" => Ok(StatusFilter::Only(EventStatus::Past)),
            _ => Err(EventError::BadRequest(format!(
                "Invalid status parameter {:?}. Use 'all', 'active', 'future', or 'past'",
                s
            ))),
        }
    }
}

/// Optional explicit ordering of query results
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortKey {
    StartTime,
    EndTime,
}

impl FromStr for SortKey {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "start_time" => Ok(SortKey::StartTime),
            "end_time" => Ok(SortKey::EndTime),
            _ => Err(EventError::BadRequest(format!(
                "Invalid sort parameter {:?}. Use 'start_time' or 'end_time'",
                s
            ))),
        }
    }
}

/// Metadata containment predicate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataFilter {
    pub key: String,
    /// `None` only requires the key to be present
    pub value: Option<String>,
}

/// A complete event query
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventQuery {
    pub status: StatusFilter,
    pub entity: Option<String>,
    pub metadata: Option<MetadataFilter>,
    pub sort: Option<SortKey>,
}

impl EventQuery {
    /// Create a query matching every event
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a query from raw request parameters
    ///
    /// Empty `entity` and `metadata_key` values mean "no filter".
    pub fn from_params(
        status: Option<&str>,
        entity: Option<&str>,
        metadata_key: Option<&str>,
        metadata_value: Option<&str>,
        sort: Option<&str>,
    ) -> Result<Self> {
        let status = status.map(str::parse::<StatusFilter>).transpose()?.unwrap_or_default();
        let entity = entity.filter(|e| !e.is_empty()).map(str::to_string);
        let metadata = match (metadata_key.filter(|k| !k.is_empty()), metadata_value) {
            (Some(key), value) => Some(MetadataFilter {
                key: key.to_string(),
                value: value.map(str::to_string),
            }),
            (None, Some(_)) => {
                return Err(EventError::BadRequest(
                    "metadata_value requires metadata_key".to_string(),
                ))
            }
            (None, None) => None,
        };
        let sort = sort.map(str::parse::<SortKey>).transpose()?;

        Ok(Self {
            status,
            entity,
            metadata,
            sort,
        })
    }

    /// Builder method: restrict to one temporal status
    pub fn with_status(mut self, status: EventStatus) -> Self {
        self.status = StatusFilter::Only(status);
        self
    }

    /// Builder method: restrict to one entity (exact, case-sensitive)
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    /// Builder method: require a metadata key, optionally with a value
    pub fn with_metadata(mut self, key: impl Into<String>, value: Option<&str>) -> Self {
        self.metadata = Some(MetadataFilter {
            key: key.into(),
            value: value.map(str::to_string),
        });
        self
    }

    /// Builder method: sort results
    pub fn sorted_by(mut self, key: SortKey) -> Self {
        self.sort = Some(key);
        self
    }

    /// Check whether a record satisfies every filter of this query
    pub fn matches(&self, record: &EventRecord, now: Timestamp) -> bool {
        if let StatusFilter::Only(status) = self.status {
            if QueryEngine::classify(record, now) != status {
                return false;
            }
        }

        if let Some(entity) = &self.entity {
            if record.entity != *entity {
                return false;
            }
        }

        if let Some(filter) = &self.metadata {
            match (record.metadata.get(&filter.key), &filter.value) {
                (None, _) => return false,
                (Some(_), None) => {}
                (Some(actual), Some(expected)) => {
                    if !scalar_matches(actual, expected) {
                        return false;
                    }
                }
            }
        }

        true
    }
}

/// Classifies and filters event snapshots
pub struct QueryEngine;

impl QueryEngine {
    /// Classify a record relative to `now`; Active is inclusive on both ends
    pub fn classify(record: &EventRecord, now: Timestamp) -> EventStatus {
        if record.start_time > now {
            EventStatus::Future
        } else if record.end_time < now {
            EventStatus::Past
        } else {
            EventStatus::Active
        }
    }

    /// Filter records in iteration order, then apply the requested sort
    pub fn filter<'a, I>(records: I, query: &EventQuery, now: Timestamp) -> Vec<EventRecord>
    where
        I: IntoIterator<Item = &'a EventRecord>,
    {
        let mut matched: Vec<EventRecord> = records
            .into_iter()
            .filter(|r| query.matches(r, now))
            .cloned()
            .collect();

        // sort_by_key is stable, so ties keep insertion order
        match query.sort {
            Some(SortKey::StartTime) => matched.sort_by_key(|r| r.start_time),
            Some(SortKey::EndTime) => matched.sort_by_key(|r| r.end_time),
            None => {}
        }

        matched
    }
}

fn scalar_matches(actual: &Value, expected: &str) -> bool {
    match actual {
        Value::String(s) => s == expected,
        other => other.to_string() == expected,
    }
}
