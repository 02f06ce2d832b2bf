//! SQLite event store
//!
//! One `events` table keyed by `id`, with times stored as integer epoch
//! seconds (UTC) and metadata as a JSON object. Every operation runs as a
//! single statement or a single transaction on a connection guarded by a
//! mutex, so no cursor outlives a call.
//!
//! Status and entity predicates are pushed into SQL with bounds that never
//! exclude a matching row; the exact predicate is then applied in process so
//! results are identical to [`MemoryStore`](crate::store::MemoryStore).

use crate::query::{EventQuery, EventStatus, QueryEngine, StatusFilter};
use crate::store::EventStore;
use crate::time::{from_epoch_seconds, parse_timezone};
use crate::types::{EventDraft, EventError, EventId, EventRecord, Metadata, Result, Timestamp};
use parking_lot::Mutex;
use rusqlite::types::Value as SqlValue;
use rusqlite::{params, params_from_iter, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::time::Duration;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS events (
        seq INTEGER PRIMARY KEY AUTOINCREMENT,
        id TEXT NOT NULL UNIQUE,
        start_time INTEGER NOT NULL,
        end_time INTEGER NOT NULL,
        entity TEXT NOT NULL,
        message TEXT NOT NULL DEFAULT '',
        metadata TEXT NOT NULL DEFAULT '{}',
        timezone TEXT
    );
    CREATE INDEX IF NOT EXISTS idx_start ON events(start_time);
    CREATE INDEX IF NOT EXISTS idx_end ON events(end_time);
    CREATE INDEX IF NOT EXISTS idx_entity ON events(entity);
";

const SELECT_COLUMNS: &str =
    "SELECT id, start_time, end_time, entity, message, metadata, timezone FROM events";

/// Event store backed by a SQLite database
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) a database file
    pub fn open(path: &Path, busy_timeout: Duration) -> Result<Self> {
        log::info!("Opening SQLite event store: {:?}", path);
        let conn = Connection::open(path)?;
        conn.busy_timeout(busy_timeout)?;
        Self::from_connection(conn)
    }

    /// Open a private in-memory database
    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

impl EventStore for SqliteStore {
    fn create(&self, draft: EventDraft) -> Result<EventId> {
        let id = draft.id.clone().unwrap_or_else(EventId::generate);
        let metadata = encode_metadata(&draft.metadata)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let inserted = tx.execute(
            "INSERT INTO events (id, start_time, end_time, entity, message, metadata, timezone)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.as_str(),
                draft.start_time.timestamp(),
                draft.end_time.timestamp(),
                draft.entity,
                draft.message,
                metadata,
                draft.timezone.map(|tz| tz.name()),
            ],
        );

        match inserted {
            Ok(_) => {}
            Err(rusqlite::Error::SqliteFailure(e, _))
                if e.code == ErrorCode::ConstraintViolation =>
            {
                return Err(EventError::Conflict(id));
            }
            Err(e) => return Err(e.into()),
        }

        tx.commit()?;
        Ok(id)
    }

    fn get(&self, id: &EventId) -> Result<EventRecord> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!("{} WHERE id = ?1", SELECT_COLUMNS))?;
        let row = stmt
            .query_row(params![id.as_str()], StoredRow::read)
            .optional()?;

        match row {
            Some(row) => row.into_record(),
            None => Err(EventError::NotFound(id.clone())),
        }
    }

    fn list(&self, query: &EventQuery, now: Timestamp) -> Result<Vec<EventRecord>> {
        let now_secs = now.timestamp();
        let mut clauses: Vec<&str> = Vec::new();
        let mut values: Vec<SqlValue> = Vec::new();

        match query.status {
            StatusFilter::All => {}
            StatusFilter::Only(EventStatus::Active) => {
                clauses.push("start_time <= ? AND end_time >= ?");
                values.push(SqlValue::Integer(now_secs));
                values.push(SqlValue::Integer(now_secs));
            }
            StatusFilter::Only(EventStatus::Future) => {
                clauses.push("start_time > ?");
                values.push(SqlValue::Integer(now_secs));
            }
            StatusFilter::Only(EventStatus::Past) => {
                // `now` may carry a fraction; the exact check happens below
                clauses.push("end_time <= ?");
                values.push(SqlValue::Integer(now_secs));
            }
        }

        if let Some(entity) = &query.entity {
            clauses.push("entity = ?");
            values.push(SqlValue::Text(entity.clone()));
        }

        let mut sql = SELECT_COLUMNS.to_string();
        if !clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&clauses.join(" AND "));
        }
        sql.push_str(" ORDER BY seq");

        let rows = {
            let conn = self.conn.lock();
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(params_from_iter(values.iter()), StoredRow::read)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let records = rows
            .into_iter()
            .map(StoredRow::into_record)
            .collect::<Result<Vec<_>>>()?;

        Ok(QueryEngine::filter(&records, query, now))
    }

    fn update(&self, id: &EventId, draft: EventDraft) -> Result<EventRecord> {
        let metadata = encode_metadata(&draft.metadata)?;

        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let changed = tx.execute(
            "UPDATE events
             SET start_time = ?1, end_time = ?2, entity = ?3,
                 message = ?4, metadata = ?5, timezone = ?6
             WHERE id = ?7",
            params![
                draft.start_time.timestamp(),
                draft.end_time.timestamp(),
                draft.entity,
                draft.message,
                metadata,
                draft.timezone.map(|tz| tz.name()),
                id.as_str(),
            ],
        )?;

        if changed == 0 {
            return Err(EventError::NotFound(id.clone()));
        }

        tx.commit()?;
        Ok(EventRecord::from_draft(id.clone(), draft))
    }

    fn delete(&self, id: &EventId) -> Result<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        let removed = tx.execute("DELETE FROM events WHERE id = ?1", params![id.as_str()])?;

        if removed == 0 {
            return Err(EventError::NotFound(id.clone()));
        }

        tx.commit()?;
        Ok(())
    }

    fn len(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM events", [], |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// A row as stored, before conversion into an [`EventRecord`]
struct StoredRow {
    id: String,
    start_time: i64,
    end_time: i64,
    entity: String,
    message: String,
    metadata: String,
    timezone: Option<String>,
}

impl StoredRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            start_time: row.get(1)?,
            end_time: row.get(2)?,
            entity: row.get(3)?,
            message: row.get(4)?,
            metadata: row.get(5)?,
            timezone: row.get(6)?,
        })
    }

    fn into_record(self) -> Result<EventRecord> {
        let start_time = from_epoch_seconds(self.start_time).ok_or_else(|| {
            EventError::Storage(format!("invalid start_time for event {}", self.id))
        })?;
        let end_time = from_epoch_seconds(self.end_time).ok_or_else(|| {
            EventError::Storage(format!("invalid end_time for event {}", self.id))
        })?;
        let metadata: Metadata = serde_json::from_str(&self.metadata).map_err(|e| {
            EventError::Storage(format!("invalid metadata for event {}: {}", self.id, e))
        })?;
        let timezone = self
            .timezone
            .as_deref()
            .map(parse_timezone)
            .transpose()
            .map_err(|e| EventError::Storage(format!("event {}: {}", self.id, e)))?;

        Ok(EventRecord {
            id: EventId::from(self.id),
            start_time,
            end_time,
            entity: self.entity,
            timezone,
            message: self.message,
            metadata,
        })
    }
}

fn encode_metadata(metadata: &Metadata) -> Result<String> {
    serde_json::to_string(metadata)
        .map_err(|e| EventError::Storage(format!("Failed to encode metadata: {}", e)))
}
