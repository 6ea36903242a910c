//! SQLite implementation of `ActivityStore`.
//!
//! One append-only table, `activity_log`. `sequence_number` is an
//! `AUTOINCREMENT` primary key, so SQLite assigns it and never reuses a
//! value. Appends run in a `BEGIN IMMEDIATE` transaction, which takes the
//! database write lock before the tail is read. That lock is SQLite's
//! equivalent of a row lock on the tail, and it serializes appenders across
//! connections and processes. A rolled-back append also rolls back the
//! `sqlite_sequence` bump, so aborted appends leave no gap.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, TransactionBehavior};
use tracing::{debug, info};
use uuid::Uuid;

use chronicle_contracts::{
    error::{ChronicleError, ChronicleResult},
    record::{ActivityFilter, ActivityRecord},
};
use chronicle_core::{
    hash::canonical_timestamp,
    traits::{ActivityStore, LinkBuilder},
};

const SCHEMA_SQL: &str = "
    CREATE TABLE IF NOT EXISTS activity_log (
        sequence_number INTEGER PRIMARY KEY AUTOINCREMENT,
        id              TEXT NOT NULL UNIQUE,
        user_id         TEXT,
        action          TEXT NOT NULL,
        resource        TEXT NOT NULL,
        resource_id     TEXT,
        details         TEXT NOT NULL,
        session_info    TEXT,
        created_at      TEXT NOT NULL,
        content_hash    TEXT NOT NULL,
        previous_hash   TEXT NOT NULL,
        signature       TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_activity_created_at ON activity_log(created_at);
    CREATE INDEX IF NOT EXISTS idx_activity_user_id ON activity_log(user_id);
    CREATE INDEX IF NOT EXISTS idx_activity_resource ON activity_log(resource);
";

const COLUMNS: &str = "sequence_number, id, user_id, action, resource, resource_id, \
                       details, session_info, created_at, content_hash, previous_hash, signature";

/// How long a writer waits for another connection's append to commit.
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// A row as SQLite returns it, before JSON and timestamp decoding.
struct RawRow {
    sequence_number: i64,
    id: String,
    user_id: Option<String>,
    action: String,
    resource: String,
    resource_id: Option<String>,
    details: String,
    session_info: Option<String>,
    created_at: String,
    content_hash: String,
    previous_hash: String,
    signature: String,
}

impl RawRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            sequence_number: row.get(0)?,
            id: row.get(1)?,
            user_id: row.get(2)?,
            action: row.get(3)?,
            resource: row.get(4)?,
            resource_id: row.get(5)?,
            details: row.get(6)?,
            session_info: row.get(7)?,
            created_at: row.get(8)?,
            content_hash: row.get(9)?,
            previous_hash: row.get(10)?,
            signature: row.get(11)?,
        })
    }

    fn decode(self) -> ChronicleResult<ActivityRecord> {
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| ChronicleError::Serialization {
                reason: format!(
                    "invalid created_at '{}' at sequence {}: {}",
                    self.created_at, self.sequence_number, e
                ),
            })?
            .with_timezone(&Utc);

        let session_info = match self.session_info {
            Some(json) => Some(serde_json::from_str(&json)?),
            None => None,
        };

        Ok(ActivityRecord {
            id: self.id,
            sequence_number: self.sequence_number as u64,
            user_id: self.user_id,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            details: serde_json::from_str(&self.details)?,
            session_info,
            created_at,
            content_hash: self.content_hash,
            previous_hash: self.previous_hash,
            signature: self.signature,
        })
    }
}

fn storage_err(context: &str) -> impl Fn(rusqlite::Error) -> ChronicleError + '_ {
    move |e| ChronicleError::StorageUnavailable {
        reason: format!("{}: {}", context, e),
    }
}

fn append_err(context: &str) -> impl Fn(rusqlite::Error) -> ChronicleError + '_ {
    move |e| ChronicleError::AppendFailed {
        reason: format!("{}: {}", context, e),
    }
}

/// An append-only activity store backed by a SQLite database.
pub struct SqliteActivityStore {
    conn: Mutex<Connection>,
}

impl SqliteActivityStore {
    /// Open (or create) the activity log at `path`.
    ///
    /// Enables WAL mode so verification reads do not block appends, then
    /// creates the table and indices if they do not exist.
    pub fn open(path: &Path) -> ChronicleResult<Self> {
        let conn = Connection::open(path).map_err(|e| ChronicleError::StorageUnavailable {
            reason: format!("failed to open database '{}': {}", path.display(), e),
        })?;

        conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
            .map_err(storage_err("failed to enable WAL mode"))?;

        let store = Self::init(conn)?;
        info!(path = %path.display(), "activity store opened");
        Ok(store)
    }

    /// A private, non-persistent database. Each call gets a fresh log.
    pub fn open_in_memory() -> ChronicleResult<Self> {
        let conn = Connection::open_in_memory().map_err(storage_err("failed to open in-memory database"))?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> ChronicleResult<Self> {
        conn.busy_timeout(BUSY_TIMEOUT)
            .map_err(storage_err("failed to set busy timeout"))?;
        conn.execute_batch(SCHEMA_SQL)
            .map_err(storage_err("failed to create schema"))?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Rewrite a stored row outside the chain.
    ///
    /// Simulates an attacker with direct database access; used by detection
    /// drills. Only the stored columns change, nothing is re-hashed. Returns
    /// `false` when no row has that sequence number.
    pub fn tamper(
        &self,
        sequence_number: u64,
        mutate: impl FnOnce(&mut ActivityRecord),
    ) -> ChronicleResult<bool> {
        let conn = self.lock()?;
        let Some(mut record) = fetch_one(
            &conn,
            &format!("SELECT {COLUMNS} FROM activity_log WHERE sequence_number = ?1"),
            sequence_number as i64,
        )?
        else {
            return Ok(false);
        };

        mutate(&mut record);

        let details = serde_json::to_string(&record.details)?;
        let session_info = record
            .session_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        conn.execute(
            "UPDATE activity_log SET user_id = ?1, action = ?2, resource = ?3, resource_id = ?4,
                 details = ?5, session_info = ?6, created_at = ?7, content_hash = ?8,
                 previous_hash = ?9, signature = ?10
             WHERE sequence_number = ?11",
            params![
                record.user_id,
                record.action,
                record.resource,
                record.resource_id,
                details,
                session_info,
                canonical_timestamp(record.created_at),
                record.content_hash,
                record.previous_hash,
                record.signature,
                sequence_number as i64,
            ],
        )
        .map_err(storage_err("failed to rewrite row"))?;

        Ok(true)
    }

    fn lock(&self) -> ChronicleResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|e| ChronicleError::StorageUnavailable {
            reason: format!("connection lock poisoned: {}", e),
        })
    }
}

fn fetch_all(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> ChronicleResult<Vec<ActivityRecord>> {
    let mut stmt = conn.prepare(sql).map_err(storage_err("failed to prepare query"))?;
    let rows = stmt
        .query_map(params, RawRow::from_row)
        .map_err(storage_err("failed to query activity log"))?
        .collect::<Result<Vec<_>, _>>()
        .map_err(storage_err("failed to read activity row"))?;

    rows.into_iter().map(RawRow::decode).collect()
}

fn fetch_one(conn: &Connection, sql: &str, param: i64) -> ChronicleResult<Option<ActivityRecord>> {
    conn.query_row(sql, [param], RawRow::from_row)
        .optional()
        .map_err(storage_err("failed to read activity row"))?
        .map(RawRow::decode)
        .transpose()
}

// ── ActivityStore impl ────────────────────────────────────────────────────────

impl ActivityStore for SqliteActivityStore {
    fn append_under_lock(&self, build: &mut LinkBuilder<'_>) -> ChronicleResult<ActivityRecord> {
        let mut conn = self.conn.lock().map_err(|e| ChronicleError::AppendFailed {
            reason: format!("connection lock poisoned: {}", e),
        })?;

        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(append_err("failed to lock activity log tail"))?;

        let tail: Option<String> = tx
            .query_row(
                "SELECT content_hash FROM activity_log ORDER BY sequence_number DESC LIMIT 1",
                [],
                |row| row.get(0),
            )
            .optional()
            .map_err(append_err("failed to read tail"))?;

        // Dropping `tx` on any early return rolls the transaction back.
        let pending = build(tail.as_deref())?;

        let id = Uuid::new_v4().to_string();
        let details = serde_json::to_string(&pending.details)?;
        let session_info = pending
            .session_info
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;

        tx.execute(
            "INSERT INTO activity_log (id, user_id, action, resource, resource_id, details,
                 session_info, created_at, content_hash, previous_hash, signature)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
            params![
                id,
                pending.user_id,
                pending.action,
                pending.resource,
                pending.resource_id,
                details,
                session_info,
                canonical_timestamp(pending.created_at),
                pending.content_hash,
                pending.previous_hash,
                pending.signature,
            ],
        )
        .map_err(append_err("failed to insert activity row"))?;

        let sequence = tx.last_insert_rowid();
        tx.commit().map_err(append_err("failed to commit append"))?;

        debug!(sequence, "activity row committed");
        Ok(pending.into_record(id, sequence as u64))
    }

    fn tail_content_hash(&self) -> ChronicleResult<Option<String>> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT content_hash FROM activity_log ORDER BY sequence_number DESC LIMIT 1",
            [],
            |row| row.get(0),
        )
        .optional()
        .map_err(storage_err("failed to read tail"))
    }

    fn recent_records(&self, limit: usize) -> ChronicleResult<Vec<ActivityRecord>> {
        let conn = self.lock()?;
        fetch_all(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM (
                     SELECT {COLUMNS} FROM activity_log ORDER BY sequence_number DESC LIMIT ?1
                 ) ORDER BY sequence_number ASC"
            ),
            [limit as i64],
        )
    }

    fn records_from(&self, from: u64, batch_size: usize) -> ChronicleResult<Vec<ActivityRecord>> {
        let conn = self.lock()?;
        fetch_all(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM activity_log WHERE sequence_number >= ?1
                 ORDER BY sequence_number ASC LIMIT ?2"
            ),
            [from as i64, batch_size as i64],
        )
    }

    fn record_before(&self, sequence_number: u64) -> ChronicleResult<Option<ActivityRecord>> {
        let conn = self.lock()?;
        fetch_one(
            &conn,
            &format!(
                "SELECT {COLUMNS} FROM activity_log WHERE sequence_number < ?1
                 ORDER BY sequence_number DESC LIMIT 1"
            ),
            sequence_number as i64,
        )
    }

    fn total_count(&self) -> ChronicleResult<u64> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM activity_log", [], |row| row.get(0))
            .map_err(storage_err("failed to count activity rows"))?;
        Ok(count as u64)
    }

    fn query(&self, filter: &ActivityFilter) -> ChronicleResult<Vec<ActivityRecord>> {
        let mut sql = format!("SELECT {COLUMNS} FROM activity_log WHERE 1 = 1");
        let mut args: Vec<String> = Vec::new();

        if let Some(user_id) = &filter.user_id {
            args.push(user_id.clone());
            sql.push_str(&format!(" AND user_id = ?{}", args.len()));
        }
        if let Some(resource) = &filter.resource {
            args.push(resource.clone());
            sql.push_str(&format!(" AND resource = ?{}", args.len()));
        }
        if let Some(action) = &filter.action {
            args.push(action.clone());
            sql.push_str(&format!(" AND action = ?{}", args.len()));
        }
        // Canonical timestamps are fixed-width UTC, so text order is time order.
        if let Some(since) = filter.since {
            args.push(canonical_timestamp(since));
            sql.push_str(&format!(" AND created_at >= ?{}", args.len()));
        }
        if let Some(until) = filter.until {
            args.push(canonical_timestamp(until));
            sql.push_str(&format!(" AND created_at < ?{}", args.len()));
        }

        let limit = filter.limit.map(|l| l as i64).unwrap_or(-1);
        let offset = filter.offset.unwrap_or(0) as i64;
        sql.push_str(&format!(
            " ORDER BY sequence_number DESC LIMIT {limit} OFFSET {offset}"
        ));

        let conn = self.lock()?;
        fetch_all(&conn, &sql, params_from_iter(args.iter()))
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> ChronicleResult<u64> {
        let conn = self.lock()?;
        let removed = conn
            .execute(
                "DELETE FROM activity_log WHERE created_at < ?1",
                [canonical_timestamp(cutoff)],
            )
            .map_err(storage_err("failed to purge activity rows"))?;

        info!(removed, cutoff = %cutoff, "purged activity records");
        Ok(removed as u64)
    }
}
