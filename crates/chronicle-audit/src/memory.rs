//! In-memory implementation of `ActivityStore`.
//!
//! `InMemoryActivityStore` keeps every record in a `Vec` behind a `Mutex`.
//! The mutex stands in for the tail row lock: `append_under_lock` holds it
//! from the tail read through the push, so concurrent appenders are
//! linearized exactly as they would be by a database row lock.
//!
//! Handles are cheap to clone and share the same log.

use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use tracing::info;
use uuid::Uuid;

use chronicle_contracts::{
    error::{ChronicleError, ChronicleResult},
    record::{ActivityFilter, ActivityRecord},
};
use chronicle_core::{
    hash::truncate_to_seconds,
    traits::{ActivityStore, LinkBuilder},
};

// ── Internal mutable state ────────────────────────────────────────────────────

/// The mutable interior of an `InMemoryActivityStore`.
pub(crate) struct InMemoryState {
    /// All surviving records, in ascending sequence order.
    pub(crate) records: Vec<ActivityRecord>,

    /// The next sequence number to assign. Starts at 1 and never rewinds,
    /// not even after a purge.
    pub(crate) next_sequence: u64,
}

// ── Public store ──────────────────────────────────────────────────────────────

/// An append-only activity store held entirely in memory.
#[derive(Clone)]
pub struct InMemoryActivityStore {
    pub(crate) state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        let state = InMemoryState {
            records: Vec::new(),
            next_sequence: 1,
        };
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    /// Mutate a stored record in place, bypassing the chain entirely.
    ///
    /// This is what an attacker with direct storage access can do; detection
    /// drills and tests use it to confirm verification notices. Returns
    /// `false` when no record has that sequence number.
    pub fn tamper(
        &self,
        sequence_number: u64,
        mutate: impl FnOnce(&mut ActivityRecord),
    ) -> ChronicleResult<bool> {
        let mut state = self.lock()?;
        let idx = state
            .records
            .binary_search_by_key(&sequence_number, |r| r.sequence_number);
        match idx {
            Ok(i) => {
                mutate(&mut state.records[i]);
                Ok(true)
            }
            Err(_) => Ok(false),
        }
    }

    /// Remove one record from the middle of the log, bypassing retention.
    ///
    /// Companion to `tamper` for deletion drills.
    pub fn excise(&self, sequence_number: u64) -> ChronicleResult<bool> {
        let mut state = self.lock()?;
        let before = state.records.len();
        state.records.retain(|r| r.sequence_number != sequence_number);
        Ok(state.records.len() != before)
    }

    fn lock(&self) -> ChronicleResult<MutexGuard<'_, InMemoryState>> {
        self.state.lock().map_err(|e| ChronicleError::StorageUnavailable {
            reason: format!("activity store lock poisoned: {}", e),
        })
    }
}

impl Default for InMemoryActivityStore {
    fn default() -> Self {
        Self::new()
    }
}

// ── ActivityStore impl ────────────────────────────────────────────────────────

impl ActivityStore for InMemoryActivityStore {
    fn append_under_lock(&self, build: &mut LinkBuilder<'_>) -> ChronicleResult<ActivityRecord> {
        let mut state = self.state.lock().map_err(|e| ChronicleError::AppendFailed {
            reason: format!("activity store lock poisoned: {}", e),
        })?;

        let tail = state.records.last().map(|r| r.content_hash.clone());

        // Nothing has been mutated yet, so an error here leaves no trace.
        let pending = build(tail.as_deref())?;

        let sequence = state.next_sequence;
        let record = pending.into_record(Uuid::new_v4().to_string(), sequence);

        state.records.push(record.clone());
        state.next_sequence += 1;

        Ok(record)
    }

    fn tail_content_hash(&self) -> ChronicleResult<Option<String>> {
        let state = self.lock()?;
        Ok(state.records.last().map(|r| r.content_hash.clone()))
    }

    fn recent_records(&self, limit: usize) -> ChronicleResult<Vec<ActivityRecord>> {
        let state = self.lock()?;
        let start = state.records.len().saturating_sub(limit);
        Ok(state.records[start..].to_vec())
    }

    fn records_from(&self, from: u64, batch_size: usize) -> ChronicleResult<Vec<ActivityRecord>> {
        let state = self.lock()?;
        let start = state.records.partition_point(|r| r.sequence_number < from);
        Ok(state.records[start..].iter().take(batch_size).cloned().collect())
    }

    fn record_before(&self, sequence_number: u64) -> ChronicleResult<Option<ActivityRecord>> {
        let state = self.lock()?;
        let idx = state
            .records
            .partition_point(|r| r.sequence_number < sequence_number);
        Ok(idx.checked_sub(1).map(|i| state.records[i].clone()))
    }

    fn total_count(&self) -> ChronicleResult<u64> {
        Ok(self.lock()?.records.len() as u64)
    }

    fn query(&self, filter: &ActivityFilter) -> ChronicleResult<Vec<ActivityRecord>> {
        let state = self.lock()?;
        Ok(state
            .records
            .iter()
            .rev()
            .filter(|r| filter.matches(r))
            .skip(filter.offset.unwrap_or(0))
            .take(filter.limit.unwrap_or(usize::MAX))
            .cloned()
            .collect())
    }

    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> ChronicleResult<u64> {
        let cutoff = truncate_to_seconds(cutoff);
        let mut state = self.lock()?;
        let before = state.records.len();
        state.records.retain(|r| r.created_at >= cutoff);
        let removed = (before - state.records.len()) as u64;

        info!(removed, cutoff = %cutoff, "purged activity records");
        Ok(removed)
    }
}
