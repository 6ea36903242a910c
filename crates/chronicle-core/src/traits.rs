//! Trait seams between the chain engines and their collaborators.
//!
//! - `ActivityStore`: the append-only relational store (external)
//! - `LinkSigner`: keyed MAC over each chain link (keys are external)
//!
//! The append engine and the chain verifier are written against these
//! traits only. Nothing above this layer holds chain state in memory.

use chrono::{DateTime, Utc};

use chronicle_contracts::{
    error::ChronicleResult,
    record::{ActivityFilter, ActivityRecord, PendingRecord},
};

/// Builds the next record given the tail's `content_hash`.
///
/// Receives `None` when the log is empty.
pub type LinkBuilder<'a> = dyn FnMut(Option<&str>) -> ChronicleResult<PendingRecord> + 'a;

/// The append-only store behind the activity log.
///
/// Implementations must assign `sequence_number` themselves (monotonic,
/// gapless) and must make `append_under_lock` atomic: either the row is
/// committed and visible, or nothing is.
pub trait ActivityStore: Send + Sync {
    /// Lock the tail, hand its `content_hash` to `build`, insert the result.
    ///
    /// The lock is held from the tail read until commit, so no two callers
    /// can observe the same tail. If `build` fails the transaction is rolled
    /// back and its error returned unchanged.
    fn append_under_lock(&self, build: &mut LinkBuilder<'_>) -> ChronicleResult<ActivityRecord>;

    /// `content_hash` of the current tail, or `None` for an empty log.
    fn tail_content_hash(&self) -> ChronicleResult<Option<String>>;

    /// The newest `limit` records, in ascending sequence order.
    fn recent_records(&self, limit: usize) -> ChronicleResult<Vec<ActivityRecord>>;

    /// Up to `batch_size` records with `sequence_number >= from`, ascending.
    fn records_from(&self, from: u64, batch_size: usize) -> ChronicleResult<Vec<ActivityRecord>>;

    /// The record with the greatest sequence number below `sequence_number`.
    fn record_before(&self, sequence_number: u64) -> ChronicleResult<Option<ActivityRecord>>;

    fn total_count(&self) -> ChronicleResult<u64>;

    /// Records matching `filter`, newest first, with pagination applied.
    fn query(&self, filter: &ActivityFilter) -> ChronicleResult<Vec<ActivityRecord>>;

    /// Delete every record created before `cutoff`. Returns the number removed.
    ///
    /// The comparison is at whole-second precision: `cutoff` is truncated
    /// with `truncate_to_seconds` first, so a record stamped 12:00:00 survives
    /// a cutoff of 12:00:00.5.
    ///
    /// Not chain-aware: the oldest surviving record keeps its original
    /// `previous_hash`, so full verification from GENESIS fails afterwards.
    fn purge_older_than(&self, cutoff: DateTime<Utc>) -> ChronicleResult<u64>;
}

/// Keyed signing of chain links.
///
/// `verify` never errors: an unverifiable signature is simply `false`, which
/// the verifier reports as a detected tamper.
pub trait LinkSigner: Send + Sync {
    /// Sign `message` with the primary key. Returns lowercase hex.
    fn sign(&self, message: &str) -> String;

    /// True if `signature` validates under the primary key or any legacy key.
    fn verify(&self, message: &str, signature: &str) -> bool;
}
