//! Activity records and the shapes that flow into and out of storage.
//!
//! `ActivityCandidate` is what the facade builds. The append engine turns it
//! into a `PendingRecord` (timestamp, hashes, signature) under the tail lock,
//! and the store persists that as an `ActivityRecord`, assigning `id` and
//! `sequence_number`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::details::{ActivityDetails, SessionInfo};

/// The sentinel `previous_hash` of the first record ever written.
///
/// 64 hex zeros, the width of a SHA-256 digest.
pub const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// One persisted row of the activity log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityRecord {
    /// Opaque identifier assigned by the store.
    pub id: String,

    /// Storage-assigned chain position. Gapless and strictly increasing.
    pub sequence_number: u64,

    /// The acting user, or `None` for unauthenticated events.
    pub user_id: Option<String>,

    /// `"<resource>.<verb>"`, e.g. `"users.create"`.
    pub action: String,

    pub resource: String,
    pub resource_id: Option<String>,
    pub details: ActivityDetails,
    pub session_info: Option<SessionInfo>,

    /// Creation time, truncated to whole seconds.
    pub created_at: DateTime<Utc>,

    /// SHA-256 (hex) of the canonical content, including `previous_hash`.
    pub content_hash: String,

    /// `content_hash` of the preceding record, or `GENESIS_HASH`.
    pub previous_hash: String,

    /// HMAC (hex) over `"<content_hash>:<previous_hash>"`.
    pub signature: String,
}

/// The semantic content of an event, before it is linked into the chain.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityCandidate {
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: ActivityDetails,
    pub session_info: Option<SessionInfo>,
}

/// A fully linked record awaiting insertion.
///
/// Carries everything except the storage-assigned `id` and `sequence_number`.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRecord {
    pub user_id: Option<String>,
    pub action: String,
    pub resource: String,
    pub resource_id: Option<String>,
    pub details: ActivityDetails,
    pub session_info: Option<SessionInfo>,
    pub created_at: DateTime<Utc>,
    pub content_hash: String,
    pub previous_hash: String,
    pub signature: String,
}

impl PendingRecord {
    /// Attach the storage-assigned identity, producing the persisted record.
    pub fn into_record(self, id: String, sequence_number: u64) -> ActivityRecord {
        ActivityRecord {
            id,
            sequence_number,
            user_id: self.user_id,
            action: self.action,
            resource: self.resource,
            resource_id: self.resource_id,
            details: self.details,
            session_info: self.session_info,
            created_at: self.created_at,
            content_hash: self.content_hash,
            previous_hash: self.previous_hash,
            signature: self.signature,
        }
    }
}

/// Filter for list/query reads. Results are newest first.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityFilter {
    pub user_id: Option<String>,
    pub resource: Option<String>,
    pub action: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub since: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub until: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: Option<usize>,
}

impl ActivityFilter {
    /// Whether `record` satisfies every criterion except pagination.
    pub fn matches(&self, record: &ActivityRecord) -> bool {
        if let Some(user_id) = &self.user_id {
            if record.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(resource) = &self.resource {
            if &record.resource != resource {
                return false;
            }
        }
        if let Some(action) = &self.action {
            if &record.action != action {
                return false;
            }
        }
        if let Some(since) = self.since {
            if record.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if record.created_at >= until {
                return false;
            }
        }
        true
    }
}
