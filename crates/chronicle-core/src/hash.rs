//! Content hashing: canonical serialization and SHA-256 of a record.
//!
//! Hash input is the JSON serialization of a `CanonicalPayload`:
//!
//!   userId, action, resource, resourceId, details, sessionInfo,
//!   createdAt (RFC 3339, whole seconds, `Z`), previousHash
//!
//! The payload passes through `serde_json::Value` first, whose object maps
//! are key-sorted, and every object member holding `null` is dropped. An
//! explicit `null` and an absent field therefore hash identically, which is
//! what lets a record read back from storage reproduce its write-time hash.

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use chronicle_contracts::{
    details::{ActivityDetails, SessionInfo},
    error::ChronicleResult,
    record::{ActivityCandidate, ActivityRecord},
};

/// The exact field set a record's `content_hash` commits to.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalPayload<'a> {
    user_id: Option<&'a str>,
    action: &'a str,
    resource: &'a str,
    resource_id: Option<&'a str>,
    details: &'a ActivityDetails,
    session_info: Option<&'a SessionInfo>,
    created_at: String,
    previous_hash: &'a str,
}

impl<'a> CanonicalPayload<'a> {
    /// Payload for a candidate about to be linked after `previous_hash`.
    pub fn for_candidate(
        candidate: &'a ActivityCandidate,
        created_at: DateTime<Utc>,
        previous_hash: &'a str,
    ) -> Self {
        Self {
            user_id: candidate.user_id.as_deref(),
            action: &candidate.action,
            resource: &candidate.resource,
            resource_id: candidate.resource_id.as_deref(),
            details: &candidate.details,
            session_info: candidate.session_info.as_ref(),
            created_at: canonical_timestamp(created_at),
            previous_hash,
        }
    }

    /// Payload rebuilt from a persisted record's stored fields.
    pub fn for_record(record: &'a ActivityRecord) -> Self {
        Self {
            user_id: record.user_id.as_deref(),
            action: &record.action,
            resource: &record.resource,
            resource_id: record.resource_id.as_deref(),
            details: &record.details,
            session_info: record.session_info.as_ref(),
            created_at: canonical_timestamp(record.created_at),
            previous_hash: &record.previous_hash,
        }
    }
}

/// Truncate `ts` to whole seconds.
///
/// Both the write path and the verify path go through this. Storage layers
/// may round-trip timestamps at a different sub-second precision, and a
/// single stray microsecond would read as tampering.
pub fn truncate_to_seconds(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.trunc_subsecs(0)
}

/// `YYYY-MM-DDTHH:MM:SSZ`, the form hashed and persisted.
pub fn canonical_timestamp(ts: DateTime<Utc>) -> String {
    truncate_to_seconds(ts).to_rfc3339_opts(SecondsFormat::Secs, true)
}

/// Compute the SHA-256 content hash of `payload`. Returns 64 lowercase hex chars.
pub fn content_hash(payload: &CanonicalPayload<'_>) -> ChronicleResult<String> {
    let bytes = canonical_bytes(payload)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

/// Recompute the content hash of a stored record.
pub fn recompute_record_hash(record: &ActivityRecord) -> ChronicleResult<String> {
    content_hash(&CanonicalPayload::for_record(record))
}

/// The exact string a link signature covers.
pub fn link_message(content_hash: &str, previous_hash: &str) -> String {
    format!("{content_hash}:{previous_hash}")
}

fn canonical_bytes(payload: &CanonicalPayload<'_>) -> ChronicleResult<Vec<u8>> {
    let mut value = serde_json::to_value(payload)?;
    strip_nulls(&mut value);
    Ok(serde_json::to_vec(&value)?)
}

/// Remove `null` object members at every depth. Array positions are kept.
fn strip_nulls(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            for v in map.values_mut() {
                strip_nulls(v);
            }
        }
        Value::Array(items) => {
            for v in items {
                strip_nulls(v);
            }
        }
        _ => {}
    }
}
