//! Verification options and the result contract.
//!
//! `VerificationResult` serializes to the JSON shape that API and UI layers
//! render directly:
//!
//! ```json
//! { "valid": false, "totalEntries": 3, "checkedEntries": 1, "mode": "full",
//!   "brokenAt": { "id": "…", "sequenceNumber": 2, "reason": "content_modified",
//!                 "expected": "…", "actual": "…" } }
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

/// Number of most recent records a quick verification examines by default.
pub const DEFAULT_QUICK_LIMIT: usize = 100;

/// Rows fetched per batch during a full verification.
pub const DEFAULT_FULL_BATCH_SIZE: usize = 1000;

/// How much of the chain to examine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationMode {
    /// The most recent `limit` records, anchored on their predecessor.
    #[default]
    Quick,
    /// Every record from GENESIS onwards.
    Full,
}

impl fmt::Display for VerificationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VerificationMode::Quick => write!(f, "quick"),
            VerificationMode::Full => write!(f, "full"),
        }
    }
}

/// Caller-facing options for `verify_chain`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOptions {
    #[serde(default)]
    pub mode: VerificationMode,
    /// Quick mode only. Defaults to `DEFAULT_QUICK_LIMIT`.
    #[serde(default)]
    pub limit: Option<usize>,
}

impl VerifyOptions {
    pub fn quick(limit: usize) -> Self {
        Self {
            mode: VerificationMode::Quick,
            limit: Some(limit),
        }
    }

    pub fn full() -> Self {
        Self {
            mode: VerificationMode::Full,
            limit: None,
        }
    }
}

/// Why verification stopped at a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BreakReason {
    /// The stored `content_hash` does not match the recomputed hash.
    ContentModified,
    /// The stored `previous_hash` does not match the prior record's hash.
    ChainBreak,
    /// The signature does not validate under any accepted key.
    InvalidSignature,
}

impl fmt::Display for BreakReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BreakReason::ContentModified => "content_modified",
            BreakReason::ChainBreak => "chain_break",
            BreakReason::InvalidSignature => "invalid_signature",
        };
        f.write_str(s)
    }
}

/// The first point of divergence found by a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenAt {
    pub id: String,
    pub sequence_number: u64,
    pub reason: BreakReason,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
}

/// Outcome of a verification run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerificationResult {
    pub valid: bool,
    /// Records in the log when the run started.
    pub total_entries: u64,
    /// Records that passed every check before the run ended.
    pub checked_entries: u64,
    pub mode: VerificationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broken_at: Option<BrokenAt>,
}

impl VerificationResult {
    pub fn passed(mode: VerificationMode, total_entries: u64, checked_entries: u64) -> Self {
        Self {
            valid: true,
            total_entries,
            checked_entries,
            mode,
            broken_at: None,
        }
    }

    pub fn failed(
        mode: VerificationMode,
        total_entries: u64,
        checked_entries: u64,
        broken_at: BrokenAt,
    ) -> Self {
        Self {
            valid: false,
            total_entries,
            checked_entries,
            mode,
            broken_at: Some(broken_at),
        }
    }
}
