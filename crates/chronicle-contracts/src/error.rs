//! Error types for the Chronicle activity log.
//!
//! Every fallible operation returns `ChronicleResult<T>`. Chain-integrity
//! violations are deliberately absent from this enum: they are reported as
//! data in `VerificationResult::broken_at`, never raised.

use thiserror::Error;

/// The unified error type for the Chronicle crates.
#[derive(Debug, Error)]
pub enum ChronicleError {
    /// The backing store could not be reached or a read failed.
    #[error("storage unavailable: {reason}")]
    StorageUnavailable { reason: String },

    /// An append transaction aborted. Nothing was committed; the caller may retry.
    #[error("append failed: {reason}")]
    AppendFailed { reason: String },

    /// A record or payload could not be serialized or deserialized.
    #[error("serialization error: {reason}")]
    Serialization { reason: String },

    /// The link signer could not be constructed or used.
    #[error("signing error: {reason}")]
    Signing { reason: String },

    /// A required configuration value is missing or invalid.
    #[error("configuration error: {reason}")]
    ConfigError { reason: String },
}

impl From<serde_json::Error> for ChronicleError {
    fn from(e: serde_json::Error) -> Self {
        ChronicleError::Serialization {
            reason: e.to_string(),
        }
    }
}

/// Convenience alias used throughout the Chronicle crates.
pub type ChronicleResult<T> = Result<T, ChronicleError>;
