//! HMAC-SHA256 link signer with legacy-key acceptance.
//!
//! New links are always signed with the primary key. Verification accepts a
//! signature produced by the primary key or by any legacy key, so rotating
//! the primary key does not invalidate historical links. Where the keys
//! come from is the caller's concern.

use std::fmt;

use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::warn;

use chronicle_contracts::error::{ChronicleError, ChronicleResult};
use chronicle_core::traits::LinkSigner;

type HmacSha256 = Hmac<Sha256>;

/// An ordered key ring: `[primary, legacy...]`.
///
/// Each key is kept as a keyed MAC instance and cloned per operation, so
/// signing never re-validates key material.
#[derive(Clone)]
pub struct HmacSigner {
    primary: HmacSha256,
    legacy: Vec<HmacSha256>,
}

impl HmacSigner {
    /// Build a signer with `primary` as the only key.
    ///
    /// Returns `ChronicleError::Signing` for an empty key.
    pub fn new(primary: impl AsRef<[u8]>) -> ChronicleResult<Self> {
        Ok(Self {
            primary: keyed_mac(primary.as_ref())?,
            legacy: Vec::new(),
        })
    }

    /// Add a retired key that is still accepted during verification.
    pub fn with_legacy_key(mut self, key: impl AsRef<[u8]>) -> ChronicleResult<Self> {
        self.legacy.push(keyed_mac(key.as_ref())?);
        Ok(self)
    }

    /// Load keys from the named environment variables.
    ///
    /// The primary variable must be set and non-empty. Legacy variables that
    /// are unset are skipped with a warning.
    pub fn from_env(primary_var: &str, legacy_vars: &[String]) -> ChronicleResult<Self> {
        let primary = std::env::var(primary_var).map_err(|_| ChronicleError::ConfigError {
            reason: format!("signing key variable '{}' is not set", primary_var),
        })?;
        let mut signer = Self::new(primary.as_bytes())?;

        for var in legacy_vars {
            match std::env::var(var) {
                Ok(key) if !key.is_empty() => signer = signer.with_legacy_key(key.as_bytes())?,
                _ => warn!(variable = %var, "legacy signing key variable not set, skipping"),
            }
        }
        Ok(signer)
    }

    pub fn legacy_key_count(&self) -> usize {
        self.legacy.len()
    }
}

fn keyed_mac(key: &[u8]) -> ChronicleResult<HmacSha256> {
    if key.is_empty() {
        return Err(ChronicleError::Signing {
            reason: "HMAC key must not be empty".to_string(),
        });
    }
    HmacSha256::new_from_slice(key).map_err(|e| ChronicleError::Signing {
        reason: format!("invalid HMAC key: {}", e),
    })
}

impl LinkSigner for HmacSigner {
    fn sign(&self, message: &str) -> String {
        let mut mac = self.primary.clone();
        mac.update(message.as_bytes());
        hex::encode(mac.finalize().into_bytes())
    }

    fn verify(&self, message: &str, signature: &str) -> bool {
        let Ok(sig_bytes) = hex::decode(signature) else {
            return false;
        };

        std::iter::once(&self.primary)
            .chain(self.legacy.iter())
            .any(|key| {
                let mut mac = key.clone();
                mac.update(message.as_bytes());
                mac.verify_slice(&sig_bytes).is_ok()
            })
    }
}

impl fmt::Debug for HmacSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HmacSigner")
            .field("legacy_keys", &self.legacy.len())
            .finish_non_exhaustive()
    }
}
