//! Configuration schema and loader.
//!
//! A `ChronicleConfig` is deserialized from TOML. Every section is optional
//! and falls back to its defaults, so an empty document is a valid config.
//!
//! ```toml
//! [signing]
//! primary_key_env = "CHRONICLE_SIGNING_KEY"
//! legacy_key_envs = ["CHRONICLE_SIGNING_KEY_2025"]
//!
//! [verification]
//! quick_limit = 100
//! full_batch_size = 1000
//!
//! [login_failures]
//! max_attempts = 10
//! window_secs = 900
//!
//! [storage]
//! database_path = "chronicle.db"
//!
//! [[apps]]
//! app_id = "notes"
//! resources = ["notes", "note_shares"]
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use chronicle_contracts::{
    error::{ChronicleError, ChronicleResult},
    verification::{DEFAULT_FULL_BATCH_SIZE, DEFAULT_QUICK_LIMIT},
};

pub const DEFAULT_PRIMARY_KEY_ENV: &str = "CHRONICLE_SIGNING_KEY";
pub const DEFAULT_MAX_LOGIN_FAILURES: u32 = 10;
pub const DEFAULT_LOGIN_WINDOW_SECS: u64 = 900;
pub const DEFAULT_DATABASE_PATH: &str = "chronicle.db";

/// Names of the environment variables holding HMAC keys.
///
/// Key material never appears in the config file itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigningConfig {
    pub primary_key_env: String,

    /// Retired keys still accepted during verification, oldest last.
    pub legacy_key_envs: Vec<String>,
}

impl Default for SigningConfig {
    fn default() -> Self {
        Self {
            primary_key_env: DEFAULT_PRIMARY_KEY_ENV.to_string(),
            legacy_key_envs: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Window used by quick verification when the caller gives no limit.
    pub quick_limit: usize,

    /// Rows per round trip in full verification.
    pub full_batch_size: usize,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            quick_limit: DEFAULT_QUICK_LIMIT,
            full_batch_size: DEFAULT_FULL_BATCH_SIZE,
        }
    }
}

/// Per-IP throttle on `auth.login_failed` records.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoginFailureConfig {
    pub max_attempts: u32,
    pub window_secs: u64,
}

impl Default for LoginFailureConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_LOGIN_FAILURES,
            window_secs: DEFAULT_LOGIN_WINDOW_SECS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(DEFAULT_DATABASE_PATH),
        }
    }
}

/// An application module and the resource names it owns.
///
/// The `app_id` itself always counts as one of its resources.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppModule {
    pub app_id: String,

    #[serde(default)]
    pub resources: Vec<String>,
}

/// The top-level structure deserialized from a Chronicle config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChronicleConfig {
    pub signing: SigningConfig,
    pub verification: VerificationConfig,
    pub login_failures: LoginFailureConfig,
    pub storage: StorageConfig,
    pub apps: Vec<AppModule>,
}

impl ChronicleConfig {
    /// Parse `s` as TOML and validate the result.
    ///
    /// Returns `ChronicleError::ConfigError` if the TOML is malformed, does
    /// not match the schema, or holds an out-of-range value.
    pub fn from_toml_str(s: &str) -> ChronicleResult<Self> {
        let config: ChronicleConfig = toml::from_str(s).map_err(|e| ChronicleError::ConfigError {
            reason: format!("failed to parse config TOML: {}", e),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Read the file at `path` and parse it as a Chronicle config.
    pub fn from_file(path: &Path) -> ChronicleResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| ChronicleError::ConfigError {
            reason: format!("failed to read config file '{}': {}", path.display(), e),
        })?;
        Self::from_toml_str(&contents)
    }

    fn validate(&self) -> ChronicleResult<()> {
        if self.signing.primary_key_env.trim().is_empty() {
            return Err(invalid("signing.primary_key_env must name a variable"));
        }
        if self.verification.quick_limit == 0 {
            return Err(invalid("verification.quick_limit must be at least 1"));
        }
        if self.verification.full_batch_size == 0 {
            return Err(invalid("verification.full_batch_size must be at least 1"));
        }
        if self.login_failures.max_attempts == 0 {
            return Err(invalid("login_failures.max_attempts must be at least 1"));
        }
        if self.login_failures.window_secs == 0 {
            return Err(invalid("login_failures.window_secs must be at least 1"));
        }

        let mut seen = std::collections::HashSet::new();
        for app in &self.apps {
            if app.app_id.trim().is_empty() {
                return Err(invalid("apps entries need a non-empty app_id"));
            }
            if !seen.insert(app.app_id.as_str()) {
                return Err(ChronicleError::ConfigError {
                    reason: format!("app '{}' is declared more than once", app.app_id),
                });
            }
        }
        Ok(())
    }
}

fn invalid(reason: &str) -> ChronicleError {
    ChronicleError::ConfigError {
        reason: reason.to_string(),
    }
}
