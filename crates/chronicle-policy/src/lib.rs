//! # chronicle-policy
//!
//! Deployment policy for the Chronicle activity log, loaded from TOML.
//!
//! ## Overview
//!
//! - [`ChronicleConfig`] holds signing key variable names, verification
//!   limits, the login-failure throttle, the database path and the
//!   application modules.
//! - [`ScopeClassifier`] labels a resource `app` or `system` from the
//!   configured `[[apps]]` table.
//! - [`LoginRateLimiter`] bounds `auth.login_failed` records per client
//!   address per time window.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::path::Path;
//! use chronicle_policy::{ChronicleConfig, ScopeClassifier};
//!
//! let config = ChronicleConfig::from_file(Path::new("chronicle.toml"))?;
//! let scopes = ScopeClassifier::new(&config.apps);
//! ```

pub mod config;
pub mod limiter;
pub mod scope;

pub use config::{AppModule, ChronicleConfig};
pub use limiter::LoginRateLimiter;
pub use scope::ScopeClassifier;

// ── Tests ─────────────────────────────────────────────────────────────────────
