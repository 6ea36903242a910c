//! # chronicle-activity
//!
//! The typed logging facade for the Chronicle activity log.
//!
//! ## Overview
//!
//! [`ActivityLog`] turns application events into chain records:
//!
//! - `log_create`, `log_update`, `log_delete`, `log_action` build the
//!   `details` payload (scope, target, changes, impersonation) and append it.
//! - `log_update` drops no-op changes and writes nothing if none remain.
//! - `log_login_failure` is throttled per client address.
//! - `verify_chain`, `list` and `purge_older_than` delegate to the verifier
//!   and the store.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use chronicle_activity::{ActivityLog, ActorContext, LogOptions};
//! use chronicle_contracts::details::Target;
//!
//! let log = ActivityLog::from_config(store, signer, &config);
//! let actor = ActorContext::user("admin-1").with_session(session);
//! log.log_create(&actor, "users", Target::new("user", "u-42").named("Alice"), LogOptions::default())?;
//! ```

pub mod changes;
pub mod context;
pub mod facade;

pub use context::{ActingAs, ActorContext, LogOptions};
pub use facade::ActivityLog;

// ── Tests ─────────────────────────────────────────────────────────────────────
