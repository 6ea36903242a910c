//! The activity log facade.
//!
//! `ActivityLog` is what application code talks to. Each call:
//!
//!   classify scope → build details → enrich impersonation → append
//!
//! Appending and verification are delegated to `AppendEngine` and
//! `ChainVerifier`. The facade holds no chain state of its own, so one
//! instance may be shared across threads behind an `Arc`.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{debug, warn};

use chronicle_contracts::{
    details::{ActivityDetails, Change, SessionInfo, Target},
    error::ChronicleResult,
    record::{ActivityCandidate, ActivityFilter, ActivityRecord},
    verification::{VerificationResult, VerifyOptions},
};
use chronicle_core::{
    traits::{ActivityStore, LinkSigner},
    AppendEngine,
};
use chronicle_policy::{ChronicleConfig, LoginRateLimiter, ScopeClassifier};
use chronicle_verify::ChainVerifier;

use crate::{
    changes::effective_changes,
    context::{ActorContext, LogOptions},
};

pub const LOGIN_FAILED_ACTION: &str = "auth.login_failed";
pub const AUTH_RESOURCE: &str = "auth";

/// Throttle bucket for login failures with no client address.
const UNKNOWN_CLIENT: &str = "unknown";

/// Typed, thread-safe entry point to the activity log.
pub struct ActivityLog {
    engine: AppendEngine,
    verifier: ChainVerifier,
    scopes: ScopeClassifier,
    login_limiter: LoginRateLimiter,
}

impl ActivityLog {
    /// A facade with default configuration and no application modules.
    pub fn new(store: Arc<dyn ActivityStore>, signer: Arc<dyn LinkSigner>) -> Self {
        Self::from_config(store, signer, &ChronicleConfig::default())
    }

    pub fn from_config(
        store: Arc<dyn ActivityStore>,
        signer: Arc<dyn LinkSigner>,
        config: &ChronicleConfig,
    ) -> Self {
        let verifier = ChainVerifier::new(store.clone(), signer.clone())
            .with_quick_limit(config.verification.quick_limit)
            .with_batch_size(config.verification.full_batch_size);

        Self {
            engine: AppendEngine::new(store, signer),
            verifier,
            scopes: ScopeClassifier::new(&config.apps),
            login_limiter: LoginRateLimiter::from_config(&config.login_failures),
        }
    }

    /// Record `"<resource>.create"`.
    pub fn log_create(
        &self,
        actor: &ActorContext,
        resource: &str,
        target: Target,
        opts: LogOptions,
    ) -> ChronicleResult<ActivityRecord> {
        self.write(actor, "create", resource, target, Vec::new(), opts)
    }

    /// Record `"<resource>.update"` with its effective changes.
    ///
    /// Returns `Ok(None)` without writing when every change is a no-op.
    pub fn log_update(
        &self,
        actor: &ActorContext,
        resource: &str,
        target: Target,
        changes: Vec<Change>,
        opts: LogOptions,
    ) -> ChronicleResult<Option<ActivityRecord>> {
        let changes = effective_changes(changes);
        if changes.is_empty() {
            debug!(
                resource = %resource,
                target_id = ?target.id,
                "update had no effective changes, skipped"
            );
            return Ok(None);
        }
        self.write(actor, "update", resource, target, changes, opts).map(Some)
    }

    /// Record `"<resource>.delete"`.
    pub fn log_delete(
        &self,
        actor: &ActorContext,
        resource: &str,
        target: Target,
        opts: LogOptions,
    ) -> ChronicleResult<ActivityRecord> {
        self.write(actor, "delete", resource, target, Vec::new(), opts)
    }

    /// Record `"<resource>.<verb>"` for anything outside create/update/delete.
    pub fn log_action(
        &self,
        actor: &ActorContext,
        verb: &str,
        resource: &str,
        target: Target,
        opts: LogOptions,
    ) -> ChronicleResult<ActivityRecord> {
        self.write(actor, verb, resource, target, Vec::new(), opts)
    }

    /// Record a failed sign-in, subject to the per-address throttle.
    ///
    /// Returns `Ok(false)` when throttled; that is not an error. An attempt
    /// whose append fails is handed back to the throttle, so only recorded
    /// failures count toward the limit.
    pub fn log_login_failure(
        &self,
        identifier: &str,
        reason: &str,
        ip: Option<&str>,
    ) -> ChronicleResult<bool> {
        let client = ip.unwrap_or(UNKNOWN_CLIENT);
        if !self.login_limiter.allow(client, Utc::now()) {
            return Ok(false);
        }

        let mut metadata = json!({ "reason": reason });
        if let Some(addr) = ip {
            metadata["ip"] = json!(addr);
        }

        let mut details = ActivityDetails::new(
            self.scopes.classify(AUTH_RESOURCE),
            Target::anonymous("user").named(identifier),
        );
        details.metadata = Some(metadata);

        let session_info = ip.map(|addr| SessionInfo {
            ip_address: Some(addr.to_string()),
            ..SessionInfo::default()
        });

        let appended = self.engine.append(&ActivityCandidate {
            user_id: None,
            action: LOGIN_FAILED_ACTION.to_string(),
            resource: AUTH_RESOURCE.to_string(),
            resource_id: None,
            details,
            session_info,
        });
        if appended.is_err() {
            self.login_limiter.release(client);
        }
        appended.map(|_| true)
    }

    pub fn verify_chain(&self, opts: &VerifyOptions) -> ChronicleResult<VerificationResult> {
        self.verifier.verify(opts)
    }

    /// Records matching `filter`, newest first.
    pub fn list(&self, filter: &ActivityFilter) -> ChronicleResult<Vec<ActivityRecord>> {
        self.engine.store().query(filter)
    }

    /// Delete every record created before `cutoff`. Returns the number removed.
    pub fn purge_older_than(&self, cutoff: DateTime<Utc>) -> ChronicleResult<u64> {
        let removed = self.engine.store().purge_older_than(cutoff)?;
        if removed > 0 {
            warn!(
                removed,
                cutoff = %cutoff,
                "purged activity records; full verification from GENESIS will report a chain break at the oldest survivor"
            );
        }
        Ok(removed)
    }

    fn write(
        &self,
        actor: &ActorContext,
        verb: &str,
        resource: &str,
        target: Target,
        changes: Vec<Change>,
        opts: LogOptions,
    ) -> ChronicleResult<ActivityRecord> {
        let resource_id = opts.resource_id.or_else(|| target.id.clone());

        let details = ActivityDetails {
            scope: self.scopes.classify(resource),
            target,
            related_targets: opts.related_targets,
            changes,
            metadata: opts.metadata,
            impersonation: opts.impersonation.or_else(|| actor.impersonation()),
        };

        self.engine.append(&ActivityCandidate {
            user_id: actor.user_id.clone(),
            action: format!("{resource}.{verb}"),
            resource: resource.to_string(),
            resource_id,
            details,
            session_info: actor.session.clone(),
        })
    }
}
