//! Caller identity and per-call options for the facade.

use serde_json::Value;

use chronicle_contracts::details::{Impersonation, SessionInfo, Target};

/// The administrator really operating a session that belongs to another user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActingAs {
    pub actor_id: String,
    pub actor_name: Option<String>,
}

/// Who performed an action, and from where.
///
/// `user_id` is the effective (session) user. When an administrator is
/// acting as that user, `acting_as` names the administrator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorContext {
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub session: Option<SessionInfo>,
    pub acting_as: Option<ActingAs>,
}

impl ActorContext {
    pub fn user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Self::default()
        }
    }

    /// No user at all: background jobs and retention tasks.
    pub fn system() -> Self {
        Self::default()
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.user_name = Some(name.into());
        self
    }

    pub fn with_session(mut self, session: SessionInfo) -> Self {
        self.session = Some(session);
        self
    }

    pub fn acting_as(mut self, actor_id: impl Into<String>, actor_name: Option<String>) -> Self {
        self.acting_as = Some(ActingAs {
            actor_id: actor_id.into(),
            actor_name,
        });
        self
    }

    /// Both identities, if this context is an impersonated session.
    ///
    /// `None` without an effective user id, since there is no one being
    /// impersonated.
    pub(crate) fn impersonation(&self) -> Option<Impersonation> {
        let acting = self.acting_as.as_ref()?;
        let effective = self.user_id.as_ref()?;
        Some(Impersonation {
            actor_id: acting.actor_id.clone(),
            actor_name: acting.actor_name.clone(),
            effective_user_id: effective.clone(),
            effective_user_name: self.user_name.clone(),
        })
    }
}

/// Optional extras for a single log call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LogOptions {
    /// Overrides the record's `resource_id`, which defaults to the target id.
    pub resource_id: Option<String>,
    pub related_targets: Vec<Target>,
    pub metadata: Option<Value>,
    /// Takes precedence over the impersonation derived from the actor.
    pub impersonation: Option<Impersonation>,
}

impl LogOptions {
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_related(mut self, target: Target) -> Self {
        self.related_targets.push(target);
        self
    }

    pub fn with_resource_id(mut self, resource_id: impl Into<String>) -> Self {
        self.resource_id = Some(resource_id.into());
        self
    }
}
