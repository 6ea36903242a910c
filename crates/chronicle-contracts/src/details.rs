//! The structured `details` payload carried by every activity record.
//!
//! The payload is typed rather than an open map so the content hasher has a
//! stable serialization contract. Optional members are omitted from JSON when
//! absent, which keeps the persisted form identical to what was hashed.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Where an event happened: the platform itself, or one application module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Scope {
    /// Platform-level resources (users, roles, sessions, settings).
    System,
    /// A resource owned by an application module.
    App {
        #[serde(rename = "appId")]
        app_id: String,
    },
}

/// The entity an event acted on.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Target {
    /// Entity type, e.g. `"user"` or `"note"`.
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Display name captured at the time of the event.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl Target {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: Some(id.into()),
            name: None,
        }
    }

    /// A target with no identifier, e.g. an unknown login name.
    pub fn anonymous(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: None,
            name: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

/// One field-level change recorded by an update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Change {
    /// A scalar or object field moved from one value to another.
    Set {
        field: String,
        #[serde(default)]
        from: Value,
        #[serde(default)]
        to: Value,
    },

    /// Items were added to or removed from a collection field.
    Items {
        field: String,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        added: Vec<Value>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        removed: Vec<Value>,
    },
}

impl Change {
    pub fn set(field: impl Into<String>, from: impl Into<Value>, to: impl Into<Value>) -> Self {
        Change::Set {
            field: field.into(),
            from: from.into(),
            to: to.into(),
        }
    }

    pub fn items(field: impl Into<String>, added: Vec<Value>, removed: Vec<Value>) -> Self {
        Change::Items {
            field: field.into(),
            added,
            removed,
        }
    }

    pub fn field(&self) -> &str {
        match self {
            Change::Set { field, .. } | Change::Items { field, .. } => field,
        }
    }
}

/// The real and effective identities when an administrator acts as another user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Impersonation {
    /// The administrator who is actually operating the session.
    pub actor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actor_name: Option<String>,

    /// The user the administrator is acting as.
    pub effective_user_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effective_user_name: Option<String>,
}

/// The semantic payload of an activity record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityDetails {
    pub scope: Scope,
    pub target: Target,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub related_targets: Vec<Target>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub changes: Vec<Change>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub impersonation: Option<Impersonation>,
}

impl ActivityDetails {
    pub fn new(scope: Scope, target: Target) -> Self {
        Self {
            scope,
            target,
            related_targets: Vec::new(),
            changes: Vec::new(),
            metadata: None,
            impersonation: None,
        }
    }
}

/// Snapshot of the caller's session at the time of the action.
///
/// Copied into the record so it survives deletion of the session itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip_address: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}
