//! Authorization decision types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::OwnerRef;

/// Authorization decision with the facts that produced it
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decision {
    /// Unique decision ID
    pub id: String,

    /// Whether the operation is allowed
    pub allowed: bool,

    /// Step of the decision procedure that determined the outcome
    pub reason: DecisionReason,

    /// Action token checked, once computed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    /// Scope the instance currently belongs to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_owner: Option<OwnerRef>,

    /// Scope the payload moves the instance into
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_owner: Option<OwnerRef>,

    pub timestamp: DateTime<Utc>,
}

impl Decision {
    /// Create an allow decision
    pub fn allow(reason: DecisionReason) -> Self {
        Self::new(true, reason)
    }

    /// Create a deny decision
    pub fn deny(reason: DecisionReason) -> Self {
        Self::new(false, reason)
    }

    fn new(allowed: bool, reason: DecisionReason) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            allowed,
            reason,
            action: None,
            current_owner: None,
            target_owner: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_action(mut self, action: impl Into<String>) -> Self {
        self.action = Some(action.into());
        self
    }

    pub fn with_current_owner(mut self, owner: Option<OwnerRef>) -> Self {
        self.current_owner = owner;
        self
    }

    pub fn with_target_owner(mut self, owner: Option<OwnerRef>) -> Self {
        self.target_owner = owner;
        self
    }
}

/// Reason for an authorization decision
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// No principal attached
    Anonymous,

    /// Principal holds the global admin role
    Admin,

    /// New owner instance; there is no scope to check yet
    OwnerCreation,

    /// Current owner could not be determined (fail-open unless disabled)
    UnresolvedOwner,

    /// Current owner is the principal itself
    SelfAccess,

    /// Permission granted in every scope involved
    Granted,

    /// Permission missing in the current scope
    DeniedInCurrent,

    /// Permission missing in the scope the instance moves into
    DeniedInTarget,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Anonymous => "anonymous",
            Self::Admin => "admin",
            Self::OwnerCreation => "owner_creation",
            Self::UnresolvedOwner => "unresolved_owner",
            Self::SelfAccess => "self_access",
            Self::Granted => "granted",
            Self::DeniedInCurrent => "denied_in_current",
            Self::DeniedInTarget => "denied_in_target",
        }
    }
}

impl std::fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
