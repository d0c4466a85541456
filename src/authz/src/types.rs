//! Core authorization types

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;

use crate::error::AuthzError;

/// Principal identifier (opaque user id)
pub type PrincipalId = String;

/// Built-in action tokens
pub mod actions {
    /// Read access
    pub const READ: &str = "READ";
    /// Write access
    pub const WRITE: &str = "WRITE";
    /// Manage access (create, destroy, membership)
    pub const MANAGE: &str = "MANAGE";
    /// Wildcard granting every action of a type
    pub const ALL: &str = "*";
}

/// Canonical scope handle: the owner a resource belongs to.
///
/// Two owners are equal iff both `owner_type` and `id` match.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct OwnerRef {
    /// Owner model name (e.g. "Team", "User")
    #[serde(rename = "type")]
    pub owner_type: String,

    /// Owner instance id
    pub id: String,
}

impl OwnerRef {
    /// Create a new owner reference
    pub fn new(owner_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            owner_type: owner_type.into(),
            id: id.into(),
        }
    }

    /// Parse a combined owner value: either `"type:id"` or `{"type": .., "id": ..}`
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => s.parse().ok(),
            Value::Object(map) => {
                let owner_type = map.get("type").and_then(Value::as_str)?;
                let id = map.get("id").and_then(id_from_value)?;
                if owner_type.is_empty() {
                    return None;
                }
                Some(Self::new(owner_type, id))
            }
            _ => None,
        }
    }
}

impl fmt::Display for OwnerRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.owner_type, self.id)
    }
}

impl FromStr for OwnerRef {
    type Err = AuthzError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once(':') {
            Some((owner_type, id)) if !owner_type.is_empty() && !id.is_empty() => {
                Ok(Self::new(owner_type, id))
            }
            _ => Err(AuthzError::InvalidInput(format!(
                "Owner reference must be 'type:id', got '{}'",
                s
            ))),
        }
    }
}

/// Coerce a JSON id (string or number) to its opaque string form
pub fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Per-operation authorization facts.
///
/// Built by the host for each inbound write/execute operation and passed
/// explicitly through every resolver call. Never shared across requests.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AccessContext {
    /// Model being acted upon
    pub resource_type: String,

    /// Method name (e.g. "create", "updateAttributes", "__create__docs")
    pub method: String,

    /// Id of the acted-upon instance, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_id: Option<String>,

    /// Incoming payload (create/update data)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,

    /// Requesting principal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub principal_id: Option<PrincipalId>,
}

impl AccessContext {
    /// Create a context for a method on a model
    pub fn new(resource_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            resource_type: resource_type.into(),
            method: method.into(),
            ..Default::default()
        }
    }

    /// Set the acted-upon instance id
    pub fn with_instance(mut self, id: impl Into<String>) -> Self {
        self.instance_id = Some(id.into());
        self
    }

    /// Set the incoming payload
    pub fn with_payload(mut self, payload: Value) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Set the requesting principal
    pub fn with_principal(mut self, principal: impl Into<PrincipalId>) -> Self {
        self.principal_id = Some(principal.into());
        self
    }
}

/// Facts for a read operation passing through the query filter
#[derive(Debug, Clone, Default)]
pub struct ReadContext {
    /// Model being queried
    pub model: String,

    /// Requesting principal
    pub principal_id: Option<PrincipalId>,

    /// Caller marked the read as privileged (skip filtering)
    pub privileged: bool,
}

impl ReadContext {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            ..Default::default()
        }
    }

    pub fn with_principal(mut self, principal: impl Into<PrincipalId>) -> Self {
        self.principal_id = Some(principal.into());
        self
    }

    pub fn privileged(mut self) -> Self {
        self.privileged = true;
        self
    }
}
