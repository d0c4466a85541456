//! Declarative security configuration
//!
//! The configuration is plain JSON (camelCase keys). Every field has a
//! default, so an empty object is a valid (if useless) configuration.
//!
//! ```json
//! {
//!   "owners": ["Team"],
//!   "resources": { "Doc": "team" },
//!   "models": {
//!     "Team": { "roles": { "member": { "actions": ["read"] } } },
//!     "Doc":  { "permissions": { "member": "read" } }
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;

use crate::error::Result;

/// A permission value: a single action name or a list (may contain `"*"`)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PermissionValue {
    One(String),
    Many(Vec<String>),
}

impl PermissionValue {
    /// Coerce to a list of action names
    pub fn to_vec(&self) -> Vec<String> {
        match self {
            Self::One(action) => vec![action.clone()],
            Self::Many(actions) => actions.clone(),
        }
    }
}

impl From<&str> for PermissionValue {
    fn from(action: &str) -> Self {
        Self::One(action.to_string())
    }
}

impl From<Vec<&str>> for PermissionValue {
    fn from(actions: Vec<&str>) -> Self {
        Self::Many(actions.into_iter().map(String::from).collect())
    }
}

/// Permission table: role name to permitted action(s)
pub type PermissionMap = BTreeMap<String, PermissionValue>;

/// Per-resource options. Accepts the shorthands `"relName"` and `true/false`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceEntry {
    Rel(String),
    RowLevel(bool),
    Options(ResourceOptions),
}

/// Normalized per-resource options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceOptions {
    /// Owner-pointing relation name (falls back to the global `rel`)
    #[serde(default)]
    pub rel: Option<String>,

    /// Restrict reads to permitted rows
    #[serde(default, alias = "rowLevel")]
    pub rowlevel: Option<bool>,
}

impl ResourceEntry {
    /// Expand shorthand into full options
    pub fn options(&self) -> ResourceOptions {
        match self {
            Self::Rel(rel) => ResourceOptions {
                rel: Some(rel.clone()),
                rowlevel: None,
            },
            Self::RowLevel(flag) => ResourceOptions {
                rel: None,
                rowlevel: Some(*flag),
            },
            Self::Options(options) => options.clone(),
        }
    }
}

/// Raw security block of a model, prior to normalization.
///
/// `actions` and `roles` values stay untyped here: the schema builder
/// rejects anything that is neither a string nor an object.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecurityBlock {
    #[serde(default)]
    pub actions: Map<String, Value>,

    #[serde(default)]
    pub roles: Map<String, Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<PermissionMap>,

    /// Deprecated alias of `permissions`
    #[serde(
        default,
        rename = "default-permissions",
        skip_serializing_if = "Option::is_none"
    )]
    pub legacy_permissions: Option<PermissionMap>,
}

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SaclConfig {
    /// Dynamic role identifier the role resolver is registered under
    pub role: String,

    /// Model name of principals (enables the self-access shortcut)
    pub user_model: String,

    /// Global role name that bypasses every scope check
    pub admin_role: String,

    /// Default owner-pointing relation name
    pub rel: String,

    /// Owner (group) model names
    #[serde(alias = "groups")]
    pub owners: Vec<String>,

    /// Resource model names with their options
    pub resources: BTreeMap<String, ResourceEntry>,

    /// Security blocks by model name
    pub models: BTreeMap<String, SecurityBlock>,

    /// Owner roles the creator of an owner instance is assigned to
    pub default_creator_roles: Vec<String>,

    /// Owner instance fields naming its creator, tried in order when no
    /// principal is attached
    pub creator_fields: Vec<String>,

    /// Actions given to models that declare none
    pub default_actions: Vec<String>,

    /// Permission table for resources that declare none
    pub default_permissions: PermissionMap,

    /// Allow when the current owner cannot be determined
    pub fail_open_on_unresolved: bool,

    /// Collect decision metrics
    pub enable_metrics: bool,
}

impl Default for SaclConfig {
    fn default() -> Self {
        let mut default_permissions = PermissionMap::new();
        default_permissions.insert("member".to_string(), "read".into());
        default_permissions.insert("manager".to_string(), vec!["write", "manage"].into());
        default_permissions.insert("admin".to_string(), "*".into());

        Self {
            role: "$sacl".to_string(),
            user_model: "User".to_string(),
            admin_role: "admin".to_string(),
            rel: "owner".to_string(),
            owners: Vec::new(),
            resources: BTreeMap::new(),
            models: BTreeMap::new(),
            default_creator_roles: vec!["manager".to_string(), "admin".to_string()],
            creator_fields: vec!["userId".to_string(), "owner".to_string()],
            default_actions: vec!["read".to_string(), "write".to_string(), "manage".to_string()],
            default_permissions,
            fail_open_on_unresolved: true,
            enable_metrics: true,
        }
    }
}

impl SaclConfig {
    /// Parse a configuration from a JSON string
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Parse a configuration from a JSON value
    pub fn from_value(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Register an owner model
    pub fn with_owner(mut self, name: impl Into<String>) -> Self {
        self.owners.push(name.into());
        self
    }

    /// Register a resource model owned through `rel`
    pub fn with_resource(mut self, name: impl Into<String>, rel: impl Into<String>) -> Self {
        self.resources.insert(name.into(), ResourceEntry::Rel(rel.into()));
        self
    }

    /// Attach a security block to a model
    pub fn with_security(mut self, model: impl Into<String>, block: SecurityBlock) -> Self {
        self.models.insert(model.into(), block);
        self
    }
}
