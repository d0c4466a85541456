//! ACL store contract
//!
//! Role/permission storage is external. The engine only needs the small
//! surface below; [`MemoryAclStore`] is a complete in-process implementation
//! used by tests and embedded deployments.

pub mod memory;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::OwnerRef;

pub use memory::MemoryAclStore;

/// A named role, materialized per owner scope.
///
/// Global roles (such as the admin role) have no scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Store-assigned identifier
    pub id: String,

    /// Role name (e.g. "member")
    pub name: String,

    /// Owner scope the role lives in
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<OwnerRef>,

    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// External ACL store.
///
/// Every method may suspend; implementations must not block the runtime.
/// `ensure_role`, `grant_role_actions` and `assign_principal_to_role` must be
/// idempotent, including under concurrent invocation.
#[async_trait]
pub trait AclStore: Send + Sync {
    /// Whether the principal holds the global role `role_name`
    async fn has_role(&self, principal: &str, role_name: &str) -> Result<bool>;

    /// Whether the principal may perform `action` within `scope`
    async fn is_allowed(&self, principal: &str, scope: &OwnerRef, action: &str) -> Result<bool>;

    /// Ids of `resource_type` instances the principal may `action`, across all scopes
    async fn allowed_resources(
        &self,
        principal: &str,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>>;

    /// Ids of `resource_type` instances the principal may `action` through roles of `scope`
    async fn allowed_resources_with_scope(
        &self,
        principal: &str,
        scope: &OwnerRef,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>>;

    /// Publish the action vocabulary of a type (upsert)
    async fn register_actions(&self, resource_type: &str, actions: &[String]) -> Result<()>;

    /// Get-or-create the role `name` in `scope`
    async fn ensure_role(&self, name: &str, scope: Option<&OwnerRef>) -> Result<Role>;

    /// Existing roles of `scope` whose name is in `names`
    async fn find_roles(&self, scope: &OwnerRef, names: &[String]) -> Result<Vec<Role>>;

    /// Grant `actions` on `scope` to every holder of `role` (upsert)
    async fn grant_role_actions(&self, role: &Role, scope: &OwnerRef, actions: &[String])
        -> Result<()>;

    /// Make the principal a holder of `role`
    async fn assign_principal_to_role(&self, principal: &str, role: &Role) -> Result<()>;
}
