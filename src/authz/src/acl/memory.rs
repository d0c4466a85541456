//! In-memory ACL store backed by `DashMap`
//!
//! Role creation goes through the map's entry API, so concurrent
//! `ensure_role` calls for the same (name, scope) pair observe one role.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use super::{AclStore, Role};
use crate::error::{AuthzError, Result};
use crate::types::{actions, OwnerRef};

type RoleKey = (String, Option<OwnerRef>);

/// In-memory ACL store implementation
#[derive(Clone, Default)]
pub struct MemoryAclStore {
    /// Registered action vocabulary per type
    vocabulary: Arc<DashMap<String, HashSet<String>>>,

    /// Roles by (name, scope)
    roles: Arc<DashMap<RoleKey, Role>>,

    /// Role id -> scope -> granted actions
    grants: Arc<DashMap<String, HashMap<OwnerRef, HashSet<String>>>>,

    /// Principal -> held role ids
    memberships: Arc<DashMap<String, HashSet<String>>>,
}

impl MemoryAclStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of roles named `name` in `scope` (diagnostics)
    pub fn role_count(&self, name: &str, scope: Option<&OwnerRef>) -> usize {
        self.roles
            .iter()
            .filter(|entry| entry.key().0 == name && entry.key().1.as_ref() == scope)
            .count()
    }

    /// Registered vocabulary of a type
    pub fn vocabulary(&self, resource_type: &str) -> Option<HashSet<String>> {
        self.vocabulary.get(resource_type).map(|v| v.clone())
    }

    /// Actions granted to `role` on `scope`
    pub fn granted_actions(&self, role: &Role, scope: &OwnerRef) -> HashSet<String> {
        self.grants
            .get(&role.id)
            .and_then(|scopes| scopes.get(scope).cloned())
            .unwrap_or_default()
    }

    fn in_vocabulary(&self, resource_type: &str, action: &str) -> bool {
        self.vocabulary
            .get(resource_type)
            .map(|v| v.contains(action))
            .unwrap_or(false)
    }

    fn role_ids_of(&self, principal: &str) -> HashSet<String> {
        self.memberships
            .get(principal)
            .map(|ids| ids.clone())
            .unwrap_or_default()
    }

    /// Scopes of `resource_type` where one of `role_ids` holds `action`
    fn permitted_ids<'a>(
        &self,
        role_ids: impl Iterator<Item = &'a String>,
        action: &str,
        resource_type: &str,
    ) -> Vec<String> {
        if !self.in_vocabulary(resource_type, action) {
            return Vec::new();
        }

        let mut ids: Vec<String> = Vec::new();
        for role_id in role_ids {
            let Some(scopes) = self.grants.get(role_id) else {
                continue;
            };
            for (scope, granted) in scopes.iter() {
                if scope.owner_type == resource_type
                    && (granted.contains(action) || granted.contains(actions::ALL))
                    && !ids.contains(&scope.id)
                {
                    ids.push(scope.id.clone());
                }
            }
        }

        ids.sort();
        ids
    }
}

#[async_trait]
impl AclStore for MemoryAclStore {
    async fn has_role(&self, principal: &str, role_name: &str) -> Result<bool> {
        let Some(global) = self.roles.get(&(role_name.to_string(), None)) else {
            return Ok(false);
        };
        let role_id = global.id.clone();
        drop(global);

        Ok(self.role_ids_of(principal).contains(&role_id))
    }

    async fn is_allowed(&self, principal: &str, scope: &OwnerRef, action: &str) -> Result<bool> {
        if !self.in_vocabulary(&scope.owner_type, action) {
            debug!("Action {} is not registered for {}", action, scope.owner_type);
            return Ok(false);
        }

        for role_id in self.role_ids_of(principal) {
            let allowed = self
                .grants
                .get(&role_id)
                .and_then(|scopes| {
                    scopes
                        .get(scope)
                        .map(|granted| granted.contains(action) || granted.contains(actions::ALL))
                })
                .unwrap_or(false);

            if allowed {
                return Ok(true);
            }
        }

        Ok(false)
    }

    async fn allowed_resources(
        &self,
        principal: &str,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>> {
        let role_ids = self.role_ids_of(principal);
        Ok(self.permitted_ids(role_ids.iter(), action, resource_type))
    }

    async fn allowed_resources_with_scope(
        &self,
        principal: &str,
        scope: &OwnerRef,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>> {
        let scoped: HashSet<String> = self
            .roles
            .iter()
            .filter(|entry| entry.key().1.as_ref() == Some(scope))
            .map(|entry| entry.value().id.clone())
            .collect();

        let role_ids = self.role_ids_of(principal);
        Ok(self.permitted_ids(
            role_ids.iter().filter(|id| scoped.contains(*id)),
            action,
            resource_type,
        ))
    }

    async fn register_actions(&self, resource_type: &str, actions: &[String]) -> Result<()> {
        if resource_type.is_empty() {
            return Err(AuthzError::Store("Resource type name is empty".to_string()));
        }

        self.vocabulary
            .entry(resource_type.to_string())
            .or_default()
            .extend(actions.iter().cloned());
        Ok(())
    }

    async fn ensure_role(&self, name: &str, scope: Option<&OwnerRef>) -> Result<Role> {
        let key = (name.to_string(), scope.cloned());
        let role = self
            .roles
            .entry(key)
            .or_insert_with(|| Role {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                scope: scope.cloned(),
                created_at: Utc::now(),
            })
            .clone();

        Ok(role)
    }

    async fn find_roles(&self, scope: &OwnerRef, names: &[String]) -> Result<Vec<Role>> {
        let mut found: Vec<Role> = names
            .iter()
            .filter_map(|name| {
                self.roles
                    .get(&(name.clone(), Some(scope.clone())))
                    .map(|role| role.clone())
            })
            .collect();
        found.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(found)
    }

    async fn grant_role_actions(
        &self,
        role: &Role,
        scope: &OwnerRef,
        actions: &[String],
    ) -> Result<()> {
        self.grants
            .entry(role.id.clone())
            .or_default()
            .entry(scope.clone())
            .or_default()
            .extend(actions.iter().cloned());
        Ok(())
    }

    async fn assign_principal_to_role(&self, principal: &str, role: &Role) -> Result<()> {
        self.memberships
            .entry(principal.to_string())
            .or_default()
            .insert(role.id.clone());
        Ok(())
    }
}
