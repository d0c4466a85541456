//! Authorization policies registered against role identifiers
//!
//! Hosts resolve a dynamic role (by default `"$sacl"`) by calling the policy
//! registered under it. The role resolver is the built-in policy.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{AuthzError, Result};
use crate::resolver::RoleResolver;
use crate::types::AccessContext;

/// Allow/deny decision for one operation
#[async_trait]
pub trait AuthorizationPolicy: Send + Sync {
    async fn decide(&self, ctx: &AccessContext) -> Result<bool>;
}

#[async_trait]
impl AuthorizationPolicy for RoleResolver {
    async fn decide(&self, ctx: &AccessContext) -> Result<bool> {
        RoleResolver::decide(self, ctx).await
    }
}

/// Policies by role identifier
#[derive(Clone, Default)]
pub struct PolicyRegistry {
    policies: Arc<RwLock<HashMap<String, Arc<dyn AuthorizationPolicy>>>>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `policy` under `role`. Each role is registered once.
    pub async fn register(&self, role: &str, policy: Arc<dyn AuthorizationPolicy>) -> Result<()> {
        let mut policies = self.policies.write().await;
        if policies.contains_key(role) {
            return Err(AuthzError::InvalidInput(format!(
                "A policy is already registered for role {}",
                role
            )));
        }
        debug!("Registering authorization policy for \"{}\"", role);
        policies.insert(role.to_string(), policy);
        Ok(())
    }

    pub async fn get(&self, role: &str) -> Option<Arc<dyn AuthorizationPolicy>> {
        self.policies.read().await.get(role).cloned()
    }

    pub async fn roles(&self) -> Vec<String> {
        let mut roles: Vec<String> = self.policies.read().await.keys().cloned().collect();
        roles.sort();
        roles
    }

    /// Decide through the policy of `role`; no policy means deny
    pub async fn decide(&self, role: &str, ctx: &AccessContext) -> Result<bool> {
        let Some(policy) = self.get(role).await else {
            debug!("No policy registered for role {}, denying", role);
            return Ok(false);
        };
        policy.decide(ctx).await
    }
}
