//! Shared fixtures for the integration tests
//!
//! `Host` stands in for a data-access layer: it runs the interceptor chain
//! around writes and reads against an in-memory data source.

#![allow(dead_code)]

use async_trait::async_trait;
use sacl_authz::acl::{AclStore, MemoryAclStore, Role};
use sacl_authz::config::{SaclConfig, SecurityBlock};
use sacl_authz::data::{DataSource, MemoryDataSource, Relation, RelationCatalog};
use sacl_authz::error::{AuthzError, Result};
use sacl_authz::filter::{Predicate, Query};
use sacl_authz::interceptor::InterceptorChain;
use sacl_authz::types::{AccessContext, OwnerRef, ReadContext};
use sacl_authz::Security;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Team owns Doc through `team`; User and Team can own a Note
pub fn team_doc_data() -> MemoryDataSource {
    MemoryDataSource::new()
        .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"))
        .with_relation("Team", "docs", Relation::has_many("Doc", "teamId"))
        .with_relation("Note", "owner", Relation::polymorphic("ownerType", "ownerId"))
}

pub fn team_doc_config() -> SaclConfig {
    let team: SecurityBlock = serde_json::from_value(json!({
        "roles": {
            "member": {"title": "Member", "actions": ["read"]},
            "manager": {"title": "Manager", "actions": ["write", "manage"]}
        }
    }))
    .unwrap();

    SaclConfig::default()
        .with_owner("Team")
        .with_owner("User")
        .with_resource("Doc", "team")
        .with_resource("Note", "owner")
        .with_security("Team", team)
}

pub struct Host {
    pub security: Security,
    pub acl: MemoryAclStore,
    pub data: MemoryDataSource,
    pub chain: InterceptorChain,
}

impl Host {
    pub async fn new() -> Self {
        Self::with_config(team_doc_config()).await
    }

    pub async fn with_config(config: SaclConfig) -> Self {
        let acl = MemoryAclStore::new();
        let data = team_doc_data();
        let security = Security::new(config, Arc::new(acl.clone()), Arc::new(data.clone()))
            .await
            .unwrap();
        let chain = security.interceptors();
        Self {
            security,
            acl,
            data,
            chain,
        }
    }

    /// Authorize, store and provision a new instance
    pub async fn create(&self, model: &str, principal: &str, payload: Value) -> Result<Value> {
        let ctx = AccessContext::new(model, "create")
            .with_principal(principal)
            .with_payload(payload.clone());
        self.chain.before_write(&ctx).await?;
        self.data.insert(model, payload.clone())?;
        self.chain.after_write(&ctx, &payload).await?;
        Ok(payload)
    }

    /// Create through a relation method such as `Team.__create__docs`
    pub async fn create_related(
        &self,
        model: &str,
        id: &str,
        relation: &str,
        principal: &str,
        payload: Value,
    ) -> Result<Value> {
        let ctx = AccessContext::new(model, format!("__create__{}", relation))
            .with_instance(id)
            .with_principal(principal)
            .with_payload(payload.clone());
        self.chain.before_write(&ctx).await?;
        let target = self
            .data
            .relation(model, relation)
            .and_then(|r| r.target().map(String::from))
            .unwrap();
        self.data.insert(&target, payload.clone())?;
        self.chain.after_write(&ctx, &payload).await?;
        Ok(payload)
    }

    /// Run a filtered read and evaluate the resulting predicate in memory
    pub async fn find(&self, model: &str, principal: &str, query: Query) -> Result<Vec<Value>> {
        let mut query = query;
        let ctx = ReadContext::new(model).with_principal(principal);
        self.chain.on_read(&ctx, &mut query).await?;

        let rows = self.data.find_privileged(model, None, 0).await?;
        Ok(rows
            .into_iter()
            .filter(|row| query.filter.as_ref().map_or(true, |p| matches(p, row)))
            .collect())
    }

    /// Give `principal` a role on an owner instance
    pub async fn assign(&self, principal: &str, role: &str, owner: &OwnerRef) {
        let role = self.acl.ensure_role(role, Some(owner)).await.unwrap();
        self.acl.assign_principal_to_role(principal, &role).await.unwrap();
    }

    pub async fn make_admin(&self, principal: &str) {
        let admin = self.acl.ensure_role("admin", None).await.unwrap();
        self.acl.assign_principal_to_role(principal, &admin).await.unwrap();
    }
}

/// Evaluate a predicate against a JSON row
pub fn matches(predicate: &Predicate, row: &Value) -> bool {
    match predicate {
        Predicate::Eq { field, value } => row.get(field) == Some(value),
        Predicate::In { field, values } => row.get(field).map_or(false, |v| values.contains(v)),
        Predicate::And { clauses } => clauses.iter().all(|c| matches(c, row)),
        Predicate::Or { clauses } => clauses.iter().any(|c| matches(c, row)),
    }
}

pub fn ids(rows: &[Value]) -> Vec<String> {
    let mut ids: Vec<String> = rows
        .iter()
        .filter_map(|row| row["id"].as_str().map(String::from))
        .collect();
    ids.sort();
    ids
}

/// ACL store whose operations can be made to fail on demand
#[derive(Clone, Default)]
pub struct FailingStore {
    pub inner: MemoryAclStore,
    pub fail_has_role: Arc<AtomicBool>,
    pub fail_is_allowed: Arc<AtomicBool>,
    pub failing_grant_role: Arc<Mutex<Option<String>>>,
}

impl FailingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make grants to roles named `role` fail
    pub fn fail_grants_for(&self, role: &str) {
        *self.failing_grant_role.lock().unwrap() = Some(role.to_string());
    }

    fn check(flag: &AtomicBool, op: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(AuthzError::Store(format!("{} unavailable", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl AclStore for FailingStore {
    async fn has_role(&self, principal: &str, role_name: &str) -> Result<bool> {
        Self::check(&self.fail_has_role, "has_role")?;
        self.inner.has_role(principal, role_name).await
    }

    async fn is_allowed(&self, principal: &str, scope: &OwnerRef, action: &str) -> Result<bool> {
        Self::check(&self.fail_is_allowed, "is_allowed")?;
        self.inner.is_allowed(principal, scope, action).await
    }

    async fn allowed_resources(
        &self,
        principal: &str,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>> {
        self.inner.allowed_resources(principal, action, resource_type).await
    }

    async fn allowed_resources_with_scope(
        &self,
        principal: &str,
        scope: &OwnerRef,
        action: &str,
        resource_type: &str,
    ) -> Result<Vec<String>> {
        self.inner
            .allowed_resources_with_scope(principal, scope, action, resource_type)
            .await
    }

    async fn register_actions(&self, resource_type: &str, actions: &[String]) -> Result<()> {
        self.inner.register_actions(resource_type, actions).await
    }

    async fn ensure_role(&self, name: &str, scope: Option<&OwnerRef>) -> Result<Role> {
        self.inner.ensure_role(name, scope).await
    }

    async fn find_roles(&self, scope: &OwnerRef, names: &[String]) -> Result<Vec<Role>> {
        self.inner.find_roles(scope, names).await
    }

    async fn grant_role_actions(
        &self,
        role: &Role,
        scope: &OwnerRef,
        actions: &[String],
    ) -> Result<()> {
        let rejected =
            self.failing_grant_role.lock().unwrap().as_deref() == Some(role.name.as_str());
        if rejected {
            return Err(AuthzError::Store(format!("grant to {} rejected", role.name)));
        }
        self.inner.grant_role_actions(role, scope, actions).await
    }

    async fn assign_principal_to_role(&self, principal: &str, role: &Role) -> Result<()> {
        self.inner.assign_principal_to_role(principal, role).await
    }
}
