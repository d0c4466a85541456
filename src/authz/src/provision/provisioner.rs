//! Owner and resource provisioning

use futures::future::join_all;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::acl::{AclStore, Role};
use crate::context::AccessContextResolver;
use crate::data::{DataSource, Relation};
use crate::error::{AuthzError, Result};
use crate::schema::{ModelSecurity, SchemaRegistry};
use crate::types::{id_from_value, OwnerRef};

/// What a provisioning run did
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProvisionReport {
    /// Roles ensured on a new owner
    pub roles_ensured: Vec<String>,
    /// Roles granted actions
    pub roles_granted: Vec<String>,
    /// Roles the creator was assigned to
    pub creator_roles: Vec<String>,
}

/// Totals of a bulk re-provisioning pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AutoupdateReport {
    pub owners: usize,
    pub resources: usize,
}

/// Runs the provisioning observers
#[derive(Clone)]
pub struct Provisioner {
    schema: Arc<SchemaRegistry>,
    acl: Arc<dyn AclStore>,
    data: Arc<dyn DataSource>,
    contexts: AccessContextResolver,
}

impl Provisioner {
    pub fn new(
        schema: Arc<SchemaRegistry>,
        acl: Arc<dyn AclStore>,
        data: Arc<dyn DataSource>,
    ) -> Self {
        let contexts = AccessContextResolver::new(schema.clone(), data.clone());
        Self {
            schema,
            acl,
            data,
            contexts,
        }
    }

    /// Dispatch on the model kind; models not under access control are ignored
    pub async fn on_created(
        &self,
        model: &str,
        instance: &Value,
        principal: Option<&str>,
    ) -> Result<ProvisionReport> {
        if self.schema.is_owner(model) {
            self.on_owner_created(model, instance, principal).await
        } else if self.schema.is_resource(model) {
            self.on_resource_created(model, instance).await
        } else {
            Ok(ProvisionReport::default())
        }
    }

    /// Ensure the owner's roles on the new instance, grant them their action
    /// sets there and assign the creator to the default creator roles.
    ///
    /// Without `creator` the instance's own creator is used, see
    /// [`creator_of`](Self::creator_of).
    pub async fn on_owner_created(
        &self,
        model: &str,
        instance: &Value,
        creator: Option<&str>,
    ) -> Result<ProvisionReport> {
        let security = self.schema.require(model)?;
        let scope = self.scope_of(model, instance)?;
        let mut report = ProvisionReport::default();
        let mut failures = Vec::new();

        let role_names: Vec<&String> = security.roles.keys().collect();
        debug!("Ensuring roles {:?} on {}", role_names, scope);

        let ensured = join_all(
            role_names
                .iter()
                .map(|name| self.acl.ensure_role(name, Some(&scope))),
        )
        .await;

        let mut roles: Vec<Role> = Vec::new();
        for (name, result) in role_names.iter().zip(ensured) {
            match result {
                Ok(role) => roles.push(role),
                Err(err) => failures.push(format!("ensure role {}: {}", name, err)),
            }
        }
        report.roles_ensured = roles.iter().map(|r| r.name.clone()).collect();

        self.grant_owner_roles(security, &scope, &roles, &mut report, &mut failures)
            .await;

        let creator = match creator {
            Some(principal) => Some(principal.to_string()),
            None => self.creator_of(model, instance),
        };
        match creator.as_deref() {
            Some(principal) => {
                let defaults: Vec<&Role> = roles
                    .iter()
                    .filter(|role| self.schema.default_creator_roles().contains(&role.name))
                    .collect();
                debug!(
                    "Assigning creator {} to roles {:?} of {}",
                    principal,
                    defaults.iter().map(|r| &r.name).collect::<Vec<_>>(),
                    scope
                );

                let assigned = join_all(
                    defaults
                        .iter()
                        .map(|role| self.acl.assign_principal_to_role(principal, role)),
                )
                .await;
                for (role, result) in defaults.iter().zip(assigned) {
                    match result {
                        Ok(()) => report.creator_roles.push(role.name.clone()),
                        Err(err) => {
                            failures.push(format!("assign {} to {}: {}", principal, role.name, err))
                        }
                    }
                }
            }
            None => debug!("No creator of {}, skip assigning roles", scope),
        }

        finish(&scope, report, failures)
    }

    /// Grant the owner's existing roles the resource's permitted actions on
    /// the new instance
    pub async fn on_resource_created(
        &self,
        model: &str,
        instance: &Value,
    ) -> Result<ProvisionReport> {
        let security = self.schema.require(model)?;
        let target = self.scope_of(model, instance)?;
        let mut report = ProvisionReport::default();

        let Some(owner) = self.contexts.owner_of_instance(model, instance)? else {
            debug!("Skip default permissions for no owner found for {}", target);
            return Ok(report);
        };

        let role_names: Vec<String> = security.permissions.keys().cloned().collect();
        let roles = match self.acl.find_roles(&owner, &role_names).await {
            Ok(roles) => roles,
            Err(err) => {
                return finish(&target, report, vec![format!("find roles on {}: {}", owner, err)])
            }
        };
        if roles.is_empty() {
            debug!("No roles {:?} found on {}", role_names, owner);
        }

        let grants: Vec<(&Role, Vec<String>)> = roles
            .iter()
            .map(|role| {
                let actions = security.permitted_actions(&role.name).unwrap_or_default();
                (role, actions)
            })
            .collect();

        let results = join_all(grants.iter().map(|(role, actions)| {
            debug!(
                "Allowing {}:{} to access {} with {:?}",
                owner, role.name, target, actions
            );
            self.acl.grant_role_actions(role, &target, actions)
        }))
        .await;

        let mut failures = Vec::new();
        for ((role, _), result) in grants.iter().zip(results) {
            match result {
                Ok(()) => report.roles_granted.push(role.name.clone()),
                Err(err) => failures.push(format!("grant {} on {}: {}", role.name, target, err)),
            }
        }

        finish(&target, report, failures)
    }

    /// Re-provision every existing owner and resource instance.
    ///
    /// Pages through instances with privileged reads; owners first so that
    /// resource grants find their roles. Creators recorded on owner instances
    /// get their roles back.
    pub async fn autoupdate_permissions(&self, page_size: usize) -> Result<AutoupdateReport> {
        if page_size == 0 {
            return Err(AuthzError::InvalidInput(
                "Page size must be greater than zero".to_string(),
            ));
        }

        let mut report = AutoupdateReport::default();
        let mut failures = Vec::new();

        for owner in self.schema.owners() {
            if owner.roles.is_empty() {
                debug!("Skip {} for no roles defined for it", owner.name);
                continue;
            }
            report.owners += self.update_model(owner, page_size, &mut failures).await?;
        }
        for resource in self.schema.resources() {
            report.resources += self.update_model(resource, page_size, &mut failures).await?;
        }

        info!(
            "Permissions updated for {} owner(s) and {} resource(s)",
            report.owners, report.resources
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            error!("Permission update incomplete: {} failure(s)", failures.len());
            Err(AuthzError::Provisioning {
                target: "all models".to_string(),
                failures,
            })
        }
    }

    /// Process every instance of one model, page by page
    async fn update_model(
        &self,
        model: &ModelSecurity,
        page_size: usize,
        failures: &mut Vec<String>,
    ) -> Result<usize> {
        let mut offset = 0;
        let mut processed = 0;

        loop {
            let page = self
                .data
                .find_privileged(&model.name, Some(page_size), offset)
                .await?;

            let results = join_all(page.iter().map(|instance| async move {
                if model.is_owner() {
                    self.on_owner_created(&model.name, instance, None).await
                } else {
                    self.on_resource_created(&model.name, instance).await
                }
            }))
            .await;

            for result in results {
                match result {
                    Ok(_) => processed += 1,
                    Err(AuthzError::Provisioning { failures: f, .. }) => failures.extend(f),
                    Err(err) => failures.push(err.to_string()),
                }
            }

            if page.len() < page_size {
                return Ok(processed);
            }
            offset += page_size;
        }
    }

    async fn grant_owner_roles(
        &self,
        security: &ModelSecurity,
        scope: &OwnerRef,
        roles: &[Role],
        report: &mut ProvisionReport,
        failures: &mut Vec<String>,
    ) {
        let grants: Vec<(&Role, Vec<String>)> = roles
            .iter()
            .filter_map(|role| {
                let actions: Vec<String> =
                    security.roles.get(&role.name)?.actions.iter().cloned().collect();
                Some((role, actions))
            })
            .filter(|(_, actions)| !actions.is_empty())
            .collect();

        let results = join_all(
            grants
                .iter()
                .map(|(role, actions)| self.acl.grant_role_actions(role, scope, actions)),
        )
        .await;

        for ((role, _), result) in grants.iter().zip(results) {
            match result {
                Ok(()) => report.roles_granted.push(role.name.clone()),
                Err(err) => failures.push(format!("grant {} on {}: {}", role.name, scope, err)),
            }
        }
    }

    /// Creator recorded on an owner instance: the first configured creator
    /// field, else the key of a belongsTo relation to the user model
    pub fn creator_of(&self, model: &str, instance: &Value) -> Option<String> {
        let from_field = self
            .schema
            .creator_fields()
            .iter()
            .find_map(|field| self.creator_id(instance.get(field)?));
        if from_field.is_some() {
            return from_field;
        }

        self.data
            .relations(model)
            .into_iter()
            .find_map(|(_, relation)| match relation {
                Relation::BelongsTo {
                    target,
                    foreign_key,
                } if target == self.schema.user_model() => {
                    instance.get(&foreign_key).and_then(id_from_value)
                }
                _ => None,
            })
    }

    /// Plain ids and `"User:id"` references name a user; other owners do not
    fn creator_id(&self, value: &Value) -> Option<String> {
        match OwnerRef::from_value(value) {
            Some(owner) if owner.owner_type == self.schema.user_model() => Some(owner.id),
            Some(_) => None,
            None => id_from_value(value),
        }
    }

    fn scope_of(&self, model: &str, instance: &Value) -> Result<OwnerRef> {
        let id_field = self.data.id_field(model);
        let id = instance
            .get(&id_field)
            .and_then(id_from_value)
            .ok_or_else(|| {
                AuthzError::InvalidInput(format!("{} instance has no '{}' field", model, id_field))
            })?;
        Ok(OwnerRef::new(model, id))
    }
}

fn finish(
    target: &OwnerRef,
    report: ProvisionReport,
    failures: Vec<String>,
) -> Result<ProvisionReport> {
    if failures.is_empty() {
        return Ok(report);
    }

    error!("Provisioning of {} incomplete: {:?}", target, failures);
    Err(AuthzError::Provisioning {
        target: target.to_string(),
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::acl::MemoryAclStore;
    use crate::config::SaclConfig;
    use crate::data::{MemoryDataSource, Relation};
    use crate::schema::SchemaBuilder;
    use serde_json::json;

    fn provisioner() -> (Provisioner, MemoryAclStore) {
        let data = MemoryDataSource::new()
            .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"));
        let config = SaclConfig::default()
            .with_owner("Team")
            .with_resource("Doc", "team");
        let schema = Arc::new(SchemaBuilder::new(&config, &data).build().unwrap());
        let acl = MemoryAclStore::new();
        (
            Provisioner::new(schema, Arc::new(acl.clone()), Arc::new(data)),
            acl,
        )
    }

    #[tokio::test]
    async fn test_instance_without_id_is_rejected() {
        let (provisioner, _) = provisioner();
        let result = provisioner.on_created("Doc", &json!({"teamId": "t1"}), None).await;
        assert!(matches!(result, Err(AuthzError::InvalidInput(_))));
    }

    #[tokio::test]
    async fn test_uncontrolled_model_is_ignored() {
        let (provisioner, acl) = provisioner();
        let report = provisioner
            .on_created("AuditLog", &json!({"id": "1"}), Some("u"))
            .await
            .unwrap();
        assert_eq!(report, ProvisionReport::default());
        assert_eq!(acl.role_count("manager", None), 0);
    }

    #[tokio::test]
    async fn test_owner_without_roles_assigns_nothing() {
        let (provisioner, acl) = provisioner();
        let report = provisioner
            .on_created("Team", &json!({"id": "t1"}), Some("u"))
            .await
            .unwrap();
        assert!(report.roles_ensured.is_empty());
        assert!(report.creator_roles.is_empty());
        assert_eq!(acl.role_count("manager", Some(&OwnerRef::new("Team", "t1"))), 0);
    }
}
