//! Schema builder
//!
//! Turns the declarative security blocks of [`SaclConfig`] into a
//! [`SchemaRegistry`]:
//!
//! 1. normalize `actions`/`roles` shorthand (`"Title"` or `{...}`)
//! 2. default and list-coerce resource `permissions`
//! 3. resolve and validate each resource's owner relation
//! 4. fold resource permissions into the roles of their owner types
//!
//! Any inconsistency is a fatal [`AuthzError::Config`].

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::registry::SchemaRegistry;
use super::types::{
    namespaced_action, ActionDef, ModelKind, ModelSecurity, OwnerRelation, RoleDef,
};
use crate::config::{PermissionMap, SaclConfig, SecurityBlock};
use crate::data::{Relation, RelationCatalog};
use crate::error::{AuthzError, Result};
use crate::types::actions;

/// Builds the immutable schema registry at startup
pub struct SchemaBuilder<'a, C: ?Sized> {
    config: &'a SaclConfig,
    catalog: &'a C,
}

impl<'a, C: RelationCatalog + ?Sized> SchemaBuilder<'a, C> {
    pub fn new(config: &'a SaclConfig, catalog: &'a C) -> Self {
        Self { config, catalog }
    }

    /// Build and validate the registry
    pub fn build(self) -> Result<SchemaRegistry> {
        let owners: BTreeSet<String> = self.config.owners.iter().cloned().collect();
        let resources: BTreeSet<String> = self.config.resources.keys().cloned().collect();

        if let Some(both) = owners.intersection(&resources).next() {
            return Err(AuthzError::Config(format!(
                "Model {} is declared as both an owner and a resource",
                both
            )));
        }

        if let Some(stray) = self
            .config
            .models
            .keys()
            .find(|name| !owners.contains(*name) && !resources.contains(*name))
        {
            return Err(AuthzError::Config(format!(
                "Security settings given for {}, which is neither an owner nor a resource",
                stray
            )));
        }

        debug!(
            "Building security schema for owners {:?} and resources {:?}",
            owners, resources
        );

        let mut models: HashMap<String, ModelSecurity> = HashMap::new();
        for name in &owners {
            models.insert(name.clone(), self.transform(name, ModelKind::Owner)?);
        }
        for name in &resources {
            models.insert(name.clone(), self.transform(name, ModelKind::Resource)?);
        }

        for owner in &owners {
            let folded: Vec<ModelSecurity> = resources
                .iter()
                .filter_map(|name| models.get(name))
                .filter(|resource| belongs_to_owner(resource, owner))
                .cloned()
                .collect();

            if let Some(owner_security) = models.get_mut(owner) {
                for resource in &folded {
                    fold_resource(owner_security, resource);
                }
            }
        }

        info!(
            "Security schema built: {} owner(s), {} resource(s)",
            owners.len(),
            resources.len()
        );

        Ok(SchemaRegistry {
            models: models
                .into_iter()
                .map(|(name, security)| (name, Arc::new(security)))
                .collect(),
            owners,
            resources,
            user_model: self.config.user_model.clone(),
            admin_role: self.config.admin_role.clone(),
            default_creator_roles: self.config.default_creator_roles.clone(),
            creator_fields: self.config.creator_fields.clone(),
        })
    }

    fn transform(&self, name: &str, kind: ModelKind) -> Result<ModelSecurity> {
        let empty = SecurityBlock::default();
        let block = self.config.models.get(name).unwrap_or(&empty);

        let mut actions = BTreeMap::new();
        for (key, value) in &block.actions {
            let action = ActionDef::from_setting(name, key, value)?;
            if actions.insert(action.name.clone(), action).is_some() {
                return Err(AuthzError::Config(format!(
                    "Model {} declares action {} more than once",
                    name,
                    key.to_uppercase()
                )));
            }
        }
        if actions.is_empty() {
            for action in &self.config.default_actions {
                let action = ActionDef::new(action.as_str());
                actions.insert(action.name.clone(), action);
            }
        }

        let mut roles = BTreeMap::new();
        for (key, value) in &block.roles {
            roles.insert(key.clone(), RoleDef::from_setting(name, key, value)?);
        }

        let mut security = ModelSecurity {
            name: name.to_string(),
            kind,
            actions,
            roles,
            permissions: BTreeMap::new(),
            relation: None,
            rowlevel: true,
        };

        if kind == ModelKind::Resource {
            let declared = match (&block.permissions, &block.legacy_permissions) {
                (Some(permissions), _) => Some(permissions),
                (None, Some(legacy)) => {
                    warn!(
                        "{}: \"default-permissions\" is deprecated, use \"permissions\"",
                        name
                    );
                    Some(legacy)
                }
                (None, None) => None,
            };
            security.permissions =
                normalize_permissions(declared.unwrap_or(&self.config.default_permissions));

            let options = self
                .config
                .resources
                .get(name)
                .map(|entry| entry.options())
                .unwrap_or_default();
            let rel = options.rel.unwrap_or_else(|| self.config.rel.clone());
            security.relation = Some(self.owner_relation(name, &rel)?);
            security.rowlevel = options.rowlevel.unwrap_or(true);
        } else if block.permissions.is_some() {
            debug!("{}: permissions on an owner model are ignored", name);
        }

        Ok(security)
    }

    fn owner_relation(&self, model: &str, rel: &str) -> Result<OwnerRelation> {
        let relation = self.catalog.relation(model, rel).ok_or_else(|| {
            AuthzError::Config(format!("Model {} has no relation {} to an owner", model, rel))
        })?;

        match &relation {
            Relation::BelongsTo { target, .. } if !self.config.owners.contains(target) => {
                return Err(AuthzError::Config(format!(
                    "Relation {}.{} points at {}, which is not an owner model",
                    model, rel, target
                )));
            }
            _ if !relation.is_owner_pointing() => {
                return Err(AuthzError::Config(format!(
                    "Relation {}.{} must be belongsTo or polymorphic to identify an owner",
                    model, rel
                )));
            }
            _ => {}
        }

        Ok(OwnerRelation {
            name: rel.to_string(),
            relation,
        })
    }
}

fn normalize_permissions(permissions: &PermissionMap) -> BTreeMap<String, Vec<String>> {
    permissions
        .iter()
        .map(|(role, value)| {
            let list = value
                .to_vec()
                .into_iter()
                .map(|action| action.to_uppercase())
                .collect();
            (role.clone(), list)
        })
        .collect()
}

fn belongs_to_owner(resource: &ModelSecurity, owner: &str) -> bool {
    match resource.relation.as_ref().map(|r| &r.relation) {
        Some(Relation::BelongsTo { target, .. }) => target == owner,
        Some(Relation::Polymorphic { .. }) => true,
        _ => false,
    }
}

/// Add a resource's namespaced actions to the owner's vocabulary and its
/// permitted actions to the matching owner roles. Set union, so order free.
fn fold_resource(owner: &mut ModelSecurity, resource: &ModelSecurity) {
    for action in resource.actions.values() {
        let token = resource.namespaced(&action.name);
        owner.actions.entry(token.clone()).or_insert_with(|| ActionDef {
            name: token,
            title: action.title.clone(),
            methods: Vec::new(),
        });
    }

    for role in owner.roles.values_mut() {
        let Some(permitted) = resource.permissions.get(&role.name) else {
            continue;
        };

        let expanded: Vec<&String> = if permitted.iter().any(|a| a == actions::ALL) {
            resource.actions.keys().collect()
        } else {
            permitted.iter().collect()
        };

        role.actions
            .extend(expanded.into_iter().map(|a| namespaced_action(&resource.name, a)));
    }
}
