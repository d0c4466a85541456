//! Immutable schema registry
//!
//! Populated once by the [`SchemaBuilder`](super::SchemaBuilder) and shared
//! read-only (behind an `Arc`) by every component afterwards. Owner/resource
//! membership is a set lookup.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use super::types::{ModelSecurity, OwnerRelation};
use crate::error::{AuthzError, Result};

/// Normalized security settings for all access-controlled models
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    pub(super) models: HashMap<String, Arc<ModelSecurity>>,
    pub(super) owners: BTreeSet<String>,
    pub(super) resources: BTreeSet<String>,
    pub(super) user_model: String,
    pub(super) admin_role: String,
    pub(super) default_creator_roles: Vec<String>,
    pub(super) creator_fields: Vec<String>,
}

impl SchemaRegistry {
    /// Security settings of a model, if it is access-controlled
    pub fn model(&self, name: &str) -> Option<&Arc<ModelSecurity>> {
        self.models.get(name)
    }

    /// Security settings of a model, or `UnknownModel`
    pub fn require(&self, name: &str) -> Result<&Arc<ModelSecurity>> {
        self.models
            .get(name)
            .ok_or_else(|| AuthzError::UnknownModel(name.to_string()))
    }

    pub fn is_owner(&self, name: &str) -> bool {
        self.owners.contains(name)
    }

    pub fn is_resource(&self, name: &str) -> bool {
        self.resources.contains(name)
    }

    /// Owner models, sorted by name
    pub fn owners(&self) -> impl Iterator<Item = &Arc<ModelSecurity>> {
        self.owners.iter().filter_map(|name| self.models.get(name))
    }

    /// Resource models, sorted by name
    pub fn resources(&self) -> impl Iterator<Item = &Arc<ModelSecurity>> {
        self.resources.iter().filter_map(|name| self.models.get(name))
    }

    /// All access-controlled models: owners first
    pub fn models(&self) -> impl Iterator<Item = &Arc<ModelSecurity>> {
        self.owners().chain(self.resources())
    }

    /// Owner relation of a resource model.
    ///
    /// A resource without one is a configuration error; the builder already
    /// rejects that, so this only fails for owners and unknown models.
    pub fn owner_relation(&self, model: &str) -> Result<&OwnerRelation> {
        self.require(model)?.relation.as_ref().ok_or_else(|| {
            AuthzError::Config(format!("Model {} has no owner relation", model))
        })
    }

    /// Model name of principals
    pub fn user_model(&self) -> &str {
        &self.user_model
    }

    /// Global bypass role name
    pub fn admin_role(&self) -> &str {
        &self.admin_role
    }

    /// Roles the creator of an owner instance is assigned to
    pub fn default_creator_roles(&self) -> &[String] {
        &self.default_creator_roles
    }

    /// Instance fields that may name the creator of an owner
    pub fn creator_fields(&self) -> &[String] {
        &self.creator_fields
    }
}
