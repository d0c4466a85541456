//! In-memory data source
//!
//! Backs tests and embedded hosts. Instances are JSON objects keyed by the
//! model's id field.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use super::{DataSource, Relation, RelationCatalog};
use crate::error::{AuthzError, Result};
use crate::types::id_from_value;

/// In-memory data source implementation
#[derive(Clone, Default)]
pub struct MemoryDataSource {
    relations: Arc<DashMap<(String, String), Relation>>,
    id_fields: Arc<DashMap<String, String>>,
    instances: Arc<DashMap<String, BTreeMap<String, Value>>>,
}

impl MemoryDataSource {
    /// Create an empty data source
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a relation on a model
    pub fn with_relation(self, model: &str, name: &str, relation: Relation) -> Self {
        self.relations
            .insert((model.to_string(), name.to_string()), relation);
        self
    }

    /// Override the id field of a model (default "id")
    pub fn with_id_field(self, model: &str, field: &str) -> Self {
        self.id_fields.insert(model.to_string(), field.to_string());
        self
    }

    /// Insert or replace an instance; returns its id
    pub fn insert(&self, model: &str, instance: Value) -> Result<String> {
        let id_field = self.id_field(model);
        let id = instance
            .get(&id_field)
            .and_then(id_from_value)
            .ok_or_else(|| {
                AuthzError::InvalidInput(format!("{} instance has no '{}' field", model, id_field))
            })?;

        self.instances
            .entry(model.to_string())
            .or_default()
            .insert(id.clone(), instance);

        Ok(id)
    }

    /// Remove an instance
    pub fn remove(&self, model: &str, id: &str) -> Option<Value> {
        self.instances
            .get_mut(model)
            .and_then(|mut rows| rows.remove(id))
    }
}

impl RelationCatalog for MemoryDataSource {
    fn relation(&self, model: &str, name: &str) -> Option<Relation> {
        self.relations
            .get(&(model.to_string(), name.to_string()))
            .map(|r| r.clone())
    }

    fn relations(&self, model: &str) -> Vec<(String, Relation)> {
        let mut relations: Vec<(String, Relation)> = self
            .relations
            .iter()
            .filter(|entry| entry.key().0 == model)
            .map(|entry| (entry.key().1.clone(), entry.value().clone()))
            .collect();
        relations.sort_by(|a, b| a.0.cmp(&b.0));
        relations
    }

    fn id_field(&self, model: &str) -> String {
        self.id_fields
            .get(model)
            .map(|f| f.clone())
            .unwrap_or_else(|| "id".to_string())
    }
}

#[async_trait]
impl DataSource for MemoryDataSource {
    async fn find_by_id_privileged(&self, model: &str, id: &str) -> Result<Option<Value>> {
        Ok(self
            .instances
            .get(model)
            .and_then(|rows| rows.get(id).cloned()))
    }

    async fn find_privileged(
        &self,
        model: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>> {
        let Some(rows) = self.instances.get(model) else {
            return Ok(Vec::new());
        };

        let page = rows.values().skip(offset);
        Ok(match limit {
            Some(limit) => page.take(limit).cloned().collect(),
            None => page.cloned().collect(),
        })
    }

    fn typed_id(&self, model: &str, id: &str) -> Value {
        let id_field = self.id_field(model);
        self.instances
            .get(model)
            .and_then(|rows| rows.get(id).and_then(|row| row.get(&id_field).cloned()))
            .unwrap_or_else(|| Value::String(id.to_string()))
    }
}
