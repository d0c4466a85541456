//! Normalized security schema types

use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

use crate::data::Relation;
use crate::error::{AuthzError, Result};
use crate::types::actions;

/// Whether a model is an owner (scope) or a resource living in a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    Owner,
    Resource,
}

/// A declared action
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionDef {
    /// Uppercase token
    pub name: String,
    pub title: Option<String>,
    /// Method names mapped onto this action
    pub methods: Vec<String>,
}

impl ActionDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_uppercase(),
            title: None,
            methods: Vec::new(),
        }
    }

    /// Normalize `name -> "Title"` or `name -> {title, methods}`
    pub(crate) fn from_setting(model: &str, name: &str, value: &Value) -> Result<Self> {
        let mut action = Self::new(name);
        match value {
            Value::String(title) => action.title = Some(title.clone()),
            Value::Object(map) => {
                action.title = map.get("title").and_then(Value::as_str).map(String::from);
                if let Some(methods) = map.get("methods") {
                    action.methods = string_list(methods).ok_or_else(|| {
                        invalid_setting(model, "actions", name)
                    })?;
                }
            }
            _ => return Err(invalid_setting(model, "actions", name)),
        }
        Ok(action)
    }
}

/// A declared role with its (folded) action set
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoleDef {
    pub name: String,
    pub title: Option<String>,
    /// Uppercase action tokens, including namespaced resource actions
    pub actions: BTreeSet<String>,
}

impl RoleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: None,
            actions: BTreeSet::new(),
        }
    }

    /// Normalize `name -> "Title"` or `name -> {title, actions}`
    pub(crate) fn from_setting(model: &str, name: &str, value: &Value) -> Result<Self> {
        let mut role = Self::new(name);
        match value {
            Value::String(title) => role.title = Some(title.clone()),
            Value::Object(map) => {
                role.title = map.get("title").and_then(Value::as_str).map(String::from);
                if let Some(list) = map.get("actions") {
                    let list = string_list(list)
                        .ok_or_else(|| invalid_setting(model, "roles", name))?;
                    role.actions = list.iter().map(|a| a.to_uppercase()).collect();
                }
            }
            _ => return Err(invalid_setting(model, "roles", name)),
        }
        Ok(role)
    }
}

/// The owner-pointing relation of a resource model
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OwnerRelation {
    /// Relation name (also the combined "type:id" payload field)
    pub name: String,
    pub relation: Relation,
}

/// Normalized security settings of one model
#[derive(Debug, Clone, Serialize)]
pub struct ModelSecurity {
    pub name: String,
    pub kind: ModelKind,
    pub actions: BTreeMap<String, ActionDef>,
    pub roles: BTreeMap<String, RoleDef>,
    /// Role name -> uppercase actions (may contain "*"); resources only
    pub permissions: BTreeMap<String, Vec<String>>,
    /// Owner relation; resources only
    pub relation: Option<OwnerRelation>,
    /// Apply the read filter to this model
    pub rowlevel: bool,
}

impl ModelSecurity {
    pub fn is_owner(&self) -> bool {
        self.kind == ModelKind::Owner
    }

    /// Token of `action` as held by owner roles: `"DOC:READ"` for resources
    pub fn namespaced(&self, action: &str) -> String {
        namespaced_action(&self.name, action)
    }

    /// Action tokens published to the ACL store
    pub fn vocabulary(&self) -> Vec<String> {
        self.actions.keys().cloned().collect()
    }

    /// Actions `role` receives on each new instance, with `"*"` expanded
    pub fn permitted_actions(&self, role: &str) -> Option<Vec<String>> {
        let permitted = self.permissions.get(role)?;
        if permitted.iter().any(|a| a == actions::ALL) {
            return Some(self.actions.keys().cloned().collect());
        }
        Some(permitted.clone())
    }

    /// Action whose declared methods include `method`
    pub fn action_for_declared_method(&self, method: &str) -> Option<&str> {
        self.actions
            .values()
            .find(|action| action.methods.iter().any(|m| m == method))
            .map(|action| action.name.as_str())
    }
}

/// `"<Type>:<ACTION>"`, uppercased
pub fn namespaced_action(model: &str, action: &str) -> String {
    format!("{}:{}", model, action).to_uppercase()
}

fn string_list(value: &Value) -> Option<Vec<String>> {
    match value {
        Value::String(s) => Some(vec![s.clone()]),
        Value::Array(items) => items
            .iter()
            .map(|item| item.as_str().map(String::from))
            .collect(),
        _ => None,
    }
}

fn invalid_setting(model: &str, property: &str, key: &str) -> AuthzError {
    AuthzError::Config(format!(
        "Invalid settings for model {} security settings {}.{}",
        model, property, key
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_action_shorthand() {
        let action = ActionDef::from_setting("Doc", "approve", &json!("Approve")).unwrap();
        assert_eq!(action.name, "APPROVE");
        assert_eq!(action.title.as_deref(), Some("Approve"));
        assert!(action.methods.is_empty());
    }

    #[test]
    fn test_action_with_methods() {
        let action = ActionDef::from_setting(
            "Doc",
            "publish",
            &json!({"title": "Publish", "methods": ["publish", "unpublish"]}),
        )
        .unwrap();
        assert_eq!(action.methods, vec!["publish", "unpublish"]);
    }

    #[test]
    fn test_rejects_non_string_non_object() {
        assert!(ActionDef::from_setting("Doc", "x", &json!(3)).is_err());
        assert!(RoleDef::from_setting("Team", "member", &json!(true)).is_err());
        assert!(RoleDef::from_setting("Team", "member", &json!({"actions": 1})).is_err());
    }

    #[test]
    fn test_role_actions_uppercased() {
        let role =
            RoleDef::from_setting("Team", "manager", &json!({"actions": ["write", "manage"]}))
                .unwrap();
        assert!(role.actions.contains("WRITE"));
        assert!(role.actions.contains("MANAGE"));
    }

    #[test]
    fn test_namespaced_action() {
        assert_eq!(namespaced_action("Doc", "read"), "DOC:READ");
    }
}
