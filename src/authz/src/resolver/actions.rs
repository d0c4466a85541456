//! Method to action mapping

use once_cell::sync::Lazy;
use regex::Regex;

use crate::data::RelationCatalog;
use crate::error::Result;
use crate::schema::{ModelSecurity, SchemaRegistry};
use crate::types::actions;

/// `__<method>__<relation>`, e.g. `__create__docs`
static RELATION_METHOD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^__([^_]+)__([^_]+)").expect("invalid relation method pattern"));

/// A relation (prototype) method split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RelationMethod<'a> {
    pub method: &'a str,
    pub relation: &'a str,
}

/// Split `__create__docs` into `create` on relation `docs`
pub fn parse_relation_method(method: &str) -> Option<RelationMethod<'_>> {
    let captures = RELATION_METHOD.captures(method)?;
    Some(RelationMethod {
        method: captures.get(1)?.as_str(),
        relation: captures.get(2)?.as_str(),
    })
}

/// Built-in action of a method without a declared mapping.
///
/// Anything unrecognized falls back to `MANAGE`.
pub fn default_action(method: &str) -> &'static str {
    match method {
        "create" => actions::MANAGE,
        "exists" | "count" => actions::READ,
        m if m.starts_with("update") || m.starts_with("upsert") => actions::WRITE,
        m if m.starts_with("find") => actions::READ,
        m if m.starts_with("destroy") || m.starts_with("delete") || m.starts_with("remove") => {
            actions::MANAGE
        }
        _ => actions::MANAGE,
    }
}

/// Declared mapping of `model`, else the built-in one
pub fn method_action(model: &ModelSecurity, method: &str) -> String {
    model
        .action_for_declared_method(method)
        .map(String::from)
        .unwrap_or_else(|| default_action(method).to_string())
}

/// Action token checked for `method` on `model`.
///
/// Owner models use the bare action; resources use `"<TYPE>:<ACTION>"`.
/// A relation method whose relation targets a resource model is checked
/// against that resource's namespaced action.
pub fn resolve_action<C: RelationCatalog + ?Sized>(
    schema: &SchemaRegistry,
    catalog: &C,
    model: &str,
    method: &str,
) -> Result<String> {
    let acting = schema.require(model)?;

    let method = match parse_relation_method(method) {
        Some(parsed) => {
            let target = catalog
                .relation(model, parsed.relation)
                .and_then(|relation| relation.target().and_then(|t| schema.model(t)).cloned());

            if let Some(target) = target.filter(|t| !t.is_owner()) {
                return Ok(target.namespaced(&method_action(&target, parsed.method)));
            }
            parsed.method
        }
        None => method,
    };

    let action = method_action(acting, method);
    if acting.is_owner() {
        Ok(action.to_uppercase())
    } else {
        Ok(acting.namespaced(&action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_relation_method() {
        let parsed = parse_relation_method("__create__docs").unwrap();
        assert_eq!(parsed.method, "create");
        assert_eq!(parsed.relation, "docs");

        let plain = parse_relation_method("__get__team").unwrap();
        assert_eq!(plain.method, "get");

        assert!(parse_relation_method("create").is_none());
        assert!(parse_relation_method("__create").is_none());
    }

    #[test]
    fn test_default_actions() {
        assert_eq!(default_action("create"), "MANAGE");
        assert_eq!(default_action("updateAttributes"), "WRITE");
        assert_eq!(default_action("updateOrCreate"), "WRITE");
        assert_eq!(default_action("upsertWithWhere"), "WRITE");
        assert_eq!(default_action("exists"), "READ");
        assert_eq!(default_action("findById"), "READ");
        assert_eq!(default_action("findOne"), "READ");
        assert_eq!(default_action("count"), "READ");
        assert_eq!(default_action("destroyById"), "MANAGE");
        assert_eq!(default_action("deleteById"), "MANAGE");
        assert_eq!(default_action("removeById"), "MANAGE");
        assert_eq!(default_action("publish"), "MANAGE");
    }
}
