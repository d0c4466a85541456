//! Query filter rewriter

use serde::Serialize;
use std::sync::Arc;
use tracing::debug;

use super::query::{Predicate, Query};
use crate::acl::AclStore;
use crate::data::{DataSource, Relation};
use crate::error::Result;
use crate::schema::{ModelSecurity, SchemaRegistry};
use crate::types::{actions, id_from_value, OwnerRef, ReadContext};

/// What the rewriter did to a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum FilterOutcome {
    /// Privileged read, no principal, or model not filtered
    Bypassed,
    /// Principal is an admin; query left as is
    Unrestricted,
    /// Query restricted to these ids
    Restricted { ids: Vec<String> },
}

/// Restricts reads to the ids the principal may `READ`
#[derive(Clone)]
pub struct QueryFilter {
    schema: Arc<SchemaRegistry>,
    acl: Arc<dyn AclStore>,
    data: Arc<dyn DataSource>,
}

impl QueryFilter {
    pub fn new(
        schema: Arc<SchemaRegistry>,
        acl: Arc<dyn AclStore>,
        data: Arc<dyn DataSource>,
    ) -> Self {
        Self { schema, acl, data }
    }

    /// Whether reads of `model` go through the filter
    pub fn applies_to(&self, model: &str) -> bool {
        self.schema
            .model(model)
            .map(|security| security.is_owner() || security.rowlevel)
            .unwrap_or(false)
    }

    /// Merge the read restriction for `ctx` into `query`
    pub async fn apply(&self, ctx: &ReadContext, query: &mut Query) -> Result<FilterOutcome> {
        if ctx.privileged {
            debug!("{} - Skip filter for privileged read", ctx.model);
            return Ok(FilterOutcome::Bypassed);
        }

        let Some(principal) = ctx.principal_id.as_deref() else {
            debug!("{} - Skip filter for no principal attached", ctx.model);
            return Ok(FilterOutcome::Bypassed);
        };

        if !self.applies_to(&ctx.model) {
            return Ok(FilterOutcome::Bypassed);
        }
        let model = self.schema.require(&ctx.model)?;

        if self.acl.has_role(principal, self.schema.admin_role()).await? {
            debug!("{} - Skip filter for admin {}", ctx.model, principal);
            return Ok(FilterOutcome::Unrestricted);
        }

        let ids = match self.pinned_scope(model, query) {
            Some(scope) => {
                debug!("{} - Find allowed resources within {}", ctx.model, scope);
                self.acl
                    .allowed_resources_with_scope(principal, &scope, actions::READ, &ctx.model)
                    .await?
            }
            None => {
                debug!("{} - Find allowed resources across scopes", ctx.model);
                self.acl
                    .allowed_resources(principal, actions::READ, &ctx.model)
                    .await?
            }
        };

        query.restrict(Predicate::is_in(
            self.data.id_field(&ctx.model),
            ids.iter().map(|id| self.data.typed_id(&ctx.model, id)),
        ));
        debug!("{} - Restricted query: {:?}", ctx.model, query.filter);

        Ok(FilterOutcome::Restricted { ids })
    }

    /// Owner scope the query already pins, if any
    fn pinned_scope(&self, model: &ModelSecurity, query: &Query) -> Option<OwnerRef> {
        if model.is_owner() {
            let id = query.pinned_value(&self.data.id_field(&model.name))?;
            return Some(OwnerRef::new(model.name.as_str(), id_from_value(id)?));
        }

        match &model.relation.as_ref()?.relation {
            Relation::BelongsTo {
                target,
                foreign_key,
            } => {
                let id = id_from_value(query.pinned_value(foreign_key)?)?;
                Some(OwnerRef::new(target.as_str(), id))
            }
            Relation::Polymorphic {
                discriminator,
                foreign_key,
            } => {
                let owner_type = query.pinned_value(discriminator)?.as_str()?;
                let id = id_from_value(query.pinned_value(foreign_key)?)?;
                Some(OwnerRef::new(owner_type, id))
            }
            Relation::HasMany { .. } => None,
        }
    }
}
