//! Current/target owner resolution

use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tracing::debug;

use crate::data::{DataSource, Relation};
use crate::error::Result;
use crate::schema::{OwnerRelation, SchemaRegistry};
use crate::types::{id_from_value, AccessContext, OwnerRef};

/// Outcome of current-owner resolution
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "owner", rename_all = "lowercase")]
pub enum OwnerResolution {
    /// Owner scope identified
    Resolved(OwnerRef),
    /// Owner genuinely indeterminate from the available data
    Unresolved,
}

impl OwnerResolution {
    pub fn owner(&self) -> Option<&OwnerRef> {
        match self {
            Self::Resolved(owner) => Some(owner),
            Self::Unresolved => None,
        }
    }
}

impl From<Option<OwnerRef>> for OwnerResolution {
    fn from(owner: Option<OwnerRef>) -> Self {
        owner.map(Self::Resolved).unwrap_or(Self::Unresolved)
    }
}

/// Both scopes of one access context
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScopes {
    pub current: OwnerResolution,
    /// Scope the payload tries to place the instance in
    pub target: Option<OwnerRef>,
}

impl ResolvedScopes {
    /// Target scope when it differs from the current one
    pub fn moved_to(&self) -> Option<&OwnerRef> {
        let current = self.current.owner()?;
        self.target.as_ref().filter(|target| *target != current)
    }
}

/// Resolves owner scopes of an [`AccessContext`].
///
/// Instance lookups go through [`DataSource::find_by_id_privileged`], which
/// bypasses the query filter.
#[derive(Clone)]
pub struct AccessContextResolver {
    schema: Arc<SchemaRegistry>,
    data: Arc<dyn DataSource>,
}

impl AccessContextResolver {
    pub fn new(schema: Arc<SchemaRegistry>, data: Arc<dyn DataSource>) -> Self {
        Self { schema, data }
    }

    /// Resolve current and target owner concurrently
    pub async fn resolve(&self, ctx: &AccessContext) -> Result<ResolvedScopes> {
        let (current, target) = tokio::try_join!(self.current_owner(ctx), async {
            self.target_owner(ctx)
        })?;
        Ok(ResolvedScopes { current, target })
    }

    /// Scope the acted-upon instance currently belongs to.
    ///
    /// Unknown models and resources without an owner relation are errors;
    /// missing data is [`OwnerResolution::Unresolved`].
    pub async fn current_owner(&self, ctx: &AccessContext) -> Result<OwnerResolution> {
        let model = self.schema.require(&ctx.resource_type)?;

        if model.is_owner() {
            let owner = ctx
                .instance_id
                .as_ref()
                .map(|id| OwnerRef::new(&ctx.resource_type, id.as_str()));
            debug!(
                "{}.{}: owner model, current owner {:?}",
                ctx.resource_type, ctx.method, owner
            );
            return Ok(owner.into());
        }

        let relation = self.schema.owner_relation(&ctx.resource_type)?;

        if let Some(id) = &ctx.instance_id {
            match self.data.find_by_id_privileged(&ctx.resource_type, id).await? {
                Some(instance) => {
                    if let Some(owner) = extract_owner(relation, &instance) {
                        debug!("{}:{} belongs to {}", ctx.resource_type, id, owner);
                        return Ok(OwnerResolution::Resolved(owner));
                    }
                    debug!("{}:{} has no owner reference", ctx.resource_type, id);
                }
                None => debug!("{}:{} not found", ctx.resource_type, id),
            }
        }

        let from_payload = ctx
            .payload
            .as_ref()
            .and_then(|payload| extract_owner(relation, payload));
        if from_payload.is_none() {
            debug!(
                "{}.{}: current owner unresolved",
                ctx.resource_type, ctx.method
            );
        }
        Ok(from_payload.into())
    }

    /// Scope implied by the incoming payload; never read from storage
    pub fn target_owner(&self, ctx: &AccessContext) -> Result<Option<OwnerRef>> {
        let model = self.schema.require(&ctx.resource_type)?;
        let Some(relation) = model.relation.as_ref() else {
            return Ok(None);
        };
        Ok(ctx
            .payload
            .as_ref()
            .and_then(|payload| extract_owner(relation, payload)))
    }

    /// Owner of a stored resource instance (used after a write)
    pub fn owner_of_instance(&self, model: &str, instance: &Value) -> Result<Option<OwnerRef>> {
        let relation = self.schema.owner_relation(model)?;
        Ok(extract_owner(relation, instance))
    }
}

/// Extract an owner reference from instance or payload data.
///
/// Discrete fields win over the combined relation-named field, which may hold
/// `"type:id"` or `{"type", "id"}`. Both type and id are required.
pub fn extract_owner(relation: &OwnerRelation, data: &Value) -> Option<OwnerRef> {
    let fields = data.as_object()?;
    let combined = || fields.get(&relation.name).and_then(OwnerRef::from_value);

    match &relation.relation {
        Relation::BelongsTo {
            target,
            foreign_key,
        } => match fields.get(foreign_key).and_then(id_from_value) {
            Some(id) => Some(OwnerRef::new(target.as_str(), id)),
            None => combined().filter(|owner| &owner.owner_type == target),
        },
        Relation::Polymorphic {
            discriminator,
            foreign_key,
        } => {
            let owner_type = fields
                .get(discriminator)
                .and_then(Value::as_str)
                .filter(|t| !t.is_empty());
            let id = fields.get(foreign_key).and_then(id_from_value);
            match (owner_type, id) {
                (Some(owner_type), Some(id)) => Some(OwnerRef::new(owner_type, id)),
                _ => combined(),
            }
        }
        Relation::HasMany { .. } => None,
    }
}
