//! Role resolver: the write/execute decision procedure

use std::sync::Arc;
use tracing::{debug, warn};

use super::actions::resolve_action;
use crate::acl::AclStore;
use crate::context::{AccessContextResolver, OwnerResolution};
use crate::data::DataSource;
use crate::engine::{Decision, DecisionReason};
use crate::error::Result;
use crate::schema::SchemaRegistry;
use crate::types::AccessContext;

/// Decides whether the principal of an [`AccessContext`] may run its method.
///
/// Order of checks, stopping at the first determining one:
///
/// 1. no principal: deny
/// 2. global admin role: allow
/// 3. plain create of an owner model: allow
/// 4. current owner unresolved: allow (fail-open, configurable)
/// 5. current owner is the principal itself: allow
/// 6. action granted in the current owner scope
/// 7. if the payload moves the instance, action granted in the target scope too
///
/// Store failures propagate as errors and never turn into allow or deny.
#[derive(Clone)]
pub struct RoleResolver {
    schema: Arc<SchemaRegistry>,
    acl: Arc<dyn AclStore>,
    data: Arc<dyn DataSource>,
    contexts: AccessContextResolver,
    fail_open: bool,
}

impl RoleResolver {
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
            fail_open: true,
        }
    }

    /// Deny instead of allow when the current owner cannot be determined
    pub fn with_fail_open(mut self, fail_open: bool) -> Self {
        self.fail_open = fail_open;
        self
    }

    /// Run the decision procedure
    pub async fn evaluate(&self, ctx: &AccessContext) -> Result<Decision> {
        let target = format!("{}.{}", ctx.resource_type, ctx.method);

        let Some(principal) = ctx.principal_id.as_deref() else {
            debug!("{} - Denied access for anonymous principal", target);
            return Ok(Decision::deny(DecisionReason::Anonymous));
        };

        // Owner resolution errors must not hide an admin
        let (is_admin, scopes) = tokio::join!(
            self.acl.has_role(principal, self.schema.admin_role()),
            self.contexts.resolve(ctx)
        );

        if is_admin? {
            debug!(
                "{} - Principal {} holds the {} role",
                target,
                principal,
                self.schema.admin_role()
            );
            return Ok(Decision::allow(DecisionReason::Admin));
        }

        let scopes = scopes?;
        let action = resolve_action(
            &self.schema,
            self.data.as_ref(),
            &ctx.resource_type,
            &ctx.method,
        )?;

        let current = match &scopes.current {
            OwnerResolution::Resolved(owner) => owner.clone(),
            OwnerResolution::Unresolved if self.is_owner_creation(ctx) => {
                debug!("{} - {} creates a new owner", target, principal);
                return Ok(Decision::allow(DecisionReason::OwnerCreation).with_action(action));
            }
            OwnerResolution::Unresolved => {
                let decision = if self.fail_open {
                    warn!(
                        "{} - Could not determine owner, skipping ACL check for {}",
                        target, principal
                    );
                    Decision::allow(DecisionReason::UnresolvedOwner)
                } else {
                    debug!("{} - Could not determine owner, denying {}", target, principal);
                    Decision::deny(DecisionReason::UnresolvedOwner)
                };
                return Ok(decision
                    .with_action(action)
                    .with_target_owner(scopes.target));
            }
        };

        if current.owner_type == self.schema.user_model() && current.id == principal {
            debug!("{} - Principal {} acts on itself", target, principal);
            return Ok(Decision::allow(DecisionReason::SelfAccess)
                .with_action(action)
                .with_current_owner(Some(current)));
        }

        debug!(
            "{} - Checking whether {} has {} in {}",
            target, principal, action, current
        );
        if !self.acl.is_allowed(principal, &current, &action).await? {
            debug!("{} - {} lacks {} in {}", target, principal, action, current);
            return Ok(Decision::deny(DecisionReason::DeniedInCurrent)
                .with_action(action)
                .with_current_owner(Some(current))
                .with_target_owner(scopes.target));
        }

        if let Some(moved_to) = scopes.moved_to() {
            let allowed = self.acl.is_allowed(principal, moved_to, &action).await?;
            debug!(
                "{} - Moving into {}, {} is{} allowed there",
                target,
                moved_to,
                principal,
                if allowed { "" } else { " not" }
            );
            let decision = if allowed {
                Decision::allow(DecisionReason::Granted)
            } else {
                Decision::deny(DecisionReason::DeniedInTarget)
            };
            return Ok(decision
                .with_action(action)
                .with_current_owner(Some(current))
                .with_target_owner(scopes.target));
        }

        debug!("{} - {} has {} in {}", target, principal, action, current);
        Ok(Decision::allow(DecisionReason::Granted)
            .with_action(action)
            .with_current_owner(Some(current))
            .with_target_owner(scopes.target))
    }

    /// A plain create of an owner model has no scope of its own yet; any
    /// authenticated principal may found one
    fn is_owner_creation(&self, ctx: &AccessContext) -> bool {
        self.schema.is_owner(&ctx.resource_type)
            && ctx.instance_id.is_none()
            && ctx.method == "create"
    }

    /// Boolean projection of [`evaluate`](Self::evaluate)
    pub async fn decide(&self, ctx: &AccessContext) -> Result<bool> {
        Ok(self.evaluate(ctx).await?.allowed)
    }
}
