//! Interceptor chain invoked by the data-access layer
//!
//! The host calls [`InterceptorChain::before_write`] before a write or
//! execute operation, [`InterceptorChain::after_write`] after it committed,
//! and [`InterceptorChain::on_read`] on every query.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::data::DataSource;
use crate::error::{AuthzError, Result};
use crate::engine::MetricsCollector;
use crate::filter::{FilterOutcome, Query, QueryFilter};
use crate::policy::AuthorizationPolicy;
use crate::provision::Provisioner;
use crate::resolver::parse_relation_method;
use crate::types::{AccessContext, ReadContext};

/// Hook points of the data-access layer
#[async_trait]
pub trait Interceptor: Send + Sync {
    /// Name for logs
    fn name(&self) -> &str;

    /// Reject the operation by returning an error
    async fn before_write(&self, _ctx: &AccessContext) -> Result<()> {
        Ok(())
    }

    /// `instance` is the committed record
    async fn after_write(&self, _ctx: &AccessContext, _instance: &Value) -> Result<()> {
        Ok(())
    }

    async fn on_read(&self, _ctx: &ReadContext, _query: &mut Query) -> Result<()> {
        Ok(())
    }
}

/// Ordered set of interceptors
#[derive(Clone, Default)]
pub struct InterceptorChain {
    interceptors: Vec<Arc<dyn Interceptor>>,
}

impl InterceptorChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, interceptor: Arc<dyn Interceptor>) -> Self {
        self.interceptors.push(interceptor);
        self
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    /// Stops at the first interceptor that rejects
    pub async fn before_write(&self, ctx: &AccessContext) -> Result<()> {
        for interceptor in &self.interceptors {
            interceptor.before_write(ctx).await?;
        }
        Ok(())
    }

    /// Runs every interceptor; returns the first error after all ran
    pub async fn after_write(&self, ctx: &AccessContext, instance: &Value) -> Result<()> {
        let mut first_error = None;
        for interceptor in &self.interceptors {
            if let Err(err) = interceptor.after_write(ctx, instance).await {
                warn!("{} after-write failed: {}", interceptor.name(), err);
                first_error.get_or_insert(err);
            }
        }
        first_error.map_or(Ok(()), Err)
    }

    pub async fn on_read(&self, ctx: &ReadContext, query: &mut Query) -> Result<()> {
        for interceptor in &self.interceptors {
            interceptor.on_read(ctx, query).await?;
        }
        Ok(())
    }
}

/// Runs an authorization policy before writes
pub struct AuthorizeInterceptor {
    policy: Arc<dyn AuthorizationPolicy>,
}

impl AuthorizeInterceptor {
    pub fn new(policy: Arc<dyn AuthorizationPolicy>) -> Self {
        Self { policy }
    }
}

#[async_trait]
impl Interceptor for AuthorizeInterceptor {
    fn name(&self) -> &str {
        "authorize"
    }

    async fn before_write(&self, ctx: &AccessContext) -> Result<()> {
        if self.policy.decide(ctx).await? {
            return Ok(());
        }
        Err(AuthzError::AccessDenied {
            principal: ctx
                .principal_id
                .clone()
                .unwrap_or_else(|| "anonymous".to_string()),
            model: ctx.resource_type.clone(),
            method: ctx.method.clone(),
        })
    }
}

/// Provisions roles and grants after creates
pub struct ProvisionInterceptor {
    provisioner: Provisioner,
    data: Arc<dyn DataSource>,
}

impl ProvisionInterceptor {
    pub fn new(provisioner: Provisioner, data: Arc<dyn DataSource>) -> Self {
        Self { provisioner, data }
    }

    /// Model of the instance a create produced, or None for other methods
    fn created_model(&self, ctx: &AccessContext) -> Option<String> {
        if ctx.method == "create" {
            return Some(ctx.resource_type.clone());
        }
        let parsed = parse_relation_method(&ctx.method).filter(|m| m.method == "create")?;
        let relation = self.data.relation(&ctx.resource_type, parsed.relation)?;
        relation.target().map(String::from)
    }
}

#[async_trait]
impl Interceptor for ProvisionInterceptor {
    fn name(&self) -> &str {
        "provision"
    }

    async fn after_write(&self, ctx: &AccessContext, instance: &Value) -> Result<()> {
        let Some(model) = self.created_model(ctx) else {
            return Ok(());
        };
        debug!("Provisioning new {} instance", model);
        self.provisioner
            .on_created(&model, instance, ctx.principal_id.as_deref())
            .await
            .map(|_| ())
    }
}

/// Restricts reads through the query filter
pub struct FilterInterceptor {
    filter: QueryFilter,
    metrics: Option<Arc<MetricsCollector>>,
}

impl FilterInterceptor {
    pub fn new(filter: QueryFilter) -> Self {
        Self {
            filter,
            metrics: None,
        }
    }

    /// Count restricted reads
    pub fn with_metrics(mut self, metrics: Option<Arc<MetricsCollector>>) -> Self {
        self.metrics = metrics;
        self
    }
}

#[async_trait]
impl Interceptor for FilterInterceptor {
    fn name(&self) -> &str {
        "filter"
    }

    async fn on_read(&self, ctx: &ReadContext, query: &mut Query) -> Result<()> {
        let outcome = self.filter.apply(ctx, query).await?;
        if let (Some(metrics), FilterOutcome::Restricted { .. }) = (&self.metrics, &outcome) {
            metrics.record_filtered_read().await;
        }
        Ok(())
    }
}
