//! Security engine
//!
//! Wires the schema, role resolver, query filter and provisioning observers
//! around a host's ACL store and data source, and records decision metrics.

pub mod decision;
pub mod metrics;

pub use decision::{Decision, DecisionReason};
pub use metrics::{EngineMetrics, MetricsCollector};

use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

use crate::abilities::{AbilityRegistrar, RegistrationReport};
use crate::acl::AclStore;
use crate::config::SaclConfig;
use crate::data::DataSource;
use crate::error::{AuthzError, Result};
use crate::filter::{FilterOutcome, Query, QueryFilter};
use crate::interceptor::{
    AuthorizeInterceptor, FilterInterceptor, InterceptorChain, ProvisionInterceptor,
};
use crate::policy::{AuthorizationPolicy, PolicyRegistry};
use crate::provision::{AutoupdateReport, ProvisionReport, Provisioner};
use crate::resolver::RoleResolver;
use crate::schema::{SchemaBuilder, SchemaRegistry};
use crate::types::{AccessContext, ReadContext};

/// Authorization engine facade
///
/// # Architecture
///
/// ```text
/// write:  AccessContext → AccessContextResolver → RoleResolver → Decision → [Metrics]
/// read:   ReadContext + Query → QueryFilter → Query AND id IN (...)
/// commit: instance → Provisioner → roles / grants
/// ```
#[derive(Clone)]
pub struct Security {
    config: Arc<SaclConfig>,
    schema: Arc<SchemaRegistry>,
    data: Arc<dyn DataSource>,
    resolver: RoleResolver,
    filter: QueryFilter,
    provisioner: Provisioner,
    registration: RegistrationReport,
    metrics: Option<Arc<MetricsCollector>>,
}

impl Security {
    /// Build the schema and publish action vocabularies.
    ///
    /// Schema errors are fatal. Vocabulary registration is best-effort; see
    /// [`registration`](Self::registration) for what failed.
    pub async fn new(
        config: SaclConfig,
        acl: Arc<dyn AclStore>,
        data: Arc<dyn DataSource>,
    ) -> Result<Self> {
        let schema = Arc::new(SchemaBuilder::new(&config, data.as_ref()).build()?);

        let registration = AbilityRegistrar::new(schema.clone(), acl.clone())
            .register_all()
            .await;

        let resolver = RoleResolver::new(schema.clone(), acl.clone(), data.clone())
            .with_fail_open(config.fail_open_on_unresolved);
        let filter = QueryFilter::new(schema.clone(), acl.clone(), data.clone());
        let provisioner = Provisioner::new(schema.clone(), acl, data.clone());

        let metrics = if config.enable_metrics {
            Some(Arc::new(MetricsCollector::new()))
        } else {
            None
        };

        info!(
            "Security initialized for role \"{}\": fail_open={}, metrics={}",
            config.role, config.fail_open_on_unresolved, config.enable_metrics
        );

        Ok(Self {
            config: Arc::new(config),
            schema,
            data,
            resolver,
            filter,
            provisioner,
            registration,
            metrics,
        })
    }

    pub fn config(&self) -> &SaclConfig {
        &self.config
    }

    pub fn schema(&self) -> &Arc<SchemaRegistry> {
        &self.schema
    }

    pub fn resolver(&self) -> &RoleResolver {
        &self.resolver
    }

    /// Outcome of vocabulary registration at startup
    pub fn registration(&self) -> &RegistrationReport {
        &self.registration
    }

    /// Run the decision procedure for a write/execute operation
    pub async fn evaluate(&self, ctx: &AccessContext) -> Result<Decision> {
        let start = Instant::now();
        let result = self.resolver.evaluate(ctx).await;

        if let Some(metrics) = &self.metrics {
            match &result {
                Ok(decision) => metrics.record_decision(decision).await,
                Err(_) => metrics.record_error().await,
            }
            metrics.record_latency(start.elapsed()).await;
        }

        let decision = result?;
        debug!(
            "Decision {} for {}.{}: {} ({})",
            decision.id,
            ctx.resource_type,
            ctx.method,
            if decision.allowed { "ALLOW" } else { "DENY" },
            decision.reason
        );
        Ok(decision)
    }

    pub async fn decide(&self, ctx: &AccessContext) -> Result<bool> {
        Ok(self.evaluate(ctx).await?.allowed)
    }

    /// `Ok` when allowed, [`AuthzError::AccessDenied`] otherwise
    pub async fn authorize(&self, ctx: &AccessContext) -> Result<()> {
        if self.decide(ctx).await? {
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

    /// Restrict a read query to permitted rows
    pub async fn filter_query(
        &self,
        ctx: &ReadContext,
        query: &mut Query,
    ) -> Result<FilterOutcome> {
        let outcome = self.filter.apply(ctx, query).await?;
        if let (Some(metrics), FilterOutcome::Restricted { .. }) = (&self.metrics, &outcome) {
            metrics.record_filtered_read().await;
        }
        Ok(outcome)
    }

    /// Run the provisioning observer for a committed create
    pub async fn after_create(
        &self,
        model: &str,
        instance: &Value,
        principal: Option<&str>,
    ) -> Result<ProvisionReport> {
        self.provisioner.on_created(model, instance, principal).await
    }

    /// Re-provision every existing owner and resource instance
    pub async fn autoupdate_permissions(&self, page_size: usize) -> Result<AutoupdateReport> {
        self.provisioner.autoupdate_permissions(page_size).await
    }

    /// Register this engine under the configured role identifier
    pub async fn install(&self, registry: &PolicyRegistry) -> Result<()> {
        registry
            .register(&self.config.role, Arc::new(self.clone()))
            .await
    }

    /// Interceptor chain for the data-access layer: authorize, provision, filter
    pub fn interceptors(&self) -> InterceptorChain {
        InterceptorChain::new()
            .with(Arc::new(AuthorizeInterceptor::new(Arc::new(self.clone()))))
            .with(Arc::new(ProvisionInterceptor::new(
                self.provisioner.clone(),
                self.data.clone(),
            )))
            .with(Arc::new(
                FilterInterceptor::new(self.filter.clone()).with_metrics(self.metrics.clone()),
            ))
    }

    /// Get engine metrics
    pub async fn get_metrics(&self) -> Option<EngineMetrics> {
        match &self.metrics {
            Some(metrics) => Some(metrics.get_metrics().await),
            None => None,
        }
    }

    pub async fn export_prometheus(&self) -> Option<String> {
        match &self.metrics {
            Some(metrics) => Some(metrics.export_prometheus().await),
            None => None,
        }
    }
}

#[async_trait]
impl AuthorizationPolicy for Security {
    async fn decide(&self, ctx: &AccessContext) -> Result<bool> {
        Security::decide(self, ctx).await
    }
}
