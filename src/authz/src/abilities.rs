//! Ability registrar
//!
//! Publishes each model's action vocabulary to the ACL store. Best-effort:
//! a failure for one model is logged and the others still register. A model
//! whose vocabulary never registered cannot be granted anything.

use futures::future::join_all;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::acl::AclStore;
use crate::schema::SchemaRegistry;

/// Outcome of a registration pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RegistrationReport {
    /// Models whose vocabulary was registered
    pub registered: Vec<String>,
    /// Models skipped for declaring no actions
    pub skipped: Vec<String>,
    /// Model name and error message of each failed registration
    pub failed: Vec<(String, String)>,
}

impl RegistrationReport {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Registers action vocabularies with the ACL store
pub struct AbilityRegistrar {
    schema: Arc<SchemaRegistry>,
    acl: Arc<dyn AclStore>,
}

impl AbilityRegistrar {
    pub fn new(schema: Arc<SchemaRegistry>, acl: Arc<dyn AclStore>) -> Self {
        Self { schema, acl }
    }

    /// Register every model's vocabulary concurrently
    pub async fn register_all(&self) -> RegistrationReport {
        let mut report = RegistrationReport::default();

        let models: Vec<_> = self
            .schema
            .models()
            .filter(|model| {
                if model.actions.is_empty() {
                    report.skipped.push(model.name.clone());
                    false
                } else {
                    true
                }
            })
            .collect();

        let results = join_all(models.iter().map(|model| async move {
            let vocabulary = model.vocabulary();
            debug!("Registering actions {:?} for {}", vocabulary, model.name);
            self.acl.register_actions(&model.name, &vocabulary).await
        }))
        .await;

        for (model, result) in models.iter().zip(results) {
            match result {
                Ok(()) => report.registered.push(model.name.clone()),
                Err(err) => {
                    error!("Failed to register actions for {}: {}", model.name, err);
                    report.failed.push((model.name.clone(), err.to_string()));
                }
            }
        }

        info!(
            "Registered actions for {} model(s), {} failed",
            report.registered.len(),
            report.failed.len()
        );
        report
    }
}
