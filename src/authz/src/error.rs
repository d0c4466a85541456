//! Error types for the authorization engine

use thiserror::Error;

/// Authorization engine errors
#[derive(Debug, Error)]
pub enum AuthzError {
    /// Invalid or inconsistent security configuration. Fatal at build time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Model is neither an owner nor a resource type
    #[error("Model {0} is not under access control")]
    UnknownModel(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// ACL store failure (network, storage)
    #[error("ACL store error: {0}")]
    Store(String),

    /// Data-access collaborator failure
    #[error("Data access error: {0}")]
    DataAccess(String),

    /// Operation rejected by the role resolver
    #[error("Access denied: {principal} may not {method} on {model}")]
    AccessDenied {
        principal: String,
        model: String,
        method: String,
    },

    /// One or more provisioning steps failed after the write committed
    #[error("Provisioning incomplete for {target}: {failures:?}")]
    Provisioning {
        target: String,
        failures: Vec<String>,
    },

    /// JSON (de)serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl AuthzError {
    /// Whether this error originates from the security configuration
    pub fn is_config(&self) -> bool {
        matches!(self, Self::Config(_) | Self::UnknownModel(_))
    }
}

/// Result type for authorization operations
pub type Result<T> = std::result::Result<T, AuthzError>;
