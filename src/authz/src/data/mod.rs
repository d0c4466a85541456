//! Data-access collaborator contract
//!
//! The engine never talks to a database directly. Hosts implement
//! [`RelationCatalog`] (static relation metadata) and [`DataSource`]
//! (privileged reads that bypass the query filter).

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;

pub use memory::MemoryDataSource;

/// Relation metadata of a model
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Relation {
    /// Direct foreign key to a fixed target model
    BelongsTo {
        target: String,
        #[serde(rename = "foreignKey")]
        foreign_key: String,
    },

    /// Polymorphic pair: discriminator field holds the target model name
    Polymorphic {
        discriminator: String,
        #[serde(rename = "foreignKey")]
        foreign_key: String,
    },

    /// One-to-many; the foreign key lives on the target
    HasMany {
        target: String,
        #[serde(rename = "foreignKey")]
        foreign_key: String,
    },
}

impl Relation {
    pub fn belongs_to(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::BelongsTo {
            target: target.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn polymorphic(discriminator: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::Polymorphic {
            discriminator: discriminator.into(),
            foreign_key: foreign_key.into(),
        }
    }

    pub fn has_many(target: impl Into<String>, foreign_key: impl Into<String>) -> Self {
        Self::HasMany {
            target: target.into(),
            foreign_key: foreign_key.into(),
        }
    }

    /// Fixed target model, if the relation is not polymorphic
    pub fn target(&self) -> Option<&str> {
        match self {
            Self::BelongsTo { target, .. } | Self::HasMany { target, .. } => Some(target),
            Self::Polymorphic { .. } => None,
        }
    }

    /// Whether the relation can point at an owner
    pub fn is_owner_pointing(&self) -> bool {
        matches!(self, Self::BelongsTo { .. } | Self::Polymorphic { .. })
    }
}

/// Static relation metadata lookup
pub trait RelationCatalog: Send + Sync {
    /// Look up relation `name` declared on `model`
    fn relation(&self, model: &str, name: &str) -> Option<Relation>;

    /// Every relation declared on `model`, by name
    fn relations(&self, model: &str) -> Vec<(String, Relation)>;

    /// Name of the primary key field of `model`
    fn id_field(&self, _model: &str) -> String {
        "id".to_string()
    }
}

/// Privileged data access used by the engine.
///
/// Reads through this trait must NOT pass through the query filter,
/// otherwise owner resolution would recurse into authorization.
#[async_trait]
pub trait DataSource: RelationCatalog {
    /// Fetch one instance by id
    async fn find_by_id_privileged(&self, model: &str, id: &str) -> Result<Option<Value>>;

    /// Page through all instances of a model (ordered by id)
    async fn find_privileged(
        &self,
        model: &str,
        limit: Option<usize>,
        offset: usize,
    ) -> Result<Vec<Value>>;

    /// Id `id` of `model` in the type the model stores it with.
    ///
    /// ACL stores hand ids back as strings; queries must compare them
    /// against the stored column type.
    fn typed_id(&self, _model: &str, id: &str) -> Value {
        Value::String(id.to_string())
    }
}
