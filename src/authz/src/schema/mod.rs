//! Security schema module
//!
//! Normalizes each model's declarative security block into an immutable
//! registry and folds resource permissions into owner roles.
//!
//! # Examples
//!
//! ```
//! use sacl_authz::config::SaclConfig;
//! use sacl_authz::data::{MemoryDataSource, Relation};
//! use sacl_authz::schema::SchemaBuilder;
//!
//! let data = MemoryDataSource::new()
//!     .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"));
//! let config = SaclConfig::default()
//!     .with_owner("Team")
//!     .with_resource("Doc", "team");
//!
//! let schema = SchemaBuilder::new(&config, &data).build().unwrap();
//! assert!(schema.is_owner("Team"));
//! assert!(schema.model("Team").unwrap().actions.contains_key("DOC:READ"));
//! ```

mod builder;
mod registry;
mod types;


pub use builder::SchemaBuilder;
pub use registry::SchemaRegistry;
pub use types::{
    namespaced_action, ActionDef, ModelKind, ModelSecurity, OwnerRelation, RoleDef,
};
