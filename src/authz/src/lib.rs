//! # SACL Authorization Engine
//!
//! Scoped, role-based authorization for multi-tenant data models. Every
//! protected resource belongs to an owner (a team, an organization, the user
//! itself) and permissions are computed per operation from the resource's
//! security schema and the principal's roles in the owner scope.
//!
//! ## Features
//!
//! - **Declarative schema** of actions, roles and permissions per model,
//!   with resource permissions folded into owner roles
//! - **Owner resolution** from stored instances, foreign keys, polymorphic
//!   pairs or combined `"type:id"` fields
//! - **Move-aware decisions**: reassigning a resource needs the action in
//!   both the source and the destination scope
//! - **Read filtering** by conjoining `id IN (...)` with the query's filter
//! - **Auto-provisioning** of per-owner roles and default grants on create
//! - **Async-first design** using Tokio; ACL store and data access are traits
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use sacl_authz::{
//!     AccessContext, MemoryAclStore, MemoryDataSource, Relation, SaclConfig, Security,
//! };
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let data = MemoryDataSource::new()
//!         .with_relation("Doc", "team", Relation::belongs_to("Team", "teamId"));
//!     let config = SaclConfig::default()
//!         .with_owner("Team")
//!         .with_resource("Doc", "team");
//!
//!     let acl = Arc::new(MemoryAclStore::new());
//!     let security = Security::new(config, acl, Arc::new(data)).await?;
//!
//!     let ctx = AccessContext::new("Doc", "create")
//!         .with_principal("alice")
//!         .with_payload(json!({"teamId": "t1"}));
//!
//!     // alice holds no role on team t1
//!     assert!(!security.decide(&ctx).await?);
//!     Ok(())
//! }
//! ```

pub mod abilities;
pub mod acl;
pub mod config;
pub mod context;
pub mod data;
pub mod engine;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod policy;
pub mod provision;
pub mod resolver;
pub mod schema;
pub mod types;

// Re-export commonly used types
pub use acl::{AclStore, MemoryAclStore, Role};
pub use config::SaclConfig;
pub use context::{AccessContextResolver, OwnerResolution};
pub use data::{DataSource, MemoryDataSource, Relation, RelationCatalog};
pub use engine::{Decision, DecisionReason, Security};
pub use error::{AuthzError, Result};
pub use filter::{FilterOutcome, Predicate, Query};
pub use interceptor::{Interceptor, InterceptorChain};
pub use policy::{AuthorizationPolicy, PolicyRegistry};
pub use resolver::RoleResolver;
pub use schema::{SchemaBuilder, SchemaRegistry};
pub use types::{AccessContext, OwnerRef, PrincipalId, ReadContext};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
