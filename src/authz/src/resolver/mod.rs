//! Role resolver module
//!
//! Computes the action token of a method and runs the allow/deny decision
//! procedure against the ACL store.

pub mod actions;
mod role;


pub use actions::{default_action, parse_relation_method, resolve_action, RelationMethod};
pub use role::RoleResolver;
