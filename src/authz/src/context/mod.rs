//! Access context resolution
//!
//! Derives the current owner scope (where the acted-upon instance lives) and
//! the target owner scope (where the incoming payload tries to place it).

mod resolver;

pub use resolver::{extract_owner, AccessContextResolver, OwnerResolution, ResolvedScopes};
