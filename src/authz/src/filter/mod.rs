//! Read-query filtering
//!
//! Restricts find/count style reads to the rows the principal may `READ`
//! by conjoining an `id IN (...)` predicate with the query's own filter.

mod query;
mod rewriter;

pub use query::{Predicate, Query};
pub use rewriter::{FilterOutcome, QueryFilter};
