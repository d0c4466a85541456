//! Auto-provisioning observers
//!
//! Run after a successful write. Creating an owner ensures its roles, grants
//! them their actions on the new scope and assigns the creator to the
//! default creator roles. Creating a resource grants the owner's roles the
//! resource's permitted actions on the new instance.
//!
//! Nothing here is transactional. Every step is an idempotent get-or-create
//! or grant union, so a partially failed run can simply be re-issued.

mod provisioner;

pub use provisioner::{AutoupdateReport, ProvisionReport, Provisioner};
