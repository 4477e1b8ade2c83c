//! Reconciliation Engine
//!
//! Correlates the control-plane inventories with each other and with the
//! credentials deployed to the clusters, and deletes what nothing uses.
//!
//! ## Safety
//!
//! - Only operator-managed usernames are ever considered; the classification
//!   happens when the snapshot is fetched.
//! - Dry runs compute exactly what a live run would delete and issue no
//!   mutating calls.
//! - Every run recomputes from current state, so an aborted run can simply be
//!   repeated.

pub mod detector;
pub mod executor;
pub mod pipeline;

#[cfg(test)]
pub(crate) mod fake;

pub use detector::{
    is_live_acl, old_convention_acls, post_acl_view, unused_acls, unused_users,
    unused_users_by_credential, AclIndex,
};
pub use executor::DeletionExecutor;
pub use pipeline::{AclRunOptions, CleanupReport, Reaper};
