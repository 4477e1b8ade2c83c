//! Deletion Executor
//!
//! Applies deletions one at a time. The first failure aborts the rest of
//! the batch; whatever was deleted before it stays deleted, and a re-run
//! recomputes what is left.

use std::collections::HashSet;
use tracing::{info, warn};

use crate::aiven::{Acl, ControlPlane};
use crate::error::{ReaperError, Result};

pub struct DeletionExecutor<'a, C: ?Sized> {
    control_plane: &'a C,
    dry_run: bool,
}

impl<'a, C: ControlPlane + ?Sized> DeletionExecutor<'a, C> {
    pub fn new(control_plane: &'a C, dry_run: bool) -> Self {
        Self {
            control_plane,
            dry_run,
        }
    }

    /// Delete (or report) every fetched grant equal to a decided one
    ///
    /// Decisions compare grants by value, so one decision may cover several
    /// grants that differ only in id. Returns how many grants were handled.
    pub async fn delete_acls(&self, decided: &HashSet<Acl>, grants: &[Acl]) -> Result<usize> {
        let mut ordered: Vec<&Acl> = grants.iter().filter(|a| decided.contains(*a)).collect();
        ordered.sort_by(|a, b| a.cmp(b).then_with(|| a.id.cmp(&b.id)));

        for acl in &ordered {
            if self.dry_run {
                info!("Would have deleted {}", acl);
                continue;
            }

            warn!("Deleting {}", acl);
            self.control_plane
                .delete_acl(acl)
                .await
                .map_err(|e| ReaperError::Deletion {
                    item: acl.to_string(),
                    source: Box::new(e),
                })?;
        }

        Ok(ordered.len())
    }

    /// Delete (or report) each user; returns how many were handled
    pub async fn delete_users(&self, usernames: &HashSet<String>) -> Result<usize> {
        let mut ordered: Vec<&String> = usernames.iter().collect();
        ordered.sort();

        for username in &ordered {
            if self.dry_run {
                info!("Would have deleted {}", username);
                continue;
            }

            warn!("Deleting {}", username);
            self.control_plane
                .delete_user(username)
                .await
                .map_err(|e| ReaperError::Deletion {
                    item: format!("user {}", username),
                    source: Box::new(e),
                })?;
        }

        Ok(ordered.len())
    }
}
