//! Cleanup Pipelines
//!
//! Wires fetch, detect and delete into the two cleanup runs:
//!
//! - ACL run: snapshot -> ACL decision -> delete ACLs -> re-fetch ACLs minus
//!   the decided set -> user decision -> delete users
//! - credential run: snapshot + deployed credentials from every cluster ->
//!   user decision -> delete users
//!
//! The user decision of the ACL run always sees the post-ACL view, never the
//! raw snapshot; otherwise a dry run would keep users alive through grants it
//! just decided to delete.

use serde::Serialize;
use std::collections::HashSet;
use tracing::info;

use super::detector::{
    old_convention_acls, post_acl_view, unused_acls, unused_users, unused_users_by_credential,
};
use super::executor::DeletionExecutor;
use crate::aiven::{Acl, ControlPlane};
use crate::credentials::{fetch_credentials, CredentialQuery, CredentialSource};
use crate::error::{ReaperError, Result};

/// Outcome of one cleanup run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CleanupReport {
    pub dry_run: bool,
    pub acls_deleted: usize,
    pub users_deleted: usize,
}

impl std::fmt::Display for CleanupReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let verb = if self.dry_run { "would delete" } else { "deleted" };
        write!(
            f,
            "{} {} ACLs and {} users",
            verb, self.acls_deleted, self.users_deleted
        )
    }
}

/// Options for the ACL-driven run
#[derive(Debug, Clone, Copy, Default)]
pub struct AclRunOptions {
    pub dry_run: bool,
    /// Skip deleting grants issued to dotted (legacy) usernames
    pub keep_old_convention: bool,
}

/// Runs cleanups against one Kafka service
pub struct Reaper<'a, C: ?Sized> {
    control_plane: &'a C,
}

impl<'a, C: ControlPlane + ?Sized> Reaper<'a, C> {
    pub fn new(control_plane: &'a C) -> Self {
        Self { control_plane }
    }

    /// Remove grants for deleted topics, then users no grant covers
    pub async fn reap_acls(&self, options: AclRunOptions) -> Result<CleanupReport> {
        let executor = DeletionExecutor::new(self.control_plane, options.dry_run);

        let snapshot = self.control_plane.fetch_service(None).await?;

        let mut acls_to_delete = unused_acls(&snapshot.topics, &snapshot.acls);
        info!(
            count = acls_to_delete.len(),
            "Found {} ACLs referencing non-existing topics",
            acls_to_delete.len()
        );

        if !options.keep_old_convention {
            let old = old_convention_acls(&snapshot.acls);
            info!(count = old.len(), "Found {} ACLs using the old naming convention", old.len());
            acls_to_delete.extend(old);
        }

        let acls_deleted = executor
            .delete_acls(&acls_to_delete, &snapshot.grants)
            .await?;

        let acls = self.acls_after(&acls_to_delete).await?;
        let users_to_delete: HashSet<String> = unused_users(&acls, &snapshot.users)
            .into_iter()
            .map(|u| u.username)
            .collect();
        info!(
            count = users_to_delete.len(),
            "Found {} users with no associated ACLs",
            users_to_delete.len()
        );

        let users_deleted = executor.delete_users(&users_to_delete).await?;

        Ok(CleanupReport {
            dry_run: options.dry_run,
            acls_deleted,
            users_deleted,
        })
    }

    /// Remove users that no cluster has a deployed credential for
    ///
    /// At least one context is required; with none, every user would look
    /// orphaned.
    pub async fn reap_users<S>(
        &self,
        source: &S,
        contexts: &[String],
        team: Option<&str>,
        dry_run: bool,
    ) -> Result<CleanupReport>
    where
        S: CredentialSource + ?Sized,
    {
        if contexts.is_empty() {
            return Err(ReaperError::CredentialSource {
                context: "<none>".to_string(),
                message: "no cluster contexts to search for credentials".to_string(),
            });
        }

        let executor = DeletionExecutor::new(self.control_plane, dry_run);

        let snapshot = self.control_plane.fetch_service(team).await?;
        info!(count = snapshot.users.len(), "Aiven knows {} users", snapshot.users.len());

        let credentials =
            fetch_credentials(source, contexts, &CredentialQuery::for_team(team)).await?;
        info!(
            count = credentials.len(),
            "Found {} secrets in all clusters",
            credentials.len()
        );

        let users_to_delete = unused_users_by_credential(&credentials, &snapshot.users);
        info!(
            count = users_to_delete.len(),
            "Found {} users with no associated secret",
            users_to_delete.len()
        );

        let users_deleted = executor.delete_users(&users_to_delete).await?;

        Ok(CleanupReport {
            dry_run,
            acls_deleted: 0,
            users_deleted,
        })
    }

    async fn acls_after(&self, decided: &HashSet<Acl>) -> Result<HashSet<Acl>> {
        let fetched = self.control_plane.fetch_acls().await?;
        Ok(post_acl_view(fetched, decided))
    }
}
