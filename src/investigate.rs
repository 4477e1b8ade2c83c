//! Read-only diagnostics
//!
//! Answers "what does Aiven know about this application?" and "where is this
//! service user deployed?". Nothing here mutates anything.

use regex::Regex;
use std::collections::BTreeSet;
use tracing::info;

use crate::aiven::{Acl, ControlPlane, ServiceSnapshot, User};
use crate::credentials::{fetch_credentials, CredentialQuery, CredentialSource, DeployedCredential};
use crate::error::Result;
use crate::pattern::glob_match;

/// What the control plane holds for one application's credentials
#[derive(Debug, Clone, Default)]
pub struct Investigation {
    pub usernames: BTreeSet<String>,
    pub users: Vec<User>,
    pub acls: Vec<Acl>,
}

/// Aiven project for a cluster context: its first two `-` separated segments
pub fn default_pool(context: &str) -> String {
    context.split('-').take(2).collect::<Vec<_>>().join("-")
}

/// Users whose username is one of `usernames`
pub fn identify_users(snapshot: &ServiceSnapshot, usernames: &BTreeSet<String>) -> Vec<User> {
    let mut users: Vec<User> = snapshot
        .users
        .iter()
        .filter(|u| usernames.contains(&u.username))
        .cloned()
        .collect();
    users.sort_by(|a, b| a.username.cmp(&b.username));
    users
}

/// Grants whose username pattern matches any of `usernames`, sorted by pattern
pub fn identify_acls(snapshot: &ServiceSnapshot, usernames: &BTreeSet<String>) -> Vec<Acl> {
    let mut acls: Vec<Acl> = snapshot
        .acls
        .iter()
        .filter(|acl| usernames.iter().any(|u| glob_match(&acl.username, u)))
        .cloned()
        .collect();
    acls.sort();
    acls
}

/// Look up an application's credentials in one context and correlate them
pub async fn investigate<C, S>(
    control_plane: &C,
    source: &S,
    context: &str,
    team: &str,
    app: &str,
) -> Result<Investigation>
where
    C: ControlPlane + ?Sized,
    S: CredentialSource + ?Sized,
{
    let query = CredentialQuery::for_team(Some(team)).with_app(app);
    let usernames: BTreeSet<String> = source
        .list_credentials(context, &query)
        .await?
        .into_iter()
        .map(|c| c.username)
        .collect();
    info!(
        context = %context,
        app = %app,
        "Found {} users in {} with app={}",
        usernames.len(),
        context,
        app
    );

    let snapshot = control_plane.fetch_service(Some(team)).await?;

    Ok(Investigation {
        users: identify_users(&snapshot, &usernames),
        acls: identify_acls(&snapshot, &usernames),
        usernames,
    })
}

/// Credentials in any context whose username matches `pattern` from the start
pub async fn find_credentials<S>(
    source: &S,
    contexts: &[String],
    pattern: &str,
) -> Result<Vec<DeployedCredential>>
where
    S: CredentialSource + ?Sized,
{
    let pattern = Regex::new(&format!("^(?:{})", pattern))?;

    let mut found: Vec<DeployedCredential> =
        fetch_credentials(source, contexts, &CredentialQuery::default())
            .await?
            .into_iter()
            .filter(|c| pattern.is_match(&c.username))
            .collect();

    found.sort_by(|a, b| (&a.context, &a.namespace, &a.name).cmp(&(&b.context, &b.namespace, &b.name)));
    Ok(found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aiven::{Permission, UserType};
    use crate::error::ReaperError;
    use crate::reconcile::fake::FakeControlPlane;
    use async_trait::async_trait;

    fn names(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_default_pool() {
        assert_eq!(default_pool("nav-dev-gcp"), "nav-dev");
        assert_eq!(default_pool("dev"), "dev");
    }

    #[test]
    fn test_identify_acls_sorted_by_pattern() {
        let snapshot = ServiceSnapshot {
            acls: [
                Acl::new("2", Permission::Write, "aura.foo", "aura_foo_*"),
                Acl::new("1", Permission::Read, "aura.bar", "aura_*"),
                Acl::new("3", Permission::Read, "aura.baz", "teamb_*"),
            ]
            .into_iter()
            .collect(),
            ..Default::default()
        };

        let acls = identify_acls(&snapshot, &names(&["aura_foo_a1_b2"]));
        let patterns: Vec<&str> = acls.iter().map(|a| a.username.as_str()).collect();
        assert_eq!(patterns, vec!["aura_*", "aura_foo_*"]);
    }

    struct OneApp;

    #[async_trait]
    impl CredentialSource for OneApp {
        async fn list_credentials(
            &self,
            context: &str,
            query: &CredentialQuery,
        ) -> Result<Vec<DeployedCredential>> {
            if context == "broken" {
                return Err(ReaperError::CredentialSource {
                    context: context.to_string(),
                    message: "forbidden".to_string(),
                });
            }
            if query.app.as_deref() == Some("other") {
                return Ok(vec![]);
            }
            Ok(vec![
                DeployedCredential::new("aura_foo_a1_b2", "foo-1", "aura", context),
                DeployedCredential::new("aura_foo_c3_d4", "foo-2", "aura", context),
            ])
        }
    }

    #[tokio::test]
    async fn test_investigate() {
        let cp = FakeControlPlane::new(
            vec![Acl::new("1", Permission::Read, "aura.foo", "aura_foo_*")],
            &["aura.foo"],
            vec![User::new("aura_foo_a1_b2", UserType::Normal)],
        );

        let found = investigate(&cp, &OneApp, "nav-dev-gcp", "aura", "foo")
            .await
            .unwrap();

        assert_eq!(found.usernames.len(), 2);
        assert_eq!(found.users.len(), 1);
        assert_eq!(found.acls.len(), 1);

        let nothing = investigate(&cp, &OneApp, "nav-dev-gcp", "aura", "other")
            .await
            .unwrap();
        assert!(nothing.users.is_empty());
        assert!(nothing.acls.is_empty());
    }

    #[tokio::test]
    async fn test_find_credentials_matches_from_start() {
        let contexts = vec!["dev-fss".to_string(), "dev-gcp".to_string()];

        let found = find_credentials(&OneApp, &contexts, "aura_foo_a1").await.unwrap();
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].context, "dev-fss");

        let none = find_credentials(&OneApp, &contexts, "foo").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_find_credentials_rejects_bad_regex() {
        let contexts = vec!["dev-fss".to_string()];
        let err = find_credentials(&OneApp, &contexts, "aura_(").await.unwrap_err();
        assert!(matches!(err, ReaperError::InvalidPattern(_)));
    }
}
