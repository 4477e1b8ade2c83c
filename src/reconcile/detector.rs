//! Orphan Detection
//!
//! Pure functions over inventory snapshots. Nothing here talks to the
//! network or mutates its inputs, so calling them twice on the same inputs
//! gives the same sets.

use std::collections::HashSet;

use crate::aiven::{Acl, User, INTERNAL_TOPIC_PREFIX, STREAM_TOPIC_MARKER, SUPERUSER};
use crate::credentials::DeployedCredential;
use crate::pattern::{is_literal, Glob};

/// A grant is live if it targets an internal or stream topic, or an existing topic
pub fn is_live_acl(acl: &Acl, topics: &HashSet<String>) -> bool {
    acl.topic.starts_with(INTERNAL_TOPIC_PREFIX)
        || acl.topic.contains(STREAM_TOPIC_MARKER)
        || topics.contains(&acl.topic)
}

/// Grants that reference no live topic
pub fn unused_acls(topics: &HashSet<String>, acls: &HashSet<Acl>) -> HashSet<Acl> {
    acls.iter()
        .filter(|acl| !is_live_acl(acl, topics))
        .cloned()
        .collect()
}

/// Grants issued under the legacy dotted username convention
pub fn old_convention_acls(acls: &HashSet<Acl>) -> HashSet<Acl> {
    acls.iter()
        .filter(|acl| acl.username.contains('.'))
        .cloned()
        .collect()
}

/// The ACL set as it stands once `decided` has been deleted
///
/// Used for the user pass: in a dry run the re-fetched set still holds the
/// grants we only pretended to delete.
pub fn post_acl_view(fetched: HashSet<Acl>, decided: &HashSet<Acl>) -> HashSet<Acl> {
    fetched
        .into_iter()
        .filter(|acl| !decided.contains(acl))
        .collect()
}

/// Username patterns of a set of grants, split for fast lookup
#[derive(Debug)]
pub struct AclIndex<'a> {
    literal: HashSet<&'a str>,
    wildcard: Vec<Glob>,
}

impl<'a> AclIndex<'a> {
    pub fn new(acls: impl IntoIterator<Item = &'a Acl>) -> Self {
        let mut literal = HashSet::new();
        let mut seen = HashSet::new();
        let mut wildcard = Vec::new();

        for acl in acls {
            let pattern = acl.username.as_str();
            if is_literal(pattern) {
                literal.insert(pattern);
            } else if seen.insert(pattern) {
                wildcard.push(Glob::new(pattern));
            }
        }

        Self { literal, wildcard }
    }

    /// True if any grant's username pattern matches
    pub fn covers(&self, username: &str) -> bool {
        self.literal.contains(username) || self.wildcard.iter().any(|g| g.matches(username))
    }
}

/// Users (other than the superuser) not matched by any grant
pub fn unused_users(acls: &HashSet<Acl>, users: &HashSet<User>) -> HashSet<User> {
    let index = AclIndex::new(acls);

    users
        .iter()
        .filter(|u| u.username != SUPERUSER)
        .filter(|u| !index.covers(&u.username))
        .cloned()
        .collect()
}

/// Usernames with no deployed credential in any queried cluster
pub fn unused_users_by_credential(
    credentials: &HashSet<DeployedCredential>,
    users: &HashSet<User>,
) -> HashSet<String> {
    let deployed: HashSet<&str> = credentials.iter().map(|c| c.username.as_str()).collect();

    users
        .iter()
        .map(|u| u.username.as_str())
        .filter(|username| !deployed.contains(username))
        .map(str::to_string)
        .collect()
}
