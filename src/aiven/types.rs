//! Aiven Kafka Types
//!
//! Value types for the control-plane inventories and the wire schemas they
//! are decoded from.

use serde::Deserialize;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::hash::{Hash, Hasher};
use tracing::warn;

use crate::pattern::{in_team_scope, is_operator_managed};

/// The superuser every Aiven Kafka service is created with
pub const SUPERUSER: &str = "avnadmin";

/// Topics with this prefix are Kafka-internal (`__consumer_offsets`, ...)
pub const INTERNAL_TOPIC_PREFIX: &str = "__";

/// Topics containing this marker belong to stream applications
pub const STREAM_TOPIC_MARKER: &str = "_stream_";

/// ACL permission level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Permission {
    Read,
    Write,
    ReadWrite,
    Admin,
}

impl std::fmt::Display for Permission {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Permission::Read => write!(f, "read"),
            Permission::Write => write!(f, "write"),
            Permission::ReadWrite => write!(f, "readwrite"),
            Permission::Admin => write!(f, "admin"),
        }
    }
}

/// Aiven service user type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
pub enum UserType {
    #[serde(rename = "normal")]
    Normal,
    #[serde(rename = "service-account", alias = "service_account")]
    ServiceAccount,
    #[serde(rename = "admin", alias = "primary")]
    Admin,
}

/// An ACL grant binding a username pattern to a topic pattern
///
/// Equality and hashing ignore `id`: two grants with the same permission,
/// topic and username are the same grant for reconciliation purposes. The
/// id is only needed to address the delete call.
#[derive(Debug, Clone, Deserialize)]
pub struct Acl {
    pub id: String,
    pub permission: Permission,
    pub topic: String,
    pub username: String,
}

impl Acl {
    pub fn new(
        id: impl Into<String>,
        permission: Permission,
        topic: impl Into<String>,
        username: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            permission,
            topic: topic.into(),
            username: username.into(),
        }
    }

    fn key(&self) -> (&str, &str, Permission) {
        (&self.username, &self.topic, self.permission)
    }
}

impl PartialEq for Acl {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Acl {}

impl Hash for Acl {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Acl {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Acl {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for Acl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Acl(id={}, permission={}, topic={}, username={})",
            self.id, self.permission, self.topic, self.username
        )
    }
}

/// A Kafka service user; identity is the username
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub username: String,
    #[serde(rename = "type")]
    pub user_type: UserType,
}

impl User {
    pub fn new(username: impl Into<String>, user_type: UserType) -> Self {
        Self {
            username: username.into(),
            user_type,
        }
    }
}

impl PartialEq for User {
    fn eq(&self, other: &Self) -> bool {
        self.username == other.username
    }
}

impl Eq for User {}

impl Hash for User {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.username.hash(state);
    }
}

impl std::fmt::Display for User {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "User(username={}, type={:?})", self.username, self.user_type)
    }
}

/// One consistent read of a Kafka service
#[derive(Debug, Clone, Default)]
pub struct ServiceSnapshot {
    pub acls: HashSet<Acl>,
    /// Every grant as fetched, including value-equal grants with distinct ids
    pub grants: Vec<Acl>,
    pub topics: HashSet<String>,
    /// Operator-managed users only, already team scoped
    pub users: HashSet<User>,
}

// ============================================================
// Wire Schemas
// ============================================================

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceResponse {
    pub service: ServiceBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ServiceBody {
    pub acl: Vec<Acl>,
    pub topics: Vec<TopicEntry>,
    pub users: Vec<User>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicEntry {
    pub topic_name: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct AclListResponse {
    pub acl: Vec<Acl>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct TopicListResponse {
    pub topics: Vec<TopicEntry>,
}

impl ServiceBody {
    /// Build a snapshot, keeping only operator-managed users within the team scope
    pub(crate) fn into_snapshot(self, team: Option<&str>) -> ServiceSnapshot {
        let users = self
            .users
            .into_iter()
            .filter(|u| {
                if !is_operator_managed(&u.username) {
                    warn!(
                        username = %u.username,
                        "Ignoring {}, since it did not match any pattern", u.username
                    );
                    return false;
                }
                in_team_scope(&u.username, team)
            })
            .collect();

        ServiceSnapshot {
            acls: self.acl.iter().cloned().collect(),
            grants: self.acl,
            topics: self.topics.into_iter().map(|t| t.topic_name).collect(),
            users,
        }
    }
}
