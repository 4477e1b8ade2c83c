//! Deployed Credential Inventory
//!
//! Enumerates the Kafka credentials that workloads actually have mounted,
//! across any number of cluster contexts. A credential is a Kubernetes
//! Secret written by Aivenator, annotated with the service user it holds.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::try_join_all;
use k8s_openapi::api::core::v1::Secret;
use kube::api::ListParams;
use kube::config::{KubeConfigOptions, Kubeconfig};
use kube::{Api, Client, Config};
use std::collections::{BTreeMap, HashSet};
use std::hash::{Hash, Hasher};
use tracing::{debug, info};

use crate::error::{ReaperError, Result};

/// Label put on every credential secret Aivenator manages
pub const CREDENTIAL_SELECTOR: &str = "type=aivenator.aiven.nais.io";

pub const SERVICE_USER_ANNOTATION: &str = "kafka.aiven.nais.io/serviceUser";
pub const POOL_ANNOTATION: &str = "kafka.aiven.nais.io/pool";
pub const PROTECTED_ANNOTATION: &str = "aivenator.aiven.nais.io/protected";

/// Data keys holding the last rotation time, newest convention first
const UPDATED_AT_KEYS: [&str; 2] = ["AIVEN_SECRET_UPDATED", "KAFKA_SECRET_UPDATED"];

/// Secret contents kept for diagnostics; never part of a credential's identity
#[derive(Debug, Clone, Default)]
pub struct CredentialPayload {
    pub labels: BTreeMap<String, String>,
    pub annotations: BTreeMap<String, String>,
    pub data: BTreeMap<String, String>,
    pub created_at: Option<DateTime<Utc>>,
}

impl CredentialPayload {
    pub fn label(&self, key: &str) -> Option<&str> {
        self.labels.get(key).map(String::as_str)
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.annotations.get(key).map(String::as_str)
    }

    pub fn updated_at(&self) -> Option<&str> {
        UPDATED_AT_KEYS
            .iter()
            .find_map(|k| self.data.get(*k))
            .map(String::as_str)
    }
}

/// A service user credential deployed to a cluster
#[derive(Debug, Clone)]
pub struct DeployedCredential {
    pub username: String,
    pub name: String,
    pub namespace: String,
    pub context: String,
    pub payload: CredentialPayload,
}

impl DeployedCredential {
    pub fn new(
        username: impl Into<String>,
        name: impl Into<String>,
        namespace: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            name: name.into(),
            namespace: namespace.into(),
            context: context.into(),
            payload: CredentialPayload::default(),
        }
    }

    fn key(&self) -> (&str, &str, &str, &str) {
        (&self.username, &self.name, &self.namespace, &self.context)
    }
}

impl PartialEq for DeployedCredential {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for DeployedCredential {}

impl Hash for DeployedCredential {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

/// Filters for one inventory query
#[derive(Debug, Clone, Default)]
pub struct CredentialQuery {
    /// Restrict to the team's namespace
    pub team: Option<String>,
    /// Keep only credentials for this Aiven project (pool)
    pub project: Option<String>,
    /// Restrict to one application's secrets
    pub app: Option<String>,
}

impl CredentialQuery {
    /// An empty team means no team restriction
    pub fn for_team(team: Option<&str>) -> Self {
        Self {
            team: team.filter(|t| !t.is_empty()).map(str::to_string),
            ..Default::default()
        }
    }

    pub fn with_app(mut self, app: impl Into<String>) -> Self {
        self.app = Some(app.into());
        self
    }

    pub fn label_selector(&self) -> String {
        match &self.app {
            Some(app) => format!("{},app={}", CREDENTIAL_SELECTOR, app),
            None => CREDENTIAL_SELECTOR.to_string(),
        }
    }
}

/// Lists deployed credentials in one cluster context
#[async_trait]
pub trait CredentialSource: Send + Sync {
    async fn list_credentials(
        &self,
        context: &str,
        query: &CredentialQuery,
    ) -> Result<Vec<DeployedCredential>>;
}

/// Query every context and union the results
///
/// The first failing context aborts the whole fetch; a partial view could
/// make live users look orphaned.
pub async fn fetch_credentials<S>(
    source: &S,
    contexts: &[String],
    query: &CredentialQuery,
) -> Result<HashSet<DeployedCredential>>
where
    S: CredentialSource + ?Sized,
{
    let per_context = try_join_all(
        contexts
            .iter()
            .map(|context| source.list_credentials(context, query)),
    )
    .await?;

    let mut credentials = HashSet::new();
    for (context, found) in contexts.iter().zip(per_context) {
        info!(context = %context, count = found.len(), "Listed credentials");
        credentials.extend(found);
    }

    Ok(credentials)
}

/// Reads credential secrets through the local kubeconfig
#[derive(Debug, Default)]
pub struct KubeCredentialSource;

impl KubeCredentialSource {
    pub fn new() -> Self {
        Self
    }

    /// The kubeconfig's current context
    pub fn current_context() -> Result<String> {
        let kubeconfig = Kubeconfig::read().map_err(|e| ReaperError::CredentialSource {
            context: "<current>".to_string(),
            message: e.to_string(),
        })?;

        kubeconfig
            .current_context
            .ok_or_else(|| ReaperError::CredentialSource {
                context: "<current>".to_string(),
                message: "kubeconfig has no current context".to_string(),
            })
    }

    async fn client_for(&self, context: &str) -> Result<Client> {
        let options = KubeConfigOptions {
            context: Some(context.to_string()),
            ..Default::default()
        };

        let config = Config::from_kubeconfig(&options)
            .await
            .map_err(|e| source_error(context, e))?;

        Client::try_from(config).map_err(|e| source_error(context, e))
    }
}

#[async_trait]
impl CredentialSource for KubeCredentialSource {
    async fn list_credentials(
        &self,
        context: &str,
        query: &CredentialQuery,
    ) -> Result<Vec<DeployedCredential>> {
        let client = self.client_for(context).await?;

        let api: Api<Secret> = match &query.team {
            Some(team) => Api::namespaced(client, team),
            None => Api::all(client),
        };

        let selector = query.label_selector();
        debug!(context = %context, selector = %selector, "Listing credential secrets");

        let secrets = api
            .list(&ListParams::default().labels(&selector))
            .await
            .map_err(|e| source_error(context, e))?;

        Ok(secrets
            .items
            .into_iter()
            .filter_map(|s| credential_from_secret(s, context, query.project.as_deref()))
            .collect())
    }
}

fn source_error(context: &str, err: impl std::fmt::Display) -> ReaperError {
    ReaperError::CredentialSource {
        context: context.to_string(),
        message: err.to_string(),
    }
}

/// Extract a credential from an Aivenator secret
///
/// Secrets without a service user annotation, or for another pool when a
/// project filter is given, are skipped.
pub fn credential_from_secret(
    secret: Secret,
    context: &str,
    project: Option<&str>,
) -> Option<DeployedCredential> {
    let metadata = secret.metadata;
    let annotations = metadata.annotations.unwrap_or_default();

    let username = annotations
        .get(SERVICE_USER_ANNOTATION)
        .filter(|u| !u.is_empty())?
        .clone();

    if let Some(project) = project {
        if annotations.get(POOL_ANNOTATION).map(String::as_str) != Some(project) {
            return None;
        }
    }

    let data = secret
        .data
        .unwrap_or_default()
        .into_iter()
        .map(|(k, v)| (k, String::from_utf8_lossy(&v.0).into_owned()))
        .collect();

    Some(DeployedCredential {
        username,
        name: metadata.name.unwrap_or_default(),
        namespace: metadata.namespace.unwrap_or_default(),
        context: context.to_string(),
        payload: CredentialPayload {
            labels: metadata.labels.unwrap_or_default(),
            annotations,
            data,
            created_at: metadata.creation_timestamp.map(|t| t.0),
        },
    })
}
