//! Aiven Control Plane Client
//!
//! Typed wrapper around the Aiven v1 REST API for one Kafka service.
//! Every non-success response and every body that does not decode into the
//! expected schema is returned as an error; nothing is retried here.

pub mod types;

pub use types::{
    Acl, Permission, ServiceSnapshot, User, UserType, INTERNAL_TOPIC_PREFIX, STREAM_TOPIC_MARKER,
    SUPERUSER,
};

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use std::collections::HashSet;
use std::time::Duration;
use tracing::debug;

use crate::error::{ReaperError, Result};
use types::{AclListResponse, ServiceResponse, TopicListResponse};

pub const DEFAULT_API_URL: &str = "https://api.aiven.io/v1";

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Read and delete operations the reaper needs from the control plane
#[async_trait]
pub trait ControlPlane: Send + Sync {
    /// Topics, ACLs and (operator-managed, team scoped) users in one read
    async fn fetch_service(&self, team: Option<&str>) -> Result<ServiceSnapshot>;

    async fn fetch_acls(&self) -> Result<HashSet<Acl>>;

    async fn fetch_topics(&self) -> Result<HashSet<String>>;

    async fn delete_acl(&self, acl: &Acl) -> Result<()>;

    async fn delete_user(&self, username: &str) -> Result<()>;
}

/// Connection settings for one Kafka service
#[derive(Clone)]
pub struct AivenConfig {
    pub api_url: String,
    pub project: String,
    pub service: String,
    pub token: String,
    pub timeout: Duration,
}

impl AivenConfig {
    /// Settings for `<project>-kafka` on the public API
    pub fn new(project: impl Into<String>, token: impl Into<String>) -> Self {
        let project = project.into();
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            service: format!("{}-kafka", project),
            project,
            token: token.into(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_service(mut self, service: impl Into<String>) -> Self {
        self.service = service.into();
        self
    }

    pub fn with_api_url(mut self, api_url: impl Into<String>) -> Self {
        self.api_url = api_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl std::fmt::Debug for AivenConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AivenConfig")
            .field("api_url", &self.api_url)
            .field("project", &self.project)
            .field("service", &self.service)
            .field("token", &"<redacted>")
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Aiven API client bound to one project/service
pub struct AivenClient {
    client: Client,
    token: String,
    base_url: String,
}

impl AivenClient {
    pub fn new(config: AivenConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(concat!("kafka-reaper/", env!("CARGO_PKG_VERSION")))
            .timeout(config.timeout)
            .build()?;

        let base_url = format!(
            "{}/project/{}/service/{}",
            config.api_url,
            urlencoding::encode(&config.project),
            urlencoding::encode(&config.service)
        );

        Ok(Self {
            client,
            token: config.token,
            base_url,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        debug!("GET {}", url);

        let response = self
            .client
            .get(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        let body = checked_body("GET", url, response).await?;

        serde_json::from_str(&body).map_err(|source| ReaperError::Schema {
            url: url.to_string(),
            source,
        })
    }

    async fn delete(&self, url: &str) -> Result<()> {
        debug!("DELETE {}", url);

        let response = self
            .client
            .delete(url)
            .bearer_auth(&self.token)
            .send()
            .await?;

        checked_body("DELETE", url, response).await?;
        Ok(())
    }
}

/// Read the body, turning any non-success status into a control-plane error
async fn checked_body(method: &str, url: &str, response: Response) -> Result<String> {
    let status = response.status();
    let body = response.text().await?;

    if !status.is_success() {
        return Err(ReaperError::ControlPlane {
            method: method.to_string(),
            url: url.to_string(),
            status: status.as_u16(),
            body,
        });
    }

    Ok(body)
}

#[async_trait]
impl ControlPlane for AivenClient {
    async fn fetch_service(&self, team: Option<&str>) -> Result<ServiceSnapshot> {
        let response: ServiceResponse = self.get(&self.base_url).await?;
        let snapshot = response.service.into_snapshot(team);

        debug!(
            acls = snapshot.acls.len(),
            topics = snapshot.topics.len(),
            users = snapshot.users.len(),
            "Fetched service snapshot"
        );
        Ok(snapshot)
    }

    async fn fetch_acls(&self) -> Result<HashSet<Acl>> {
        let url = format!("{}/acl", self.base_url);
        let response: AclListResponse = self.get(&url).await?;
        Ok(response.acl.into_iter().collect())
    }

    async fn fetch_topics(&self) -> Result<HashSet<String>> {
        let url = format!("{}/topic", self.base_url);
        let response: TopicListResponse = self.get(&url).await?;
        Ok(response.topics.into_iter().map(|t| t.topic_name).collect())
    }

    async fn delete_acl(&self, acl: &Acl) -> Result<()> {
        let url = format!("{}/acl/{}", self.base_url, urlencoding::encode(&acl.id));
        self.delete(&url).await
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        let url = format!("{}/user/{}", self.base_url, urlencoding::encode(username));
        self.delete(&url).await
    }
}
