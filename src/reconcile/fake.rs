//! In-memory control plane for engine tests

use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Mutex;

use crate::aiven::types::{ServiceBody, TopicEntry};
use crate::aiven::{Acl, ControlPlane, ServiceSnapshot, User};
use crate::error::{ReaperError, Result};

#[derive(Default)]
struct State {
    acls: Vec<Acl>,
    topics: Vec<String>,
    users: Vec<User>,
    deleted_acls: Vec<String>,
    deleted_users: Vec<String>,
    acl_fetches: usize,
}

#[derive(Default)]
pub struct FakeControlPlane {
    state: Mutex<State>,
    fail_user: Option<String>,
}

impl FakeControlPlane {
    pub fn new(acls: Vec<Acl>, topics: &[&str], users: Vec<User>) -> Self {
        Self {
            state: Mutex::new(State {
                acls,
                topics: topics.iter().map(|t| t.to_string()).collect(),
                users,
                ..Default::default()
            }),
            fail_user: None,
        }
    }

    pub fn fail_user_delete(mut self, username: &str) -> Self {
        self.fail_user = Some(username.to_string());
        self
    }

    pub fn deleted_acls(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_acls.clone()
    }

    pub fn deleted_users(&self) -> Vec<String> {
        self.state.lock().unwrap().deleted_users.clone()
    }

    pub fn acl_fetches(&self) -> usize {
        self.state.lock().unwrap().acl_fetches
    }
}

#[async_trait]
impl ControlPlane for FakeControlPlane {
    async fn fetch_service(&self, team: Option<&str>) -> Result<ServiceSnapshot> {
        let state = self.state.lock().unwrap();
        let body = ServiceBody {
            acl: state.acls.clone(),
            topics: state
                .topics
                .iter()
                .map(|t| TopicEntry {
                    topic_name: t.clone(),
                })
                .collect(),
            users: state.users.clone(),
        };
        Ok(body.into_snapshot(team))
    }

    async fn fetch_acls(&self) -> Result<HashSet<Acl>> {
        let mut state = self.state.lock().unwrap();
        state.acl_fetches += 1;
        Ok(state.acls.iter().cloned().collect())
    }

    async fn fetch_topics(&self) -> Result<HashSet<String>> {
        Ok(self.state.lock().unwrap().topics.iter().cloned().collect())
    }

    async fn delete_acl(&self, acl: &Acl) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.acls.retain(|a| a.id != acl.id);
        state.deleted_acls.push(acl.id.clone());
        Ok(())
    }

    async fn delete_user(&self, username: &str) -> Result<()> {
        if self.fail_user.as_deref() == Some(username) {
            return Err(ReaperError::ControlPlane {
                method: "DELETE".to_string(),
                url: format!("fake/user/{}", username),
                status: 500,
                body: "boom".to_string(),
            });
        }

        let mut state = self.state.lock().unwrap();
        state.users.retain(|u| u.username != username);
        state.deleted_users.push(username.to_string());
        Ok(())
    }
}
