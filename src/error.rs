//! Error types for the reaper
//!
//! Every variant except the classification warning aborts the run it occurs in.

use thiserror::Error;

/// Errors that can occur while reconciling Kafka access control
#[derive(Debug, Error)]
pub enum ReaperError {
    /// The control plane answered with a non-success status
    #[error("Aiven API returned {status} for {method} {url}: {body}")]
    ControlPlane {
        method: String,
        url: String,
        status: u16,
        body: String,
    },

    /// The control plane answered, but not in the shape we expect
    #[error("Aiven API response from {url} did not match the expected schema: {source}")]
    Schema {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// The request never completed
    #[error("Aiven API request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// A cluster inventory query failed
    #[error("Credential inventory for context {context} failed: {message}")]
    CredentialSource { context: String, message: String },

    /// A delete call failed mid-batch
    #[error("Failed to delete {item}: {source}")]
    Deletion {
        item: String,
        #[source]
        source: Box<ReaperError>,
    },

    /// Invalid search expression
    #[error("Invalid username pattern: {0}")]
    InvalidPattern(#[from] regex::Error),
}

impl ReaperError {
    /// True for failures reported by (or while talking to) the control plane
    pub fn is_control_plane(&self) -> bool {
        match self {
            ReaperError::ControlPlane { .. }
            | ReaperError::Schema { .. }
            | ReaperError::Transport(_) => true,
            ReaperError::Deletion { source, .. } => source.is_control_plane(),
            _ => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, ReaperError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_control_plane_error_display() {
        let err = ReaperError::ControlPlane {
            method: "DELETE".to_string(),
            url: "https://api.aiven.io/v1/project/p/service/s/acl/default".to_string(),
            status: 403,
            body: "forbidden".to_string(),
        };

        let msg = err.to_string();
        assert!(msg.contains("403"));
        assert!(msg.contains("DELETE"));
        assert!(err.is_control_plane());
    }

    #[test]
    fn test_deletion_wraps_cause() {
        let err = ReaperError::Deletion {
            item: "user app_team_x_y".to_string(),
            source: Box::new(ReaperError::ControlPlane {
                method: "DELETE".to_string(),
                url: "u".to_string(),
                status: 500,
                body: String::new(),
            }),
        };

        assert!(err.is_control_plane());
        assert!(err.to_string().starts_with("Failed to delete user app_team_x_y"));

        let cred = ReaperError::CredentialSource {
            context: "prod-gcp".to_string(),
            message: "unreachable".to_string(),
        };
        assert!(!cred.is_control_plane());
    }
}
