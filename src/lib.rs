//! Kafka Reaper Library
//!
//! Reconciles Aiven Kafka access control (topics, ACL grants, service users)
//! against what is actually in use, and removes what is not.

pub mod aiven;
pub mod credentials;
pub mod error;
pub mod investigate;
pub mod pattern;
pub mod reconcile;

pub use aiven::{AivenClient, AivenConfig, ControlPlane};
pub use credentials::{CredentialSource, KubeCredentialSource};
pub use error::{ReaperError, Result};
pub use reconcile::{AclRunOptions, CleanupReport, Reaper};
