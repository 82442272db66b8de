//! External directory authentication (e.g. LDAP).
//!
//! The core only defines the seam; a concrete directory client lives with
//! whatever adapter the deployment wires in.

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BindSecurity {
    #[default]
    None,
    Tls,
    StartTls,
}

/// Where and how to reach a directory server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryConfig {
    pub server: String,
    pub port: u16,
    #[serde(default)]
    pub security: BindSecurity,
    pub base_dn: String,
}

impl DirectoryConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.server, self.port)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ExternalAuthError {
    #[error("connection error: {0}")]
    Connection(String),

    #[error("invalid configuration: {0}")]
    Configuration(String),
}

/// Checks an identity/secret pair against an external directory.
///
/// `Ok(false)` means the directory answered and rejected the credentials;
/// errors mean it could not answer.
pub trait ExternalAuthenticator: Send + Sync {
    fn authenticate(
        &self,
        config: &DirectoryConfig,
        identity: &str,
        secret: &str,
    ) -> Result<bool, ExternalAuthError>;
}
