//! Issuance requests and their validation into a closed grant union.

use std::net::IpAddr;

use serde::Deserialize;

use crate::error::IssueError;
use crate::security::LoginAttempt;
use crate::token::GrantType;

/// Raw token request as received from a transport.
#[derive(Clone, Default, Deserialize)]
pub struct IssuanceRequest {
    #[serde(default)]
    pub grant_type: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub username: Option<String>,
    pub password: Option<String>,
    pub refresh_token: Option<String>,
    pub code: Option<String>,
    /// Filled in by the transport, never by the request body.
    #[serde(skip)]
    pub source_ip: Option<IpAddr>,
    #[serde(skip)]
    pub location_changed: bool,
}

impl core::fmt::Debug for IssuanceRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("IssuanceRequest")
            .field("grant_type", &self.grant_type)
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("source_ip", &self.source_ip)
            .field("location_changed", &self.location_changed)
            .finish_non_exhaustive()
    }
}

/// One variant per grant type, each carrying exactly the fields it needs.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    Password { username: String, password: String },
    ClientCredentials,
    AuthorizationCode { code: String },
    RefreshToken { refresh_token: String },
}

impl Grant {
    pub fn grant_type(&self) -> GrantType {
        match self {
            Grant::Password { .. } => GrantType::Password,
            Grant::ClientCredentials => GrantType::ClientCredentials,
            Grant::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Grant::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

impl core::fmt::Debug for Grant {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Grant::Password { username, .. } => f
                .debug_struct("Password")
                .field("username", username)
                .finish_non_exhaustive(),
            other => f.write_str(other.grant_type().as_str()),
        }
    }
}

/// A request that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedRequest {
    pub client_id: String,
    pub client_secret: String,
    pub grant: Grant,
    pub attempt: LoginAttempt,
}

pub(crate) fn required(value: Option<String>, field: &str) -> Result<String, IssueError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(IssueError::bad_request(format!("{field} required"))),
    }
}

impl IssuanceRequest {
    pub fn password(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::Password.as_str().to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: Some(username.into()),
            password: Some(password.into()),
            ..Self::default()
        }
    }

    pub fn client_credentials(client_id: impl Into<String>, client_secret: impl Into<String>) -> Self {
        Self {
            grant_type: GrantType::ClientCredentials.as_str().to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            ..Self::default()
        }
    }

    pub fn authorization_code(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::AuthorizationCode.as_str().to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            code: Some(code.into()),
            ..Self::default()
        }
    }

    pub fn refresh(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        refresh_token: impl Into<String>,
    ) -> Self {
        Self {
            grant_type: GrantType::RefreshToken.as_str().to_string(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            refresh_token: Some(refresh_token.into()),
            ..Self::default()
        }
    }

    /// Attach what the transport observed about the caller.
    pub fn with_source(mut self, ip: Option<IpAddr>, location_changed: bool) -> Self {
        self.source_ip = ip;
        self.location_changed = location_changed;
        self
    }

    /// Check the request shape.
    ///
    /// An unknown grant type is an `Internal` error: the transport accepted a
    /// grant this core does not serve, which is a configuration bug.
    pub fn validate(self) -> Result<ValidatedRequest, IssueError> {
        let grant_type: GrantType = self
            .grant_type
            .parse()
            .map_err(|e: crate::token::UnknownGrantType| IssueError::internal(e.to_string()))?;

        if self.client_id.trim().is_empty() {
            return Err(IssueError::bad_request("client_id required"));
        }
        if self.client_secret.is_empty() {
            return Err(IssueError::bad_request("client_secret required"));
        }

        let grant = match grant_type {
            GrantType::Password => Grant::Password {
                username: required(self.username, "username")?,
                password: required(self.password, "password")?,
            },
            GrantType::ClientCredentials => Grant::ClientCredentials,
            GrantType::AuthorizationCode => Grant::AuthorizationCode {
                code: required(self.code, "code")?,
            },
            GrantType::RefreshToken => Grant::RefreshToken {
                refresh_token: required(self.refresh_token, "refresh_token")?,
            },
        };

        Ok(ValidatedRequest {
            client_id: self.client_id,
            client_secret: self.client_secret,
            grant,
            attempt: LoginAttempt {
                ip: self.source_ip,
                location_changed: self.location_changed,
            },
        })
    }
}
