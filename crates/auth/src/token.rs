//! Issued credentials and authorization codes.

use core::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use keygate_core::{AccountId, ApplicationId, DomainId, TokenId};

use crate::application::Application;
use crate::secret::make_bearer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    Password,
    ClientCredentials,
    AuthorizationCode,
    RefreshToken,
}

impl GrantType {
    pub fn as_str(&self) -> &'static str {
        match self {
            GrantType::Password => "password",
            GrantType::ClientCredentials => "client_credentials",
            GrantType::AuthorizationCode => "authorization_code",
            GrantType::RefreshToken => "refresh_token",
        }
    }
}

impl core::fmt::Display for GrantType {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown grant type '{0}'")]
pub struct UnknownGrantType(pub String);

impl FromStr for GrantType {
    type Err = UnknownGrantType;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "password" => Ok(GrantType::Password),
            "client_credentials" => Ok(GrantType::ClientCredentials),
            "authorization_code" => Ok(GrantType::AuthorizationCode),
            "refresh_token" => Ok(GrantType::RefreshToken),
            other => Err(UnknownGrantType(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Bearer,
}

/// An issued access/refresh pair. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub id: TokenId,
    pub kind: TokenKind,
    pub access_token: String,
    pub refresh_token: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub refresh_expires_at: DateTime<Utc>,
    pub client_id: String,
    pub application_id: ApplicationId,
    pub domain: DomainId,
    /// Set for grants that authenticate an account.
    pub account_id: Option<AccountId>,
    pub username: Option<String>,
    pub grant_type: GrantType,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenValidationError {
    #[error("token has expired")]
    Expired,

    #[error("token not yet valid (created_at is in the future)")]
    NotYetValid,

    #[error("invalid token time window (expires_at <= created_at)")]
    InvalidTimeWindow,
}

impl Token {
    /// Access token lifetime in whole seconds.
    pub fn expires_in(&self) -> i64 {
        (self.expires_at - self.created_at).num_seconds()
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn is_refresh_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.refresh_expires_at
    }

    /// Deterministically validate the access token's time window.
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), TokenValidationError> {
        if self.expires_at <= self.created_at {
            return Err(TokenValidationError::InvalidTimeWindow);
        }
        if now < self.created_at {
            return Err(TokenValidationError::NotYetValid);
        }
        if self.is_expired(now) {
            return Err(TokenValidationError::Expired);
        }
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Authorization codes
// ─────────────────────────────────────────────────────────────────────────────

const AUTHORIZATION_CODE_LENGTH: usize = 32;

/// A single-use code binding an account to the client that requested it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthorizationCode {
    pub code: String,
    pub client_id: String,
    pub application_id: ApplicationId,
    pub account_id: AccountId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl AuthorizationCode {
    pub fn issue(app: &Application, account_id: AccountId, ttl: Duration, now: DateTime<Utc>) -> Self {
        Self {
            code: make_bearer(AUTHORIZATION_CODE_LENGTH),
            client_id: app.client_id.clone(),
            application_id: app.id,
            account_id,
            created_at: now,
            expires_at: now + ttl,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}
