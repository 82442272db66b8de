//! Self-service password change for locally managed accounts.

use std::net::IpAddr;

use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::TokenIssuer;
use crate::account::CredentialSource;
use crate::error::IssueError;
use crate::password::{self, PasswordChangeError};
use crate::request::required;
use crate::security::{self, LockoutPolicy, LoginAttempt, SecurityDecision};

/// Password change as received from a transport. The caller proves both the
/// client and the current password; no bearer token is needed so that
/// accounts with an expired password can still recover.
#[derive(Clone, Default, Deserialize)]
pub struct PasswordChangeRequest {
    #[serde(default)]
    pub client_id: String,
    #[serde(default)]
    pub client_secret: String,
    pub username: Option<String>,
    pub old_password: Option<String>,
    pub new_password: Option<String>,
    #[serde(skip)]
    pub source_ip: Option<IpAddr>,
}

impl core::fmt::Debug for PasswordChangeRequest {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PasswordChangeRequest")
            .field("client_id", &self.client_id)
            .field("username", &self.username)
            .field("source_ip", &self.source_ip)
            .finish_non_exhaustive()
    }
}

impl PasswordChangeRequest {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        username: impl Into<String>,
        old_password: impl Into<String>,
        new_password: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            username: Some(username.into()),
            old_password: Some(old_password.into()),
            new_password: Some(new_password.into()),
            source_ip: None,
        }
    }

    pub fn with_source(mut self, ip: Option<IpAddr>) -> Self {
        self.source_ip = ip;
        self
    }
}

impl TokenIssuer {
    /// Replace an account's password after checking the client, the login
    /// security rules and the current password. The new password must pass
    /// the domain's password policy; success clears `expired` and
    /// `needs_reset`.
    pub fn change_password(&self, request: PasswordChangeRequest, now: DateTime<Utc>) -> Result<(), IssueError> {
        if request.client_id.trim().is_empty() {
            return Err(IssueError::bad_request("client_id required"));
        }
        if request.client_secret.is_empty() {
            return Err(IssueError::bad_request("client_secret required"));
        }
        let username = required(request.username, "username")?;
        let old_password = required(request.old_password, "old_password")?;
        let new_password = required(request.new_password, "new_password")?;

        let app = self.clients.check_client(&request.client_id, &request.client_secret)?;
        let account = match self.stores.accounts.describe_account(app.domain, &username) {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                tracing::warn!(client_id = %app.client_id, reason = "unknown_account", "password change refused");
                return Err(IssueError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        let setting = self.setting_for(app.domain)?;
        let login = &setting.login_security;
        let attempt = LoginAttempt {
            ip: request.source_ip,
            location_changed: false,
        };

        let decision = security::evaluate(&account, login, now, &attempt);
        if let SecurityDecision::Deny(reason) = decision {
            tracing::warn!(account_id = %account.id, reason = reason.code(), "password change refused");
            return Err(IssueError::Unauthorized);
        }

        if !self.verify_credentials(&account, &old_password)? {
            if let Some(lockout) = LockoutPolicy::from_policy(login) {
                self.stores.accounts.record_login_failure(account.id, now, &lockout)?;
            }
            tracing::warn!(account_id = %account.id, reason = "bad_password", "password change refused");
            return Err(IssueError::Unauthorized);
        }

        if let SecurityDecision::RequireVerification(reason) = decision {
            tracing::warn!(account_id = %account.id, reason = reason.code(), "verification required");
            return Err(IssueError::VerificationRequired);
        }

        if account.source == CredentialSource::External {
            return Err(IssueError::bad_request("password is managed by an external directory"));
        }

        let record = password::change_password(
            &account.password,
            &new_password,
            &setting.password_security,
            self.hasher.as_ref(),
            now,
        )
        .map_err(|e| match e {
            PasswordChangeError::Policy(violation) => IssueError::PolicyViolation(violation),
            PasswordChangeError::Hash(e) => IssueError::internal(e.to_string()),
        })?;

        self.stores.accounts.update_password(account.id, record)?;
        self.stores.accounts.update_lock_state(account.id, security::after_success())?;
        tracing::info!(account_id = %account.id, client_id = %app.client_id, "password changed");
        Ok(())
    }
}
