//! Token issuance: validate, authenticate the client, dispatch on the grant,
//! mint and persist.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keygate_core::{AccountId, DomainError, DomainId, TokenId};

use crate::account::{Account, CredentialSource};
use crate::application::Application;
use crate::client::ClientChecker;
use crate::config::IssuerConfig;
use crate::error::IssueError;
use crate::external::{DirectoryConfig, ExternalAuthenticator};
use crate::password::{Aging, PasswordHasher, evaluate_aging};
use crate::request::{Grant, IssuanceRequest};
use crate::secret::make_bearer;
use crate::security::{self, LockoutPolicy, LoginAttempt, SecurityDecision};
use crate::session::LoginSession;
use crate::setting::{PasswordPolicy, SecuritySetting};
use crate::store::{
    AccountStore, ApplicationStore, AuthorizationCodeStore, SecuritySettingStore, SessionRecorder,
    TokenStore,
};
use crate::token::{AuthorizationCode, GrantType, Token, TokenKind};

mod password_change;

pub use password_change::PasswordChangeRequest;

/// Everything the issuer reads from or writes to.
#[derive(Clone)]
pub struct Collaborators {
    pub applications: Arc<dyn ApplicationStore>,
    pub accounts: Arc<dyn AccountStore>,
    pub settings: Arc<dyn SecuritySettingStore>,
    pub tokens: Arc<dyn TokenStore>,
    pub codes: Arc<dyn AuthorizationCodeStore>,
    pub sessions: Arc<dyn SessionRecorder>,
}

/// Directory used to verify accounts whose credentials live elsewhere.
#[derive(Clone)]
pub struct ExternalProvider {
    pub authenticator: Arc<dyn ExternalAuthenticator>,
    pub directory: DirectoryConfig,
}

/// Non-blocking prompt to change the password.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResetHint {
    /// Days left before expiry; `None` when an operator requested the reset.
    pub remaining_days: Option<u32>,
}

/// Successful issuance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Issued {
    pub token: Token,
    pub hint: Option<ResetHint>,
}

/// Wire shape of a successful token response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token_type: TokenKind,
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub grant_type: GrantType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_reset_hint: Option<ResetHint>,
}

impl From<&Issued> for TokenResponse {
    fn from(issued: &Issued) -> Self {
        let token = &issued.token;
        Self {
            token_type: token.kind,
            access_token: token.access_token.clone(),
            refresh_token: token.refresh_token.clone(),
            expires_in: token.expires_in(),
            expires_at: token.expires_at,
            grant_type: token.grant_type,
            password_reset_hint: issued.hint,
        }
    }
}

pub struct TokenIssuer {
    clients: ClientChecker,
    stores: Collaborators,
    hasher: Arc<dyn PasswordHasher>,
    external: Option<ExternalProvider>,
    config: IssuerConfig,
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("config", &self.config)
            .field("external", &self.external.as_ref().map(|p| &p.directory))
            .finish_non_exhaustive()
    }
}

fn not_found_as_unauthorized(e: DomainError) -> IssueError {
    if e.is_not_found() {
        IssueError::Unauthorized
    } else {
        e.into()
    }
}

impl TokenIssuer {
    pub fn new(stores: Collaborators, hasher: Arc<dyn PasswordHasher>, config: IssuerConfig) -> Self {
        Self {
            clients: ClientChecker::new(stores.applications.clone()),
            stores,
            hasher,
            external: None,
            config,
        }
    }

    pub fn with_external(mut self, provider: ExternalProvider) -> Self {
        self.external = Some(provider);
        self
    }

    pub fn config(&self) -> &IssuerConfig {
        &self.config
    }

    /// Issue a token for `request` at instant `now`.
    pub fn issue(&self, request: IssuanceRequest, now: DateTime<Utc>) -> Result<Issued, IssueError> {
        let request = request.validate()?;
        let app = self.clients.check_client(&request.client_id, &request.client_secret)?;

        let (issued, superseded) = match &request.grant {
            Grant::Password { username, password } => {
                (self.issue_password(&app, username, password, &request.attempt, now)?, None)
            }
            Grant::ClientCredentials => {
                let token = self.mint(&app, None, None, GrantType::ClientCredentials, now);
                (Issued { token, hint: None }, None)
            }
            Grant::AuthorizationCode { code } => (self.issue_from_code(&app, code, now)?, None),
            Grant::RefreshToken { refresh_token } => {
                let (issued, old) = self.refresh(&app, refresh_token, now)?;
                (issued, Some(old))
            }
        };

        // The new pair is stored before the old one goes away.
        self.persist(&issued.token, &request.attempt)?;
        if let Some(old) = superseded {
            self.retire(&old, &issued.token, now)?;
        }
        tracing::info!(
            client_id = %app.client_id,
            grant_type = %issued.token.grant_type,
            account_id = ?issued.token.account_id,
            token_id = %issued.token.id,
            "token issued"
        );
        Ok(issued)
    }

    /// Create a single-use code that binds `account_id` to `client_id`.
    pub fn issue_authorization_code(
        &self,
        client_id: &str,
        account_id: AccountId,
        now: DateTime<Utc>,
    ) -> Result<AuthorizationCode, IssueError> {
        let app = self.clients.describe(client_id)?;
        let account = self
            .stores
            .accounts
            .describe_account_by_id(account_id)
            .map_err(not_found_as_unauthorized)?;
        if account.domain != app.domain {
            tracing::warn!(client_id, %account_id, "account outside application domain");
            return Err(IssueError::Unauthorized);
        }

        let code = AuthorizationCode::issue(&app, account.id, self.config.authorization_code_ttl, now);
        self.stores.codes.save(&code)?;
        tracing::debug!(client_id, %account_id, "authorization code issued");
        Ok(code)
    }

    /// Resolve a presented access token, refusing unknown or expired ones.
    pub fn describe_token(&self, access_token: &str, now: DateTime<Utc>) -> Result<Token, IssueError> {
        let token = self
            .stores
            .tokens
            .describe_by_access(access_token)
            .map_err(not_found_as_unauthorized)?;
        token.validate(now).map_err(|e| {
            tracing::debug!(token_id = %token.id, error = %e, "access token rejected");
            IssueError::Unauthorized
        })?;
        Ok(token)
    }

    /// Revoke a token and close the login session it opened.
    pub fn revoke_token(&self, access_token: &str, now: DateTime<Utc>) -> Result<(), IssueError> {
        let token = self
            .stores
            .tokens
            .revoke(access_token)
            .map_err(not_found_as_unauthorized)?;
        self.close_session(&token, now);
        tracing::info!(token_id = %token.id, "token revoked");
        Ok(())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Grants
    // ─────────────────────────────────────────────────────────────────────────

    fn issue_password(
        &self,
        app: &Application,
        username: &str,
        password: &str,
        attempt: &LoginAttempt,
        now: DateTime<Utc>,
    ) -> Result<Issued, IssueError> {
        let account = match self.stores.accounts.describe_account(app.domain, username) {
            Ok(account) => account,
            Err(e) if e.is_not_found() => {
                tracing::warn!(client_id = %app.client_id, reason = "unknown_account", "password grant refused");
                return Err(IssueError::Unauthorized);
            }
            Err(e) => return Err(e.into()),
        };

        let setting = self.setting_for(app.domain)?;
        let login = &setting.login_security;

        let decision = security::evaluate(&account, login, now, attempt);
        tracing::debug!(account_id = %account.id, ?decision, "security decision");
        if let SecurityDecision::Deny(reason) = decision {
            tracing::warn!(account_id = %account.id, reason = reason.code(), "password grant refused");
            return Err(IssueError::Unauthorized);
        }

        if !self.verify_credentials(&account, password)? {
            if let Some(lockout) = LockoutPolicy::from_policy(login) {
                let state = self.stores.accounts.record_login_failure(account.id, now, &lockout)?;
                if state.is_locked(now) {
                    tracing::warn!(
                        account_id = %account.id,
                        failed_attempts = state.failed_attempts,
                        "account locked after repeated failures"
                    );
                }
            }
            tracing::warn!(account_id = %account.id, reason = "bad_password", "password grant refused");
            return Err(IssueError::Unauthorized);
        }

        if let SecurityDecision::RequireVerification(reason) = decision {
            tracing::warn!(account_id = %account.id, reason = reason.code(), "verification required");
            return Err(IssueError::VerificationRequired);
        }

        let hint = self.check_password_state(&account, &setting.password_security, now)?;

        self.stores.accounts.record_login_success(account.id, now)?;
        let token = self.mint(
            app,
            Some(account.id),
            Some(account.username.clone()),
            GrantType::Password,
            now,
        );
        Ok(Issued { token, hint })
    }

    fn issue_from_code(&self, app: &Application, code: &str, now: DateTime<Utc>) -> Result<Issued, IssueError> {
        let code = self.stores.codes.consume(code).map_err(not_found_as_unauthorized)?;

        if code.client_id != app.client_id {
            tracing::warn!(client_id = %app.client_id, reason = "code_client_mismatch", "authorization code refused");
            return Err(IssueError::Unauthorized);
        }
        if code.is_expired(now) {
            tracing::warn!(client_id = %app.client_id, reason = "code_expired", "authorization code refused");
            return Err(IssueError::Unauthorized);
        }

        let account = self.bound_account(code.account_id)?;
        let token = self.mint(
            app,
            Some(account.id),
            Some(account.username),
            GrantType::AuthorizationCode,
            now,
        );
        Ok(Issued { token, hint: None })
    }

    /// Mint the successor of a refreshable pair. The old pair is returned so
    /// it can be retired once the successor is stored.
    fn refresh(
        &self,
        app: &Application,
        refresh_token: &str,
        now: DateTime<Utc>,
    ) -> Result<(Issued, Token), IssueError> {
        let old = self
            .stores
            .tokens
            .describe_by_refresh(refresh_token)
            .map_err(not_found_as_unauthorized)?;

        if old.client_id != app.client_id {
            tracing::warn!(client_id = %app.client_id, reason = "refresh_client_mismatch", "refresh refused");
            return Err(IssueError::Unauthorized);
        }
        if old.is_refresh_expired(now) {
            tracing::warn!(token_id = %old.id, reason = "refresh_expired", "refresh refused");
            return Err(IssueError::Unauthorized);
        }
        if let Some(account_id) = old.account_id {
            self.bound_account(account_id)?;
        }

        let token = self.mint(app, old.account_id, old.username.clone(), GrantType::RefreshToken, now);
        Ok((Issued { token, hint: None }, old))
    }

    /// Revoke the pair a refresh replaced. Losing that revoke means another
    /// caller already rotated it, so the successor is withdrawn as well.
    fn retire(&self, old: &Token, successor: &Token, now: DateTime<Utc>) -> Result<(), IssueError> {
        match self.stores.tokens.revoke(&old.access_token) {
            Ok(old) => {
                self.close_session(&old, now);
                Ok(())
            }
            Err(e) if e.is_not_found() => {
                tracing::warn!(token_id = %old.id, reason = "refresh_replayed", "refresh refused");
                if let Err(e) = self.stores.tokens.revoke(&successor.access_token) {
                    tracing::warn!(token_id = %successor.id, error = %e, "failed to withdraw successor token");
                }
                self.close_session(successor, now);
                Err(IssueError::Unauthorized)
            }
            Err(e) => Err(e.into()),
        }
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Helpers
    // ─────────────────────────────────────────────────────────────────────────

    fn bound_account(&self, id: AccountId) -> Result<Account, IssueError> {
        let account = self
            .stores
            .accounts
            .describe_account_by_id(id)
            .map_err(not_found_as_unauthorized)?;
        if account.expired {
            return Err(IssueError::PasswordExpired);
        }
        Ok(account)
    }

    fn setting_for(&self, domain: DomainId) -> Result<SecuritySetting, IssueError> {
        match self.stores.settings.describe_setting(domain) {
            Ok(setting) => Ok(setting),
            Err(e) if e.is_not_found() => Ok(SecuritySetting::default()),
            Err(e) => Err(e.into()),
        }
    }

    fn verify_credentials(&self, account: &Account, password: &str) -> Result<bool, IssueError> {
        match account.source {
            CredentialSource::Local => Ok(self.hasher.verify(password, &account.password.hash)),
            CredentialSource::External => {
                let Some(provider) = &self.external else {
                    return Err(IssueError::internal("no external authenticator configured"));
                };
                provider
                    .authenticator
                    .authenticate(&provider.directory, &account.username, password)
                    .map_err(|e| IssueError::internal(e.to_string()))
            }
        }
    }

    /// Expiry flag first, then aging for locally managed passwords.
    fn check_password_state(
        &self,
        account: &Account,
        policy: &PasswordPolicy,
        now: DateTime<Utc>,
    ) -> Result<Option<ResetHint>, IssueError> {
        if account.expired {
            return Err(IssueError::PasswordExpired);
        }

        let aging = match account.source {
            CredentialSource::Local => evaluate_aging(&account.password, policy, now),
            CredentialSource::External => Aging::Ok,
        };

        match aging {
            Aging::Expired => {
                self.stores.accounts.mark_password_expired(account.id)?;
                tracing::info!(account_id = %account.id, "password expired");
                Err(IssueError::PasswordExpired)
            }
            Aging::NeedsReset { remaining_days } => Ok(Some(ResetHint {
                remaining_days: Some(remaining_days),
            })),
            Aging::Ok => Ok(account.needs_reset.then_some(ResetHint { remaining_days: None })),
        }
    }

    fn mint(
        &self,
        app: &Application,
        account_id: Option<AccountId>,
        username: Option<String>,
        grant_type: GrantType,
        now: DateTime<Utc>,
    ) -> Token {
        Token {
            id: TokenId::new(),
            kind: TokenKind::Bearer,
            access_token: make_bearer(self.config.access_token_length()),
            refresh_token: make_bearer(self.config.refresh_token_length()),
            created_at: now,
            expires_at: now + app.token_ttl(),
            refresh_expires_at: now + app.refresh_ttl(),
            client_id: app.client_id.clone(),
            application_id: app.id,
            domain: app.domain,
            account_id,
            username,
            grant_type,
        }
    }

    fn close_session(&self, token: &Token, now: DateTime<Utc>) {
        if token.account_id.is_none() {
            return;
        }
        match self.stores.sessions.record_logout(token.id, now) {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                tracing::debug!(token_id = %token.id, "no login session to close");
            }
            Err(e) => tracing::warn!(token_id = %token.id, error = %e, "failed to close login session"),
        }
    }

    fn persist(&self, token: &Token, attempt: &LoginAttempt) -> Result<(), IssueError> {
        self.stores.tokens.save(token)?;

        if let Some(session) = LoginSession::from_token(token, attempt.ip.map(|ip| ip.to_string())) {
            if let Err(e) = self.stores.sessions.record_login(&session) {
                tracing::warn!(token_id = %token.id, error = %e, "failed to record login session");
            }
        }
        Ok(())
    }
}
