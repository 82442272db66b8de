//! Collaborator contracts the issuance core depends on.
//!
//! All traits are synchronous and `Send + Sync`; adapters report failures as
//! [`DomainError`](keygate_core::DomainError). `NotFound` is the only error
//! the core interprets, everything else surfaces as an internal error.

use chrono::{DateTime, Utc};

use keygate_core::{AccountId, DomainId, DomainResult, TokenId};

use crate::account::{Account, LockState, PasswordRecord};
use crate::application::Application;
use crate::security::{self, LockoutPolicy};
use crate::session::LoginSession;
use crate::setting::SecuritySetting;
use crate::token::{AuthorizationCode, Token};

/// Registered client applications.
pub trait ApplicationStore: Send + Sync {
    fn describe_by_client_id(&self, client_id: &str) -> DomainResult<Application>;
}

/// Accounts and their mutable login state.
pub trait AccountStore: Send + Sync {
    fn describe_account(&self, domain: DomainId, username: &str) -> DomainResult<Account>;

    fn describe_account_by_id(&self, id: AccountId) -> DomainResult<Account>;

    fn update_lock_state(&self, id: AccountId, state: LockState) -> DomainResult<()>;

    /// Count one failed credential check and return the resulting lock state.
    ///
    /// Must be atomic per account: read the current state, apply
    /// [`LockoutPolicy::apply_failure`] and write it back without another
    /// failure interleaving.
    fn record_login_failure(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
        lockout: &LockoutPolicy,
    ) -> DomainResult<LockState>;

    fn update_login_time(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()>;

    /// Clear the failure counter and stamp the login time.
    fn record_login_success(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()> {
        self.update_lock_state(id, security::after_success())?;
        self.update_login_time(id, at)
    }

    /// Flag the account so password logins are refused until a reset.
    fn mark_password_expired(&self, id: AccountId) -> DomainResult<()>;

    /// Replace the password record and clear the `expired` and `needs_reset` flags.
    fn update_password(&self, id: AccountId, record: PasswordRecord) -> DomainResult<()>;
}

/// Per-domain security settings.
pub trait SecuritySettingStore: Send + Sync {
    fn describe_setting(&self, domain: DomainId) -> DomainResult<SecuritySetting>;
    fn save_setting(&self, domain: DomainId, setting: &SecuritySetting) -> DomainResult<()>;
}

/// Issued tokens.
pub trait TokenStore: Send + Sync {
    fn save(&self, token: &Token) -> DomainResult<()>;
    fn describe_by_access(&self, access_token: &str) -> DomainResult<Token>;
    fn describe_by_refresh(&self, refresh_token: &str) -> DomainResult<Token>;

    /// Remove a token by its access value. `NotFound` if already revoked.
    fn revoke(&self, access_token: &str) -> DomainResult<Token>;
}

/// Single-use authorization codes.
pub trait AuthorizationCodeStore: Send + Sync {
    fn save(&self, code: &AuthorizationCode) -> DomainResult<()>;

    /// Remove and return the code in one step. A second call yields `NotFound`.
    fn consume(&self, code: &str) -> DomainResult<AuthorizationCode>;
}

/// Audit sink for successful user-bound logins.
pub trait SessionRecorder: Send + Sync {
    fn record_login(&self, session: &LoginSession) -> DomainResult<()>;

    /// Stamp the logout time of the session opened by `token_id`.
    /// `NotFound` when no session was recorded for that token.
    fn record_logout(&self, token_id: TokenId, at: DateTime<Utc>) -> DomainResult<()>;
}
