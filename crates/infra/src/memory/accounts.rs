use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};

use keygate_auth::account::{Account, LockState, PasswordRecord};
use keygate_auth::security::{self, LockoutPolicy};
use keygate_auth::store::AccountStore;
use keygate_core::{AccountId, DomainError, DomainId, DomainResult};

use super::{read, write};

/// Accounts keyed by id, with a `(domain, username)` uniqueness rule.
#[derive(Debug, Default)]
pub struct InMemoryAccountStore {
    inner: RwLock<HashMap<AccountId, Account>>,
}

impl InMemoryAccountStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, account: Account) -> DomainResult<()> {
        let mut map = write(&self.inner)?;
        let taken = map
            .values()
            .any(|a| a.domain == account.domain && a.username == account.username);
        if taken {
            return Err(DomainError::conflict(format!("username {} already taken", account.username)));
        }
        map.insert(account.id, account);
        Ok(())
    }

    fn with_account<T>(&self, id: AccountId, f: impl FnOnce(&mut Account) -> T) -> DomainResult<T> {
        let mut map = write(&self.inner)?;
        let account = map.get_mut(&id).ok_or(DomainError::NotFound)?;
        Ok(f(account))
    }
}

impl AccountStore for InMemoryAccountStore {
    fn describe_account(&self, domain: DomainId, username: &str) -> DomainResult<Account> {
        read(&self.inner)?
            .values()
            .find(|a| a.domain == domain && a.username == username)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn describe_account_by_id(&self, id: AccountId) -> DomainResult<Account> {
        read(&self.inner)?.get(&id).cloned().ok_or(DomainError::NotFound)
    }

    fn update_lock_state(&self, id: AccountId, state: LockState) -> DomainResult<()> {
        self.with_account(id, |account| account.lock = state)
    }

    // Read-modify-write under one write guard.
    fn record_login_failure(
        &self,
        id: AccountId,
        now: DateTime<Utc>,
        lockout: &LockoutPolicy,
    ) -> DomainResult<LockState> {
        self.with_account(id, |account| {
            account.lock = lockout.apply_failure(&account.lock, now);
            account.lock
        })
    }

    fn update_login_time(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()> {
        self.with_account(id, |account| account.last_login_at = Some(at))
    }

    fn record_login_success(&self, id: AccountId, at: DateTime<Utc>) -> DomainResult<()> {
        self.with_account(id, |account| {
            account.lock = security::after_success();
            account.last_login_at = Some(at);
        })
    }

    fn mark_password_expired(&self, id: AccountId) -> DomainResult<()> {
        self.with_account(id, |account| account.expired = true)
    }

    fn update_password(&self, id: AccountId, record: PasswordRecord) -> DomainResult<()> {
        self.with_account(id, |account| {
            account.password = record;
            account.expired = false;
            account.needs_reset = false;
        })
    }
}
