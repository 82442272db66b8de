//! Account snapshot as seen by the policy engines.
//!
//! Accounts are owned by an external store. The engines read a snapshot and
//! describe the writes the store has to perform; they never create accounts.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keygate_core::{AccountId, DomainId};

/// Where the account's credential is verified.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CredentialSource {
    /// Against the locally stored password hash.
    #[default]
    Local,
    /// Against an external directory; the local hash is unused.
    External,
}

/// Stored password hash plus its rotation metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordRecord {
    pub hash: String,
    pub updated_at: DateTime<Utc>,
    /// Previous hashes, newest first.
    #[serde(default)]
    pub history: Vec<String>,
}

impl PasswordRecord {
    pub fn new(hash: impl Into<String>, updated_at: DateTime<Utc>) -> Self {
        Self {
            hash: hash.into(),
            updated_at,
            history: Vec::new(),
        }
    }

    /// Current hash followed by the history, newest first.
    pub fn retained(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.hash.as_str()).chain(self.history.iter().map(String::as_str))
    }

    /// Replace the current hash, pushing the old one into a history bounded by `depth`.
    pub fn rotate(&self, new_hash: impl Into<String>, now: DateTime<Utc>, depth: u32) -> Self {
        let mut history = Vec::with_capacity(self.history.len() + 1);
        history.push(self.hash.clone());
        history.extend(self.history.iter().cloned());
        history.truncate(depth as usize);

        Self {
            hash: new_hash.into(),
            updated_at: now,
            history,
        }
    }
}

/// Lock-related fields of an account.
///
/// Writes to these fields must be serialized per account by the store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockState {
    /// Consecutive failed credential checks.
    pub failed_attempts: u32,
    /// The account is locked until this instant.
    pub locked_until: Option<DateTime<Utc>>,
}

impl LockState {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    /// A lock was set and has since run out.
    pub fn lock_elapsed(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until <= now)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub domain: DomainId,
    pub username: String,
    pub password: PasswordRecord,
    #[serde(default)]
    pub source: CredentialSource,
    /// Mandatory reset: password logins are refused until the password changes.
    #[serde(default)]
    pub expired: bool,
    /// Non-blocking reset prompt requested by an operator.
    #[serde(default)]
    pub needs_reset: bool,
    /// May change the domain's security setting.
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub lock: LockState,
    pub last_login_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Account {
    /// New local account whose password was set at `now`.
    pub fn new(
        domain: DomainId,
        username: impl Into<String>,
        password_hash: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: AccountId::new(),
            domain,
            username: username.into(),
            password: PasswordRecord::new(password_hash, now),
            source: CredentialSource::Local,
            expired: false,
            needs_reset: false,
            is_admin: false,
            lock: LockState::default(),
            last_login_at: None,
            created_at: now,
        }
    }

    /// Last activity used by the inactivity check; falls back to creation time.
    pub fn last_seen(&self) -> DateTime<Utc> {
        self.last_login_at.unwrap_or(self.created_at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn rotate_keeps_bounded_history() {
        let t0 = Utc::now();
        let record = PasswordRecord::new("h1", t0);
        let record = record.rotate("h2", t0 + Duration::days(1), 2);
        let record = record.rotate("h3", t0 + Duration::days(2), 2);
        let record = record.rotate("h4", t0 + Duration::days(3), 2);

        assert_eq!(record.hash, "h4");
        assert_eq!(record.history, vec!["h3".to_string(), "h2".to_string()]);
        assert_eq!(record.updated_at, t0 + Duration::days(3));
        assert_eq!(record.retained().collect::<Vec<_>>(), vec!["h4", "h3", "h2"]);
    }

    #[test]
    fn rotate_with_zero_depth_drops_history() {
        let record = PasswordRecord::new("h1", Utc::now()).rotate("h2", Utc::now(), 0);
        assert!(record.history.is_empty());
    }

    #[test]
    fn lock_state_distinguishes_active_and_elapsed() {
        let now = Utc::now();
        let active = LockState {
            failed_attempts: 5,
            locked_until: Some(now + Duration::minutes(1)),
        };
        let elapsed = LockState {
            failed_attempts: 5,
            locked_until: Some(now - Duration::minutes(1)),
        };

        assert!(active.is_locked(now));
        assert!(!active.lock_elapsed(now));
        assert!(!elapsed.is_locked(now));
        assert!(elapsed.lock_elapsed(now));
        assert!(!LockState::default().is_locked(now));
    }

    #[test]
    fn last_seen_falls_back_to_creation() {
        let now = Utc::now();
        let mut account = Account::new(DomainId::new(), "alice", "hash", now);
        assert_eq!(account.last_seen(), now);

        let later = now + Duration::days(3);
        account.last_login_at = Some(later);
        assert_eq!(account.last_seen(), later);
    }
}
