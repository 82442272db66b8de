//! Account security policy: IP limit, retry lock and exception lock.
//!
//! [`evaluate`] is a pure decision over an account snapshot. It runs before
//! any password comparison so a refused attempt never reveals whether the
//! presented password was correct.

use std::net::IpAddr;

use chrono::{DateTime, Duration, Utc};
use serde::Serialize;

use crate::account::{Account, LockState};
use crate::setting::{IpLimitMode, LoginPolicy};

/// Caller-observed facts about a login attempt.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoginAttempt {
    pub ip: Option<IpAddr>,
    /// The caller detected a login from a location inconsistent with history.
    pub location_changed: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum DenyReason {
    IpNotAllowed,
    IpDenied,
    RetryLocked { remaining_secs: i64 },
}

impl DenyReason {
    pub fn code(&self) -> &'static str {
        match self {
            DenyReason::IpNotAllowed => "ip_not_allowed",
            DenyReason::IpDenied => "ip_denied",
            DenyReason::RetryLocked { .. } => "retry_locked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum VerifyReason {
    Inactive { idle_days: i64 },
    LocationChanged,
}

impl VerifyReason {
    pub fn code(&self) -> &'static str {
        match self {
            VerifyReason::Inactive { .. } => "inactive",
            VerifyReason::LocationChanged => "location_changed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecurityDecision {
    Allow,
    Deny(DenyReason),
    /// Softer than a denial: the caller must escalate (e.g. a second factor).
    RequireVerification(VerifyReason),
}

/// Evaluate the enabled login rules in order: IP limit, retry lock, exception lock.
pub fn evaluate(
    account: &Account,
    policy: &LoginPolicy,
    now: DateTime<Utc>,
    attempt: &LoginAttempt,
) -> SecurityDecision {
    if policy.ip_limit {
        if let Some(reason) = check_ip(policy, attempt.ip) {
            return SecurityDecision::Deny(reason);
        }
    }

    if policy.retry_lock {
        if let Some(until) = account.lock.locked_until.filter(|until| *until > now) {
            return SecurityDecision::Deny(DenyReason::RetryLocked {
                remaining_secs: (until - now).num_seconds(),
            });
        }
    }

    if policy.exception_lock {
        let config = &policy.exception_lock_config;
        let idle_days = (now - account.last_seen()).num_days();
        if idle_days > i64::from(config.not_login_days) {
            return SecurityDecision::RequireVerification(VerifyReason::Inactive { idle_days });
        }
        if config.other_place_login && attempt.location_changed {
            return SecurityDecision::RequireVerification(VerifyReason::LocationChanged);
        }
    }

    SecurityDecision::Allow
}

fn check_ip(policy: &LoginPolicy, ip: Option<IpAddr>) -> Option<DenyReason> {
    let config = &policy.ip_limit_config;
    match (config.mode, ip) {
        (IpLimitMode::Allow, Some(addr)) if config.contains(addr) => None,
        // An unknown source cannot be on an allow-list.
        (IpLimitMode::Allow, _) => Some(DenyReason::IpNotAllowed),
        (IpLimitMode::Deny, Some(addr)) if config.contains(addr) => Some(DenyReason::IpDenied),
        (IpLimitMode::Deny, _) => None,
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Lockout bookkeeping
// ─────────────────────────────────────────────────────────────────────────────

/// Retry-lock thresholds handed to the store's atomic failure update.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    pub retry_limit: u32,
    pub lock_duration: Duration,
}

impl LockoutPolicy {
    /// `None` when the retry lock is disabled: failures are then not counted.
    pub fn from_policy(policy: &LoginPolicy) -> Option<Self> {
        policy.retry_lock.then(|| Self {
            retry_limit: policy.retry_lock_config.retry_limit,
            lock_duration: Duration::minutes(i64::from(policy.retry_lock_config.locked_minutes)),
        })
    }

    /// Lock state after one more failed credential check.
    ///
    /// Stores must compute this and write it back as one atomic step per
    /// account. Once a previous lock has run out the count starts over.
    pub fn apply_failure(&self, current: &LockState, now: DateTime<Utc>) -> LockState {
        let previous = if current.lock_elapsed(now) {
            0
        } else {
            current.failed_attempts
        };
        let failed_attempts = previous.saturating_add(1);

        if failed_attempts >= self.retry_limit {
            LockState {
                failed_attempts,
                locked_until: Some(now + self.lock_duration),
            }
        } else {
            LockState {
                failed_attempts,
                locked_until: None,
            }
        }
    }
}

/// Lock state after a successful authentication.
pub fn after_success() -> LockState {
    LockState::default()
}
