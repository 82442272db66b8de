//! Login session query interface for auditing.
//!
//! All queries are domain-scoped and paginated by default.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keygate_auth::{GrantType, LoginSession};
use keygate_core::{AccountId, ApplicationId, DomainId, DomainResult};
use uuid::Uuid;

/// Pagination parameters for session queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pagination {
    pub limit: u32,
    /// 0-based.
    pub offset: u32,
}

impl Default for Pagination {
    fn default() -> Self {
        Self { limit: 50, offset: 0 }
    }
}

impl Pagination {
    pub const MAX_LIMIT: u32 = 1000;

    pub fn new(limit: Option<u32>, offset: Option<u32>) -> Self {
        Self {
            limit: limit.unwrap_or(50).clamp(1, Self::MAX_LIMIT),
            offset: offset.unwrap_or(0),
        }
    }
}

/// Filter criteria; every `None` field matches everything. Both time bounds
/// are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionFilter {
    pub account_id: Option<AccountId>,
    pub username: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub login_ip: Option<String>,
    pub grant_type: Option<GrantType>,
    pub login_after: Option<DateTime<Utc>>,
    pub login_before: Option<DateTime<Utc>>,
    /// `Some(true)` keeps sessions without a logout, `Some(false)` closed ones.
    pub active: Option<bool>,
}

impl SessionFilter {
    pub fn matches(&self, session: &LoginSession) -> bool {
        self.account_id.is_none_or(|id| session.account_id == id)
            && self.username.as_ref().is_none_or(|u| &session.username == u)
            && self.application_id.is_none_or(|id| session.application_id == id)
            && self
                .login_ip
                .as_ref()
                .is_none_or(|ip| session.login_ip.as_ref() == Some(ip))
            && self.grant_type.is_none_or(|g| session.grant_type == g)
            && self.login_after.is_none_or(|t| session.login_at >= t)
            && self.login_before.is_none_or(|t| session.login_at <= t)
            && self.active.is_none_or(|active| session.is_active() == active)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionQueryResult {
    /// Newest first.
    pub sessions: Vec<LoginSession>,
    /// Matches across all pages.
    pub total: u64,
    pub pagination: Pagination,
    pub has_more: bool,
}

pub trait SessionQuery: Send + Sync {
    fn query_sessions(
        &self,
        domain: DomainId,
        filter: &SessionFilter,
        pagination: Pagination,
    ) -> DomainResult<SessionQueryResult>;

    fn describe_session(&self, domain: DomainId, id: Uuid) -> DomainResult<LoginSession>;

    /// Most recent login of an account; `NotFound` when it never logged in.
    fn last_session(&self, domain: DomainId, account_id: AccountId) -> DomainResult<LoginSession>;
}
