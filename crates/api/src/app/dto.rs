use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use keygate_auth::{GrantType, Token};
use keygate_core::{AccountId, ApplicationId, DomainId};
use keygate_infra::{Pagination, SessionFilter};

// -------------------------
// Request DTOs
// -------------------------

/// Query string of `GET /sessions`.
#[derive(Debug, Default, Deserialize)]
pub struct SessionQueryParams {
    pub account_id: Option<AccountId>,
    pub username: Option<String>,
    pub application_id: Option<ApplicationId>,
    pub login_ip: Option<String>,
    pub grant_type: Option<GrantType>,
    pub login_after: Option<DateTime<Utc>>,
    pub login_before: Option<DateTime<Utc>>,
    pub active: Option<bool>,
    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

impl SessionQueryParams {
    pub fn into_query(self) -> (SessionFilter, Pagination) {
        let pagination = Pagination::new(self.limit, self.offset);
        let filter = SessionFilter {
            account_id: self.account_id,
            username: self.username,
            application_id: self.application_id,
            login_ip: self.login_ip,
            grant_type: self.grant_type,
            login_after: self.login_after,
            login_before: self.login_before,
            active: self.active,
        };
        (filter, pagination)
    }
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct WhoAmIResponse {
    pub domain: DomainId,
    pub client_id: String,
    pub application_id: ApplicationId,
    pub account_id: Option<AccountId>,
    pub username: Option<String>,
    pub grant_type: GrantType,
    pub expires_at: DateTime<Utc>,
}

impl From<&Token> for WhoAmIResponse {
    fn from(token: &Token) -> Self {
        Self {
            domain: token.domain,
            client_id: token.client_id.clone(),
            application_id: token.application_id,
            account_id: token.account_id,
            username: token.username.clone(),
            grant_type: token.grant_type,
            expires_at: token.expires_at,
        }
    }
}
