//! Login session records kept for auditing.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use keygate_core::{AccountId, ApplicationId, DomainId, TokenId};

use crate::token::{GrantType, Token};

/// One successful user-bound login.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginSession {
    pub id: Uuid,
    pub domain: DomainId,
    pub account_id: AccountId,
    pub username: String,
    pub application_id: ApplicationId,
    pub client_id: String,
    pub grant_type: GrantType,
    pub login_ip: Option<String>,
    pub login_at: DateTime<Utc>,
    /// Set when the session's token is revoked or rotated.
    #[serde(default)]
    pub logout_at: Option<DateTime<Utc>>,
    pub token_id: TokenId,
}

impl LoginSession {
    /// `None` for tokens that are not bound to an account.
    pub fn from_token(token: &Token, login_ip: Option<String>) -> Option<Self> {
        let account_id = token.account_id?;
        Some(Self {
            id: Uuid::now_v7(),
            domain: token.domain,
            account_id,
            username: token.username.clone().unwrap_or_default(),
            application_id: token.application_id,
            client_id: token.client_id.clone(),
            grant_type: token.grant_type,
            login_ip,
            login_at: token.created_at,
            logout_at: None,
            token_id: token.id,
        })
    }

    pub fn is_active(&self) -> bool {
        self.logout_at.is_none()
    }
}
