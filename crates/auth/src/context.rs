//! Per-request context built from a resolved bearer token.

use keygate_core::{AccountId, DomainId};

use crate::token::Token;

/// Request-scoped view of who is calling. Holds the token rather than
/// flattening it, so callers always see where an identity came from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestContext {
    token: Option<Token>,
}

impl RequestContext {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn with_token(token: Token) -> Self {
        Self { token: Some(token) }
    }

    pub fn token(&self) -> Option<&Token> {
        self.token.as_ref()
    }

    /// `None` for anonymous callers and application-only tokens.
    pub fn user_id(&self) -> Option<AccountId> {
        self.token.as_ref().and_then(|t| t.account_id)
    }

    pub fn domain(&self) -> Option<DomainId> {
        self.token.as_ref().map(|t| t.domain)
    }

    pub fn is_authenticated(&self) -> bool {
        self.token.is_some()
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use keygate_core::{ApplicationId, TokenId};

    use super::*;
    use crate::token::{GrantType, TokenKind};

    fn user_token(account_id: Option<AccountId>) -> Token {
        let now = Utc::now();
        Token {
            id: TokenId::new(),
            kind: TokenKind::Bearer,
            access_token: "a".repeat(24),
            refresh_token: "r".repeat(32),
            created_at: now,
            expires_at: now + Duration::hours(1),
            refresh_expires_at: now + Duration::days(7),
            client_id: "cid".to_string(),
            application_id: ApplicationId::new(),
            domain: DomainId::new(),
            account_id,
            username: None,
            grant_type: GrantType::Password,
        }
    }

    #[test]
    fn anonymous_context_has_no_identity() {
        let ctx = RequestContext::anonymous();
        assert!(!ctx.is_authenticated());
        assert_eq!(ctx.user_id(), None);
        assert_eq!(ctx.domain(), None);
    }

    #[test]
    fn token_supplies_user_and_domain() {
        let account = AccountId::new();
        let token = user_token(Some(account));
        let domain = token.domain;
        let ctx = RequestContext::with_token(token);

        assert_eq!(ctx.user_id(), Some(account));
        assert_eq!(ctx.domain(), Some(domain));
    }

    #[test]
    fn application_token_has_domain_but_no_user() {
        let ctx = RequestContext::with_token(user_token(None));
        assert!(ctx.is_authenticated());
        assert_eq!(ctx.user_id(), None);
        assert!(ctx.domain().is_some());
    }
}
