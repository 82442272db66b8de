use std::collections::HashMap;
use std::sync::RwLock;

use keygate_auth::Token;
use keygate_auth::store::TokenStore;
use keygate_core::{DomainError, DomainResult};

use super::{read, write};

#[derive(Debug, Default)]
struct Tokens {
    by_access: HashMap<String, Token>,
    /// refresh value -> access value
    by_refresh: HashMap<String, String>,
}

/// Tokens indexed by both their access and refresh values.
#[derive(Debug, Default)]
pub struct InMemoryTokenStore {
    inner: RwLock<Tokens>,
}

impl InMemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        read(&self.inner).map(|t| t.by_access.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TokenStore for InMemoryTokenStore {
    fn save(&self, token: &Token) -> DomainResult<()> {
        let mut tokens = write(&self.inner)?;
        if tokens.by_access.contains_key(&token.access_token)
            || tokens.by_refresh.contains_key(&token.refresh_token)
        {
            return Err(DomainError::conflict("token value already issued"));
        }
        tokens
            .by_refresh
            .insert(token.refresh_token.clone(), token.access_token.clone());
        tokens.by_access.insert(token.access_token.clone(), token.clone());
        Ok(())
    }

    fn describe_by_access(&self, access_token: &str) -> DomainResult<Token> {
        read(&self.inner)?
            .by_access
            .get(access_token)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn describe_by_refresh(&self, refresh_token: &str) -> DomainResult<Token> {
        let tokens = read(&self.inner)?;
        tokens
            .by_refresh
            .get(refresh_token)
            .and_then(|access| tokens.by_access.get(access))
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn revoke(&self, access_token: &str) -> DomainResult<Token> {
        let mut tokens = write(&self.inner)?;
        let token = tokens.by_access.remove(access_token).ok_or(DomainError::NotFound)?;
        tokens.by_refresh.remove(&token.refresh_token);
        Ok(token)
    }
}
