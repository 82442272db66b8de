use std::collections::HashMap;
use std::sync::RwLock;

use keygate_auth::AuthorizationCode;
use keygate_auth::store::AuthorizationCodeStore;
use keygate_core::{DomainError, DomainResult};

use super::write;

#[derive(Debug, Default)]
pub struct InMemoryCodeStore {
    inner: RwLock<HashMap<String, AuthorizationCode>>,
}

impl InMemoryCodeStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl AuthorizationCodeStore for InMemoryCodeStore {
    fn save(&self, code: &AuthorizationCode) -> DomainResult<()> {
        write(&self.inner)?.insert(code.code.clone(), code.clone());
        Ok(())
    }

    fn consume(&self, code: &str) -> DomainResult<AuthorizationCode> {
        write(&self.inner)?.remove(code).ok_or(DomainError::NotFound)
    }
}
