use std::collections::HashMap;
use std::sync::RwLock;

use keygate_auth::Application;
use keygate_auth::store::ApplicationStore;
use keygate_core::{DomainError, DomainResult};

use super::{read, write};

/// Applications keyed by client id.
#[derive(Debug, Default)]
pub struct InMemoryApplicationStore {
    inner: RwLock<HashMap<String, Application>>,
}

impl InMemoryApplicationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, app: Application) -> DomainResult<()> {
        let mut map = write(&self.inner)?;
        if map.contains_key(&app.client_id) {
            return Err(DomainError::conflict(format!("client_id {} already registered", app.client_id)));
        }
        map.insert(app.client_id.clone(), app);
        Ok(())
    }
}

impl ApplicationStore for InMemoryApplicationStore {
    fn describe_by_client_id(&self, client_id: &str) -> DomainResult<Application> {
        read(&self.inner)?.get(client_id).cloned().ok_or(DomainError::NotFound)
    }
}
