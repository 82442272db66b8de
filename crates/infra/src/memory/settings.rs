use std::collections::HashMap;
use std::sync::RwLock;

use keygate_auth::SecuritySetting;
use keygate_auth::store::SecuritySettingStore;
use keygate_core::{DomainError, DomainId, DomainResult};

use super::{read, write};

#[derive(Debug, Default)]
pub struct InMemorySettingStore {
    inner: RwLock<HashMap<DomainId, SecuritySetting>>,
}

impl InMemorySettingStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecuritySettingStore for InMemorySettingStore {
    fn describe_setting(&self, domain: DomainId) -> DomainResult<SecuritySetting> {
        read(&self.inner)?.get(&domain).cloned().ok_or(DomainError::NotFound)
    }

    fn save_setting(&self, domain: DomainId, setting: &SecuritySetting) -> DomainResult<()> {
        write(&self.inner)?.insert(domain, setting.clone());
        Ok(())
    }
}
