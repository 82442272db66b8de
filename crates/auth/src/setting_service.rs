//! Read and patch the security setting of a domain.

use std::sync::Arc;

use serde_json::Value;
use thiserror::Error;

use keygate_core::{DomainError, DomainId};

use crate::setting::{SecuritySetting, SettingError};
use crate::store::SecuritySettingStore;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SettingServiceError {
    #[error(transparent)]
    Invalid(#[from] SettingError),

    #[error("setting store: {0}")]
    Store(#[from] DomainError),
}

#[derive(Clone)]
pub struct SettingService {
    store: Arc<dyn SecuritySettingStore>,
}

impl SettingService {
    pub fn new(store: Arc<dyn SecuritySettingStore>) -> Self {
        Self { store }
    }

    /// Stored setting, or the defaults for a domain that never saved one.
    pub fn describe(&self, domain: DomainId) -> Result<SecuritySetting, SettingServiceError> {
        match self.store.describe_setting(domain) {
            Ok(setting) => Ok(setting),
            Err(e) if e.is_not_found() => Ok(SecuritySetting::default()),
            Err(e) => Err(e.into()),
        }
    }

    /// Merge `patch` into the current setting, validate, then persist.
    ///
    /// Nothing is written when the patched result is invalid.
    pub fn patch(&self, domain: DomainId, patch: &Value) -> Result<SecuritySetting, SettingServiceError> {
        let current = self.describe(domain)?;
        let updated = current.apply_patch(patch)?;
        self.store.save_setting(domain, &updated)?;
        tracing::info!(%domain, "security setting updated");
        Ok(updated)
    }
}

impl core::fmt::Debug for SettingService {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("SettingService").finish_non_exhaustive()
    }
}
