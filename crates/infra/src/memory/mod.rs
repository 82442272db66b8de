//! In-memory adapters for every collaborator trait. Used by tests, local
//! development and the default API binary.

mod accounts;
mod applications;
mod codes;
mod sessions;
mod settings;
mod tokens;

pub use accounts::InMemoryAccountStore;
pub use applications::InMemoryApplicationStore;
pub use codes::InMemoryCodeStore;
pub use sessions::InMemorySessionStore;
pub use settings::InMemorySettingStore;
pub use tokens::InMemoryTokenStore;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use keygate_core::{DomainError, DomainResult};

fn poisoned<T>(_: PoisonError<T>) -> DomainError {
    tracing::error!("in-memory store lock poisoned");
    DomainError::unavailable("in-memory store lock poisoned")
}

pub(crate) fn read<T>(lock: &RwLock<T>) -> DomainResult<RwLockReadGuard<'_, T>> {
    lock.read().map_err(poisoned)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> DomainResult<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(poisoned)
}
