//! Storage adapters for the issuance core.
//!
//! In-memory implementations of every collaborator trait live in
//! [`memory`]; Postgres adapters for the durable ones are behind the
//! `postgres` feature.

pub mod memory;
pub mod query;

#[cfg(feature = "postgres")]
pub mod postgres;


pub use memory::{
    InMemoryAccountStore, InMemoryApplicationStore, InMemoryCodeStore, InMemorySessionStore,
    InMemorySettingStore, InMemoryTokenStore,
};
pub use query::{Pagination, SessionFilter, SessionQuery, SessionQueryResult};

use std::sync::Arc;

use keygate_auth::Collaborators;

/// One in-memory instance of every store, shared between the issuer and
/// whatever else needs direct access (seeding, session queries).
#[derive(Debug, Clone, Default)]
pub struct InMemoryStores {
    pub applications: Arc<InMemoryApplicationStore>,
    pub accounts: Arc<InMemoryAccountStore>,
    pub settings: Arc<InMemorySettingStore>,
    pub tokens: Arc<InMemoryTokenStore>,
    pub codes: Arc<InMemoryCodeStore>,
    pub sessions: Arc<InMemorySessionStore>,
}

impl InMemoryStores {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn collaborators(&self) -> Collaborators {
        Collaborators {
            applications: self.applications.clone(),
            accounts: self.accounts.clone(),
            settings: self.settings.clone(),
            tokens: self.tokens.clone(),
            codes: self.codes.clone(),
            sessions: self.sessions.clone(),
        }
    }
}
