use std::sync::RwLock;

use chrono::{DateTime, Utc};
use keygate_auth::LoginSession;
use keygate_auth::store::SessionRecorder;
use keygate_core::{AccountId, DomainError, DomainId, DomainResult, TokenId};
use uuid::Uuid;

use super::{read, write};
use crate::query::{Pagination, SessionFilter, SessionQuery, SessionQueryResult};

/// Login sessions in arrival order; only `logout_at` is ever changed.
#[derive(Debug, Default)]
pub struct InMemorySessionStore {
    inner: RwLock<Vec<LoginSession>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionRecorder for InMemorySessionStore {
    fn record_login(&self, session: &LoginSession) -> DomainResult<()> {
        write(&self.inner)?.push(session.clone());
        Ok(())
    }

    fn record_logout(&self, token_id: TokenId, at: DateTime<Utc>) -> DomainResult<()> {
        let mut sessions = write(&self.inner)?;
        let session = sessions
            .iter_mut()
            .find(|s| s.token_id == token_id)
            .ok_or(DomainError::NotFound)?;
        // First logout wins.
        session.logout_at.get_or_insert(at);
        Ok(())
    }
}

impl SessionQuery for InMemorySessionStore {
    fn query_sessions(
        &self,
        domain: DomainId,
        filter: &SessionFilter,
        pagination: Pagination,
    ) -> DomainResult<SessionQueryResult> {
        let sessions = read(&self.inner)?;
        let mut matching: Vec<&LoginSession> = sessions
            .iter()
            .filter(|s| s.domain == domain && filter.matches(s))
            .collect();
        matching.sort_by(|a, b| b.login_at.cmp(&a.login_at));

        let total = matching.len() as u64;
        let page: Vec<LoginSession> = matching
            .into_iter()
            .skip(pagination.offset as usize)
            .take(pagination.limit as usize)
            .cloned()
            .collect();
        let has_more = u64::from(pagination.offset) + (page.len() as u64) < total;

        Ok(SessionQueryResult {
            sessions: page,
            total,
            pagination,
            has_more,
        })
    }

    fn describe_session(&self, domain: DomainId, id: Uuid) -> DomainResult<LoginSession> {
        read(&self.inner)?
            .iter()
            .find(|s| s.domain == domain && s.id == id)
            .cloned()
            .ok_or(DomainError::NotFound)
    }

    fn last_session(&self, domain: DomainId, account_id: AccountId) -> DomainResult<LoginSession> {
        read(&self.inner)?
            .iter()
            .filter(|s| s.domain == domain && s.account_id == account_id)
            .max_by_key(|s| s.login_at)
            .cloned()
            .ok_or(DomainError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use keygate_auth::GrantType;
    use keygate_core::ApplicationId;

    use super::*;

    fn session(domain: DomainId, username: &str, minutes_ago: i64, ip: &str) -> LoginSession {
        LoginSession {
            id: Uuid::now_v7(),
            domain,
            account_id: AccountId::new(),
            username: username.to_string(),
            application_id: ApplicationId::new(),
            client_id: "cid".to_string(),
            grant_type: GrantType::Password,
            login_ip: Some(ip.to_string()),
            login_at: Utc::now() - Duration::minutes(minutes_ago),
            logout_at: None,
            token_id: TokenId::new(),
        }
    }

    fn seeded() -> (InMemorySessionStore, DomainId) {
        let store = InMemorySessionStore::new();
        let domain = DomainId::new();
        for (i, name) in ["alice", "bob", "alice", "carol", "alice"].iter().enumerate() {
            store
                .record_login(&session(domain, name, i as i64 * 10, "10.0.0.1"))
                .unwrap();
        }
        store
            .record_login(&session(DomainId::new(), "alice", 0, "10.0.0.1"))
            .unwrap();
        (store, domain)
    }

    #[test]
    fn results_are_domain_scoped_and_newest_first() {
        let (store, domain) = seeded();
        let result = store
            .query_sessions(domain, &SessionFilter::default(), Pagination::default())
            .unwrap();

        assert_eq!(result.total, 5);
        assert!(!result.has_more);
        assert!(result.sessions.windows(2).all(|w| w[0].login_at >= w[1].login_at));
    }

    #[test]
    fn filters_and_pages() {
        let (store, domain) = seeded();
        let filter = SessionFilter {
            username: Some("alice".to_string()),
            ..SessionFilter::default()
        };
        let first = store
            .query_sessions(domain, &filter, Pagination { limit: 2, offset: 0 })
            .unwrap();
        assert_eq!(first.total, 3);
        assert_eq!(first.sessions.len(), 2);
        assert!(first.has_more);

        let second = store
            .query_sessions(domain, &filter, Pagination { limit: 2, offset: 2 })
            .unwrap();
        assert_eq!(second.sessions.len(), 1);
        assert!(!second.has_more);
    }

    #[test]
    fn time_window_includes_both_ends() {
        let (store, domain) = seeded();
        let all = store
            .query_sessions(domain, &SessionFilter::default(), Pagination::default())
            .unwrap();
        let newest = all.sessions[0].login_at;
        let oldest = all.sessions[4].login_at;

        let filter = SessionFilter {
            login_after: Some(oldest),
            login_before: Some(newest),
            ..SessionFilter::default()
        };
        let result = store.query_sessions(domain, &filter, Pagination::default()).unwrap();
        assert_eq!(result.total, 5);

        let filter = SessionFilter {
            login_after: Some(Utc::now() - Duration::minutes(25)),
            ..SessionFilter::default()
        };
        let result = store.query_sessions(domain, &filter, Pagination::default()).unwrap();
        assert_eq!(result.total, 3);
    }

    #[test]
    fn logout_closes_the_session_once() {
        let store = InMemorySessionStore::new();
        let domain = DomainId::new();
        let open = session(domain, "alice", 5, "10.0.0.1");
        store.record_login(&open).unwrap();

        let first = Utc::now();
        store.record_logout(open.token_id, first).unwrap();
        store.record_logout(open.token_id, first + Duration::minutes(1)).unwrap();

        let stored = store.describe_session(domain, open.id).unwrap();
        assert_eq!(stored.logout_at, Some(first));
        assert!(!stored.is_active());

        let active_only = SessionFilter {
            active: Some(true),
            ..SessionFilter::default()
        };
        let result = store.query_sessions(domain, &active_only, Pagination::default()).unwrap();
        assert_eq!(result.total, 0);

        assert!(store.record_logout(TokenId::new(), first).unwrap_err().is_not_found());
    }

    #[test]
    fn describe_session_is_domain_scoped() {
        let (store, domain) = seeded();
        let any = store
            .query_sessions(domain, &SessionFilter::default(), Pagination::default())
            .unwrap()
            .sessions[0]
            .clone();
        assert_eq!(store.describe_session(domain, any.id).unwrap(), any);
        assert!(store.describe_session(DomainId::new(), any.id).unwrap_err().is_not_found());
        assert!(store.describe_session(domain, Uuid::now_v7()).unwrap_err().is_not_found());
    }

    #[test]
    fn last_session_picks_the_newest_login() {
        let store = InMemorySessionStore::new();
        let domain = DomainId::new();
        let mut older = session(domain, "alice", 30, "10.0.0.1");
        let mut newer = session(domain, "alice", 1, "10.0.0.2");
        newer.account_id = older.account_id;
        older.login_ip = Some("10.0.0.9".to_string());
        store.record_login(&newer).unwrap();
        store.record_login(&older).unwrap();

        let last = store.last_session(domain, newer.account_id).unwrap();
        assert_eq!(last.id, newer.id);
        assert!(store.last_session(domain, AccountId::new()).unwrap_err().is_not_found());
    }
}
