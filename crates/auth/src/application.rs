//! Registered applications (OAuth clients).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::Duration;
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use keygate_core::{ApplicationId, DomainId};

use crate::secret::make_bearer;

/// Default refresh token lifetime (7 days).
pub const DEFAULT_REFRESH_TTL_SECS: u32 = 7 * 24 * 3600;

const CLIENT_ID_LENGTH: usize = 24;
const CLIENT_SECRET_LENGTH: usize = 32;

/// SHA-256 digest of a client secret, URL-safe base64 without padding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SecretDigest(String);

impl SecretDigest {
    pub fn of(secret: &str) -> Self {
        Self(URL_SAFE_NO_PAD.encode(Sha256::digest(secret.as_bytes())))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Constant-time comparison against a presented secret.
    pub fn matches(&self, secret: &str) -> bool {
        let presented = Self::of(secret);
        constant_time_eq(self.0.as_bytes(), presented.0.as_bytes())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Application {
    pub id: ApplicationId,
    pub domain: DomainId,
    pub name: String,
    pub client_id: String,
    pub client_secret: SecretDigest,
    /// Access token lifetime in seconds.
    pub token_expire_secs: u32,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_expire_secs: u32,
}

fn default_refresh_ttl() -> u32 {
    DEFAULT_REFRESH_TTL_SECS
}

impl Application {
    /// Register a new application, returning it with the plaintext secret.
    ///
    /// The plaintext is shown to the caller once; only its digest is kept.
    pub fn register(domain: DomainId, name: impl Into<String>, token_expire_secs: u32) -> (Self, String) {
        let secret = make_bearer(CLIENT_SECRET_LENGTH);
        let app = Self {
            id: ApplicationId::new(),
            domain,
            name: name.into(),
            client_id: make_bearer(CLIENT_ID_LENGTH),
            client_secret: SecretDigest::of(&secret),
            token_expire_secs,
            refresh_expire_secs: DEFAULT_REFRESH_TTL_SECS,
        };
        (app, secret)
    }

    pub fn check_client_secret(&self, secret: &str) -> bool {
        self.client_secret.matches(secret)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(i64::from(self.token_expire_secs))
    }

    pub fn refresh_ttl(&self) -> Duration {
        Duration::seconds(i64::from(self.refresh_expire_secs))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registered_secret_matches_only_itself() {
        let (app, secret) = Application::register(DomainId::new(), "console", 3600);
        assert_eq!(app.client_id.len(), CLIENT_ID_LENGTH);
        assert_eq!(secret.len(), CLIENT_SECRET_LENGTH);
        assert!(app.check_client_secret(&secret));
        assert!(!app.check_client_secret(""));
        assert!(!app.check_client_secret(&format!("{secret}x")));
        assert_ne!(app.client_secret.as_str(), secret);
    }

    #[test]
    fn ttls_are_expressed_in_seconds() {
        let (app, _) = Application::register(DomainId::new(), "console", 90);
        assert_eq!(app.token_ttl(), Duration::seconds(90));
        assert_eq!(app.refresh_ttl(), Duration::days(7));
    }
}
