//! Environment-driven configuration for the API binary.

use std::net::SocketAddr;
use std::str::FromStr;

use ipnetwork::IpNetwork;
use keygate_auth::IssuerConfig;

pub const BIND_ADDR_ENV: &str = "KEYGATE_BIND_ADDR";
pub const ACCESS_TOKEN_LENGTH_ENV: &str = "KEYGATE_ACCESS_TOKEN_LENGTH";
pub const REFRESH_TOKEN_LENGTH_ENV: &str = "KEYGATE_REFRESH_TOKEN_LENGTH";
pub const ADMIN_USERNAME_ENV: &str = "KEYGATE_ADMIN_USERNAME";
pub const ADMIN_PASSWORD_ENV: &str = "KEYGATE_ADMIN_PASSWORD";
/// Comma-separated addresses or CIDR ranges allowed to set `X-Forwarded-For`.
pub const TRUSTED_PROXIES_ENV: &str = "KEYGATE_TRUSTED_PROXIES";
#[cfg(feature = "postgres")]
pub const DATABASE_URL_ENV: &str = "DATABASE_URL";

/// Credentials for the administrator created at startup.
#[derive(Clone, PartialEq, Eq)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl core::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiConfig {
    pub bind_addr: SocketAddr,
    pub issuer: IssuerConfig,
    pub bootstrap: Option<BootstrapAdmin>,
    /// Peers whose forwarding headers are believed. Empty means none.
    pub trusted_proxies: Vec<IpNetwork>,
    #[cfg(feature = "postgres")]
    pub database_url: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            issuer: IssuerConfig::default(),
            bootstrap: None,
            trusted_proxies: Vec::new(),
            #[cfg(feature = "postgres")]
            database_url: None,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Unparsable values are logged and
    /// replaced by their defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let bind_addr = parse_or(&lookup, BIND_ADDR_ENV, defaults.bind_addr);
        let access = parse_or(&lookup, ACCESS_TOKEN_LENGTH_ENV, defaults.issuer.access_token_length());
        let refresh = parse_or(&lookup, REFRESH_TOKEN_LENGTH_ENV, defaults.issuer.refresh_token_length());

        let bootstrap = match (lookup(ADMIN_USERNAME_ENV), lookup(ADMIN_PASSWORD_ENV)) {
            (Some(username), Some(password)) if !username.is_empty() && !password.is_empty() => {
                Some(BootstrapAdmin { username, password })
            }
            (None, None) => None,
            _ => {
                tracing::warn!(
                    "{ADMIN_USERNAME_ENV} and {ADMIN_PASSWORD_ENV} must both be set; skipping bootstrap"
                );
                None
            }
        };

        Self {
            bind_addr,
            issuer: defaults.issuer.with_token_lengths(access, refresh),
            bootstrap,
            trusted_proxies: lookup(TRUSTED_PROXIES_ENV)
                .map(|raw| parse_networks(&raw))
                .unwrap_or_default(),
            #[cfg(feature = "postgres")]
            database_url: lookup(DATABASE_URL_ENV).filter(|v| !v.is_empty()),
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr + Copy + core::fmt::Display,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(key, value = %raw, default = %default, "unparsable configuration value; using default");
                default
            }
        },
    }
}

fn parse_networks(raw: &str) -> Vec<IpNetwork> {
    raw.split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .filter_map(|entry| match entry.parse::<IpNetwork>() {
            Ok(network) => Some(network),
            Err(e) => {
                tracing::warn!(key = TRUSTED_PROXIES_ENV, entry, error = %e, "ignoring trusted proxy entry");
                None
            }
        })
        .collect()
}
