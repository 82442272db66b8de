use chrono::Duration;

use crate::secret::{ACCESS_TOKEN_LENGTH, REFRESH_TOKEN_LENGTH};

/// Tunables for [`TokenIssuer`](crate::issuer::TokenIssuer).
///
/// Token lengths never drop below [`ACCESS_TOKEN_LENGTH`] and
/// [`REFRESH_TOKEN_LENGTH`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuerConfig {
    access_token_length: usize,
    refresh_token_length: usize,
    pub authorization_code_ttl: Duration,
}

impl Default for IssuerConfig {
    fn default() -> Self {
        Self {
            access_token_length: ACCESS_TOKEN_LENGTH,
            refresh_token_length: REFRESH_TOKEN_LENGTH,
            authorization_code_ttl: Duration::minutes(10),
        }
    }
}

impl IssuerConfig {
    /// Override token lengths; values under the minimum are raised to it.
    pub fn with_token_lengths(mut self, access: usize, refresh: usize) -> Self {
        self.access_token_length = at_least(access, ACCESS_TOKEN_LENGTH, "access");
        self.refresh_token_length = at_least(refresh, REFRESH_TOKEN_LENGTH, "refresh");
        self
    }

    pub fn access_token_length(&self) -> usize {
        self.access_token_length
    }

    pub fn refresh_token_length(&self) -> usize {
        self.refresh_token_length
    }
}

fn at_least(requested: usize, minimum: usize, kind: &'static str) -> usize {
    if requested < minimum {
        tracing::warn!(kind, requested, minimum, "token length below minimum, using minimum");
        return minimum;
    }
    requested
}
