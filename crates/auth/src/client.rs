//! Client authentication: the trust anchor for every grant type.

use std::sync::Arc;

use crate::application::Application;
use crate::error::IssueError;
use crate::store::ApplicationStore;

/// Checks a client id/secret pair against the application registry.
#[derive(Clone)]
pub struct ClientChecker {
    applications: Arc<dyn ApplicationStore>,
}

impl ClientChecker {
    pub fn new(applications: Arc<dyn ApplicationStore>) -> Self {
        Self { applications }
    }

    /// Resolve the application for a client id without checking a secret.
    pub fn describe(&self, client_id: &str) -> Result<Application, IssueError> {
        match self.applications.describe_by_client_id(client_id) {
            Ok(app) => Ok(app),
            Err(e) if e.is_not_found() => Err(IssueError::Unauthorized),
            Err(e) => Err(e.into()),
        }
    }

    /// Unknown client ids and wrong secrets both yield `Unauthorized`.
    pub fn check_client(&self, client_id: &str, client_secret: &str) -> Result<Application, IssueError> {
        let app = self.describe(client_id).inspect_err(|e| {
            if matches!(e, IssueError::Unauthorized) {
                tracing::debug!(client_id, "client not registered");
            }
        })?;

        if !app.check_client_secret(client_secret) {
            tracing::debug!(client_id, "client secret mismatch");
            return Err(IssueError::Unauthorized);
        }

        Ok(app)
    }
}

impl core::fmt::Debug for ClientChecker {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("ClientChecker").finish_non_exhaustive()
    }
}
