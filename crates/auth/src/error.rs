//! Issuance error taxonomy.

use thiserror::Error;

use keygate_core::DomainError;

use crate::password::{HashError, Violation};

/// Errors surfaced by the issuance core.
///
/// `Unauthorized` is deliberately uninformative: it never says whether the
/// client, the account, the password, or a security rule caused the refusal.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IssueError {
    /// Malformed or missing input.
    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("invalid credentials")]
    Unauthorized,

    /// The password must be reset before logging in again.
    #[error("password expired")]
    PasswordExpired,

    #[error("password {0}")]
    PolicyViolation(Violation),

    /// Credentials were correct but the login looks anomalous; escalate.
    #[error("additional verification required")]
    VerificationRequired,

    /// Operator bug or collaborator failure; never a client mistake.
    #[error("internal error: {0}")]
    Internal(String),
}

impl IssueError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Stable machine-readable code.
    pub fn code(&self) -> &'static str {
        match self {
            IssueError::BadRequest(_) => "bad_request",
            IssueError::Unauthorized => "unauthorized",
            IssueError::PasswordExpired => "password_expired",
            IssueError::PolicyViolation(_) => "policy_violation",
            IssueError::VerificationRequired => "verification_required",
            IssueError::Internal(_) => "internal_error",
        }
    }
}

impl From<DomainError> for IssueError {
    fn from(value: DomainError) -> Self {
        Self::Internal(value.to_string())
    }
}

impl From<HashError> for IssueError {
    fn from(value: HashError) -> Self {
        Self::Internal(value.to_string())
    }
}
