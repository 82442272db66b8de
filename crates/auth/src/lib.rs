//! `keygate-auth`: credential issuance and access policy.
//!
//! Pure decision engines (password policy, login security, client checks)
//! plus the [`TokenIssuer`] that orchestrates them over the collaborator
//! traits in [`store`]. Nothing here knows about HTTP or a storage backend.

pub mod account;
pub mod application;
pub mod client;
pub mod config;
pub mod context;
pub mod error;
pub mod external;
pub mod issuer;
pub mod password;
pub mod request;
pub mod secret;
pub mod security;
pub mod session;
pub mod setting;
pub mod setting_service;
pub mod store;
pub mod token;

pub use account::{Account, CredentialSource, LockState, PasswordRecord};
pub use application::Application;
pub use client::ClientChecker;
pub use config::IssuerConfig;
pub use context::RequestContext;
pub use error::IssueError;
pub use external::{DirectoryConfig, ExternalAuthError, ExternalAuthenticator};
pub use issuer::{
    Collaborators, ExternalProvider, Issued, PasswordChangeRequest, ResetHint, TokenIssuer, TokenResponse,
};
pub use password::{Aging, Argon2Hasher, PasswordHasher, Violation};
pub use request::{Grant, IssuanceRequest};
pub use secret::make_bearer;
pub use security::{LockoutPolicy, LoginAttempt, SecurityDecision};
pub use session::LoginSession;
pub use setting::{SecuritySetting, SettingError};
pub use setting_service::{SettingService, SettingServiceError};
pub use token::{AuthorizationCode, GrantType, Token};
