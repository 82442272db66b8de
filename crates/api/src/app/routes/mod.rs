use axum::{
    routing::{delete, get},
    Router,
};

pub mod accounts;
pub mod sessions;
pub mod settings;
pub mod system;
pub mod tokens;

/// Router for every endpoint that needs a bearer token.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .route("/oauth2/tokens", delete(tokens::revoke_token))
        .route("/sessions", get(sessions::query_sessions))
        .route("/sessions/:id", get(sessions::describe_session))
        .route("/accounts/:account_id/sessions/last", get(sessions::last_session))
        .nest("/settings", settings::router())
}
