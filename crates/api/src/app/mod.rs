//! HTTP API application wiring (Axum router + service wiring).
//!
//! - `services.rs`: store selection, issuer construction, bootstrap data
//! - `routes/`: HTTP handlers (one file per area)
//! - `dto.rs`: request/response DTOs
//! - `errors.rs`: consistent error responses

use std::sync::Arc;

use axum::{
    http::StatusCode,
    routing::{get, post},
    Extension, Router,
};
use tower::ServiceBuilder;

use crate::middleware;

use self::services::AppServices;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

/// Build the full HTTP router (public entrypoint used by `main.rs`).
pub fn build_app(services: Arc<AppServices>) -> Router {
    let auth_state = middleware::AuthState {
        issuer: services.issuer.clone(),
    };

    // Protected routes: require a live access token.
    let protected = routes::router()
        .layer(Extension(services.clone()))
        .layer(axum::middleware::from_fn_with_state(
            auth_state,
            middleware::auth_middleware,
        ));

    Router::new()
        .route("/healthz", get(routes::system::health))
        .route("/oauth2/tokens", post(routes::tokens::issue_token))
        .route("/accounts/password", post(routes::accounts::change_password))
        .layer(Extension(services))
        .merge(protected)
        .layer(ServiceBuilder::new())
}

/// Run a synchronous store-backed call off the async executor.
pub async fn blocking<T, F>(f: F) -> Result<T, axum::response::Response>
where
    F: FnOnce() -> T + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f).await.map_err(|e| {
        tracing::error!(error = %e, "blocking task failed");
        errors::json_error(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", "internal error")
    })
}
