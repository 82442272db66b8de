use std::sync::Arc;

use axum::{
    extract::State,
    http::{HeaderMap, StatusCode},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use keygate_auth::{RequestContext, TokenIssuer};

use crate::app::blocking;
use crate::app::errors::{issue_error_to_response, json_error};

#[derive(Clone)]
pub struct AuthState {
    pub issuer: Arc<TokenIssuer>,
}

/// Resolve `Authorization: Bearer <access_token>` into a [`RequestContext`].
pub async fn auth_middleware(
    State(state): State<AuthState>,
    mut req: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, Response> {
    let token = extract_bearer(req.headers())
        .ok_or_else(|| json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required"))?
        .to_string();

    let issuer = state.issuer.clone();
    let token = blocking(move || issuer.describe_token(&token, Utc::now()))
        .await?
        .map_err(issue_error_to_response)?;

    req.extensions_mut().insert(RequestContext::with_token(token));
    Ok(next.run(req).await)
}

fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let header = headers.get(axum::http::header::AUTHORIZATION)?.to_str().ok()?;
    let token = header.strip_prefix("Bearer ")?.trim();
    (!token.is_empty()).then_some(token)
}
