use std::sync::Arc;

use axum::{
    extract::{Extension, Path, Query},
    http::StatusCode,
    response::IntoResponse,
    Json,
};

use keygate_auth::RequestContext;
use keygate_core::AccountId;
use uuid::Uuid;

use crate::app::{blocking, dto::SessionQueryParams, errors, services::AppServices};

/// `GET /sessions`: login audit trail of the caller's domain.
pub async fn query_sessions(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Query(params): Query<SessionQueryParams>,
) -> axum::response::Response {
    let Some(domain) = ctx.domain() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required");
    };

    let (filter, pagination) = params.into_query();
    let sessions = services.sessions.clone();
    match blocking(move || sessions.query_sessions(domain, &filter, pagination)).await {
        Ok(Ok(result)) => (StatusCode::OK, Json(result)).into_response(),
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(resp) => resp,
    }
}

/// `GET /sessions/:id`
pub async fn describe_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(id): Path<Uuid>,
) -> axum::response::Response {
    let Some(domain) = ctx.domain() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required");
    };

    let sessions = services.sessions.clone();
    match blocking(move || sessions.describe_session(domain, id)).await {
        Ok(Ok(session)) => (StatusCode::OK, Json(session)).into_response(),
        Ok(Err(e)) if e.is_not_found() => errors::json_error(StatusCode::NOT_FOUND, "not_found", "no such session"),
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(resp) => resp,
    }
}

/// `GET /accounts/:account_id/sessions/last`: most recent login of an account.
pub async fn last_session(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    Path(account_id): Path<AccountId>,
) -> axum::response::Response {
    let Some(domain) = ctx.domain() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required");
    };

    let sessions = services.sessions.clone();
    match blocking(move || sessions.last_session(domain, account_id)).await {
        Ok(Ok(session)) => (StatusCode::OK, Json(session)).into_response(),
        Ok(Err(e)) if e.is_not_found() => {
            errors::json_error(StatusCode::NOT_FOUND, "not_found", "account has no login sessions")
        }
        Ok(Err(e)) => errors::store_error_to_response(e),
        Err(resp) => resp,
    }
}
