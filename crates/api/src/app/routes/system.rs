use axum::{extract::Extension, http::StatusCode, response::IntoResponse, Json};

use keygate_auth::RequestContext;

use crate::app::{dto::WhoAmIResponse, errors};

pub async fn health() -> StatusCode {
    StatusCode::OK
}

pub async fn whoami(Extension(ctx): Extension<RequestContext>) -> axum::response::Response {
    match ctx.token() {
        Some(token) => Json(WhoAmIResponse::from(token)).into_response(),
        None => errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required"),
    }
}
