use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use keygate_auth::PasswordChangeRequest;

use crate::app::{blocking, errors, services::AppServices};
use crate::context::client_ip;

/// `POST /accounts/password`: change a password with the current one.
pub async fn change_password(
    Extension(services): Extension<Arc<AppServices>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<PasswordChangeRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text());
        }
    };

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr), &services.trusted_proxies);
    let request = request.with_source(ip);

    let issuer = services.issuer.clone();
    match blocking(move || issuer.change_password(request, Utc::now())).await {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e)) => errors::issue_error_to_response(e),
        Err(resp) => resp,
    }
}
