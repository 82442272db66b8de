use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, ConnectInfo, Extension},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Json,
};
use chrono::Utc;

use keygate_auth::{IssuanceRequest, RequestContext, TokenResponse};

use crate::app::{blocking, errors, services::AppServices};
use crate::context::{client_ip, location_changed};

/// `POST /oauth2/tokens`
pub async fn issue_token(
    Extension(services): Extension<Arc<AppServices>>,
    peer: Option<ConnectInfo<SocketAddr>>,
    headers: HeaderMap,
    body: Result<Json<IssuanceRequest>, JsonRejection>,
) -> axum::response::Response {
    let Json(request) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text());
        }
    };

    let ip = client_ip(&headers, peer.map(|ConnectInfo(addr)| addr), &services.trusted_proxies);
    let request = request.with_source(ip, location_changed(&headers));

    let issuer = services.issuer.clone();
    let issued = match blocking(move || issuer.issue(request, Utc::now())).await {
        Ok(Ok(issued)) => issued,
        Ok(Err(e)) => return errors::issue_error_to_response(e),
        Err(resp) => return resp,
    };

    (StatusCode::OK, Json(TokenResponse::from(&issued))).into_response()
}

/// `DELETE /oauth2/tokens`: revoke the token presented as bearer.
pub async fn revoke_token(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    let Some(access_token) = ctx.token().map(|t| t.access_token.clone()) else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required");
    };

    let issuer = services.issuer.clone();
    match blocking(move || issuer.revoke_token(&access_token, Utc::now())).await {
        Ok(Ok(())) => StatusCode::NO_CONTENT.into_response(),
        Ok(Err(e)) => errors::issue_error_to_response(e),
        Err(resp) => resp,
    }
}
