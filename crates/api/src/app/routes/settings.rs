use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};

use keygate_auth::RequestContext;
use keygate_core::DomainId;

use crate::app::{blocking, errors, services::AppServices};

pub fn router() -> Router {
    Router::new().route("/security", get(describe_security).patch(patch_security))
}

/// `GET /settings/security`
pub async fn describe_security(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
) -> axum::response::Response {
    let Some(domain) = ctx.domain() else {
        return errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required");
    };

    let settings = services.settings.clone();
    match blocking(move || settings.describe(domain)).await {
        Ok(Ok(setting)) => (StatusCode::OK, Json(setting)).into_response(),
        Ok(Err(e)) => errors::setting_error_to_response(e),
        Err(resp) => resp,
    }
}

/// `PATCH /settings/security` with a JSON merge-patch body. Only
/// administrator accounts of the domain may change it.
pub async fn patch_security(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(ctx): Extension<RequestContext>,
    body: Result<Json<serde_json::Value>, JsonRejection>,
) -> axum::response::Response {
    let domain = match require_admin(&services, &ctx).await {
        Ok(domain) => domain,
        Err(resp) => return resp,
    };
    let Json(patch) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return errors::json_error(StatusCode::BAD_REQUEST, "bad_request", rejection.body_text());
        }
    };

    let settings = services.settings.clone();
    match blocking(move || settings.patch(domain, &patch)).await {
        Ok(Ok(setting)) => (StatusCode::OK, Json(setting)).into_response(),
        Ok(Err(e)) => errors::setting_error_to_response(e),
        Err(resp) => resp,
    }
}

async fn require_admin(
    services: &Arc<AppServices>,
    ctx: &RequestContext,
) -> Result<DomainId, axum::response::Response> {
    let Some(domain) = ctx.domain() else {
        return Err(errors::json_error(StatusCode::UNAUTHORIZED, "unauthorized", "bearer token required"));
    };
    let Some(account_id) = ctx.user_id() else {
        tracing::warn!(%domain, "application token tried to change security settings");
        return Err(errors::forbidden());
    };

    let accounts = services.accounts.clone();
    match blocking(move || accounts.describe_account_by_id(account_id)).await? {
        Ok(account) if account.is_admin && account.domain == domain => Ok(domain),
        Ok(_) => {
            tracing::warn!(%domain, %account_id, "non-admin tried to change security settings");
            Err(errors::forbidden())
        }
        Err(e) if e.is_not_found() => Err(errors::forbidden()),
        Err(e) => Err(errors::store_error_to_response(e)),
    }
}
