use axum::http::StatusCode;
use axum::response::IntoResponse;
use serde_json::json;

use keygate_auth::{IssueError, SettingServiceError};
use keygate_core::DomainError;

pub fn issue_error_to_response(err: IssueError) -> axum::response::Response {
    match &err {
        IssueError::BadRequest(msg) => json_error(StatusCode::BAD_REQUEST, err.code(), msg.clone()),
        IssueError::Unauthorized => json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
        IssueError::PasswordExpired => json_error(StatusCode::UNAUTHORIZED, err.code(), err.to_string()),
        IssueError::PolicyViolation(_) => {
            json_error(StatusCode::UNPROCESSABLE_ENTITY, err.code(), err.to_string())
        }
        IssueError::VerificationRequired => json_error(StatusCode::FORBIDDEN, err.code(), err.to_string()),
        IssueError::Internal(msg) => {
            tracing::error!(error = %msg, "issuance failed");
            json_error(StatusCode::INTERNAL_SERVER_ERROR, err.code(), "internal error")
        }
    }
}

pub fn setting_error_to_response(err: SettingServiceError) -> axum::response::Response {
    match err {
        SettingServiceError::Invalid(e) => json_error(StatusCode::BAD_REQUEST, "invalid_setting", e.to_string()),
        SettingServiceError::Store(e) => store_error_to_response(e),
    }
}

pub fn store_error_to_response(err: DomainError) -> axum::response::Response {
    tracing::error!(error = %err, "store failure");
    json_error(StatusCode::INTERNAL_SERVER_ERROR, "store_error", "store unavailable")
}

pub fn forbidden() -> axum::response::Response {
    json_error(StatusCode::FORBIDDEN, "forbidden", "administrator account required")
}

pub fn json_error(
    status: StatusCode,
    code: &'static str,
    message: impl Into<String>,
) -> axum::response::Response {
    (
        status,
        axum::Json(json!({
            "error": code,
            "message": message.into(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use keygate_auth::{SettingError, Violation};

    use super::*;

    #[test]
    fn issue_errors_map_to_statuses() {
        let cases = [
            (IssueError::bad_request("username required"), StatusCode::BAD_REQUEST),
            (IssueError::Unauthorized, StatusCode::UNAUTHORIZED),
            (IssueError::PasswordExpired, StatusCode::UNAUTHORIZED),
            (IssueError::PolicyViolation(Violation::Symbol), StatusCode::UNPROCESSABLE_ENTITY),
            (IssueError::VerificationRequired, StatusCode::FORBIDDEN),
            (IssueError::internal("db down"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(issue_error_to_response(err).status(), status);
        }
    }

    #[test]
    fn setting_errors_map_to_statuses() {
        let invalid = SettingServiceError::Invalid(SettingError::PatchNotObject);
        assert_eq!(setting_error_to_response(invalid).status(), StatusCode::BAD_REQUEST);

        let store = SettingServiceError::Store(DomainError::unavailable("down"));
        assert_eq!(setting_error_to_response(store).status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn forbidden_is_403() {
        assert_eq!(forbidden().status(), StatusCode::FORBIDDEN);
    }
}
