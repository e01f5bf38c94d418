//! JSON envelope `{success, data, error: {code, message}}` and error mapping.

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::json;

use neoledger_auth::AuthzError;
use neoledger_core::LedgerError;

pub type ApiResult = Result<Response, ApiError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, "validation_error", message)
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        let status = match &err {
            LedgerError::Validation(_) | LedgerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
            LedgerError::Conflict(_) => StatusCode::CONFLICT,
            LedgerError::LockTimeout(_) => StatusCode::SERVICE_UNAVAILABLE,
            LedgerError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let message = match &err {
            LedgerError::Internal { operation, message } => {
                tracing::error!(operation = %operation, error = %message, "request failed");
                "internal server error".to_string()
            }
            other => other.to_string(),
        };
        Self::new(status, err.code(), message)
    }
}

impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated(_) => Self::new(StatusCode::UNAUTHORIZED, "unauthorized", err.to_string()),
            AuthzError::Forbidden(_) => Self::new(StatusCode::FORBIDDEN, "forbidden", err.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::validation(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            self.status,
            Json(json!({
                "success": false,
                "data": null,
                "error": { "code": self.code, "message": self.message },
            })),
        )
            .into_response()
    }
}

pub fn ok<T: Serialize>(data: T) -> ApiResult {
    respond(StatusCode::OK, data)
}

pub fn created<T: Serialize>(data: T) -> ApiResult {
    respond(StatusCode::CREATED, data)
}

fn respond<T: Serialize>(status: StatusCode, data: T) -> ApiResult {
    let data = serde_json::to_value(data).map_err(|e| ApiError::from(LedgerError::internal("encode_response", e)))?;
    Ok((status, Json(json!({ "success": true, "data": data, "error": null }))).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ledger_errors_map_to_statuses() {
        let cases = [
            (LedgerError::validation("x"), StatusCode::BAD_REQUEST),
            (LedgerError::bad_request("x"), StatusCode::BAD_REQUEST),
            (LedgerError::not_found("wallet 1"), StatusCode::NOT_FOUND),
            (LedgerError::conflict("x"), StatusCode::CONFLICT),
            (LedgerError::lock_timeout("process_transfer"), StatusCode::SERVICE_UNAVAILABLE),
            (LedgerError::internal("post_entry", "boom"), StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status, status);
        }
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err = ApiError::from(LedgerError::internal("post_entry", "password authentication failed"));
        assert_eq!(err.message, "internal server error");
        assert_eq!(err.code, "internal_error");
    }

    #[test]
    fn authz_errors_map_to_401_and_403() {
        assert_eq!(
            ApiError::from(AuthzError::Unauthenticated("missing".into())).status,
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::from(AuthzError::Forbidden("journal.post".into())).status, StatusCode::FORBIDDEN);
    }
}
