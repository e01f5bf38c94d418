use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};

use neoledger_auth::Principal;

use crate::app::errors::ApiError;

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLES_HEADER: &str = "x-user-roles";

/// Builds the request [`Principal`] from the gateway's identity headers.
///
/// The gateway has already verified the caller; requests without the headers
/// never reached it and are rejected with 401.
pub async fn principal_middleware(mut req: axum::http::Request<axum::body::Body>, next: Next) -> Response {
    let principal = match principal_from_headers(req.headers()) {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(path = %req.uri().path(), error = %e.message, "rejected unauthenticated request");
            return e.into_response();
        }
    };
    req.extensions_mut().insert(principal);
    next.run(req).await
}

fn principal_from_headers(headers: &HeaderMap) -> Result<Principal, ApiError> {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    Ok(Principal::from_gateway(header(USER_ID_HEADER), header(USER_ROLES_HEADER))?)
}
