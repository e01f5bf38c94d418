use axum::Extension;
use serde_json::json;

use neoledger_auth::Principal;

use crate::app::errors::{ApiResult, ok};

pub async fn health() -> ApiResult {
    ok(json!({ "status": "ok" }))
}

pub async fn whoami(Extension(principal): Extension<Principal>) -> ApiResult {
    ok(json!({
        "user_id": principal.user_id,
        "roles": principal.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
    }))
}
