use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use neoledger_auth::Principal;
use neoledger_auth::permissions::{LIMITS_READ, LIMITS_WRITE, WALLETS_ACTIVATE, WALLETS_MANAGE, WALLETS_READ};
use neoledger_core::WalletId;

use crate::app::dto;
use crate::app::errors::{ApiResult, ok};
use crate::app::services::AppServices;
use crate::authz::{require, require_owned};

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_wallets))
        .route("/:id", get(get_wallet))
        .route("/:id/activate", post(activate_wallet))
        .route("/:id/freeze", post(freeze_wallet))
        .route("/:id/unfreeze", post(unfreeze_wallet))
        .route("/:id/close", post(close_wallet))
        .route("/:id/limits", get(get_limits).put(update_limits))
}

/// Wallets of `?user_id=` (default: the caller).
pub async fn list_wallets(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<dto::ListWalletsQuery>, QueryRejection>,
) -> ApiResult {
    let Query(query) = query?;
    let user_id = query.user_id.unwrap_or(principal.user_id);
    require_owned(&services.roles, &principal, &WALLETS_READ, user_id)?;
    ok(services.wallets.list_user_wallets(user_id).await?)
}

pub async fn get_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: WalletId = id.parse()?;
    let wallet = services.wallets.get_wallet(id).await?;
    require_owned(&services.roles, &principal, &WALLETS_READ, wallet.user_id)?;
    ok(wallet)
}

pub async fn activate_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: WalletId = id.parse()?;
    let wallet = services.wallets.get_wallet(id).await?;
    require_owned(&services.roles, &principal, &WALLETS_ACTIVATE, wallet.user_id)?;
    ok(services.wallets.activate(id).await?)
}

pub async fn freeze_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &WALLETS_MANAGE)?;
    let id: WalletId = id.parse()?;
    let Json(body) = body?;
    ok(services.wallets.freeze(id, &body.reason).await?)
}

pub async fn unfreeze_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.roles, &principal, &WALLETS_MANAGE)?;
    let id: WalletId = id.parse()?;
    ok(services.wallets.unfreeze(id).await?)
}

pub async fn close_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &WALLETS_MANAGE)?;
    let id: WalletId = id.parse()?;
    let Json(body) = body?;
    ok(services.wallets.close(id, &body.reason).await?)
}

pub async fn get_limits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    let id: WalletId = id.parse()?;
    let wallet = services.wallets.get_wallet(id).await?;
    require_owned(&services.roles, &principal, &LIMITS_READ, wallet.user_id)?;
    ok(services.wallets.get_limits(id).await?)
}

pub async fn update_limits(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateLimitsRequest>, JsonRejection>,
) -> ApiResult {
    let id: WalletId = id.parse()?;
    let wallet = services.wallets.get_wallet(id).await?;
    require_owned(&services.roles, &principal, &LIMITS_WRITE, wallet.user_id)?;
    let Json(body) = body?;
    ok(services.wallets.update_limits(id, body.into()).await?)
}
