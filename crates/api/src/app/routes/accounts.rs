use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::routing::get;
use axum::{Extension, Json, Router};

use neoledger_auth::Principal;
use neoledger_auth::permissions::{ACCOUNTS_READ, ACCOUNTS_WRITE};
use neoledger_core::AccountId;

use crate::app::dto;
use crate::app::errors::{ApiResult, created, ok};
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_accounts).post(create_account))
        .route("/:id", get(get_account).patch(update_account))
        .route("/:id/balance", get(get_balance))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &ACCOUNTS_WRITE)?;
    let Json(body) = body?;
    let account = services
        .ledger
        .create_account(body.into_new_account(&services.default_currency)?)
        .await?;
    created(account)
}

pub async fn list_accounts(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<dto::ListAccountsQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &ACCOUNTS_READ)?;
    let Query(query) = query?;
    let (filter, page) = query.into_parts()?;
    ok(services.ledger.list_accounts(filter, page).await?)
}

pub async fn get_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.roles, &principal, &ACCOUNTS_READ)?;
    let id: AccountId = id.parse()?;
    ok(services.ledger.get_account(id).await?)
}

pub async fn update_account(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::UpdateAccountRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &ACCOUNTS_WRITE)?;
    let id: AccountId = id.parse()?;
    let Json(body) = body?;
    ok(services.ledger.update_account(id, body.into_update()?).await?)
}

pub async fn get_balance(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.roles, &principal, &ACCOUNTS_READ)?;
    let id: AccountId = id.parse()?;
    ok(services.ledger.get_balance(id).await?)
}
