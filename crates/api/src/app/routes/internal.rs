//! Service-to-service endpoints (transaction service, onboarding).
//!
//! Mounted under `/internal/v1` without gateway authentication; network
//! policy restricts who can reach them.

use std::sync::Arc;

use axum::extract::Path;
use axum::extract::rejection::JsonRejection;
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use neoledger_core::{LedgerError, WalletId};
use neoledger_wallet::NewWallet;

use crate::app::dto;
use crate::app::errors::{ApiResult, created, ok};
use crate::app::services::AppServices;

pub fn router() -> Router {
    Router::new()
        .route("/accounts", post(create_account))
        .route("/accounts/by-code/:code", get(get_account_by_code))
        .route("/wallets", post(open_wallet))
        .route("/wallets/transfer", post(transfer))
        .route("/wallets/deposit", post(deposit))
        .route("/wallets/withdraw", post(withdraw))
        .route("/wallets/:id/limits/reserve", post(reserve))
}

pub async fn create_account(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::CreateAccountRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    created(
        services
            .ledger
            .create_account(body.into_new_account(&services.default_currency)?)
            .await?,
    )
}

/// 404 means the account has not been provisioned yet.
pub async fn get_account_by_code(
    Extension(services): Extension<Arc<AppServices>>,
    Path(code): Path<String>,
) -> ApiResult {
    match services.ledger.get_account_by_code(&code).await? {
        Some(account) => ok(account),
        None => Err(LedgerError::not_found(format!("account with code '{code}'")).into()),
    }
}

pub async fn open_wallet(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::OpenWalletRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    let wallet_type = body.wallet_type()?;
    let currency = body.currency(&services.default_currency)?;
    let wallet = match body.ledger_account_id {
        Some(ledger_account_id) => {
            services
                .wallets
                .create_wallet(NewWallet {
                    user_id: body.user_id,
                    wallet_type,
                    currency,
                    ledger_account_id,
                })
                .await?
        }
        None => services.wallets.open_wallet(body.user_id, wallet_type, currency).await?,
    };
    created(wallet)
}

pub async fn transfer(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::TransferRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    ok(services.wallets.transfer(body.into()).await?)
}

pub async fn deposit(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::MovementRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    ok(services.wallets.deposit(body.into()).await?)
}

pub async fn withdraw(
    Extension(services): Extension<Arc<AppServices>>,
    body: Result<Json<dto::MovementRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body?;
    ok(services.wallets.withdraw(body.into()).await?)
}

/// Card authorisation hold against the wallet's spending caps.
pub async fn reserve(
    Extension(services): Extension<Arc<AppServices>>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReserveRequest>, JsonRejection>,
) -> ApiResult {
    let id: WalletId = id.parse()?;
    let Json(body) = body?;
    ok(services.wallets.check_and_reserve(id, body.amount).await?)
}
