use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query};
use axum::routing::{get, post};
use axum::{Extension, Json, Router};

use neoledger_auth::Principal;
use neoledger_auth::permissions::{JOURNAL_CORRECT, JOURNAL_POST, JOURNAL_READ, JOURNAL_WRITE};
use neoledger_core::EntryId;

use crate::app::dto;
use crate::app::errors::{ApiResult, created, ok};
use crate::app::services::AppServices;
use crate::authz::require;

pub fn router() -> Router {
    Router::new()
        .route("/", get(list_entries).post(create_entry))
        .route("/:id", get(get_entry))
        .route("/:id/post", post(post_entry))
        .route("/:id/void", post(void_entry))
        .route("/:id/reverse", post(reverse_entry))
}

pub async fn create_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    body: Result<Json<dto::CreateEntryRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_WRITE)?;
    let Json(body) = body?;
    let entry = services
        .ledger
        .create_entry(body.into_new_entry(principal.user_id)?)
        .await?;
    created(entry)
}

pub async fn list_entries(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    query: Result<Query<dto::ListEntriesQuery>, QueryRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_READ)?;
    let Query(query) = query?;
    let (filter, page) = query.into_parts()?;
    ok(services.ledger.list_entries(filter, page).await?)
}

pub async fn get_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_READ)?;
    let id: EntryId = id.parse()?;
    ok(services.ledger.get_entry(id).await?)
}

pub async fn post_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_POST)?;
    let id: EntryId = id.parse()?;
    ok(services.ledger.post_entry(id, Some(principal.user_id)).await?)
}

pub async fn void_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_CORRECT)?;
    let id: EntryId = id.parse()?;
    let Json(body) = body?;
    ok(services
        .ledger
        .void_entry(id, Some(principal.user_id), &body.reason)
        .await?)
}

/// Responds with the new reversing entry.
pub async fn reverse_entry(
    Extension(services): Extension<Arc<AppServices>>,
    Extension(principal): Extension<Principal>,
    Path(id): Path<String>,
    body: Result<Json<dto::ReasonRequest>, JsonRejection>,
) -> ApiResult {
    require(&services.roles, &principal, &JOURNAL_CORRECT)?;
    let id: EntryId = id.parse()?;
    let Json(body) = body?;
    created(
        services
            .ledger
            .reverse_entry(id, Some(principal.user_id), &body.reason)
            .await?,
    )
}
