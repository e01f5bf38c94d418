use axum::Router;
use axum::routing::get;

pub mod accounts;
pub mod internal;
pub mod journal_entries;
pub mod system;
pub mod wallets;

/// Gateway-authenticated endpoints, mounted under `/api/v1`.
pub fn router() -> Router {
    Router::new()
        .route("/whoami", get(system::whoami))
        .nest("/accounts", accounts::router())
        .nest("/journal-entries", journal_entries::router())
        .nest("/wallets", wallets::router())
}
