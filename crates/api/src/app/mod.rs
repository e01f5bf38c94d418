//! Axum application wiring.
//!
//! - `services.rs`: store selection and service construction
//! - `routes/`: handlers, one file per resource
//! - `dto.rs`: request DTOs
//! - `errors.rs`: response envelope and error mapping

use std::sync::Arc;

use axum::routing::get;
use axum::{Extension, Router};
use tower::ServiceBuilder;

use crate::middleware;

pub mod dto;
pub mod errors;
pub mod routes;
pub mod services;

pub use services::{AppServices, build_services};

/// Full HTTP router: `/health`, gateway-authenticated `/api/v1`, and
/// unauthenticated `/internal/v1`.
pub fn build_app(services: Arc<AppServices>) -> Router {
    let public = routes::router().layer(axum::middleware::from_fn(middleware::principal_middleware));

    Router::new()
        .route("/health", get(routes::system::health))
        .nest("/api/v1", public)
        .nest("/internal/v1", routes::internal::router())
        .layer(ServiceBuilder::new().layer(Extension(services)))
}
