//! HTTP API: router, handlers, gateway-header authentication.

pub mod app;
pub mod authz;
pub mod middleware;
