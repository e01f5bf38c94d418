//! `neoledger-auth` — pure authorization for gateway-authenticated callers.
//!
//! The gateway verifies tokens and forwards the caller's id and roles; this
//! crate resolves roles to permissions through an explicit role graph. No IO,
//! no HTTP.

pub mod authorize;
pub mod permissions;
pub mod principal;
pub mod roles;

pub use authorize::{AuthzError, authorize, authorize_owned};
pub use permissions::Permission;
pub use principal::Principal;
pub use roles::{Role, RoleGraph};
