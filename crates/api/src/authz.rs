//! Permission checks at the handler boundary.
//!
//! Services stay auth-agnostic; handlers call these before touching them.

use neoledger_auth::{Permission, Principal, RoleGraph, authorize, authorize_owned};
use neoledger_core::UserId;

use crate::app::errors::ApiError;

pub fn require(roles: &RoleGraph, principal: &Principal, permission: &Permission) -> Result<(), ApiError> {
    authorize(roles, principal, permission).map_err(|e| {
        tracing::warn!(user_id = %principal.user_id, permission = permission.as_str(), "permission denied");
        ApiError::from(e)
    })
}

/// Like [`require`], but callers acting on someone else's resource need the
/// `.any` variant of the permission.
pub fn require_owned(
    roles: &RoleGraph,
    principal: &Principal,
    permission: &Permission,
    owner: UserId,
) -> Result<(), ApiError> {
    authorize_owned(roles, principal, permission, owner).map_err(|e| {
        tracing::warn!(
            user_id = %principal.user_id,
            owner = %owner,
            permission = permission.as_str(),
            "permission denied"
        );
        ApiError::from(e)
    })
}
