use thiserror::Error;

use neoledger_core::UserId;

use crate::permissions::Permission;
use crate::principal::Principal;
use crate::roles::RoleGraph;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("forbidden: missing permission '{0}'")]
    Forbidden(String),
}

/// Pure policy check: does any of the principal's roles (or their ancestors)
/// grant `required`?
pub fn authorize(graph: &RoleGraph, principal: &Principal, required: &Permission) -> Result<(), AuthzError> {
    let granted = graph.permissions_for(&principal.roles);
    if granted.iter().any(|p| p.is_wildcard()) || granted.contains(required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden(required.as_str().to_string()))
    }
}

/// Like [`authorize`] for a resource owned by `owner`: the base permission
/// suffices for the owner, anyone else needs the `.any` variant.
pub fn authorize_owned(
    graph: &RoleGraph,
    principal: &Principal,
    required: &Permission,
    owner: UserId,
) -> Result<(), AuthzError> {
    if principal.user_id == owner {
        return authorize(graph, principal, required);
    }
    authorize(graph, principal, &required.any())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::*;
    use crate::roles::Role;

    fn principal(role: &'static str) -> Principal {
        Principal::new(UserId::new(), vec![Role::new(role)])
    }

    #[test]
    fn admin_wildcard_allows_everything() {
        let graph = RoleGraph::standard();
        assert!(authorize(&graph, &principal("admin"), &JOURNAL_CORRECT).is_ok());
    }

    #[test]
    fn accountant_cannot_reverse() {
        let graph = RoleGraph::standard();
        let err = authorize(&graph, &principal("accountant"), &JOURNAL_CORRECT).unwrap_err();
        assert_eq!(err, AuthzError::Forbidden("journal.correct".to_string()));
    }

    #[test]
    fn customers_only_see_their_own_wallets() {
        let graph = RoleGraph::standard();
        let customer = principal("customer");
        assert!(authorize_owned(&graph, &customer, &WALLETS_READ, customer.user_id).is_ok());
        assert!(authorize_owned(&graph, &customer, &WALLETS_READ, UserId::new()).is_err());
        assert!(authorize_owned(&graph, &principal("support"), &WALLETS_READ, UserId::new()).is_ok());
    }
}
