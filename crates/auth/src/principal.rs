use neoledger_core::UserId;

use crate::authorize::AuthzError;
use crate::roles::Role;

/// Caller identity as asserted by the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Principal {
    pub user_id: UserId,
    pub roles: Vec<Role>,
}

impl Principal {
    pub fn new(user_id: UserId, roles: Vec<Role>) -> Self {
        Self { user_id, roles }
    }

    /// Build from the raw `X-User-Id` / `X-User-Roles` header values.
    ///
    /// Roles are comma separated; blanks are ignored.
    pub fn from_gateway(user_id: Option<&str>, roles: Option<&str>) -> Result<Self, AuthzError> {
        let user_id = user_id
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AuthzError::Unauthenticated("missing X-User-Id header".to_string()))?;
        let user_id = user_id
            .parse::<UserId>()
            .map_err(|_| AuthzError::Unauthenticated(format!("invalid X-User-Id '{user_id}'")))?;
        let roles = roles
            .ok_or_else(|| AuthzError::Unauthenticated("missing X-User-Roles header".to_string()))?
            .split(',')
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(|r| Role::new(r.to_lowercase()))
            .collect();
        Ok(Self { user_id, roles })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_gateway_headers() {
        let id = UserId::new();
        let p = Principal::from_gateway(Some(&id.to_string()), Some("Customer, support,")).unwrap();
        assert_eq!(p.user_id, id);
        assert_eq!(p.roles, vec![Role::new("customer"), Role::new("support")]);
    }

    #[test]
    fn missing_user_is_unauthenticated() {
        assert!(matches!(
            Principal::from_gateway(None, Some("admin")),
            Err(AuthzError::Unauthenticated(_))
        ));
        assert!(Principal::from_gateway(Some("nope"), Some("admin")).is_err());
    }
}
