use std::borrow::Cow;
use std::collections::{BTreeMap, BTreeSet, VecDeque};

use serde::{Deserialize, Serialize};

use crate::permissions::{self, Permission};

/// Role name as forwarded by the gateway (`X-User-Roles`).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Role(Cow<'static, str>);

impl Role {
    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Role {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Default)]
struct RoleNode {
    parents: Vec<Role>,
    grants: BTreeSet<Permission>,
}

/// Role hierarchy: each role inherits every permission of its parents.
///
/// Immutable once built; resolution is a pure walk of the graph. Cycles are
/// tolerated (each role is visited once). Unknown roles grant nothing.
#[derive(Debug, Clone, Default)]
pub struct RoleGraph {
    nodes: BTreeMap<Role, RoleNode>,
}

impl RoleGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_role<P, G>(mut self, role: &'static str, parents: P, grants: G) -> Self
    where
        P: IntoIterator<Item = &'static str>,
        G: IntoIterator<Item = Permission>,
    {
        let node = self.nodes.entry(Role::new(role)).or_default();
        node.parents.extend(parents.into_iter().map(Role::new));
        node.grants.extend(grants);
        self
    }

    /// Default neobank role set.
    ///
    /// `customer` works on its own wallets; `support` and `accountant` extend
    /// it; `finance_admin` combines both with correction rights; `admin` has
    /// everything.
    pub fn standard() -> Self {
        use permissions::*;

        RoleGraph::new()
            .with_role(
                "customer",
                [],
                [WALLETS_READ, WALLETS_ACTIVATE, LIMITS_READ],
            )
            .with_role(
                "support",
                ["customer"],
                [WALLETS_READ.any(), LIMITS_READ.any(), WALLETS_MANAGE, ACCOUNTS_READ],
            )
            .with_role(
                "accountant",
                ["customer"],
                [ACCOUNTS_READ, ACCOUNTS_WRITE, JOURNAL_READ, JOURNAL_WRITE, JOURNAL_POST],
            )
            .with_role(
                "finance_admin",
                ["accountant", "support"],
                [
                    JOURNAL_CORRECT,
                    LIMITS_WRITE,
                    LIMITS_WRITE.any(),
                    WALLETS_ACTIVATE.any(),
                ],
            )
            .with_role("admin", [], [ALL])
    }

    /// The role followed by all its ancestors, breadth first.
    pub fn ancestors(&self, role: &Role) -> Vec<Role> {
        let mut seen = BTreeSet::new();
        let mut order = Vec::new();
        let mut queue = VecDeque::from([role.clone()]);
        while let Some(current) = queue.pop_front() {
            if !seen.insert(current.clone()) {
                continue;
            }
            if let Some(node) = self.nodes.get(&current) {
                queue.extend(node.parents.iter().cloned());
            }
            order.push(current);
        }
        order
    }

    /// Union of the permissions granted to `roles` and their ancestors.
    pub fn permissions_for(&self, roles: &[Role]) -> BTreeSet<Permission> {
        roles
            .iter()
            .flat_map(|role| self.ancestors(role))
            .filter_map(|role| self.nodes.get(&role))
            .flat_map(|node| node.grants.iter().cloned())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::permissions::*;

    #[test]
    fn finance_admin_inherits_through_both_parents() {
        let graph = RoleGraph::standard();
        let chain = graph.ancestors(&Role::new("finance_admin"));
        assert_eq!(chain[0], Role::new("finance_admin"));
        assert!(chain.contains(&Role::new("customer")));
        assert_eq!(chain.iter().filter(|r| r.as_str() == "customer").count(), 1);

        let perms = graph.permissions_for(&[Role::new("finance_admin")]);
        assert!(perms.contains(&JOURNAL_POST));
        assert!(perms.contains(&WALLETS_MANAGE));
        assert!(perms.contains(&WALLETS_READ));
    }

    #[test]
    fn cycles_terminate() {
        let graph = RoleGraph::new()
            .with_role("a", ["b"], [JOURNAL_READ])
            .with_role("b", ["a"], [ACCOUNTS_READ]);
        let perms = graph.permissions_for(&[Role::new("a")]);
        assert_eq!(perms.len(), 2);
    }

    #[test]
    fn unknown_roles_grant_nothing() {
        let graph = RoleGraph::standard();
        assert!(graph.permissions_for(&[Role::new("intruder")]).is_empty());
    }
}
