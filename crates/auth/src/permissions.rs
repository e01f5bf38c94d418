use std::borrow::Cow;

use serde::{Deserialize, Serialize};

/// Permission identifier, e.g. `"journal.post"`.
///
/// `"*"` grants everything. A permission suffixed with `.any` lifts the
/// ownership restriction of its base permission (see
/// [`crate::authorize_owned`]).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const fn from_static(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }

    /// The unrestricted variant (`wallets.read` → `wallets.read.any`).
    pub fn any(&self) -> Permission {
        Permission::new(format!("{}.any", self.as_str()))
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

pub const ALL: Permission = Permission::from_static("*");

pub const ACCOUNTS_READ: Permission = Permission::from_static("accounts.read");
pub const ACCOUNTS_WRITE: Permission = Permission::from_static("accounts.write");

pub const JOURNAL_READ: Permission = Permission::from_static("journal.read");
pub const JOURNAL_WRITE: Permission = Permission::from_static("journal.write");
pub const JOURNAL_POST: Permission = Permission::from_static("journal.post");
/// Void and reverse.
pub const JOURNAL_CORRECT: Permission = Permission::from_static("journal.correct");

pub const WALLETS_READ: Permission = Permission::from_static("wallets.read");
pub const WALLETS_ACTIVATE: Permission = Permission::from_static("wallets.activate");
/// Freeze, unfreeze and close.
pub const WALLETS_MANAGE: Permission = Permission::from_static("wallets.manage");

pub const LIMITS_READ: Permission = Permission::from_static("limits.read");
pub const LIMITS_WRITE: Permission = Permission::from_static("limits.write");
