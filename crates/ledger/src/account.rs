use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use neoledger_core::{AccountId, Currency, LedgerError, LedgerResult, Metadata, money};

/// High-level account type (determines normal balance side).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountType {
    Asset,
    Liability,
    Equity,
    Revenue,
    Expense,
}

/// Which side increases an account's balance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalSide {
    Debit,
    Credit,
}

impl AccountType {
    pub fn normal_side(self) -> NormalSide {
        match self {
            AccountType::Asset | AccountType::Expense => NormalSide::Debit,
            AccountType::Liability | AccountType::Equity | AccountType::Revenue => NormalSide::Credit,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            AccountType::Asset => "asset",
            AccountType::Liability => "liability",
            AccountType::Equity => "equity",
            AccountType::Revenue => "revenue",
            AccountType::Expense => "expense",
        }
    }
}

impl core::str::FromStr for AccountType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "asset" => Ok(AccountType::Asset),
            "liability" => Ok(AccountType::Liability),
            "equity" => Ok(AccountType::Equity),
            "revenue" => Ok(AccountType::Revenue),
            "expense" => Ok(AccountType::Expense),
            other => Err(LedgerError::validation(format!(
                "invalid account type '{other}': must be one of asset, liability, equity, revenue, expense"
            ))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountStatus {
    Active,
    Inactive,
}

impl AccountStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountStatus::Active => "active",
            AccountStatus::Inactive => "inactive",
        }
    }
}

impl core::str::FromStr for AccountStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "active" => Ok(AccountStatus::Active),
            "inactive" => Ok(AccountStatus::Inactive),
            other => Err(LedgerError::validation(format!(
                "invalid account status '{other}': must be active or inactive"
            ))),
        }
    }
}

/// Request to open a chart-of-accounts entry.
#[derive(Debug, Clone, PartialEq)]
pub struct NewAccount {
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub parent_id: Option<AccountId>,
    pub metadata: Metadata,
}

impl NewAccount {
    /// Shape checks that need no store access. Parent existence is checked by
    /// the store inside its transaction.
    pub fn validate(&self) -> LedgerResult<()> {
        let code = self.code.trim();
        if code.is_empty() {
            return Err(LedgerError::validation("account code is required"));
        }
        if code.len() > 64 || code.chars().any(char::is_whitespace) {
            return Err(LedgerError::validation(format!(
                "invalid account code '{code}': at most 64 characters, no whitespace"
            )));
        }
        if self.name.trim().is_empty() {
            return Err(LedgerError::validation("account name is required"));
        }
        Ok(())
    }
}

/// Partial account update (name and/or status).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AccountUpdate {
    pub name: Option<String>,
    pub status: Option<AccountStatus>,
}

/// A ledger account with its running totals.
///
/// Totals are mutated only through [`Account::apply_posting`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Account {
    pub id: AccountId,
    pub code: String,
    pub name: String,
    pub account_type: AccountType,
    pub currency: Currency,
    pub parent_id: Option<AccountId>,
    pub balance: i64,
    pub debit_total: i64,
    pub credit_total: i64,
    pub status: AccountStatus,
    pub metadata: Metadata,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Account {
    pub fn open(id: AccountId, new: NewAccount, now: DateTime<Utc>) -> Self {
        Self {
            id,
            code: new.code.trim().to_string(),
            name: new.name.trim().to_string(),
            account_type: new.account_type,
            currency: new.currency,
            parent_id: new.parent_id,
            balance: 0,
            debit_total: 0,
            credit_total: 0,
            status: AccountStatus::Active,
            metadata: new.metadata,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == AccountStatus::Active
    }

    /// Net of the totals per the account type's normal side.
    pub fn net_balance(account_type: AccountType, debit_total: i64, credit_total: i64) -> LedgerResult<i64> {
        match account_type.normal_side() {
            NormalSide::Debit => money::checked_sub(debit_total, credit_total, "account balance"),
            NormalSide::Credit => money::checked_sub(credit_total, debit_total, "account balance"),
        }
    }

    /// Add one posting's debits/credits to the running totals.
    pub fn apply_posting(&mut self, debit: i64, credit: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        let debit_total = money::checked_add(self.debit_total, debit, "account debit total")?;
        let credit_total = money::checked_add(self.credit_total, credit, "account credit total")?;
        let balance = Self::net_balance(self.account_type, debit_total, credit_total)?;

        self.debit_total = debit_total;
        self.credit_total = credit_total;
        self.balance = balance;
        self.updated_at = now;
        Ok(())
    }

    pub fn apply_update(&mut self, update: &AccountUpdate, now: DateTime<Utc>) -> LedgerResult<()> {
        if update.name.is_none() && update.status.is_none() {
            return Err(LedgerError::validation("nothing to update: provide name and/or status"));
        }
        if let Some(name) = &update.name {
            if name.trim().is_empty() {
                return Err(LedgerError::validation("account name is required"));
            }
            self.name = name.trim().to_string();
        }
        if let Some(status) = update.status {
            self.status = status;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn balance_view(&self) -> AccountBalance {
        AccountBalance {
            account_id: self.id,
            code: self.code.clone(),
            currency: self.currency.clone(),
            balance: self.balance,
            debit_total: self.debit_total,
            credit_total: self.credit_total,
        }
    }
}

/// List filter for accounts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AccountFilter {
    pub account_type: Option<AccountType>,
    pub status: Option<AccountStatus>,
}

impl AccountFilter {
    pub fn matches(&self, account: &Account) -> bool {
        self.account_type.is_none_or(|t| account.account_type == t)
            && self.status.is_none_or(|s| account.status == s)
    }
}

/// Read model returned by `GetBalance`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountBalance {
    pub account_id: AccountId,
    pub code: String,
    pub currency: Currency,
    pub balance: i64,
    pub debit_total: i64,
    pub credit_total: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn account(kind: AccountType) -> Account {
        Account::open(
            AccountId::new(),
            NewAccount {
                code: "1000".to_string(),
                name: "Cash".to_string(),
                account_type: kind,
                currency: Currency::parse("INR").unwrap(),
                parent_id: None,
                metadata: Metadata::new(),
            },
            Utc::now(),
        )
    }

    #[test]
    fn debit_normal_accounts_grow_with_debits() {
        let mut cash = account(AccountType::Asset);
        cash.apply_posting(10_000, 0, Utc::now()).unwrap();
        cash.apply_posting(0, 2_500, Utc::now()).unwrap();
        assert_eq!(cash.debit_total, 10_000);
        assert_eq!(cash.credit_total, 2_500);
        assert_eq!(cash.balance, 7_500);
    }

    #[test]
    fn credit_normal_accounts_grow_with_credits() {
        let mut wallet = account(AccountType::Liability);
        wallet.apply_posting(0, 10_000, Utc::now()).unwrap();
        wallet.apply_posting(4_000, 0, Utc::now()).unwrap();
        assert_eq!(wallet.balance, 6_000);
    }

    #[test]
    fn overflow_leaves_totals_untouched() {
        let mut cash = account(AccountType::Asset);
        cash.apply_posting(i64::MAX, 0, Utc::now()).unwrap();
        assert!(cash.apply_posting(1, 0, Utc::now()).is_err());
        assert_eq!(cash.debit_total, i64::MAX);
    }

    #[test]
    fn empty_update_is_rejected() {
        let mut cash = account(AccountType::Asset);
        let err = cash.apply_update(&AccountUpdate::default(), Utc::now()).unwrap_err();
        assert!(matches!(err, LedgerError::Validation(_)));
    }

    #[test]
    fn account_type_parsing_is_case_insensitive() {
        assert_eq!("Revenue".parse::<AccountType>().unwrap(), AccountType::Revenue);
        assert!("income".parse::<AccountType>().is_err());
    }

    #[test]
    fn blank_code_fails_validation() {
        let new = NewAccount {
            code: "  ".to_string(),
            name: "Cash".to_string(),
            account_type: AccountType::Asset,
            currency: Currency::parse("INR").unwrap(),
            parent_id: None,
            metadata: Metadata::new(),
        };
        assert!(new.validate().is_err());
    }
}
