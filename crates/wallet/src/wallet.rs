use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use neoledger_core::{AccountId, Currency, LedgerError, LedgerResult, UserId, WalletId, money};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletType {
    Primary,
    Savings,
    Card,
}

impl WalletType {
    pub fn as_str(self) -> &'static str {
        match self {
            WalletType::Primary => "primary",
            WalletType::Savings => "savings",
            WalletType::Card => "card",
        }
    }
}

impl core::str::FromStr for WalletType {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "primary" => Ok(WalletType::Primary),
            "savings" => Ok(WalletType::Savings),
            "card" => Ok(WalletType::Card),
            other => Err(LedgerError::validation(format!(
                "invalid wallet type '{other}': must be one of primary, savings, card"
            ))),
        }
    }
}

/// Wallet lifecycle.
///
/// `inactive → active ⇄ frozen`, `active → closed`. Closed is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Inactive,
    Active,
    Frozen,
    Closed,
}

impl WalletStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            WalletStatus::Inactive => "inactive",
            WalletStatus::Active => "active",
            WalletStatus::Frozen => "frozen",
            WalletStatus::Closed => "closed",
        }
    }
}

impl core::str::FromStr for WalletStatus {
    type Err = LedgerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "inactive" => Ok(WalletStatus::Inactive),
            "active" => Ok(WalletStatus::Active),
            "frozen" => Ok(WalletStatus::Frozen),
            "closed" => Ok(WalletStatus::Closed),
            other => Err(LedgerError::validation(format!("invalid wallet status '{other}'"))),
        }
    }
}

/// Base code of a user's wallet liability account.
pub fn wallet_account_code(user_id: UserId) -> String {
    format!("WALLET-{user_id}")
}

/// Code used when the user's base wallet account is already linked elsewhere.
pub fn qualified_wallet_account_code(user_id: UserId, wallet_type: WalletType, currency: &Currency) -> String {
    format!(
        "WALLET-{user_id}-{}-{}",
        wallet_type.as_str().to_uppercase(),
        currency
    )
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewWallet {
    pub user_id: UserId,
    pub wallet_type: WalletType,
    pub currency: Currency,
    pub ledger_account_id: AccountId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Wallet {
    pub id: WalletId,
    pub user_id: UserId,
    pub wallet_type: WalletType,
    pub currency: Currency,
    pub balance: i64,
    /// Spendable part of `balance`; always `0 ≤ available_balance ≤ balance`.
    pub available_balance: i64,
    pub status: WalletStatus,
    pub ledger_account_id: AccountId,
    pub frozen_reason: Option<String>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn required_reason(reason: &str) -> LedgerResult<String> {
    let reason = reason.trim();
    if reason.is_empty() {
        return Err(LedgerError::validation("a reason is required"));
    }
    Ok(reason.to_string())
}

impl Wallet {
    pub fn open(id: WalletId, new: NewWallet, now: DateTime<Utc>) -> Self {
        Self {
            id,
            user_id: new.user_id,
            wallet_type: new.wallet_type,
            currency: new.currency,
            balance: 0,
            available_balance: 0,
            status: WalletStatus::Inactive,
            ledger_account_id: new.ledger_account_id,
            frozen_reason: None,
            closed_at: None,
            closed_reason: None,
            created_at: now,
            updated_at: now,
        }
    }

    fn transition(&mut self, action: &str, from: WalletStatus, to: WalletStatus, now: DateTime<Utc>) -> LedgerResult<()> {
        if self.status != from {
            return Err(LedgerError::bad_request(format!(
                "cannot {action} wallet {}: status is {}, must be {}",
                self.id,
                self.status.as_str(),
                from.as_str()
            )));
        }
        self.status = to;
        self.updated_at = now;
        Ok(())
    }

    pub fn activate(&mut self, now: DateTime<Utc>) -> LedgerResult<()> {
        self.transition("activate", WalletStatus::Inactive, WalletStatus::Active, now)
    }

    pub fn freeze(&mut self, reason: &str, now: DateTime<Utc>) -> LedgerResult<()> {
        let reason = required_reason(reason)?;
        self.transition("freeze", WalletStatus::Active, WalletStatus::Frozen, now)?;
        self.frozen_reason = Some(reason);
        Ok(())
    }

    pub fn unfreeze(&mut self, now: DateTime<Utc>) -> LedgerResult<()> {
        self.transition("unfreeze", WalletStatus::Frozen, WalletStatus::Active, now)?;
        self.frozen_reason = None;
        Ok(())
    }

    pub fn close(&mut self, reason: &str, now: DateTime<Utc>) -> LedgerResult<()> {
        let reason = required_reason(reason)?;
        if self.status == WalletStatus::Active && self.balance != 0 {
            return Err(LedgerError::bad_request(format!(
                "cannot close wallet {}: balance is {}, must be 0",
                self.id, self.balance
            )));
        }
        self.transition("close", WalletStatus::Active, WalletStatus::Closed, now)?;
        self.closed_at = Some(now);
        self.closed_reason = Some(reason);
        Ok(())
    }

    /// Money may only move through active wallets.
    pub fn ensure_active(&self, role: &str) -> LedgerResult<()> {
        if self.status != WalletStatus::Active {
            return Err(LedgerError::bad_request(format!(
                "{role} wallet {} is {}, must be active",
                self.id,
                self.status.as_str()
            )));
        }
        Ok(())
    }

    pub fn ensure_funds(&self, amount: i64) -> LedgerResult<()> {
        if self.available_balance < amount {
            return Err(LedgerError::bad_request(format!(
                "insufficient balance: available {}, requested {}, shortfall {}",
                self.available_balance,
                amount,
                amount - self.available_balance
            )));
        }
        Ok(())
    }

    pub fn debit(&mut self, amount: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        money::ensure_positive(amount, "amount")?;
        self.ensure_funds(amount)?;
        self.balance = money::checked_sub(self.balance, amount, "wallet balance")?;
        self.available_balance = money::checked_sub(self.available_balance, amount, "available balance")?;
        self.updated_at = now;
        Ok(())
    }

    pub fn credit(&mut self, amount: i64, now: DateTime<Utc>) -> LedgerResult<()> {
        money::ensure_positive(amount, "amount")?;
        let balance = money::checked_add(self.balance, amount, "wallet balance")?;
        let available = money::checked_add(self.available_balance, amount, "available balance")?;
        self.balance = balance;
        self.available_balance = available;
        self.updated_at = now;
        Ok(())
    }
}
