//! Money movements: wallet-to-wallet transfers, deposits and withdrawals.
//!
//! Each movement validates its request, checks the locked wallets, applies the
//! balance change and describes the journal entry that records it. The store
//! runs all of it (plus the limit reservation) in one transaction.

use chrono::{DateTime, Utc};

use neoledger_core::{AccountId, EntryId, LedgerError, LedgerResult, Metadata, TransactionId, UserId, WalletId, money};
use neoledger_ledger::{EntryType, NewJournalEntry, NewLedgerLine};

use crate::events::WalletEvent;
use crate::wallet::Wallet;

pub const TRANSFER_REFERENCE: &str = "transfer";
pub const DEPOSIT_REFERENCE: &str = "deposit";
pub const WITHDRAWAL_REFERENCE: &str = "withdrawal";

/// Canonical lock order for a pair of wallets (ascending id).
pub fn lock_order(a: WalletId, b: WalletId) -> (WalletId, WalletId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// The two-line entry shared by every movement kind.
struct MovementPosting {
    reference_type: &'static str,
    transaction_id: TransactionId,
    description: String,
    debit_account: AccountId,
    credit_account: AccountId,
    amount: i64,
    metadata: Metadata,
    actor: Option<UserId>,
}

impl MovementPosting {
    fn into_entry(self) -> NewJournalEntry {
        NewJournalEntry {
            entry_type: EntryType::Standard,
            description: self.description,
            reference_type: Some(self.reference_type.to_string()),
            reference_id: Some(self.transaction_id.to_string()),
            lines: vec![
                NewLedgerLine::debit(self.debit_account, self.amount),
                NewLedgerLine::credit(self.credit_account, self.amount),
            ],
            metadata: self.metadata.with("transaction_id", self.transaction_id.to_string()),
            created_by: self.actor,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transfer {
    pub source_wallet_id: WalletId,
    pub destination_wallet_id: WalletId,
    pub amount: i64,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
}

impl Transfer {
    pub fn validate(&self) -> LedgerResult<()> {
        money::ensure_positive(self.amount, "amount")?;
        if self.source_wallet_id == self.destination_wallet_id {
            return Err(LedgerError::validation("source and destination wallets must differ"));
        }
        Ok(())
    }

    /// Preconditions on the locked wallets, before the limit reservation.
    pub fn check(&self, source: &Wallet, destination: &Wallet) -> LedgerResult<()> {
        source.ensure_active("source")?;
        source.ensure_funds(self.amount)?;
        destination.ensure_active("destination")?;
        if source.currency != destination.currency {
            return Err(LedgerError::validation(format!(
                "currency mismatch: source wallet is {}, destination wallet is {}",
                source.currency, destination.currency
            )));
        }
        Ok(())
    }

    pub fn apply(&self, source: &mut Wallet, destination: &mut Wallet, now: DateTime<Utc>) -> LedgerResult<()> {
        source.debit(self.amount, now)?;
        destination.credit(self.amount, now)
    }

    /// Debit the source wallet's liability account, credit the destination's.
    pub fn journal_entry(&self, source: &Wallet, destination: &Wallet) -> NewJournalEntry {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("Wallet transfer {}", self.transaction_id));
        let metadata = Metadata::new()
            .with("source_wallet_id", source.id.to_string())
            .with("destination_wallet_id", destination.id.to_string());
        MovementPosting {
            reference_type: TRANSFER_REFERENCE,
            transaction_id: self.transaction_id,
            description,
            debit_account: source.ledger_account_id,
            credit_account: destination.ledger_account_id,
            amount: self.amount,
            metadata,
            actor: Some(source.user_id),
        }
        .into_entry()
    }

    pub fn completed(&self, source: &Wallet, entry_id: EntryId, now: DateTime<Utc>) -> WalletEvent {
        WalletEvent::TransferCompleted {
            transaction_id: self.transaction_id,
            source_wallet_id: self.source_wallet_id,
            destination_wallet_id: self.destination_wallet_id,
            amount: self.amount,
            currency: source.currency.to_string(),
            journal_entry_id: entry_id,
            occurred_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deposit {
    pub wallet_id: WalletId,
    pub amount: i64,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
}

impl Deposit {
    pub fn validate(&self) -> LedgerResult<()> {
        money::ensure_positive(self.amount, "amount")
    }

    pub fn check(&self, wallet: &Wallet) -> LedgerResult<()> {
        wallet.ensure_active("deposit")
    }

    pub fn apply(&self, wallet: &mut Wallet, now: DateTime<Utc>) -> LedgerResult<()> {
        wallet.credit(self.amount, now)
    }

    /// Debit the settlement asset account, credit the wallet's liability account.
    pub fn journal_entry(&self, wallet: &Wallet, settlement_account: AccountId) -> NewJournalEntry {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("Wallet deposit {}", self.transaction_id));
        MovementPosting {
            reference_type: DEPOSIT_REFERENCE,
            transaction_id: self.transaction_id,
            description,
            debit_account: settlement_account,
            credit_account: wallet.ledger_account_id,
            amount: self.amount,
            metadata: Metadata::new().with("wallet_id", wallet.id.to_string()),
            actor: Some(wallet.user_id),
        }
        .into_entry()
    }

    pub fn completed(&self, wallet: &Wallet, entry_id: EntryId, now: DateTime<Utc>) -> WalletEvent {
        WalletEvent::DepositCompleted {
            transaction_id: self.transaction_id,
            wallet_id: wallet.id,
            amount: self.amount,
            currency: wallet.currency.to_string(),
            balance: wallet.balance,
            journal_entry_id: entry_id,
            occurred_at: now,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Withdrawal {
    pub wallet_id: WalletId,
    pub amount: i64,
    pub transaction_id: TransactionId,
    pub description: Option<String>,
}

impl Withdrawal {
    pub fn validate(&self) -> LedgerResult<()> {
        money::ensure_positive(self.amount, "amount")
    }

    pub fn check(&self, wallet: &Wallet) -> LedgerResult<()> {
        wallet.ensure_active("withdrawal")?;
        wallet.ensure_funds(self.amount)
    }

    pub fn apply(&self, wallet: &mut Wallet, now: DateTime<Utc>) -> LedgerResult<()> {
        wallet.debit(self.amount, now)
    }

    /// Debit the wallet's liability account, credit the settlement asset account.
    pub fn journal_entry(&self, wallet: &Wallet, settlement_account: AccountId) -> NewJournalEntry {
        let description = self
            .description
            .clone()
            .unwrap_or_else(|| format!("Wallet withdrawal {}", self.transaction_id));
        MovementPosting {
            reference_type: WITHDRAWAL_REFERENCE,
            transaction_id: self.transaction_id,
            description,
            debit_account: wallet.ledger_account_id,
            credit_account: settlement_account,
            amount: self.amount,
            metadata: Metadata::new().with("wallet_id", wallet.id.to_string()),
            actor: Some(wallet.user_id),
        }
        .into_entry()
    }

    pub fn completed(&self, wallet: &Wallet, entry_id: EntryId, now: DateTime<Utc>) -> WalletEvent {
        WalletEvent::WithdrawalCompleted {
            transaction_id: self.transaction_id,
            wallet_id: wallet.id,
            amount: self.amount,
            currency: wallet.currency.to_string(),
            balance: wallet.balance,
            journal_entry_id: entry_id,
            occurred_at: now,
        }
    }
}
