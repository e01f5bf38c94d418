//! Transactional storage boundary shared by the ledger and wallet services.
//!
//! A [`StoreTx`] is one local transaction. Everything written through it
//! becomes visible atomically on [`StoreTx::commit`]; dropping it without
//! committing (including cancelling the owning future) discards every write.
//!
//! `lock_*` methods take row locks that are held until the transaction ends.
//! Callers acquire them in the canonical order: wallets (ascending id), then
//! the limits row, then ledger accounts (ascending id).

pub mod in_memory;
pub mod postgres;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use neoledger_core::{AccountId, Currency, EntryId, LedgerResult, Page, UserId, WalletId};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{Account, AccountFilter, EntryFilter, EntryStatus, JournalEntry};
use neoledger_wallet::{Wallet, WalletLimits, WalletType};

pub use in_memory::InMemoryStore;
pub use postgres::PostgresStore;

/// An outbox row: a committed event awaiting relay.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboxMessage {
    pub envelope: EventEnvelope,
    pub created_at: DateTime<Utc>,
    pub published_at: Option<DateTime<Utc>>,
}

impl OutboxMessage {
    pub fn id(&self) -> Uuid {
        self.envelope.event_id()
    }
}

#[async_trait]
pub trait Store: Send + Sync + 'static {
    /// Open a transaction. `operation` names it in logs and lock-timeout errors.
    async fn begin(&self, operation: &'static str) -> LedgerResult<Box<dyn StoreTx>>;
}

#[async_trait]
pub trait StoreTx: Send {
    // accounts
    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>>;
    async fn account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>>;
    /// Lock the given accounts, returned in ascending id order. Missing ids are skipped.
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>>;
    async fn list_accounts(&mut self, filter: AccountFilter, page: Page) -> LedgerResult<Vec<Account>>;
    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()>;
    /// Persist name, status and running totals.
    async fn update_account(&mut self, account: &Account) -> LedgerResult<()>;

    // journal
    /// Allocate the next `JE-YYYY-NNNNN` number from the global sequence.
    async fn next_entry_number(&mut self, now: DateTime<Utc>) -> LedgerResult<String>;
    /// Insert an entry and all its lines.
    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()>;
    /// Entry with lines in creation order.
    async fn entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>>;
    /// Like [`StoreTx::entry`] but row-locked.
    async fn lock_entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>>;
    /// Persist the entry's status columns, but only if the stored status is
    /// still `expected`. Returns whether a row was updated.
    async fn update_entry_status(&mut self, entry: &JournalEntry, expected: EntryStatus) -> LedgerResult<bool>;
    /// Entries newest first, without lines.
    async fn list_entries(&mut self, filter: &EntryFilter, page: Page) -> LedgerResult<Vec<JournalEntry>>;
    async fn reference_exists(&mut self, reference_type: &str, reference_id: &str) -> LedgerResult<bool>;

    // wallets
    async fn wallet(&mut self, id: WalletId) -> LedgerResult<Option<Wallet>>;
    /// Lock the given wallets, returned in ascending id order. Missing ids are skipped.
    async fn lock_wallets(&mut self, ids: &[WalletId]) -> LedgerResult<Vec<Wallet>>;
    async fn wallets_for_user(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>>;
    async fn wallet_by_key(
        &mut self,
        user_id: UserId,
        wallet_type: WalletType,
        currency: &Currency,
    ) -> LedgerResult<Option<Wallet>>;
    async fn wallet_by_ledger_account(&mut self, account_id: AccountId) -> LedgerResult<Option<Wallet>>;
    async fn insert_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()>;
    async fn update_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()>;

    // limits
    async fn limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>>;
    async fn lock_limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>>;
    async fn insert_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()>;
    async fn update_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()>;

    // outbox
    async fn enqueue(&mut self, envelope: &EventEnvelope, now: DateTime<Utc>) -> LedgerResult<()>;
    /// Oldest unpublished messages; rows held by another relay are skipped.
    async fn lock_pending_outbox(&mut self, limit: u32) -> LedgerResult<Vec<OutboxMessage>>;
    async fn mark_published(&mut self, ids: &[Uuid], now: DateTime<Utc>) -> LedgerResult<()>;

    async fn commit(self: Box<Self>) -> LedgerResult<()>;
}
