use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Datelike, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use neoledger_core::{AccountId, Currency, EntryId, LedgerError, LedgerResult, Page, UserId, WalletId};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{Account, AccountFilter, EntryFilter, EntryStatus, JournalEntry, format_entry_number};
use neoledger_wallet::{
    DEPOSIT_REFERENCE, TRANSFER_REFERENCE, WITHDRAWAL_REFERENCE, Wallet, WalletLimits, WalletType,
};

use super::{OutboxMessage, Store, StoreTx};

/// References that may appear on at most one entry (one money movement per
/// upstream transaction id).
const UNIQUE_REFERENCES: [&str; 3] = [TRANSFER_REFERENCE, DEPOSIT_REFERENCE, WITHDRAWAL_REFERENCE];

#[derive(Debug, Clone, Default)]
struct MemoryState {
    accounts: BTreeMap<AccountId, Account>,
    entries: BTreeMap<EntryId, JournalEntry>,
    /// Creation order of `entries`.
    entry_order: Vec<EntryId>,
    entry_seq: u64,
    wallets: BTreeMap<WalletId, Wallet>,
    limits: BTreeMap<WalletId, WalletLimits>,
    outbox: Vec<OutboxMessage>,
}

/// Process-local store for tests/dev.
///
/// Transactions are fully serialized: `begin` takes a single async mutex
/// (waiting at most the configured lock timeout) and works on a copy of the
/// state that replaces the committed state only on commit.
#[derive(Debug, Clone)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
    lock_timeout: Duration,
}

impl InMemoryStore {
    pub fn new(lock_timeout: Duration) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            lock_timeout,
        }
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new(Duration::from_secs(3))
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self, operation: &'static str) -> LedgerResult<Box<dyn StoreTx>> {
        let guard = tokio::time::timeout(self.lock_timeout, self.state.clone().lock_owned())
            .await
            .map_err(|_| {
                tracing::warn!(operation, "in-memory store lock wait timed out");
                LedgerError::lock_timeout(operation)
            })?;
        let working = (*guard).clone();
        Ok(Box::new(MemoryTx { guard, working }))
    }
}

struct MemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

#[async_trait]
impl StoreTx for MemoryTx {
    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>> {
        Ok(self.working.accounts.get(&id).cloned())
    }

    async fn account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>> {
        Ok(self.working.accounts.values().find(|a| a.code == code).cloned())
    }

    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids.iter().filter_map(|id| self.working.accounts.get(id).cloned()).collect())
    }

    async fn list_accounts(&mut self, filter: AccountFilter, page: Page) -> LedgerResult<Vec<Account>> {
        let mut accounts: Vec<Account> = self
            .working
            .accounts
            .values()
            .filter(|a| filter.matches(a))
            .cloned()
            .collect();
        accounts.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(page.slice(&accounts))
    }

    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        if self.working.accounts.values().any(|a| a.code == account.code) {
            return Err(LedgerError::conflict(format!("account code '{}' already exists", account.code)));
        }
        self.working.accounts.insert(account.id, account.clone());
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        match self.working.accounts.get_mut(&account.id) {
            Some(slot) => {
                *slot = account.clone();
                Ok(())
            }
            None => Err(LedgerError::not_found(format!("account {}", account.id))),
        }
    }

    async fn next_entry_number(&mut self, now: DateTime<Utc>) -> LedgerResult<String> {
        self.working.entry_seq += 1;
        Ok(format_entry_number(now.year(), self.working.entry_seq))
    }

    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        if let (Some(rt), Some(rid)) = (&entry.reference_type, &entry.reference_id) {
            let unique = UNIQUE_REFERENCES.contains(&rt.as_str());
            let taken = self.working.entries.values().any(|e| {
                e.reference_type.as_deref() == Some(rt.as_str()) && e.reference_id.as_deref() == Some(rid.as_str())
            });
            if unique && taken {
                return Err(LedgerError::conflict(format!("{rt} {rid} already recorded")));
            }
        }
        self.working.entries.insert(entry.id, entry.clone());
        self.working.entry_order.push(entry.id);
        Ok(())
    }

    async fn entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.working.entries.get(&id).cloned())
    }

    async fn lock_entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        Ok(self.working.entries.get(&id).cloned())
    }

    async fn update_entry_status(&mut self, entry: &JournalEntry, expected: EntryStatus) -> LedgerResult<bool> {
        let Some(stored) = self.working.entries.get_mut(&entry.id) else {
            return Ok(false);
        };
        if stored.status != expected {
            return Ok(false);
        }
        stored.status = entry.status;
        stored.posted_at = entry.posted_at;
        stored.posted_by = entry.posted_by;
        stored.voided_at = entry.voided_at;
        stored.voided_by = entry.voided_by;
        stored.void_reason = entry.void_reason.clone();
        stored.reversal_entry_id = entry.reversal_entry_id;
        stored.updated_at = entry.updated_at;
        Ok(true)
    }

    async fn list_entries(&mut self, filter: &EntryFilter, page: Page) -> LedgerResult<Vec<JournalEntry>> {
        let entries: Vec<JournalEntry> = self
            .working
            .entry_order
            .iter()
            .rev()
            .filter_map(|id| self.working.entries.get(id))
            .filter(|e| filter.matches(e))
            .map(|e| JournalEntry {
                lines: Vec::new(),
                ..e.clone()
            })
            .collect();
        Ok(page.slice(&entries))
    }

    async fn reference_exists(&mut self, reference_type: &str, reference_id: &str) -> LedgerResult<bool> {
        Ok(self.working.entries.values().any(|e| {
            e.reference_type.as_deref() == Some(reference_type) && e.reference_id.as_deref() == Some(reference_id)
        }))
    }

    async fn wallet(&mut self, id: WalletId) -> LedgerResult<Option<Wallet>> {
        Ok(self.working.wallets.get(&id).cloned())
    }

    async fn lock_wallets(&mut self, ids: &[WalletId]) -> LedgerResult<Vec<Wallet>> {
        let mut ids = ids.to_vec();
        ids.sort();
        ids.dedup();
        Ok(ids.iter().filter_map(|id| self.working.wallets.get(id).cloned()).collect())
    }

    async fn wallets_for_user(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        let mut wallets: Vec<Wallet> = self
            .working
            .wallets
            .values()
            .filter(|w| w.user_id == user_id)
            .cloned()
            .collect();
        wallets.sort_by_key(|w| w.created_at);
        Ok(wallets)
    }

    async fn wallet_by_key(
        &mut self,
        user_id: UserId,
        wallet_type: WalletType,
        currency: &Currency,
    ) -> LedgerResult<Option<Wallet>> {
        Ok(self
            .working
            .wallets
            .values()
            .find(|w| w.user_id == user_id && w.wallet_type == wallet_type && &w.currency == currency)
            .cloned())
    }

    async fn wallet_by_ledger_account(&mut self, account_id: AccountId) -> LedgerResult<Option<Wallet>> {
        Ok(self
            .working
            .wallets
            .values()
            .find(|w| w.ledger_account_id == account_id)
            .cloned())
    }

    async fn insert_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()> {
        let duplicate = self.working.wallets.values().any(|w| {
            w.user_id == wallet.user_id && w.wallet_type == wallet.wallet_type && w.currency == wallet.currency
        });
        if duplicate {
            return Err(LedgerError::conflict(format!(
                "user {} already has a {} {} wallet",
                wallet.user_id,
                wallet.wallet_type.as_str(),
                wallet.currency
            )));
        }
        if self.working.wallets.values().any(|w| w.ledger_account_id == wallet.ledger_account_id) {
            return Err(LedgerError::conflict(format!(
                "ledger account {} is already linked to a wallet",
                wallet.ledger_account_id
            )));
        }
        self.working.wallets.insert(wallet.id, wallet.clone());
        Ok(())
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()> {
        match self.working.wallets.get_mut(&wallet.id) {
            Some(slot) => {
                *slot = wallet.clone();
                Ok(())
            }
            None => Err(LedgerError::not_found(format!("wallet {}", wallet.id))),
        }
    }

    async fn limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>> {
        Ok(self.working.limits.get(&wallet_id).cloned())
    }

    async fn lock_limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>> {
        Ok(self.working.limits.get(&wallet_id).cloned())
    }

    async fn insert_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()> {
        if self.working.limits.contains_key(&limits.wallet_id) {
            return Err(LedgerError::conflict(format!("limits for wallet {} already exist", limits.wallet_id)));
        }
        self.working.limits.insert(limits.wallet_id, limits.clone());
        Ok(())
    }

    async fn update_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()> {
        match self.working.limits.get_mut(&limits.wallet_id) {
            Some(slot) => {
                *slot = limits.clone();
                Ok(())
            }
            None => Err(LedgerError::not_found(format!("limits for wallet {}", limits.wallet_id))),
        }
    }

    async fn enqueue(&mut self, envelope: &EventEnvelope, now: DateTime<Utc>) -> LedgerResult<()> {
        self.working.outbox.push(OutboxMessage {
            envelope: envelope.clone(),
            created_at: now,
            published_at: None,
        });
        Ok(())
    }

    async fn lock_pending_outbox(&mut self, limit: u32) -> LedgerResult<Vec<OutboxMessage>> {
        Ok(self
            .working
            .outbox
            .iter()
            .filter(|m| m.published_at.is_none())
            .take(limit as usize)
            .cloned()
            .collect())
    }

    /// Published rows are dropped rather than kept with a timestamp.
    async fn mark_published(&mut self, ids: &[Uuid], _now: DateTime<Utc>) -> LedgerResult<()> {
        self.working.outbox.retain(|m| !ids.contains(&m.id()));
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let MemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
