use std::sync::Arc;

use chrono::Utc;
use tracing::instrument;

use neoledger_core::{AccountId, EntryId, LedgerError, LedgerResult, Page, UserId};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{
    Account, AccountBalance, AccountFilter, AccountUpdate, EntryFilter, EntryStatus, JournalEntry,
    LedgerEvent, NewAccount, NewJournalEntry,
};

use super::journal;
use crate::store::Store;

/// Chart of accounts and journal entry operations.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn Store>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    #[instrument(skip(self, new), fields(code = %new.code, account_type = new.account_type.as_str()), err)]
    pub async fn create_account(&self, new: NewAccount) -> LedgerResult<Account> {
        new.validate()?;
        let mut tx = self.store.begin("create_account").await?;

        if let Some(parent_id) = new.parent_id {
            if tx.account(parent_id).await?.is_none() {
                return Err(LedgerError::validation(format!("parent account {parent_id} does not exist")));
            }
        }
        if tx.account_by_code(new.code.trim()).await?.is_some() {
            return Err(LedgerError::conflict(format!("account code '{}' already exists", new.code.trim())));
        }

        let account = Account::open(AccountId::new(), new, Utc::now());
        tx.insert_account(&account).await?;
        tx.commit().await?;

        tracing::info!(account_id = %account.id, code = %account.code, "account created");
        Ok(account)
    }

    pub async fn get_account(&self, id: AccountId) -> LedgerResult<Account> {
        let mut tx = self.store.begin("get_account").await?;
        tx.account(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("account {id}")))
    }

    /// Absent is not an error: callers use this to provision idempotently.
    pub async fn get_account_by_code(&self, code: &str) -> LedgerResult<Option<Account>> {
        let mut tx = self.store.begin("get_account_by_code").await?;
        tx.account_by_code(code.trim()).await
    }

    #[instrument(skip(self, update), err)]
    pub async fn update_account(&self, id: AccountId, update: AccountUpdate) -> LedgerResult<Account> {
        let mut tx = self.store.begin("update_account").await?;
        let mut account = tx
            .lock_accounts(&[id])
            .await?
            .pop()
            .ok_or_else(|| LedgerError::not_found(format!("account {id}")))?;
        account.apply_update(&update, Utc::now())?;
        tx.update_account(&account).await?;
        tx.commit().await?;

        tracing::info!(account_id = %id, status = account.status.as_str(), "account updated");
        Ok(account)
    }

    pub async fn get_balance(&self, id: AccountId) -> LedgerResult<AccountBalance> {
        Ok(self.get_account(id).await?.balance_view())
    }

    pub async fn list_accounts(&self, filter: AccountFilter, page: Page) -> LedgerResult<Vec<Account>> {
        let mut tx = self.store.begin("list_accounts").await?;
        tx.list_accounts(filter, page).await
    }

    #[instrument(skip(self, new), fields(entry_type = new.entry_type.as_str(), lines = new.lines.len()), err)]
    pub async fn create_entry(&self, new: NewJournalEntry) -> LedgerResult<JournalEntry> {
        if let Err(e) = new.validate() {
            tracing::warn!(error = %e, "journal entry rejected");
            return Err(e);
        }
        let mut tx = self.store.begin("create_entry").await?;
        let entry = journal::create_draft(tx.as_mut(), new, Utc::now()).await?;
        tx.commit().await?;

        tracing::info!(entry_id = %entry.id, entry_number = %entry.entry_number, "journal entry created");
        Ok(entry)
    }

    #[instrument(skip(self), err)]
    pub async fn post_entry(&self, id: EntryId, posted_by: Option<UserId>) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin("post_entry").await?;
        let entry = journal::post_by_id(tx.as_mut(), id, posted_by, Utc::now()).await?;
        tx.commit().await?;
        Ok(entry)
    }

    /// Void a posted entry: its balance effect is cancelled by a linked,
    /// posted reversal and the original ends `voided`.
    #[instrument(skip(self), err)]
    pub async fn void_entry(&self, id: EntryId, voided_by: Option<UserId>, reason: &str) -> LedgerResult<JournalEntry> {
        let now = Utc::now();
        let mut tx = self.store.begin("void_entry").await?;
        let mut original = tx
            .lock_entry(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {id}")))?;
        original.ensure_reversible("void")?;

        let reversal = journal::record_reversal(tx.as_mut(), &original, voided_by, reason, now).await?;
        original.mark_voided(reversal.id, voided_by, reason, now)?;
        if !tx.update_entry_status(&original, EntryStatus::Posted).await? {
            return Err(LedgerError::bad_request(format!(
                "journal entry {} changed concurrently",
                original.entry_number
            )));
        }
        let event = LedgerEvent::voided(&original, reversal.id, reason.trim(), now);
        tx.enqueue(&EventEnvelope::wrap(&event)?, now).await?;
        tx.commit().await?;

        tracing::info!(
            entry_id = %original.id,
            reversal_entry_id = %reversal.id,
            "journal entry voided"
        );
        Ok(original)
    }

    /// Reverse a posted entry. Returns the new reversing entry.
    #[instrument(skip(self), err)]
    pub async fn reverse_entry(
        &self,
        id: EntryId,
        reversed_by: Option<UserId>,
        reason: &str,
    ) -> LedgerResult<JournalEntry> {
        let now = Utc::now();
        let mut tx = self.store.begin("reverse_entry").await?;
        let mut original = tx
            .lock_entry(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {id}")))?;
        original.ensure_reversible("reverse")?;

        let reversal = journal::record_reversal(tx.as_mut(), &original, reversed_by, reason, now).await?;
        original.mark_reversed(reversal.id, now)?;
        if !tx.update_entry_status(&original, EntryStatus::Posted).await? {
            return Err(LedgerError::bad_request(format!(
                "journal entry {} changed concurrently",
                original.entry_number
            )));
        }
        let event = LedgerEvent::reversed(&original, reversal.id, reason.trim(), reversed_by, now);
        tx.enqueue(&EventEnvelope::wrap(&event)?, now).await?;
        tx.commit().await?;

        tracing::info!(
            entry_id = %original.id,
            reversal_entry_id = %reversal.id,
            reversal_number = %reversal.entry_number,
            "journal entry reversed"
        );
        Ok(reversal)
    }

    pub async fn get_entry(&self, id: EntryId) -> LedgerResult<JournalEntry> {
        let mut tx = self.store.begin("get_entry").await?;
        tx.entry(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("journal entry {id}")))
    }

    pub async fn list_entries(&self, filter: EntryFilter, page: Page) -> LedgerResult<Vec<JournalEntry>> {
        let mut tx = self.store.begin("list_entries").await?;
        tx.list_entries(&filter, page).await
    }
}
