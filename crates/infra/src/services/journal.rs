//! Journal steps shared by the ledger and wallet services.
//!
//! These run inside a caller-owned transaction so a wallet movement and its
//! journal entry commit (or roll back) together.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use neoledger_core::{EntryId, LedgerError, LedgerResult, UserId};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{
    EntryStatus, JournalEntry, LedgerEvent, NewJournalEntry, apply_posting_effects, posting_effects,
};

use crate::store::StoreTx;

const NOT_POSTABLE: &str = "journal entry not found or already posted";

/// Validate `new` against current accounts, allocate its number and insert it
/// as a draft.
pub async fn create_draft(
    tx: &mut dyn StoreTx,
    new: NewJournalEntry,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    new.validate_structure()?;

    let mut accounts = BTreeMap::new();
    for id in new.account_ids() {
        if let Some(account) = tx.account(id).await? {
            accounts.insert(id, account);
        }
    }
    new.validate_accounts(|id| accounts.get(&id))?;

    let number = tx.next_entry_number(now).await?;
    let entry = JournalEntry::draft(EntryId::new(), number, new, now);
    tx.insert_entry(&entry).await?;
    Ok(entry)
}

/// Draft → Posted plus the account posting effects, for an entry the caller
/// has already loaded (and locked).
pub async fn post_loaded(
    tx: &mut dyn StoreTx,
    mut entry: JournalEntry,
    posted_by: Option<UserId>,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    entry.post(posted_by, now)?;

    let effects = posting_effects(&entry.lines)?;
    let ids: Vec<_> = effects.iter().map(|e| e.account_id).collect();
    let mut accounts: BTreeMap<_, _> = tx
        .lock_accounts(&ids)
        .await?
        .into_iter()
        .map(|a| (a.id, a))
        .collect();
    apply_posting_effects(&mut accounts, &effects, now)?;

    if !tx.update_entry_status(&entry, EntryStatus::Draft).await? {
        return Err(LedgerError::bad_request(NOT_POSTABLE));
    }
    for account in accounts.values() {
        tx.update_account(account).await?;
    }

    let event = LedgerEvent::posted(&entry, now);
    tx.enqueue(&EventEnvelope::wrap(&event)?, now).await?;

    tracing::info!(
        entry_id = %entry.id,
        entry_number = %entry.entry_number,
        amount = %entry.total_debits(),
        "journal entry posted"
    );
    Ok(entry)
}

/// Lock and post a draft by id.
pub async fn post_by_id(
    tx: &mut dyn StoreTx,
    id: EntryId,
    posted_by: Option<UserId>,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    let entry = tx
        .lock_entry(id)
        .await?
        .filter(|e| e.status == EntryStatus::Draft)
        .ok_or_else(|| LedgerError::bad_request(NOT_POSTABLE))?;
    post_loaded(tx, entry, posted_by, now).await
}

/// Create and immediately post an entry (money movements, reversals).
pub async fn record(
    tx: &mut dyn StoreTx,
    new: NewJournalEntry,
    posted_by: Option<UserId>,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    let draft = create_draft(tx, new, now).await?;
    post_loaded(tx, draft, posted_by, now).await
}

/// Create and post the reversal of a locked, posted `original`.
pub async fn record_reversal(
    tx: &mut dyn StoreTx,
    original: &JournalEntry,
    actor: Option<UserId>,
    reason: &str,
    now: DateTime<Utc>,
) -> LedgerResult<JournalEntry> {
    let new = original.reversal_draft(actor, reason)?;
    new.validate_structure()?;

    // No active-account check: the original already posted to these accounts.
    let number = tx.next_entry_number(now).await?;
    let mut reversal = JournalEntry::draft(EntryId::new(), number, new, now);
    reversal.reverses_entry_id = Some(original.id);
    tx.insert_entry(&reversal).await?;
    post_loaded(tx, reversal, actor, now).await
}
