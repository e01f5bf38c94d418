//! Outbox events for journal entry transitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use neoledger_core::{EntryId, UserId};
use neoledger_events::Event;

use crate::entry::JournalEntry;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
    EntryPosted {
        entry_id: EntryId,
        entry_number: String,
        entry_type: String,
        /// Debit side total in minor units.
        amount: i128,
        reference_type: Option<String>,
        reference_id: Option<String>,
        posted_by: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
    EntryVoided {
        entry_id: EntryId,
        entry_number: String,
        reversal_entry_id: EntryId,
        reason: String,
        voided_by: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
    EntryReversed {
        entry_id: EntryId,
        entry_number: String,
        reversal_entry_id: EntryId,
        reason: String,
        reversed_by: Option<UserId>,
        occurred_at: DateTime<Utc>,
    },
}

impl LedgerEvent {
    pub fn posted(entry: &JournalEntry, now: DateTime<Utc>) -> Self {
        LedgerEvent::EntryPosted {
            entry_id: entry.id,
            entry_number: entry.entry_number.clone(),
            entry_type: entry.entry_type.as_str().to_string(),
            amount: entry.total_debits(),
            reference_type: entry.reference_type.clone(),
            reference_id: entry.reference_id.clone(),
            posted_by: entry.posted_by,
            occurred_at: now,
        }
    }

    pub fn voided(entry: &JournalEntry, reversal_entry_id: EntryId, reason: &str, now: DateTime<Utc>) -> Self {
        LedgerEvent::EntryVoided {
            entry_id: entry.id,
            entry_number: entry.entry_number.clone(),
            reversal_entry_id,
            reason: reason.to_string(),
            voided_by: entry.voided_by,
            occurred_at: now,
        }
    }

    pub fn reversed(
        entry: &JournalEntry,
        reversal_entry_id: EntryId,
        reason: &str,
        reversed_by: Option<UserId>,
        now: DateTime<Utc>,
    ) -> Self {
        LedgerEvent::EntryReversed {
            entry_id: entry.id,
            entry_number: entry.entry_number.clone(),
            reversal_entry_id,
            reason: reason.to_string(),
            reversed_by,
            occurred_at: now,
        }
    }

    fn entry_id(&self) -> EntryId {
        match self {
            LedgerEvent::EntryPosted { entry_id, .. }
            | LedgerEvent::EntryVoided { entry_id, .. }
            | LedgerEvent::EntryReversed { entry_id, .. } => *entry_id,
        }
    }
}

impl Event for LedgerEvent {
    fn topic(&self) -> &'static str {
        match self {
            LedgerEvent::EntryPosted { .. } => "ledger.entry.posted",
            LedgerEvent::EntryVoided { .. } => "ledger.entry.voided",
            LedgerEvent::EntryReversed { .. } => "ledger.entry.reversed",
        }
    }

    fn aggregate_id(&self) -> Uuid {
        *self.entry_id().as_uuid()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::EntryPosted { occurred_at, .. }
            | LedgerEvent::EntryVoided { occurred_at, .. }
            | LedgerEvent::EntryReversed { occurred_at, .. } => *occurred_at,
        }
    }
}
