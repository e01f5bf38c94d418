//! Ledger module (chart of accounts + double-entry journal).
//!
//! Pure domain logic only: no IO, no HTTP, no persistence concerns. Stores
//! call into these types inside their own transaction boundary.

pub mod account;
pub mod entry;
pub mod events;
pub mod number;
pub mod posting;

pub use account::{
    Account, AccountBalance, AccountFilter, AccountStatus, AccountType, AccountUpdate, NewAccount, NormalSide,
};
pub use entry::{
    EntryFilter, EntryStatus, EntryType, JournalEntry, LedgerLine, NewJournalEntry, NewLedgerLine,
    ensure_balanced,
};
pub use events::LedgerEvent;
pub use number::{format_entry_number, parse_entry_number};
pub use posting::{PostingEffect, apply_posting_effects, posting_effects};
