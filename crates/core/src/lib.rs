//! `neoledger-core` — shared building blocks for the ledger and wallet engines.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns).

pub mod error;
pub mod id;
pub mod metadata;
pub mod money;
pub mod page;

pub use error::{LedgerError, LedgerResult};
pub use id::{AccountId, EntryId, LineId, TransactionId, UserId, WalletId};
pub use metadata::{Metadata, MetadataValue};
pub use money::Currency;
pub use page::Page;
