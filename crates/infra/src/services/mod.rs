//! Application services: one public operation = one store transaction.

pub mod journal;
pub mod ledger;
pub mod wallet;

pub use ledger::LedgerService;
pub use wallet::{MovementReceipt, WalletService, WalletSettings};
