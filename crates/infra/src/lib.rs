//! Infrastructure layer: transactional stores, orchestration services,
//! outbox relay and configuration.

pub mod config;
pub mod outbox;
pub mod services;
pub mod store;

pub use config::{AppConfig, ConfigError};
pub use outbox::OutboxRelay;
pub use services::{LedgerService, MovementReceipt, WalletService, WalletSettings};
pub use store::{InMemoryStore, OutboxMessage, PostgresStore, Store, StoreTx};

#[cfg(test)]
mod integration_tests;
