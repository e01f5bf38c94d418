//! Outbox events for wallet movements and lifecycle changes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use neoledger_core::{EntryId, TransactionId, WalletId};
use neoledger_events::Event;

use crate::wallet::WalletStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum WalletEvent {
    TransferCompleted {
        transaction_id: TransactionId,
        source_wallet_id: WalletId,
        destination_wallet_id: WalletId,
        amount: i64,
        currency: String,
        journal_entry_id: EntryId,
        occurred_at: DateTime<Utc>,
    },
    DepositCompleted {
        transaction_id: TransactionId,
        wallet_id: WalletId,
        amount: i64,
        currency: String,
        /// Balance after the deposit.
        balance: i64,
        journal_entry_id: EntryId,
        occurred_at: DateTime<Utc>,
    },
    WithdrawalCompleted {
        transaction_id: TransactionId,
        wallet_id: WalletId,
        amount: i64,
        currency: String,
        balance: i64,
        journal_entry_id: EntryId,
        occurred_at: DateTime<Utc>,
    },
    StatusChanged {
        wallet_id: WalletId,
        from: WalletStatus,
        to: WalletStatus,
        reason: Option<String>,
        occurred_at: DateTime<Utc>,
    },
}

impl Event for WalletEvent {
    fn topic(&self) -> &'static str {
        match self {
            WalletEvent::TransferCompleted { .. } => "wallet.transfer.completed",
            WalletEvent::DepositCompleted { .. } => "wallet.deposit.completed",
            WalletEvent::WithdrawalCompleted { .. } => "wallet.withdrawal.completed",
            WalletEvent::StatusChanged { .. } => "wallet.status.changed",
        }
    }

    fn aggregate_id(&self) -> Uuid {
        let wallet = match self {
            WalletEvent::TransferCompleted { source_wallet_id, .. } => source_wallet_id,
            WalletEvent::DepositCompleted { wallet_id, .. }
            | WalletEvent::WithdrawalCompleted { wallet_id, .. }
            | WalletEvent::StatusChanged { wallet_id, .. } => wallet_id,
        };
        *wallet.as_uuid()
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            WalletEvent::TransferCompleted { occurred_at, .. }
            | WalletEvent::DepositCompleted { occurred_at, .. }
            | WalletEvent::WithdrawalCompleted { occurred_at, .. }
            | WalletEvent::StatusChanged { occurred_at, .. } => *occurred_at,
        }
    }
}
