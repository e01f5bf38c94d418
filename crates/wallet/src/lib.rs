//! Wallet balance and spending-limit domain.
//!
//! Pure state transitions over [`Wallet`] and [`WalletLimits`]; stores lock
//! the rows (wallets first, ascending id, then limits) and call into these.

pub mod events;
pub mod limits;
pub mod movement;
pub mod wallet;

pub use events::WalletEvent;
pub use limits::{LimitsUpdate, WalletLimits, next_daily_reset, next_monthly_reset};
pub use movement::{
    DEPOSIT_REFERENCE, Deposit, TRANSFER_REFERENCE, Transfer, WITHDRAWAL_REFERENCE, Withdrawal,
    lock_order,
};
pub use wallet::{
    NewWallet, Wallet, WalletStatus, WalletType, qualified_wallet_account_code, wallet_account_code,
};
