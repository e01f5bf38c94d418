use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::instrument;

use neoledger_core::{AccountId, Currency, EntryId, LedgerError, LedgerResult, Metadata, TransactionId, UserId, WalletId};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{Account, AccountType, NewAccount};
use neoledger_wallet::{
    DEPOSIT_REFERENCE, Deposit, LimitsUpdate, NewWallet, TRANSFER_REFERENCE, Transfer, WITHDRAWAL_REFERENCE,
    Wallet, WalletEvent, WalletLimits, WalletType, Withdrawal, lock_order,
    qualified_wallet_account_code, wallet_account_code,
};

use super::journal;
use crate::store::{Store, StoreTx};

/// Wallet defaults taken from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WalletSettings {
    pub default_daily_limit: i64,
    pub default_monthly_limit: i64,
    /// Code of the asset account that deposits/withdrawals settle against.
    pub settlement_account_code: String,
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            default_daily_limit: 1_000_000,
            default_monthly_limit: 10_000_000,
            settlement_account_code: "1000".to_string(),
        }
    }
}

/// Outcome of a committed transfer, deposit or withdrawal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MovementReceipt {
    pub transaction_id: TransactionId,
    pub journal_entry_id: EntryId,
    pub entry_number: String,
    /// Affected wallets after the movement, ascending id.
    pub wallets: Vec<Wallet>,
}

/// Wallet balances, lifecycle and spending limits.
#[derive(Clone)]
pub struct WalletService {
    store: Arc<dyn Store>,
    settings: WalletSettings,
}

async fn ensure_new_transaction(tx: &mut dyn StoreTx, reference: &str, id: TransactionId) -> LedgerResult<()> {
    if tx.reference_exists(reference, &id.to_string()).await? {
        return Err(LedgerError::conflict(format!("transaction {id} already processed")));
    }
    Ok(())
}

async fn lock_wallet(tx: &mut dyn StoreTx, id: WalletId) -> LedgerResult<Wallet> {
    tx.lock_wallets(&[id])
        .await?
        .pop()
        .ok_or_else(|| LedgerError::not_found(format!("wallet {id}")))
}

async fn lock_limits(tx: &mut dyn StoreTx, id: WalletId) -> LedgerResult<WalletLimits> {
    tx.lock_limits(id)
        .await?
        .ok_or_else(|| LedgerError::not_found(format!("limits for wallet {id}")))
}

async fn enqueue(tx: &mut dyn StoreTx, event: &WalletEvent, now: DateTime<Utc>) -> LedgerResult<()> {
    tx.enqueue(&EventEnvelope::wrap(event)?, now).await
}

impl WalletService {
    pub fn new(store: Arc<dyn Store>, settings: WalletSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &WalletSettings {
        &self.settings
    }

    async fn insert_wallet_with_limits(
        &self,
        tx: &mut dyn StoreTx,
        new: NewWallet,
        now: DateTime<Utc>,
    ) -> LedgerResult<Wallet> {
        let account = tx
            .account(new.ledger_account_id)
            .await?
            .ok_or_else(|| LedgerError::validation(format!("ledger account {} does not exist", new.ledger_account_id)))?;
        if account.currency != new.currency {
            return Err(LedgerError::validation(format!(
                "ledger account {} is {}, wallet is {}",
                account.code, account.currency, new.currency
            )));
        }
        if tx.wallet_by_key(new.user_id, new.wallet_type, &new.currency).await?.is_some() {
            return Err(LedgerError::conflict(format!(
                "user {} already has a {} {} wallet",
                new.user_id,
                new.wallet_type.as_str(),
                new.currency
            )));
        }
        if tx.wallet_by_ledger_account(new.ledger_account_id).await?.is_some() {
            return Err(LedgerError::conflict(format!(
                "ledger account {} is already linked to a wallet",
                account.code
            )));
        }

        let wallet = Wallet::open(WalletId::new(), new, now);
        tx.insert_wallet(&wallet).await?;
        let limits = WalletLimits::new(
            wallet.id,
            self.settings.default_daily_limit,
            self.settings.default_monthly_limit,
            now,
        )?;
        tx.insert_limits(&limits).await?;
        Ok(wallet)
    }

    /// Create a wallet over an existing ledger account. Starts inactive.
    #[instrument(skip(self, new), fields(user_id = %new.user_id, wallet_type = new.wallet_type.as_str()), err)]
    pub async fn create_wallet(&self, new: NewWallet) -> LedgerResult<Wallet> {
        let mut tx = self.store.begin("create_wallet").await?;
        let wallet = self.insert_wallet_with_limits(tx.as_mut(), new, Utc::now()).await?;
        tx.commit().await?;
        tracing::info!(wallet_id = %wallet.id, "wallet created");
        Ok(wallet)
    }

    /// Provision the wallet's liability account (reusing an unlinked one with
    /// the same code) and create the wallet, in one transaction.
    #[instrument(skip(self), err)]
    pub async fn open_wallet(&self, user_id: UserId, wallet_type: WalletType, currency: Currency) -> LedgerResult<Wallet> {
        let now = Utc::now();
        let mut tx = self.store.begin("open_wallet").await?;

        let mut account = None;
        for code in [
            wallet_account_code(user_id),
            qualified_wallet_account_code(user_id, wallet_type, &currency),
        ] {
            match tx.account_by_code(&code).await? {
                Some(existing) => {
                    let linked = tx.wallet_by_ledger_account(existing.id).await?.is_some();
                    if !linked && existing.currency == currency && existing.account_type == AccountType::Liability {
                        account = Some(existing);
                        break;
                    }
                }
                None => {
                    let new = NewAccount {
                        code: code.clone(),
                        name: format!("Wallet {} {} {}", user_id, wallet_type.as_str(), currency),
                        account_type: AccountType::Liability,
                        currency: currency.clone(),
                        parent_id: None,
                        metadata: Metadata::new()
                            .with("user_id", user_id.to_string())
                            .with("wallet_type", wallet_type.as_str()),
                    };
                    new.validate()?;
                    let created = Account::open(AccountId::new(), new, now);
                    tx.insert_account(&created).await?;
                    tracing::info!(account_id = %created.id, code = %created.code, "wallet ledger account provisioned");
                    account = Some(created);
                    break;
                }
            }
        }
        let account = account.ok_or_else(|| {
            LedgerError::conflict(format!(
                "no free ledger account code for user {user_id} {} {currency}",
                wallet_type.as_str()
            ))
        })?;

        let new = NewWallet {
            user_id,
            wallet_type,
            currency,
            ledger_account_id: account.id,
        };
        let wallet = self.insert_wallet_with_limits(tx.as_mut(), new, now).await?;
        tx.commit().await?;
        tracing::info!(wallet_id = %wallet.id, account_code = %account.code, "wallet opened");
        Ok(wallet)
    }

    pub async fn get_wallet(&self, id: WalletId) -> LedgerResult<Wallet> {
        let mut tx = self.store.begin("get_wallet").await?;
        tx.wallet(id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("wallet {id}")))
    }

    pub async fn list_user_wallets(&self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        let mut tx = self.store.begin("list_user_wallets").await?;
        tx.wallets_for_user(user_id).await
    }

    async fn change_status<F>(&self, operation: &'static str, id: WalletId, reason: Option<&str>, change: F) -> LedgerResult<Wallet>
    where
        F: FnOnce(&mut Wallet, DateTime<Utc>) -> LedgerResult<()> + Send,
    {
        let now = Utc::now();
        let mut tx = self.store.begin(operation).await?;
        let mut wallet = lock_wallet(tx.as_mut(), id).await?;
        let from = wallet.status;
        if let Err(e) = change(&mut wallet, now) {
            tracing::warn!(wallet_id = %id, operation, error = %e, "wallet status change rejected");
            return Err(e);
        }
        tx.update_wallet(&wallet).await?;
        let event = WalletEvent::StatusChanged {
            wallet_id: id,
            from,
            to: wallet.status,
            reason: reason.map(|r| r.trim().to_string()),
            occurred_at: now,
        };
        enqueue(tx.as_mut(), &event, now).await?;
        tx.commit().await?;

        tracing::info!(wallet_id = %id, from = from.as_str(), to = wallet.status.as_str(), "wallet status changed");
        Ok(wallet)
    }

    pub async fn activate(&self, id: WalletId) -> LedgerResult<Wallet> {
        self.change_status("activate_wallet", id, None, |w, now| w.activate(now)).await
    }

    pub async fn freeze(&self, id: WalletId, reason: &str) -> LedgerResult<Wallet> {
        self.change_status("freeze_wallet", id, Some(reason), |w, now| w.freeze(reason, now))
            .await
    }

    pub async fn unfreeze(&self, id: WalletId) -> LedgerResult<Wallet> {
        self.change_status("unfreeze_wallet", id, None, |w, now| w.unfreeze(now)).await
    }

    pub async fn close(&self, id: WalletId, reason: &str) -> LedgerResult<Wallet> {
        self.change_status("close_wallet", id, Some(reason), |w, now| w.close(reason, now))
            .await
    }

    /// Move funds between two wallets, recording and posting the journal
    /// entry in the same transaction.
    #[instrument(
        skip(self, transfer),
        fields(
            transaction_id = %transfer.transaction_id,
            source = %transfer.source_wallet_id,
            destination = %transfer.destination_wallet_id,
            amount = transfer.amount
        ),
        err
    )]
    pub async fn transfer(&self, transfer: Transfer) -> LedgerResult<MovementReceipt> {
        transfer.validate()?;
        let now = Utc::now();
        let mut tx = self.store.begin("process_transfer").await?;
        ensure_new_transaction(tx.as_mut(), TRANSFER_REFERENCE, transfer.transaction_id).await?;

        let (first, second) = lock_order(transfer.source_wallet_id, transfer.destination_wallet_id);
        let locked = tx.lock_wallets(&[first, second]).await?;
        let find = |id: WalletId| {
            locked
                .iter()
                .find(|w| w.id == id)
                .cloned()
                .ok_or_else(|| LedgerError::not_found(format!("wallet {id}")))
        };
        let mut source = find(transfer.source_wallet_id)?;
        let mut destination = find(transfer.destination_wallet_id)?;

        if let Err(e) = transfer.check(&source, &destination) {
            tracing::warn!(error = %e, "transfer rejected");
            return Err(e);
        }

        let mut limits = lock_limits(tx.as_mut(), source.id).await?;
        if let Err(e) = limits.check_and_reserve(transfer.amount, now) {
            tracing::warn!(error = %e, "transfer rejected by spending limits");
            return Err(e);
        }
        tx.update_limits(&limits).await?;

        transfer.apply(&mut source, &mut destination, now)?;
        tx.update_wallet(&source).await?;
        tx.update_wallet(&destination).await?;

        let entry = journal::record(
            tx.as_mut(),
            transfer.journal_entry(&source, &destination),
            Some(source.user_id),
            now,
        )
        .await?;
        enqueue(tx.as_mut(), &transfer.completed(&source, entry.id, now), now).await?;
        tx.commit().await?;

        tracing::info!(entry_number = %entry.entry_number, "transfer completed");
        let mut wallets = vec![source, destination];
        wallets.sort_by_key(|w| w.id);
        Ok(MovementReceipt {
            transaction_id: transfer.transaction_id,
            journal_entry_id: entry.id,
            entry_number: entry.entry_number,
            wallets,
        })
    }

    async fn settlement_account(&self, tx: &mut dyn StoreTx) -> LedgerResult<Account> {
        tx.account_by_code(&self.settings.settlement_account_code)
            .await?
            .ok_or_else(|| {
                LedgerError::validation(format!(
                    "settlement account '{}' is not provisioned",
                    self.settings.settlement_account_code
                ))
            })
    }

    /// Credit a wallet from the settlement account. No limit check.
    #[instrument(skip(self, deposit), fields(transaction_id = %deposit.transaction_id, wallet_id = %deposit.wallet_id, amount = deposit.amount), err)]
    pub async fn deposit(&self, deposit: Deposit) -> LedgerResult<MovementReceipt> {
        deposit.validate()?;
        let now = Utc::now();
        let mut tx = self.store.begin("process_deposit").await?;
        ensure_new_transaction(tx.as_mut(), DEPOSIT_REFERENCE, deposit.transaction_id).await?;

        let mut wallet = lock_wallet(tx.as_mut(), deposit.wallet_id).await?;
        if let Err(e) = deposit.check(&wallet) {
            tracing::warn!(error = %e, "deposit rejected");
            return Err(e);
        }
        let settlement = self.settlement_account(tx.as_mut()).await?;

        deposit.apply(&mut wallet, now)?;
        tx.update_wallet(&wallet).await?;

        let entry = journal::record(
            tx.as_mut(),
            deposit.journal_entry(&wallet, settlement.id),
            Some(wallet.user_id),
            now,
        )
        .await?;
        enqueue(tx.as_mut(), &deposit.completed(&wallet, entry.id, now), now).await?;
        tx.commit().await?;

        tracing::info!(entry_number = %entry.entry_number, balance = wallet.balance, "deposit completed");
        Ok(MovementReceipt {
            transaction_id: deposit.transaction_id,
            journal_entry_id: entry.id,
            entry_number: entry.entry_number,
            wallets: vec![wallet],
        })
    }

    /// Debit a wallet to the settlement account, subject to spending limits.
    #[instrument(skip(self, withdrawal), fields(transaction_id = %withdrawal.transaction_id, wallet_id = %withdrawal.wallet_id, amount = withdrawal.amount), err)]
    pub async fn withdraw(&self, withdrawal: Withdrawal) -> LedgerResult<MovementReceipt> {
        withdrawal.validate()?;
        let now = Utc::now();
        let mut tx = self.store.begin("process_withdrawal").await?;
        ensure_new_transaction(tx.as_mut(), WITHDRAWAL_REFERENCE, withdrawal.transaction_id).await?;

        let mut wallet = lock_wallet(tx.as_mut(), withdrawal.wallet_id).await?;
        if let Err(e) = withdrawal.check(&wallet) {
            tracing::warn!(error = %e, "withdrawal rejected");
            return Err(e);
        }

        let mut limits = lock_limits(tx.as_mut(), wallet.id).await?;
        if let Err(e) = limits.check_and_reserve(withdrawal.amount, now) {
            tracing::warn!(error = %e, "withdrawal rejected by spending limits");
            return Err(e);
        }
        tx.update_limits(&limits).await?;

        let settlement = self.settlement_account(tx.as_mut()).await?;
        withdrawal.apply(&mut wallet, now)?;
        tx.update_wallet(&wallet).await?;

        let entry = journal::record(
            tx.as_mut(),
            withdrawal.journal_entry(&wallet, settlement.id),
            Some(wallet.user_id),
            now,
        )
        .await?;
        enqueue(tx.as_mut(), &withdrawal.completed(&wallet, entry.id, now), now).await?;
        tx.commit().await?;

        tracing::info!(entry_number = %entry.entry_number, balance = wallet.balance, "withdrawal completed");
        Ok(MovementReceipt {
            transaction_id: withdrawal.transaction_id,
            journal_entry_id: entry.id,
            entry_number: entry.entry_number,
            wallets: vec![wallet],
        })
    }

    /// Reserve `amount` against an active wallet's caps (card authorisations).
    #[instrument(skip(self), err)]
    pub async fn check_and_reserve(&self, wallet_id: WalletId, amount: i64) -> LedgerResult<WalletLimits> {
        let mut tx = self.store.begin("check_and_reserve").await?;
        let wallet = lock_wallet(tx.as_mut(), wallet_id).await?;
        if let Err(e) = wallet.ensure_active("spending") {
            tracing::warn!(error = %e, "reservation rejected");
            return Err(e);
        }
        let mut limits = lock_limits(tx.as_mut(), wallet_id).await?;
        if let Err(e) = limits.check_and_reserve(amount, Utc::now()) {
            tracing::warn!(error = %e, "reservation rejected");
            return Err(e);
        }
        tx.update_limits(&limits).await?;
        tx.commit().await?;
        Ok(limits)
    }

    /// Current limits, with elapsed windows shown reset.
    pub async fn get_limits(&self, wallet_id: WalletId) -> LedgerResult<WalletLimits> {
        let mut tx = self.store.begin("get_limits").await?;
        let mut limits = tx
            .limits(wallet_id)
            .await?
            .ok_or_else(|| LedgerError::not_found(format!("limits for wallet {wallet_id}")))?;
        limits.refresh(Utc::now())?;
        Ok(limits)
    }

    #[instrument(skip(self), err)]
    pub async fn update_limits(&self, wallet_id: WalletId, update: LimitsUpdate) -> LedgerResult<WalletLimits> {
        let mut tx = self.store.begin("update_limits").await?;
        let mut limits = lock_limits(tx.as_mut(), wallet_id).await?;
        limits.refresh(Utc::now())?;
        limits.apply_update(&update)?;
        tx.update_limits(&limits).await?;
        tx.commit().await?;
        tracing::info!(
            wallet_id = %wallet_id,
            daily_limit = limits.daily_limit,
            monthly_limit = limits.monthly_limit,
            "wallet limits updated"
        );
        Ok(limits)
    }
}

