//! Service-level tests against the in-memory store.
//!
//! Covers the full path: service → store transaction → journal posting →
//! outbox, including rollback and lock-ordering behaviour.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use neoledger_core::{AccountId, Currency, LedgerError, Metadata, Page, TransactionId, UserId, WalletId};
use neoledger_events::{EventBus, EventEnvelope, InMemoryEventBus, Subscription, TopicFilter};
use neoledger_ledger::{
    AccountStatus, AccountType, AccountUpdate, EntryFilter, EntryStatus, EntryType, NewAccount, NewJournalEntry,
    NewLedgerLine,
};
use neoledger_wallet::{Deposit, LimitsUpdate, Transfer, Wallet, WalletStatus, WalletType, Withdrawal};

use crate::outbox::OutboxRelay;
use crate::services::{LedgerService, WalletService, WalletSettings};
use crate::store::{InMemoryStore, Store};

struct Harness {
    store: Arc<dyn Store>,
    ledger: LedgerService,
    wallets: WalletService,
    cash: AccountId,
    revenue: AccountId,
}

fn inr() -> Currency {
    Currency::parse("INR").unwrap()
}

fn new_account(code: &str, account_type: AccountType) -> NewAccount {
    NewAccount {
        code: code.to_string(),
        name: format!("{code} account"),
        account_type,
        currency: inr(),
        parent_id: None,
        metadata: Metadata::new(),
    }
}

async fn harness() -> Harness {
    harness_with_lock_timeout(Duration::from_secs(2)).await
}

async fn harness_with_lock_timeout(lock_timeout: Duration) -> Harness {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::new(lock_timeout));
    let ledger = LedgerService::new(store.clone());
    let wallets = WalletService::new(store.clone(), WalletSettings::default());
    let cash = ledger.create_account(new_account("1000", AccountType::Asset)).await.unwrap().id;
    let revenue = ledger.create_account(new_account("4000", AccountType::Revenue)).await.unwrap().id;
    Harness {
        store,
        ledger,
        wallets,
        cash,
        revenue,
    }
}

impl Harness {
    async fn active_wallet(&self, deposit: i64) -> Wallet {
        let wallet = self
            .wallets
            .open_wallet(UserId::new(), WalletType::Primary, inr())
            .await
            .unwrap();
        let wallet = self.wallets.activate(wallet.id).await.unwrap();
        if deposit > 0 {
            self.deposit(wallet.id, deposit).await;
        }
        self.wallets.get_wallet(wallet.id).await.unwrap()
    }

    async fn deposit(&self, wallet_id: WalletId, amount: i64) {
        self.wallets
            .deposit(Deposit {
                wallet_id,
                amount,
                transaction_id: TransactionId::new(),
                description: None,
            })
            .await
            .unwrap();
    }

    fn transfer(&self, source: WalletId, destination: WalletId, amount: i64) -> Transfer {
        Transfer {
            source_wallet_id: source,
            destination_wallet_id: destination,
            amount,
            transaction_id: TransactionId::new(),
            description: None,
        }
    }

    async fn balance(&self, wallet_id: WalletId) -> i64 {
        self.wallets.get_wallet(wallet_id).await.unwrap().balance
    }

    async fn entry_count(&self) -> usize {
        self.ledger
            .list_entries(EntryFilter::default(), Page::new(Some(500), None))
            .await
            .unwrap()
            .len()
    }

    fn sale(&self, amount: i64) -> NewJournalEntry {
        NewJournalEntry::new(
            EntryType::Standard,
            "cash sale",
            vec![
                NewLedgerLine::debit(self.cash, amount),
                NewLedgerLine::credit(self.revenue, amount),
            ],
        )
    }
}

#[tokio::test]
async fn balanced_entry_is_created_as_draft() {
    let h = harness().await;
    let entry = h.ledger.create_entry(h.sale(10_000)).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Draft);
    assert!(entry.entry_number.starts_with("JE-"));
    assert_eq!(h.ledger.get_balance(h.cash).await.unwrap().balance, 0);
}

#[tokio::test]
async fn unbalanced_entry_is_rejected_with_totals() {
    let h = harness().await;
    let new = NewJournalEntry::new(
        EntryType::Standard,
        "short",
        vec![NewLedgerLine::debit(h.cash, 10_000), NewLedgerLine::credit(h.revenue, 5_000)],
    );
    let err = h.ledger.create_entry(new).await.unwrap_err();
    assert_eq!(err, LedgerError::validation("entry not balanced: debits=10000, credits=5000"));
    assert_eq!(h.entry_count().await, 0);
}

#[tokio::test]
async fn posting_twice_fails_without_double_counting() {
    let h = harness().await;
    let entry = h.ledger.create_entry(h.sale(10_000)).await.unwrap();
    h.ledger.post_entry(entry.id, None).await.unwrap();

    let err = h.ledger.post_entry(entry.id, None).await.unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(ref m) if m.contains("not found or already posted")));

    let cash = h.ledger.get_balance(h.cash).await.unwrap();
    assert_eq!(cash.balance, 10_000);
    assert_eq!(cash.debit_total, 10_000);
    assert_eq!(h.ledger.get_balance(h.revenue).await.unwrap().balance, 10_000);
}

#[tokio::test]
async fn reversal_swaps_lines_and_links_both_entries() {
    let h = harness().await;
    let entry = h.ledger.create_entry(h.sale(10_000)).await.unwrap();
    h.ledger.post_entry(entry.id, None).await.unwrap();

    let reversal = h.ledger.reverse_entry(entry.id, None, "wrong customer").await.unwrap();
    assert_eq!(reversal.status, EntryStatus::Posted);
    assert_eq!(reversal.entry_type, EntryType::Reversing);
    assert_eq!(reversal.reverses_entry_id, Some(entry.id));
    assert_eq!(reversal.lines[0].account_id, h.revenue);
    assert_eq!(reversal.lines[0].debit_amount, 10_000);
    assert_eq!(reversal.lines[1].account_id, h.cash);
    assert_eq!(reversal.lines[1].credit_amount, 10_000);

    let original = h.ledger.get_entry(entry.id).await.unwrap();
    assert_eq!(original.status, EntryStatus::Reversed);
    assert_eq!(original.reversal_entry_id, Some(reversal.id));

    assert_eq!(h.ledger.get_balance(h.cash).await.unwrap().balance, 0);
    assert_eq!(h.ledger.get_balance(h.revenue).await.unwrap().balance, 0);

    let again = h.ledger.reverse_entry(entry.id, None, "again").await.unwrap_err();
    assert!(matches!(again, LedgerError::BadRequest(_)));
}

#[tokio::test]
async fn void_reverses_balances_and_marks_original() {
    let h = harness().await;
    let entry = h.ledger.create_entry(h.sale(7_500)).await.unwrap();
    h.ledger.post_entry(entry.id, None).await.unwrap();

    let actor = UserId::new();
    let voided = h.ledger.void_entry(entry.id, Some(actor), "duplicate").await.unwrap();
    assert_eq!(voided.status, EntryStatus::Voided);
    assert_eq!(voided.voided_by, Some(actor));
    assert_eq!(voided.void_reason.as_deref(), Some("duplicate"));

    let reversal_id = voided.reversal_entry_id.unwrap();
    let reversal = h.ledger.get_entry(reversal_id).await.unwrap();
    assert_eq!(reversal.reverses_entry_id, Some(entry.id));
    assert_eq!(h.ledger.get_balance(h.cash).await.unwrap().balance, 0);
}

#[tokio::test]
async fn void_of_draft_is_rejected() {
    let h = harness().await;
    let entry = h.ledger.create_entry(h.sale(100)).await.unwrap();
    let err = h.ledger.void_entry(entry.id, None, "oops").await.unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(_)));
}

#[tokio::test]
async fn inactive_account_rejects_new_entries() {
    let h = harness().await;
    h.ledger
        .update_account(
            h.revenue,
            AccountUpdate {
                name: None,
                status: Some(AccountStatus::Inactive),
            },
        )
        .await
        .unwrap();
    let err = h.ledger.create_entry(h.sale(100)).await.unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn duplicate_account_code_conflicts() {
    let h = harness().await;
    let err = h
        .ledger
        .create_account(new_account("1000", AccountType::Asset))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));
}

#[tokio::test]
async fn transfer_shortfall_is_reported() {
    let h = harness().await;
    let source = h.active_wallet(5_000).await;
    let destination = h.active_wallet(0).await;

    let err = h
        .wallets
        .transfer(h.transfer(source.id, destination.id, 10_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(ref m) if m.contains("shortfall 5000")));
    assert_eq!(h.balance(source.id).await, 5_000);
}

#[tokio::test]
async fn transfer_over_daily_limit_reports_remaining() {
    let h = harness().await;
    let source = h.active_wallet(2_000_000).await;
    let destination = h.active_wallet(0).await;

    h.wallets
        .withdraw(Withdrawal {
            wallet_id: source.id,
            amount: 900_000,
            transaction_id: TransactionId::new(),
            description: None,
        })
        .await
        .unwrap();
    assert_eq!(h.wallets.get_limits(source.id).await.unwrap().daily_spent, 900_000);

    let err = h
        .wallets
        .transfer(h.transfer(source.id, destination.id, 200_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(ref m) if m.contains("remaining 100000")));
    assert_eq!(h.wallets.get_limits(source.id).await.unwrap().daily_spent, 900_000);
}

#[tokio::test]
async fn transfer_moves_funds_and_posts_journal_entry() {
    let h = harness().await;
    let source = h.active_wallet(50_000).await;
    let destination = h.active_wallet(0).await;

    let receipt = h
        .wallets
        .transfer(h.transfer(source.id, destination.id, 12_000))
        .await
        .unwrap();
    assert_eq!(h.balance(source.id).await, 38_000);
    assert_eq!(h.balance(destination.id).await, 12_000);

    let entry = h.ledger.get_entry(receipt.journal_entry_id).await.unwrap();
    assert_eq!(entry.status, EntryStatus::Posted);
    assert_eq!(entry.reference_type.as_deref(), Some("transfer"));
    assert_eq!(entry.reference_id, Some(receipt.transaction_id.to_string()));

    // Wallet accounts are liabilities: credit-normal, so they track the wallet balance.
    let source_account = h.ledger.get_balance(source.ledger_account_id).await.unwrap();
    let destination_account = h.ledger.get_balance(destination.ledger_account_id).await.unwrap();
    assert_eq!(source_account.balance, 38_000);
    assert_eq!(destination_account.balance, 12_000);
    assert_eq!(h.wallets.get_limits(source.id).await.unwrap().daily_spent, 12_000);
}

#[tokio::test]
async fn replayed_transaction_id_conflicts() {
    let h = harness().await;
    let source = h.active_wallet(10_000).await;
    let destination = h.active_wallet(0).await;

    let transfer = h.transfer(source.id, destination.id, 1_000);
    h.wallets.transfer(transfer.clone()).await.unwrap();
    let err = h.wallets.transfer(transfer).await.unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));
    assert_eq!(h.balance(source.id).await, 9_000);
}

#[tokio::test]
async fn failed_transfer_leaves_no_trace() {
    let h = harness().await;
    let source = h.active_wallet(10_000).await;
    let destination = h.active_wallet(0).await;
    let entries_before = h.entry_count().await;

    // Fails at journal validation, after limits and balances were staged.
    h.ledger
        .update_account(
            destination.ledger_account_id,
            AccountUpdate {
                name: None,
                status: Some(AccountStatus::Inactive),
            },
        )
        .await
        .unwrap();

    let err = h
        .wallets
        .transfer(h.transfer(source.id, destination.id, 4_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));

    assert_eq!(h.balance(source.id).await, 10_000);
    assert_eq!(h.balance(destination.id).await, 0);
    assert_eq!(h.wallets.get_limits(source.id).await.unwrap().daily_spent, 0);
    assert_eq!(h.entry_count().await, entries_before);
}

#[tokio::test]
async fn frozen_wallet_cannot_send() {
    let h = harness().await;
    let source = h.active_wallet(10_000).await;
    let destination = h.active_wallet(0).await;
    h.wallets.freeze(source.id, "chargeback review").await.unwrap();

    let err = h
        .wallets
        .transfer(h.transfer(source.id, destination.id, 1_000))
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(_)));

    let unfrozen = h.wallets.unfreeze(source.id).await.unwrap();
    assert_eq!(unfrozen.status, WalletStatus::Active);
    assert_eq!(unfrozen.frozen_reason, None);
}

#[tokio::test]
async fn frozen_wallet_cannot_reserve_limits() {
    let h = harness().await;
    let wallet = h.active_wallet(0).await;
    h.wallets.freeze(wallet.id, "card reported stolen").await.unwrap();

    let err = h.wallets.check_and_reserve(wallet.id, 1_000).await.unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(ref m) if m.contains("frozen")));
    assert_eq!(h.wallets.get_limits(wallet.id).await.unwrap().daily_spent, 0);
}

#[tokio::test]
async fn transfer_times_out_while_store_is_held() {
    let h = harness_with_lock_timeout(Duration::from_millis(100)).await;
    let source = h.active_wallet(10_000).await;
    let destination = h.active_wallet(0).await;
    let transfer = h.transfer(source.id, destination.id, 1_000);

    let held = h.store.begin("held_by_test").await.unwrap();
    let err = h.wallets.transfer(transfer.clone()).await.unwrap_err();
    assert!(matches!(err, LedgerError::LockTimeout(_)));
    assert_eq!(err.code(), "lock_timeout");

    drop(held);
    h.wallets.transfer(transfer).await.unwrap();
    assert_eq!(h.balance(source.id).await, 9_000);
    assert_eq!(h.balance(destination.id).await, 1_000);
}

#[tokio::test]
async fn close_requires_zero_balance() {
    let h = harness().await;
    let wallet = h.active_wallet(500).await;
    assert!(matches!(
        h.wallets.close(wallet.id, "customer request").await.unwrap_err(),
        LedgerError::BadRequest(_)
    ));

    h.wallets
        .withdraw(Withdrawal {
            wallet_id: wallet.id,
            amount: 500,
            transaction_id: TransactionId::new(),
            description: None,
        })
        .await
        .unwrap();
    let closed = h.wallets.close(wallet.id, "customer request").await.unwrap();
    assert_eq!(closed.status, WalletStatus::Closed);
    assert!(closed.closed_at.is_some());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn opposite_direction_transfers_both_complete() {
    let h = Arc::new(harness().await);
    let a = h.active_wallet(100_000).await;
    let b = h.active_wallet(100_000).await;

    let mut tasks = Vec::new();
    for i in 0..10 {
        let h = h.clone();
        let (from, to) = if i % 2 == 0 { (a.id, b.id) } else { (b.id, a.id) };
        tasks.push(tokio::spawn(async move { h.wallets.transfer(h.transfer(from, to, 1_000)).await }));
    }
    for task in tasks {
        task.await.unwrap().unwrap();
    }

    assert_eq!(h.balance(a.id).await + h.balance(b.id).await, 200_000);
    assert_eq!(h.balance(a.id).await, 100_000);
}

#[tokio::test]
async fn transfers_conserve_total_wallet_balance() {
    let h = harness().await;
    let mut ids = Vec::new();
    for _ in 0..4 {
        ids.push(h.active_wallet(25_000).await.id);
    }

    let amounts = [3_000, 7_500, 12_000, 30_000, 1, 999];
    for (i, amount) in amounts.iter().enumerate() {
        let from = ids[i % ids.len()];
        let to = ids[(i + 1) % ids.len()];
        // Some of these fail for insufficient funds; conservation must hold either way.
        let _ = h.wallets.transfer(h.transfer(from, to, *amount)).await;
    }

    let mut total = 0;
    for id in &ids {
        total += h.balance(*id).await;
    }
    assert_eq!(total, 100_000);

    let mut ledger_total = 0;
    for id in &ids {
        let wallet = h.wallets.get_wallet(*id).await.unwrap();
        ledger_total += h.ledger.get_balance(wallet.ledger_account_id).await.unwrap().balance;
    }
    assert_eq!(ledger_total, total);
}

#[tokio::test]
async fn deposit_requires_settlement_account() {
    let store: Arc<dyn Store> = Arc::new(InMemoryStore::default());
    let wallets = WalletService::new(store.clone(), WalletSettings::default());
    let wallet = wallets.open_wallet(UserId::new(), WalletType::Primary, inr()).await.unwrap();
    wallets.activate(wallet.id).await.unwrap();

    let err = wallets
        .deposit(Deposit {
            wallet_id: wallet.id,
            amount: 100,
            transaction_id: TransactionId::new(),
            description: None,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(ref m) if m.contains("settlement account")));
}

#[tokio::test]
async fn open_wallet_provisions_distinct_accounts_per_wallet_type() {
    let h = harness().await;
    let user = UserId::new();
    let primary = h.wallets.open_wallet(user, WalletType::Primary, inr()).await.unwrap();
    let savings = h.wallets.open_wallet(user, WalletType::Savings, inr()).await.unwrap();
    assert_ne!(primary.ledger_account_id, savings.ledger_account_id);

    let primary_account = h.ledger.get_account(primary.ledger_account_id).await.unwrap();
    let savings_account = h.ledger.get_account(savings.ledger_account_id).await.unwrap();
    assert_eq!(primary_account.code, format!("WALLET-{user}"));
    assert_eq!(savings_account.code, format!("WALLET-{user}-SAVINGS-INR"));
    assert_eq!(primary_account.account_type, AccountType::Liability);

    let err = h.wallets.open_wallet(user, WalletType::Primary, inr()).await.unwrap_err();
    assert!(matches!(err, LedgerError::Conflict(_)));
    assert_eq!(h.wallets.list_user_wallets(user).await.unwrap().len(), 2);
}

#[tokio::test]
async fn create_wallet_rejects_currency_mismatch() {
    let h = harness().await;
    let usd_account = h
        .ledger
        .create_account(NewAccount {
            currency: Currency::parse("USD").unwrap(),
            ..new_account("WALLET-USD-1", AccountType::Liability)
        })
        .await
        .unwrap();
    let err = h
        .wallets
        .create_wallet(neoledger_wallet::NewWallet {
            user_id: UserId::new(),
            wallet_type: WalletType::Primary,
            currency: inr(),
            ledger_account_id: usd_account.id,
        })
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn limits_update_and_standalone_reservation() {
    let h = harness().await;
    let wallet = h.active_wallet(0).await;

    let limits = h
        .wallets
        .update_limits(
            wallet.id,
            LimitsUpdate {
                daily_limit: Some(5_000),
                monthly_limit: None,
            },
        )
        .await
        .unwrap();
    assert_eq!(limits.daily_limit, 5_000);

    h.wallets.check_and_reserve(wallet.id, 4_000).await.unwrap();
    let err = h.wallets.check_and_reserve(wallet.id, 2_000).await.unwrap_err();
    assert!(matches!(err, LedgerError::BadRequest(ref m) if m.contains("remaining 1000")));

    let err = h
        .wallets
        .update_limits(wallet.id, LimitsUpdate::default())
        .await
        .unwrap_err();
    assert!(matches!(err, LedgerError::Validation(_)));
}

#[tokio::test]
async fn outbox_relays_committed_events_once() {
    let h = harness().await;
    let bus = Arc::new(InMemoryEventBus::new());
    let wallet_events = bus.subscribe(TopicFilter::prefix("wallet."));
    let everything = bus.subscribe(TopicFilter::All);

    let source = h.active_wallet(10_000).await;
    let destination = h.active_wallet(0).await;
    h.wallets
        .transfer(h.transfer(source.id, destination.id, 2_500))
        .await
        .unwrap();

    let relay = OutboxRelay::new(h.store.clone()).with_batch_size(1_000);
    let relayed = relay.relay_pending(&bus).await.unwrap();
    assert!(relayed > 0);
    assert_eq!(relay.relay_pending(&bus).await.unwrap(), 0);

    let topics: Vec<String> = wallet_events.drain().iter().map(|e| e.topic().to_string()).collect();
    assert!(topics.iter().all(|t| t.starts_with("wallet.")));
    assert_eq!(topics.last().map(String::as_str), Some("wallet.transfer.completed"));
    assert!(topics.iter().any(|t| t == "wallet.status.changed"));

    let all = everything.drain();
    assert_eq!(all.len(), relayed);
    assert!(all.iter().any(|e| e.topic() == "ledger.entry.posted"));
}

/// Accepts a fixed number of publishes, then fails.
struct FlakyBus {
    inner: InMemoryEventBus,
    remaining: AtomicUsize,
}

impl EventBus for FlakyBus {
    type Error = String;

    fn publish(&self, envelope: EventEnvelope) -> Result<(), Self::Error> {
        let ok = self
            .remaining
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if !ok {
            return Err("broker unavailable".to_string());
        }
        self.inner.publish(envelope).map_err(|e| e.to_string())
    }

    fn subscribe(&self, filter: TopicFilter) -> Subscription {
        self.inner.subscribe(filter)
    }
}

#[tokio::test]
async fn partial_relay_reports_the_failure_and_keeps_the_rest_pending() {
    let h = harness().await;
    h.active_wallet(5_000).await;

    let flaky = FlakyBus {
        inner: InMemoryEventBus::new(),
        remaining: AtomicUsize::new(1),
    };
    let delivered = flaky.subscribe(TopicFilter::All);
    let relay = OutboxRelay::new(h.store.clone()).with_batch_size(1_000);

    let err = relay.relay_pending(&flaky).await.unwrap_err();
    assert!(matches!(err, LedgerError::Internal { .. }));
    let first = delivered.drain();
    assert_eq!(first.len(), 1);

    let bus = InMemoryEventBus::new();
    let rest = bus.subscribe(TopicFilter::All);
    let relayed = relay.relay_pending(&bus).await.unwrap();
    assert!(relayed > 0);
    let rest = rest.drain();
    assert_eq!(rest.len(), relayed);
    assert!(rest.iter().all(|e| e.event_id() != first[0].event_id()));
}
