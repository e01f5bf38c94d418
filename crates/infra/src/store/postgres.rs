//! PostgreSQL-backed store.
//!
//! ## Error Mapping
//!
//! SQLx errors are mapped to `LedgerError` as follows:
//!
//! | PostgreSQL error code | LedgerError | Scenario |
//! |-----------------------|-------------|----------|
//! | `23505` unique_violation | `Conflict` | duplicate account code, wallet, or replayed transaction id |
//! | `55P03` lock_not_available | `LockTimeout` | `lock_timeout` elapsed waiting for a row lock |
//! | `40P01` deadlock_detected | `LockTimeout` | lock cycle broken by the server |
//! | `23514` check_violation | `Validation` | value outside an enumerated or signed range |
//! | anything else | `Internal` | connection, pool, decoding failures |
//!
//! ## Locking
//!
//! Every transaction sets `lock_timeout` locally, so a blocked `FOR UPDATE`
//! fails with `LockTimeout` instead of waiting indefinitely.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions, PgRow};
use sqlx::{FromRow, Postgres, Row, Transaction};
use tracing::instrument;
use uuid::Uuid;

use neoledger_core::{
    AccountId, Currency, EntryId, LedgerError, LedgerResult, LineId, Metadata, Page, UserId, WalletId,
};
use neoledger_events::EventEnvelope;
use neoledger_ledger::{
    Account, AccountFilter, EntryFilter, EntryStatus, JournalEntry, LedgerLine,
};
use neoledger_wallet::{Wallet, WalletLimits, WalletType};

use super::{OutboxMessage, Store, StoreTx};

/// Map a SQLx error to the ledger taxonomy, naming the failing operation.
pub fn map_sqlx_error(operation: &str, err: sqlx::Error) -> LedgerError {
    match err {
        sqlx::Error::Database(db_err) => {
            let msg = format!("{operation}: {}", db_err.message());
            match db_err.code().as_deref() {
                Some("23505") => LedgerError::conflict(match db_err.constraint() {
                    Some(constraint) => format!("{msg} ({constraint})"),
                    None => msg,
                }),
                Some("55P03") | Some("40P01") => LedgerError::lock_timeout(operation),
                Some("23514") => LedgerError::validation(msg),
                _ => LedgerError::internal(operation, db_err.message()),
            }
        }
        other => LedgerError::internal(operation, other),
    }
}

fn decode_error(operation: &str, err: impl core::fmt::Display) -> LedgerError {
    LedgerError::internal(operation, format!("failed to decode row: {err}"))
}

fn metadata_json(metadata: &Metadata) -> LedgerResult<serde_json::Value> {
    serde_json::to_value(metadata).map_err(|e| LedgerError::internal("encode_metadata", e))
}

#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
    lock_timeout: Duration,
}

impl PostgresStore {
    pub fn new(pool: PgPool, lock_timeout: Duration) -> Self {
        Self { pool, lock_timeout }
    }

    pub async fn connect(database_url: &str, max_connections: u32, lock_timeout: Duration) -> LedgerResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(5))
            .connect(database_url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;
        tracing::info!(max_connections, "connected to postgres");
        Ok(Self::new(pool, lock_timeout))
    }

    /// Apply embedded migrations.
    pub async fn migrate(&self) -> LedgerResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| LedgerError::internal("migrate", e))?;
        tracing::info!("database migrations applied");
        Ok(())
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    #[instrument(skip(self), err)]
    async fn begin(&self, operation: &'static str) -> LedgerResult<Box<dyn StoreTx>> {
        let mut tx = self.pool.begin().await.map_err(|e| map_sqlx_error("begin_transaction", e))?;
        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", self.lock_timeout.as_millis()))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("set_lock_timeout", e))?;
        Ok(Box::new(PgTx { tx, operation }))
    }
}

struct PgTx {
    tx: Transaction<'static, Postgres>,
    operation: &'static str,
}

const ACCOUNT_COLUMNS: &str = "id, code, name, account_type, currency, parent_id, balance, debit_total, \
     credit_total, status, metadata, created_at, updated_at";

const ENTRY_COLUMNS: &str = "id, entry_number, entry_type, status, description, reference_type, reference_id, \
     posted_at, posted_by, voided_at, voided_by, void_reason, reversal_entry_id, reverses_entry_id, \
     metadata, created_by, created_at, updated_at";

const LINE_COLUMNS: &str = "id, entry_id, line_number, account_id, debit_amount, credit_amount, description, metadata";

const WALLET_COLUMNS: &str = "id, user_id, wallet_type, currency, balance, available_balance, status, \
     ledger_account_id, frozen_reason, closed_at, closed_reason, created_at, updated_at";

const LIMITS_COLUMNS: &str = "wallet_id, daily_limit, daily_spent, daily_reset_at, monthly_limit, monthly_spent, \
     monthly_reset_at";

const OUTBOX_COLUMNS: &str = "id, topic, version, aggregate_id, occurred_at, payload, created_at, published_at";

fn decode_account(row: &PgRow) -> LedgerResult<Account> {
    AccountRow::from_row(row).map_err(|e| decode_error("account", e))?.try_into()
}

fn decode_entry(row: &PgRow) -> LedgerResult<JournalEntry> {
    EntryRow::from_row(row).map_err(|e| decode_error("journal_entry", e))?.try_into()
}

fn decode_line(row: &PgRow) -> LedgerResult<LedgerLine> {
    LineRow::from_row(row).map_err(|e| decode_error("ledger_line", e))?.try_into()
}

fn decode_wallet(row: &PgRow) -> LedgerResult<Wallet> {
    WalletRow::from_row(row).map_err(|e| decode_error("wallet", e))?.try_into()
}

fn decode_limits(row: &PgRow) -> LedgerResult<WalletLimits> {
    Ok(LimitsRow::from_row(row).map_err(|e| decode_error("wallet_limits", e))?.into())
}

fn decode_outbox(row: &PgRow) -> LedgerResult<OutboxMessage> {
    Ok(OutboxRow::from_row(row).map_err(|e| decode_error("outbox", e))?.into())
}

impl PgTx {
    async fn load_entry(&mut self, id: EntryId, for_update: bool) -> LedgerResult<Option<JournalEntry>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!("SELECT {ENTRY_COLUMNS} FROM journal_entries WHERE id = $1{lock}"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_entry", e))?;
        let Some(row) = row else {
            return Ok(None);
        };
        let mut entry = decode_entry(&row)?;

        let lines = sqlx::query(&format!(
            "SELECT {LINE_COLUMNS} FROM ledger_lines WHERE entry_id = $1 ORDER BY line_number ASC"
        ))
        .bind(id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("load_lines", e))?;
        entry.lines = lines.iter().map(decode_line).collect::<LedgerResult<_>>()?;
        Ok(Some(entry))
    }

    async fn load_limits(&mut self, wallet_id: WalletId, for_update: bool) -> LedgerResult<Option<WalletLimits>> {
        let lock = if for_update { " FOR UPDATE" } else { "" };
        let row = sqlx::query(&format!("SELECT {LIMITS_COLUMNS} FROM wallet_limits WHERE wallet_id = $1{lock}"))
            .bind(wallet_id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("load_limits", e))?;
        row.as_ref().map(decode_limits).transpose()
    }

    async fn fetch_one_wallet(&mut self, sql: &str, op: &str, key: Uuid) -> LedgerResult<Option<Wallet>> {
        let row = sqlx::query(sql)
            .bind(key)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error(op, e))?;
        row.as_ref().map(decode_wallet).transpose()
    }
}

#[async_trait]
impl StoreTx for PgTx {
    async fn account(&mut self, id: AccountId) -> LedgerResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_account", e))?;
        row.as_ref().map(decode_account).transpose()
    }

    async fn account_by_code(&mut self, code: &str) -> LedgerResult<Option<Account>> {
        let row = sqlx::query(&format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE code = $1"))
            .bind(code)
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_account_by_code", e))?;
        row.as_ref().map(decode_account).transpose()
    }

    #[instrument(skip(self), fields(count = ids.len()), err)]
    async fn lock_accounts(&mut self, ids: &[AccountId]) -> LedgerResult<Vec<Account>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_accounts", e))?;
        rows.iter().map(decode_account).collect()
    }

    async fn list_accounts(&mut self, filter: AccountFilter, page: Page) -> LedgerResult<Vec<Account>> {
        let rows = sqlx::query(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts \
             WHERE ($1::text IS NULL OR account_type = $1) AND ($2::text IS NULL OR status = $2) \
             ORDER BY code ASC LIMIT $3 OFFSET $4"
        ))
        .bind(filter.account_type.map(|t| t.as_str()))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_accounts", e))?;
        rows.iter().map(decode_account).collect()
    }

    #[instrument(skip(self, account), fields(account_id = %account.id, code = %account.code), err)]
    async fn insert_account(&mut self, account: &Account) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO accounts (
                id, code, name, account_type, currency, parent_id, balance, debit_total,
                credit_total, status, metadata, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.code)
        .bind(&account.name)
        .bind(account.account_type.as_str())
        .bind(account.currency.as_str())
        .bind(account.parent_id.map(Uuid::from))
        .bind(account.balance)
        .bind(account.debit_total)
        .bind(account.credit_total)
        .bind(account.status.as_str())
        .bind(metadata_json(&account.metadata)?)
        .bind(account.created_at)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_account", e))?;
        Ok(())
    }

    async fn update_account(&mut self, account: &Account) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE accounts
            SET name = $2, status = $3, balance = $4, debit_total = $5, credit_total = $6, updated_at = $7
            WHERE id = $1
            "#,
        )
        .bind(account.id.as_uuid())
        .bind(&account.name)
        .bind(account.status.as_str())
        .bind(account.balance)
        .bind(account.debit_total)
        .bind(account.credit_total)
        .bind(account.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_account", e))?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("account {}", account.id)));
        }
        Ok(())
    }

    async fn next_entry_number(&mut self, _now: DateTime<Utc>) -> LedgerResult<String> {
        sqlx::query_scalar::<_, String>("SELECT next_journal_entry_number()")
            .fetch_one(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("next_entry_number", e))
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id, entry_number = %entry.entry_number, lines = entry.lines.len()), err)]
    async fn insert_entry(&mut self, entry: &JournalEntry) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO journal_entries (
                id, entry_number, entry_type, status, description, reference_type, reference_id,
                posted_at, posted_by, voided_at, voided_by, void_reason, reversal_entry_id,
                reverses_entry_id, metadata, created_by, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(&entry.entry_number)
        .bind(entry.entry_type.as_str())
        .bind(entry.status.as_str())
        .bind(&entry.description)
        .bind(entry.reference_type.as_deref())
        .bind(entry.reference_id.as_deref())
        .bind(entry.posted_at)
        .bind(entry.posted_by.map(Uuid::from))
        .bind(entry.voided_at)
        .bind(entry.voided_by.map(Uuid::from))
        .bind(entry.void_reason.as_deref())
        .bind(entry.reversal_entry_id.map(Uuid::from))
        .bind(entry.reverses_entry_id.map(Uuid::from))
        .bind(metadata_json(&entry.metadata)?)
        .bind(entry.created_by.map(Uuid::from))
        .bind(entry.created_at)
        .bind(entry.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_entry", e))?;

        for line in &entry.lines {
            sqlx::query(
                r#"
                INSERT INTO ledger_lines (
                    id, entry_id, line_number, account_id, debit_amount, credit_amount, description, metadata
                )
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                "#,
            )
            .bind(line.id.as_uuid())
            .bind(line.entry_id.as_uuid())
            .bind(line.line_number as i32)
            .bind(line.account_id.as_uuid())
            .bind(line.debit_amount)
            .bind(line.credit_amount)
            .bind(line.description.as_deref())
            .bind(metadata_json(&line.metadata)?)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("insert_line", e))?;
        }
        Ok(())
    }

    async fn entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        self.load_entry(id, false).await
    }

    #[instrument(skip(self), err)]
    async fn lock_entry(&mut self, id: EntryId) -> LedgerResult<Option<JournalEntry>> {
        self.load_entry(id, true).await
    }

    #[instrument(skip(self, entry), fields(entry_id = %entry.id, to = entry.status.as_str(), expected = expected.as_str()), err)]
    async fn update_entry_status(&mut self, entry: &JournalEntry, expected: EntryStatus) -> LedgerResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE journal_entries
            SET status = $2, posted_at = $3, posted_by = $4, voided_at = $5, voided_by = $6,
                void_reason = $7, reversal_entry_id = $8, updated_at = $9
            WHERE id = $1 AND status = $10
            "#,
        )
        .bind(entry.id.as_uuid())
        .bind(entry.status.as_str())
        .bind(entry.posted_at)
        .bind(entry.posted_by.map(Uuid::from))
        .bind(entry.voided_at)
        .bind(entry.voided_by.map(Uuid::from))
        .bind(entry.void_reason.as_deref())
        .bind(entry.reversal_entry_id.map(Uuid::from))
        .bind(entry.updated_at)
        .bind(expected.as_str())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_entry_status", e))?;
        Ok(result.rows_affected() == 1)
    }

    async fn list_entries(&mut self, filter: &EntryFilter, page: Page) -> LedgerResult<Vec<JournalEntry>> {
        let rows = sqlx::query(&format!(
            "SELECT {ENTRY_COLUMNS} FROM journal_entries \
             WHERE ($1::text IS NULL OR status = $1) \
               AND ($2::text IS NULL OR entry_type = $2) \
               AND ($3::text IS NULL OR reference_type = $3) \
               AND ($4::text IS NULL OR reference_id = $4) \
             ORDER BY created_at DESC, id DESC LIMIT $5 OFFSET $6"
        ))
        .bind(filter.status.map(|s| s.as_str()))
        .bind(filter.entry_type.map(|t| t.as_str()))
        .bind(filter.reference_type.as_deref())
        .bind(filter.reference_id.as_deref())
        .bind(i64::from(page.limit))
        .bind(i64::from(page.offset))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_entries", e))?;
        rows.iter().map(decode_entry).collect()
    }

    async fn reference_exists(&mut self, reference_type: &str, reference_id: &str) -> LedgerResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM journal_entries WHERE reference_type = $1 AND reference_id = $2)",
        )
        .bind(reference_type)
        .bind(reference_id)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("reference_exists", e))
    }

    async fn wallet(&mut self, id: WalletId) -> LedgerResult<Option<Wallet>> {
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE id = $1");
        self.fetch_one_wallet(&sql, "get_wallet", *id.as_uuid()).await
    }

    #[instrument(skip(self), fields(count = ids.len()), err)]
    async fn lock_wallets(&mut self, ids: &[WalletId]) -> LedgerResult<Vec<Wallet>> {
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE id = ANY($1) ORDER BY id ASC FOR UPDATE"
        ))
        .bind(ids)
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_wallets", e))?;
        rows.iter().map(decode_wallet).collect()
    }

    async fn wallets_for_user(&mut self, user_id: UserId) -> LedgerResult<Vec<Wallet>> {
        let rows = sqlx::query(&format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 ORDER BY created_at ASC"
        ))
        .bind(user_id.as_uuid())
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("list_user_wallets", e))?;
        rows.iter().map(decode_wallet).collect()
    }

    async fn wallet_by_key(
        &mut self,
        user_id: UserId,
        wallet_type: WalletType,
        currency: &Currency,
    ) -> LedgerResult<Option<Wallet>> {
        let sql = format!(
            "SELECT {WALLET_COLUMNS} FROM wallets WHERE user_id = $1 AND wallet_type = $2 AND currency = $3"
        );
        let row = sqlx::query(&sql)
            .bind(user_id.as_uuid())
            .bind(wallet_type.as_str())
            .bind(currency.as_str())
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("get_wallet_by_key", e))?;
        row.as_ref().map(decode_wallet).transpose()
    }

    async fn wallet_by_ledger_account(&mut self, account_id: AccountId) -> LedgerResult<Option<Wallet>> {
        let sql = format!("SELECT {WALLET_COLUMNS} FROM wallets WHERE ledger_account_id = $1");
        self.fetch_one_wallet(&sql, "get_wallet_by_account", *account_id.as_uuid()).await
    }

    #[instrument(skip(self, wallet), fields(wallet_id = %wallet.id, user_id = %wallet.user_id), err)]
    async fn insert_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallets (
                id, user_id, wallet_type, currency, balance, available_balance, status,
                ledger_account_id, frozen_reason, closed_at, closed_reason, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(wallet.id.as_uuid())
        .bind(wallet.user_id.as_uuid())
        .bind(wallet.wallet_type.as_str())
        .bind(wallet.currency.as_str())
        .bind(wallet.balance)
        .bind(wallet.available_balance)
        .bind(wallet.status.as_str())
        .bind(wallet.ledger_account_id.as_uuid())
        .bind(wallet.frozen_reason.as_deref())
        .bind(wallet.closed_at)
        .bind(wallet.closed_reason.as_deref())
        .bind(wallet.created_at)
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_wallet", e))?;
        Ok(())
    }

    async fn update_wallet(&mut self, wallet: &Wallet) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wallets
            SET balance = $2, available_balance = $3, status = $4, frozen_reason = $5,
                closed_at = $6, closed_reason = $7, updated_at = $8
            WHERE id = $1
            "#,
        )
        .bind(wallet.id.as_uuid())
        .bind(wallet.balance)
        .bind(wallet.available_balance)
        .bind(wallet.status.as_str())
        .bind(wallet.frozen_reason.as_deref())
        .bind(wallet.closed_at)
        .bind(wallet.closed_reason.as_deref())
        .bind(wallet.updated_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_wallet", e))?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("wallet {}", wallet.id)));
        }
        Ok(())
    }

    async fn limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>> {
        self.load_limits(wallet_id, false).await
    }

    #[instrument(skip(self), err)]
    async fn lock_limits(&mut self, wallet_id: WalletId) -> LedgerResult<Option<WalletLimits>> {
        self.load_limits(wallet_id, true).await
    }

    async fn insert_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO wallet_limits (
                wallet_id, daily_limit, daily_spent, daily_reset_at, monthly_limit, monthly_spent, monthly_reset_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(limits.wallet_id.as_uuid())
        .bind(limits.daily_limit)
        .bind(limits.daily_spent)
        .bind(limits.daily_reset_at)
        .bind(limits.monthly_limit)
        .bind(limits.monthly_spent)
        .bind(limits.monthly_reset_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("insert_limits", e))?;
        Ok(())
    }

    async fn update_limits(&mut self, limits: &WalletLimits) -> LedgerResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE wallet_limits
            SET daily_limit = $2, daily_spent = $3, daily_reset_at = $4,
                monthly_limit = $5, monthly_spent = $6, monthly_reset_at = $7
            WHERE wallet_id = $1
            "#,
        )
        .bind(limits.wallet_id.as_uuid())
        .bind(limits.daily_limit)
        .bind(limits.daily_spent)
        .bind(limits.daily_reset_at)
        .bind(limits.monthly_limit)
        .bind(limits.monthly_spent)
        .bind(limits.monthly_reset_at)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("update_limits", e))?;
        if result.rows_affected() == 0 {
            return Err(LedgerError::not_found(format!("limits for wallet {}", limits.wallet_id)));
        }
        Ok(())
    }

    #[instrument(skip(self, envelope), fields(topic = envelope.topic(), event_id = %envelope.event_id()), err)]
    async fn enqueue(&mut self, envelope: &EventEnvelope, now: DateTime<Utc>) -> LedgerResult<()> {
        sqlx::query(
            r#"
            INSERT INTO outbox (id, topic, version, aggregate_id, occurred_at, payload, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(envelope.event_id())
        .bind(envelope.topic())
        .bind(envelope.version() as i32)
        .bind(envelope.aggregate_id())
        .bind(envelope.occurred_at())
        .bind(envelope.payload())
        .bind(now)
        .execute(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("enqueue_outbox", e))?;
        Ok(())
    }

    async fn lock_pending_outbox(&mut self, limit: u32) -> LedgerResult<Vec<OutboxMessage>> {
        let rows = sqlx::query(&format!(
            "SELECT {OUTBOX_COLUMNS} FROM outbox WHERE published_at IS NULL \
             ORDER BY created_at ASC, id ASC LIMIT $1 FOR UPDATE SKIP LOCKED"
        ))
        .bind(i64::from(limit))
        .fetch_all(&mut *self.tx)
        .await
        .map_err(|e| map_sqlx_error("lock_pending_outbox", e))?;
        rows.iter().map(decode_outbox).collect()
    }

    async fn mark_published(&mut self, ids: &[Uuid], now: DateTime<Utc>) -> LedgerResult<()> {
        sqlx::query("UPDATE outbox SET published_at = $2 WHERE id = ANY($1)")
            .bind(ids.to_vec())
            .bind(now)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| map_sqlx_error("mark_published", e))?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> LedgerResult<()> {
        let operation = self.operation;
        self.tx.commit().await.map_err(|e| map_sqlx_error(operation, e))
    }
}

// SQLx row types

#[derive(Debug)]
struct AccountRow {
    id: Uuid,
    code: String,
    name: String,
    account_type: String,
    currency: String,
    parent_id: Option<Uuid>,
    balance: i64,
    debit_total: i64,
    credit_total: i64,
    status: String,
    metadata: serde_json::Value,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for AccountRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(AccountRow {
            id: row.try_get("id")?,
            code: row.try_get("code")?,
            name: row.try_get("name")?,
            account_type: row.try_get("account_type")?,
            currency: row.try_get("currency")?,
            parent_id: row.try_get("parent_id")?,
            balance: row.try_get("balance")?,
            debit_total: row.try_get("debit_total")?,
            credit_total: row.try_get("credit_total")?,
            status: row.try_get("status")?,
            metadata: row.try_get("metadata")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<AccountRow> for Account {
    type Error = LedgerError;

    fn try_from(row: AccountRow) -> Result<Self, Self::Error> {
        Ok(Account {
            id: AccountId::from_uuid(row.id),
            code: row.code,
            name: row.name,
            account_type: row.account_type.parse().map_err(|e| decode_error("account", e))?,
            currency: Currency::parse(&row.currency).map_err(|e| decode_error("account", e))?,
            parent_id: row.parent_id.map(AccountId::from_uuid),
            balance: row.balance,
            debit_total: row.debit_total,
            credit_total: row.credit_total,
            status: row.status.parse().map_err(|e| decode_error("account", e))?,
            metadata: Metadata::from_json(row.metadata).map_err(|e| decode_error("account", e))?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct EntryRow {
    id: Uuid,
    entry_number: String,
    entry_type: String,
    status: String,
    description: String,
    reference_type: Option<String>,
    reference_id: Option<String>,
    posted_at: Option<DateTime<Utc>>,
    posted_by: Option<Uuid>,
    voided_at: Option<DateTime<Utc>>,
    voided_by: Option<Uuid>,
    void_reason: Option<String>,
    reversal_entry_id: Option<Uuid>,
    reverses_entry_id: Option<Uuid>,
    metadata: serde_json::Value,
    created_by: Option<Uuid>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for EntryRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(EntryRow {
            id: row.try_get("id")?,
            entry_number: row.try_get("entry_number")?,
            entry_type: row.try_get("entry_type")?,
            status: row.try_get("status")?,
            description: row.try_get("description")?,
            reference_type: row.try_get("reference_type")?,
            reference_id: row.try_get("reference_id")?,
            posted_at: row.try_get("posted_at")?,
            posted_by: row.try_get("posted_by")?,
            voided_at: row.try_get("voided_at")?,
            voided_by: row.try_get("voided_by")?,
            void_reason: row.try_get("void_reason")?,
            reversal_entry_id: row.try_get("reversal_entry_id")?,
            reverses_entry_id: row.try_get("reverses_entry_id")?,
            metadata: row.try_get("metadata")?,
            created_by: row.try_get("created_by")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<EntryRow> for JournalEntry {
    type Error = LedgerError;

    fn try_from(row: EntryRow) -> Result<Self, Self::Error> {
        Ok(JournalEntry {
            id: EntryId::from_uuid(row.id),
            entry_number: row.entry_number,
            entry_type: row.entry_type.parse().map_err(|e| decode_error("journal_entry", e))?,
            status: row.status.parse().map_err(|e| decode_error("journal_entry", e))?,
            description: row.description,
            reference_type: row.reference_type,
            reference_id: row.reference_id,
            posted_at: row.posted_at,
            posted_by: row.posted_by.map(UserId::from_uuid),
            voided_at: row.voided_at,
            voided_by: row.voided_by.map(UserId::from_uuid),
            void_reason: row.void_reason,
            reversal_entry_id: row.reversal_entry_id.map(EntryId::from_uuid),
            reverses_entry_id: row.reverses_entry_id.map(EntryId::from_uuid),
            metadata: Metadata::from_json(row.metadata).map_err(|e| decode_error("journal_entry", e))?,
            created_by: row.created_by.map(UserId::from_uuid),
            created_at: row.created_at,
            updated_at: row.updated_at,
            lines: Vec::new(),
        })
    }
}

#[derive(Debug)]
struct LineRow {
    id: Uuid,
    entry_id: Uuid,
    line_number: i32,
    account_id: Uuid,
    debit_amount: i64,
    credit_amount: i64,
    description: Option<String>,
    metadata: serde_json::Value,
}

impl<'r> FromRow<'r, PgRow> for LineRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LineRow {
            id: row.try_get("id")?,
            entry_id: row.try_get("entry_id")?,
            line_number: row.try_get("line_number")?,
            account_id: row.try_get("account_id")?,
            debit_amount: row.try_get("debit_amount")?,
            credit_amount: row.try_get("credit_amount")?,
            description: row.try_get("description")?,
            metadata: row.try_get("metadata")?,
        })
    }
}

impl TryFrom<LineRow> for LedgerLine {
    type Error = LedgerError;

    fn try_from(row: LineRow) -> Result<Self, Self::Error> {
        Ok(LedgerLine {
            id: LineId::from_uuid(row.id),
            entry_id: EntryId::from_uuid(row.entry_id),
            line_number: u32::try_from(row.line_number).map_err(|e| decode_error("ledger_line", e))?,
            account_id: AccountId::from_uuid(row.account_id),
            debit_amount: row.debit_amount,
            credit_amount: row.credit_amount,
            description: row.description,
            metadata: Metadata::from_json(row.metadata).map_err(|e| decode_error("ledger_line", e))?,
        })
    }
}

#[derive(Debug)]
struct WalletRow {
    id: Uuid,
    user_id: Uuid,
    wallet_type: String,
    currency: String,
    balance: i64,
    available_balance: i64,
    status: String,
    ledger_account_id: Uuid,
    frozen_reason: Option<String>,
    closed_at: Option<DateTime<Utc>>,
    closed_reason: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for WalletRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(WalletRow {
            id: row.try_get("id")?,
            user_id: row.try_get("user_id")?,
            wallet_type: row.try_get("wallet_type")?,
            currency: row.try_get("currency")?,
            balance: row.try_get("balance")?,
            available_balance: row.try_get("available_balance")?,
            status: row.try_get("status")?,
            ledger_account_id: row.try_get("ledger_account_id")?,
            frozen_reason: row.try_get("frozen_reason")?,
            closed_at: row.try_get("closed_at")?,
            closed_reason: row.try_get("closed_reason")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

impl TryFrom<WalletRow> for Wallet {
    type Error = LedgerError;

    fn try_from(row: WalletRow) -> Result<Self, Self::Error> {
        Ok(Wallet {
            id: WalletId::from_uuid(row.id),
            user_id: UserId::from_uuid(row.user_id),
            wallet_type: row.wallet_type.parse().map_err(|e| decode_error("wallet", e))?,
            currency: Currency::parse(&row.currency).map_err(|e| decode_error("wallet", e))?,
            balance: row.balance,
            available_balance: row.available_balance,
            status: row.status.parse().map_err(|e| decode_error("wallet", e))?,
            ledger_account_id: AccountId::from_uuid(row.ledger_account_id),
            frozen_reason: row.frozen_reason,
            closed_at: row.closed_at,
            closed_reason: row.closed_reason,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug)]
struct LimitsRow {
    wallet_id: Uuid,
    daily_limit: i64,
    daily_spent: i64,
    daily_reset_at: DateTime<Utc>,
    monthly_limit: i64,
    monthly_spent: i64,
    monthly_reset_at: DateTime<Utc>,
}

impl<'r> FromRow<'r, PgRow> for LimitsRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(LimitsRow {
            wallet_id: row.try_get("wallet_id")?,
            daily_limit: row.try_get("daily_limit")?,
            daily_spent: row.try_get("daily_spent")?,
            daily_reset_at: row.try_get("daily_reset_at")?,
            monthly_limit: row.try_get("monthly_limit")?,
            monthly_spent: row.try_get("monthly_spent")?,
            monthly_reset_at: row.try_get("monthly_reset_at")?,
        })
    }
}

impl From<LimitsRow> for WalletLimits {
    fn from(row: LimitsRow) -> Self {
        WalletLimits {
            wallet_id: WalletId::from_uuid(row.wallet_id),
            daily_limit: row.daily_limit,
            daily_spent: row.daily_spent,
            daily_reset_at: row.daily_reset_at,
            monthly_limit: row.monthly_limit,
            monthly_spent: row.monthly_spent,
            monthly_reset_at: row.monthly_reset_at,
        }
    }
}

#[derive(Debug)]
struct OutboxRow {
    id: Uuid,
    topic: String,
    version: i32,
    aggregate_id: Uuid,
    occurred_at: DateTime<Utc>,
    payload: serde_json::Value,
    created_at: DateTime<Utc>,
    published_at: Option<DateTime<Utc>>,
}

impl<'r> FromRow<'r, PgRow> for OutboxRow {
    fn from_row(row: &'r PgRow) -> Result<Self, sqlx::Error> {
        Ok(OutboxRow {
            id: row.try_get("id")?,
            topic: row.try_get("topic")?,
            version: row.try_get("version")?,
            aggregate_id: row.try_get("aggregate_id")?,
            occurred_at: row.try_get("occurred_at")?,
            payload: row.try_get("payload")?,
            created_at: row.try_get("created_at")?,
            published_at: row.try_get("published_at")?,
        })
    }
}

impl From<OutboxRow> for OutboxMessage {
    fn from(row: OutboxRow) -> Self {
        OutboxMessage {
            envelope: EventEnvelope::new(
                row.id,
                row.topic,
                row.version.max(0) as u32,
                row.aggregate_id,
                row.occurred_at,
                row.payload,
            ),
            created_at: row.created_at,
            published_at: row.published_at,
        }
    }
}
