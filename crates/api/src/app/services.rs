//! Service wiring: picks the store and builds the services shared by handlers.

use std::sync::Arc;
use std::time::Duration;

use neoledger_auth::RoleGraph;
use neoledger_core::{Currency, LedgerResult};
use neoledger_events::InMemoryEventBus;
use neoledger_infra::{AppConfig, InMemoryStore, LedgerService, PostgresStore, Store, WalletService, WalletSettings};

pub struct AppServices {
    pub store: Arc<dyn Store>,
    pub ledger: LedgerService,
    pub wallets: WalletService,
    pub roles: RoleGraph,
    /// Downstream fan-out for relayed outbox events.
    pub bus: Arc<InMemoryEventBus>,
    pub default_currency: Currency,
}

impl AppServices {
    pub fn new(store: Arc<dyn Store>, settings: WalletSettings, default_currency: Currency) -> Self {
        Self {
            ledger: LedgerService::new(store.clone()),
            wallets: WalletService::new(store.clone(), settings),
            store,
            roles: RoleGraph::standard(),
            bus: Arc::new(InMemoryEventBus::new()),
            default_currency,
        }
    }

    pub fn in_memory(settings: WalletSettings, default_currency: Currency, lock_timeout: Duration) -> Self {
        Self::new(Arc::new(InMemoryStore::new(lock_timeout)), settings, default_currency)
    }
}

/// Postgres (with migrations applied) when `DATABASE_URL` is set, otherwise
/// the in-memory store.
pub async fn build_services(config: &AppConfig) -> LedgerResult<AppServices> {
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let store = PostgresStore::connect(url, config.db_max_connections, config.lock_timeout).await?;
            store.migrate().await?;
            tracing::info!(max_connections = config.db_max_connections, "using postgres store");
            Arc::new(store)
        }
        None => {
            tracing::warn!("DATABASE_URL not set; using in-memory store (data is lost on restart)");
            Arc::new(InMemoryStore::new(config.lock_timeout))
        }
    };
    Ok(AppServices::new(store, config.wallet.clone(), config.default_currency.clone()))
}
