//! Process configuration, read once from the environment at startup.

use std::net::SocketAddr;
use std::time::Duration;

use thiserror::Error;

use neoledger_core::Currency;

use crate::services::WalletSettings;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {name}: '{value}' ({reason})")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    /// Postgres connection string; `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    pub lock_timeout: Duration,
    pub default_currency: Currency,
    pub wallet: WalletSettings,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from an arbitrary variable source (tests pass a map).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let bind_addr = parse_or(get("BIND_ADDR"), "BIND_ADDR", SocketAddr::from(([0, 0, 0, 0], 8080)))?;
        let db_max_connections = parse_or(get("DB_MAX_CONNECTIONS"), "DB_MAX_CONNECTIONS", 10u32)?;
        if db_max_connections == 0 {
            return Err(invalid("DB_MAX_CONNECTIONS", "0", "must be at least 1"));
        }
        let lock_timeout_ms = parse_or(get("LOCK_TIMEOUT_MS"), "LOCK_TIMEOUT_MS", 3_000u64)?;
        let default_daily_limit = parse_or(get("DEFAULT_DAILY_LIMIT"), "DEFAULT_DAILY_LIMIT", 1_000_000i64)?;
        let default_monthly_limit = parse_or(get("DEFAULT_MONTHLY_LIMIT"), "DEFAULT_MONTHLY_LIMIT", 10_000_000i64)?;
        if default_daily_limit <= 0 || default_monthly_limit <= 0 {
            return Err(invalid(
                "DEFAULT_DAILY_LIMIT",
                &default_daily_limit.to_string(),
                "limits must be positive",
            ));
        }
        if default_daily_limit > default_monthly_limit {
            return Err(invalid(
                "DEFAULT_DAILY_LIMIT",
                &default_daily_limit.to_string(),
                "must not exceed DEFAULT_MONTHLY_LIMIT",
            ));
        }

        let currency_raw = get("DEFAULT_CURRENCY").unwrap_or_else(|| "INR".to_string());
        let default_currency =
            Currency::parse(&currency_raw).map_err(|e| invalid("DEFAULT_CURRENCY", &currency_raw, &e.to_string()))?;

        Ok(Self {
            bind_addr,
            database_url: get("DATABASE_URL"),
            db_max_connections,
            lock_timeout: Duration::from_millis(lock_timeout_ms),
            default_currency,
            wallet: WalletSettings {
                default_daily_limit,
                default_monthly_limit,
                settlement_account_code: get("SETTLEMENT_ACCOUNT_CODE").unwrap_or_else(|| "1000".to_string()),
            },
        })
    }
}

fn invalid(name: &'static str, value: &str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

fn parse_or<T>(raw: Option<String>, name: &'static str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        None => Ok(default),
        Some(value) => value.parse().map_err(|e: T::Err| invalid(name, &value, &e.to_string())),
    }
}
