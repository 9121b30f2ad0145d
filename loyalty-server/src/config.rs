//! Loyalty server configuration

use std::time::Duration;

use crate::reconcile::ReconcileConfig;

pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Loyalty server configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// PostgreSQL connection URL (env: DATABASE_URI, falls back to DATABASE_URL)
    pub database_url: String,
    /// Base URL of the accrual service
    pub accrual_address: String,
    /// Address the HTTP layer binds to
    pub run_address: String,
    pub accrual_request_timeout: Duration,
    pub accrual_poll_interval: Duration,
    pub accrual_pass_retry: Duration,
    pub accrual_default_retry_after: Duration,
    pub accrual_max_retry_after: Duration,
    /// Serializable-debit attempts before the conflict is surfaced
    pub debit_max_attempts: u32,
    pub db_connect_timeout: Duration,
    pub db_max_connections: u32,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, BoxError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build from any key/value source; blank values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, BoxError> {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let parsed = |name: &str, default: u64| -> u64 {
            get(name)
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(default)
        };

        let database_url = get("DATABASE_URI")
            .or_else(|| get("DATABASE_URL"))
            .ok_or("DATABASE_URI must be set")?;
        let accrual_address =
            get("ACCRUAL_SYSTEM_ADDRESS").ok_or("ACCRUAL_SYSTEM_ADDRESS must be set")?;

        Ok(Self {
            database_url,
            accrual_address,
            run_address: get("RUN_ADDRESS").unwrap_or_else(|| "127.0.0.1:8080".into()),
            accrual_request_timeout: Duration::from_secs(parsed("ACCRUAL_REQUEST_TIMEOUT_SECS", 5)),
            accrual_poll_interval: Duration::from_millis(parsed("ACCRUAL_POLL_INTERVAL_MS", 1000)),
            accrual_pass_retry: Duration::from_secs(parsed("ACCRUAL_PASS_RETRY_SECS", 10)),
            accrual_default_retry_after: Duration::from_secs(parsed(
                "ACCRUAL_DEFAULT_RETRY_AFTER_SECS",
                60,
            )),
            accrual_max_retry_after: Duration::from_secs(parsed(
                "ACCRUAL_MAX_RETRY_AFTER_SECS",
                3600,
            )),
            debit_max_attempts: u32::try_from(parsed("DEBIT_MAX_ATTEMPTS", 3))
                .unwrap_or(3)
                .max(1),
            db_connect_timeout: Duration::from_secs(parsed("DB_CONNECT_TIMEOUT_SECS", 10)),
            db_max_connections: u32::try_from(parsed("DB_MAX_CONNECTIONS", 10))
                .unwrap_or(10)
                .max(1),
        })
    }

    pub fn reconcile_config(&self) -> ReconcileConfig {
        ReconcileConfig {
            poll_interval: self.accrual_poll_interval,
            pass_retry_delay: self.accrual_pass_retry,
            default_retry_after: self.accrual_default_retry_after,
            max_retry_after: self.accrual_max_retry_after,
            min_call_delay: Duration::ZERO,
        }
    }
}
