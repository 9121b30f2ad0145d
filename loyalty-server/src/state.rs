//! Shared application state, built once at startup

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::accrual::{AccrualClient, AccrualSource};
use crate::config::{BoxError, Config};
use crate::db::{LoyaltyStore, PgStore};
use crate::reconcile::{ReconcileConfig, ReconciliationWorker};

pub type Worker = ReconciliationWorker<dyn LoyaltyStore, dyn AccrualSource>;

/// Context handed to every component
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn LoyaltyStore>,
    pub accrual: Arc<dyn AccrualSource>,
    pub reconcile: ReconcileConfig,
}

impl AppState {
    /// Connect to Postgres, verify the connection and apply migrations.
    ///
    /// Any failure here is fatal for the process.
    pub async fn new(config: &Config) -> Result<Self, BoxError> {
        let pool = connect(config).await?;
        sqlx::migrate!("./migrations").run(&pool).await?;

        let store = PgStore::new(pool).with_debit_attempts(config.debit_max_attempts);
        let accrual = AccrualClient::new(&config.accrual_address, config.accrual_request_timeout)?;

        Ok(Self::from_parts(
            Arc::new(store),
            Arc::new(accrual),
            config.reconcile_config(),
        ))
    }

    /// Assemble from already-built components (alternate backends, tests).
    pub fn from_parts(
        store: Arc<dyn LoyaltyStore>,
        accrual: Arc<dyn AccrualSource>,
        reconcile: ReconcileConfig,
    ) -> Self {
        Self {
            store,
            accrual,
            reconcile,
        }
    }

    pub fn reconciliation_worker(&self, shutdown: CancellationToken) -> Worker {
        ReconciliationWorker::new(
            self.store.clone(),
            self.accrual.clone(),
            self.reconcile.clone(),
            shutdown,
        )
    }
}

async fn connect(config: &Config) -> Result<PgPool, BoxError> {
    let connecting = PgPoolOptions::new()
        .max_connections(config.db_max_connections)
        .acquire_timeout(config.db_connect_timeout)
        .connect(&config.database_url);

    let pool = tokio::time::timeout(config.db_connect_timeout, connecting)
        .await
        .map_err(|_| {
            format!(
                "timed out connecting to the database after {}s",
                config.db_connect_timeout.as_secs()
            )
        })??;

    sqlx::query("SELECT 1").execute(&pool).await?;
    tracing::info!(
        max_connections = config.db_max_connections,
        "Database connection established"
    );
    Ok(pool)
}
