//! loyalty-server: runs the accrual reconciliation worker against Postgres

use loyalty_server::config::BoxError;
use loyalty_server::{AppState, Config};
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    // Load .env file
    let _ = dotenvy::dotenv();

    init_tracing();

    let config = Config::from_env()?;
    tracing::info!(
        accrual = %config.accrual_address,
        run_address = %config.run_address,
        "Starting loyalty-server"
    );

    let state = match AppState::new(&config).await {
        Ok(state) => state,
        Err(e) => {
            tracing::error!(error = %e, "Failed to initialize storage");
            return Err(e);
        }
    };

    let shutdown = CancellationToken::new();
    let worker = tokio::spawn(state.reconciliation_worker(shutdown.clone()).run());

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown signal received");
    shutdown.cancel();

    if let Err(e) = worker.await {
        tracing::error!(error = %e, "Reconciliation worker panicked");
    }
    Ok(())
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "loyalty_server=info,shared=info,sqlx=warn".into());

    let json = std::env::var("LOG_FORMAT").is_ok_and(|v| v.eq_ignore_ascii_case("json"));
    if json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}
