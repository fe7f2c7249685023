use std::sync::Arc;

use tracing::{error, info};

use genielytics_core::config::Config;
use genielytics_postgres::PgBackend;

/// Background loop: re-resolve the database credential on the dashboard
/// refresh cadence and swap the connection pool when the token has rotated.
///
/// Spawned as a `tokio::spawn` task in `main.rs`. A failed refresh keeps the
/// last working pool — in-flight queries are unaffected and the next tick
/// retries.
pub async fn run_credential_refresh_loop(db: Arc<PgBackend>, config: Arc<Config>) {
    let mut ticker = tokio::time::interval(config.refresh_interval());
    // The first tick fires immediately; skip it, the pool was just built.
    ticker.tick().await;
    loop {
        ticker.tick().await;
        match db.refresh_credential().await {
            Ok(true) => info!("database credential refreshed"),
            Ok(false) => {}
            Err(e) => error!(error = %e, "credential refresh failed — keeping current pool"),
        }
    }
}
