use std::sync::Arc;

use anyhow::Result;
use tracing::info;

use genielytics_server::state::AppState;

/// `genielytics health` — liveness probe for Docker HEALTHCHECK.
///
/// Calls `GET http://localhost:$GENIELYTICS_PORT/health`.
/// Exits 0 if the server responds with HTTP 200, exits 1 otherwise.
fn run_health_check() -> ! {
    let port = std::env::var("GENIELYTICS_PORT").unwrap_or_else(|_| "3000".to_string());
    let url = format!("http://localhost:{}/health", port);
    match ureq::get(&url).call() {
        Ok(resp) if resp.status() == 200 => std::process::exit(0),
        _ => std::process::exit(1),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Health-check subcommand — must be handled before tokio runtime work
    // so the binary stays small and fast when used as a Docker HEALTHCHECK
    // probe.
    let args: Vec<String> = std::env::args().collect();
    if args.get(1).map(|s| s.as_str()) == Some("health") {
        run_health_check();
    }

    // Initialise structured JSON logging. Level controlled via RUST_LOG.
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("genielytics=info".parse()?),
        )
        .json()
        .init();

    // Fails closed here when no database credential is available — before
    // any port is bound, with the offending variables named in the error.
    let cfg = genielytics_core::config::Config::from_env().map_err(|e| anyhow::anyhow!(e))?;

    // Connect and run the idempotent schema init (tables, indexes, comment
    // column migration, views).
    let db = Arc::new(genielytics_postgres::PgBackend::connect(&cfg).await?);

    let state = Arc::new(AppState::new(db.clone(), cfg.clone()));

    // Spawn the credential refresh loop on the dashboard cadence.
    {
        let db = Arc::clone(&db);
        let config = Arc::clone(&state.config);
        tokio::spawn(async move {
            genielytics_server::scheduler::run_credential_refresh_loop(db, config).await;
        });
    }

    let addr = format!("0.0.0.0:{}", cfg.port);
    let app = genielytics_server::app::build_app(Arc::clone(&state));

    info!(port = cfg.port, "Genielytics listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            tokio::signal::ctrl_c().await.ok();
        })
        .await?;

    Ok(())
}
