use std::time::Duration;

use anyhow::Result;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};
use sqlx::PgPool;
use tokio::sync::RwLock;
use tracing::info;

use genielytics_core::config::{Config, DatabaseConfig};

use crate::schema::INIT_SQL;

/// Credential context for a managed (host/port/token) connection.
///
/// Absent on URL-connected backends (integration tests), which have no
/// credential to rotate.
struct ManagedCredential {
    database: DatabaseConfig,
    timezone: String,
    active_token: RwLock<String>,
}

/// A PostgreSQL backend for Genielytics.
///
/// The pool lives behind an `RwLock` so the credential refresh loop can swap
/// in a freshly-authenticated pool without interrupting in-flight handlers:
/// readers clone the current `PgPool` (cheap, it is an `Arc` internally) and
/// keep using it even while a swap happens.
pub struct PgBackend {
    pool: RwLock<PgPool>,
    managed: Option<ManagedCredential>,
}

impl PgBackend {
    /// Connect using the configured host/port/database/user and the resolved
    /// OAuth-token credential, then run the idempotent schema init.
    ///
    /// The database session TimeZone is set from `config.timezone` on every
    /// pooled connection; it drives calendar-date truncation in the views.
    pub async fn connect(config: &Config) -> Result<Self> {
        let token = config
            .database
            .credential
            .resolve()
            .map_err(anyhow::Error::msg)?;
        let timezone = config.timezone.name().to_string();
        let pool = build_pool(&config.database, &timezone, &token).await?;
        sqlx::raw_sql(INIT_SQL).execute(&pool).await?;
        info!(
            host = %config.database.host,
            database = %config.database.name,
            timezone = %timezone,
            "PostgreSQL ready, schema initialised"
        );
        Ok(Self {
            pool: RwLock::new(pool),
            managed: Some(ManagedCredential {
                database: config.database.clone(),
                timezone,
                active_token: RwLock::new(token),
            }),
        })
    }

    /// Connect to an explicit URL and run the schema init.
    ///
    /// Intended for integration tests against a local database; credential
    /// refresh is a no-op on a backend created this way.
    pub async fn connect_url(url: &str) -> Result<Self> {
        let opts: PgConnectOptions = url.parse()?;
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect_with(opts)
            .await?;
        sqlx::raw_sql(INIT_SQL).execute(&pool).await?;
        Ok(Self {
            pool: RwLock::new(pool),
            managed: None,
        })
    }

    /// Snapshot the current pool for a query.
    pub(crate) async fn pool(&self) -> PgPool {
        self.pool.read().await.clone()
    }

    /// Snapshot the current pool for direct queries.
    ///
    /// Intended for integration tests that need to verify or reset stored
    /// data. Production code should use the typed methods on this struct.
    pub async fn pool_for_test(&self) -> PgPool {
        self.pool().await
    }

    /// Execute `SELECT 1` as a lightweight liveness check.
    ///
    /// Called by the `/health` endpoint. Returns an error when the database
    /// is unreachable or the credential has expired server-side.
    pub async fn ping(&self) -> Result<()> {
        let pool = self.pool().await;
        sqlx::query("SELECT 1").execute(&pool).await?;
        Ok(())
    }

    /// Re-resolve the credential source and, when the token has rotated,
    /// build and verify a new pool, swap it in, and close the old one.
    ///
    /// Returns `true` when a swap happened. A failed rotation keeps the last
    /// working pool — the caller logs and retries on the next cycle.
    pub async fn refresh_credential(&self) -> Result<bool> {
        let Some(managed) = &self.managed else {
            return Ok(false);
        };

        let token = managed
            .database
            .credential
            .resolve()
            .map_err(anyhow::Error::msg)?;
        {
            let active = managed.active_token.read().await;
            if *active == token {
                return Ok(false);
            }
        }

        let fresh = build_pool(&managed.database, &managed.timezone, &token).await?;
        sqlx::query("SELECT 1").execute(&fresh).await?;

        let stale = {
            let mut guard = self.pool.write().await;
            std::mem::replace(&mut *guard, fresh)
        };
        *managed.active_token.write().await = token;
        stale.close().await;
        info!("database credential rotated; connection pool replaced");
        Ok(true)
    }
}

async fn build_pool(db: &DatabaseConfig, timezone: &str, token: &str) -> Result<PgPool> {
    // The OAuth token rides in the password slot; the server side treats it
    // as a bearer credential, so TLS is non-negotiable.
    let opts = PgConnectOptions::new()
        .host(&db.host)
        .port(db.port)
        .database(&db.name)
        .username(&db.user)
        .password(token)
        .ssl_mode(PgSslMode::Require)
        .options([("TimeZone", timezone)]);

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(Duration::from_secs(10))
        .connect_with(opts)
        .await?;
    Ok(pool)
}
