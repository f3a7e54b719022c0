//! Database connection pool using the OnceCell pattern.

use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tokio::sync::OnceCell;

use crate::config::Database;

static POOL: OnceCell<PgPool> = OnceCell::const_new();

/// Get or initialize the process-wide connection pool.
pub async fn get_pool(settings: &Database) -> Result<&'static PgPool, sqlx::Error> {
    POOL.get_or_try_init(|| async {
        tracing::info!(
            "Connecting to PostgreSQL at {}:{} (max {} connections)",
            settings.host,
            settings.port,
            settings.connections
        );
        PgPoolOptions::new()
            .max_connections(settings.connections)
            .connect(&settings.url())
            .await
    })
    .await
}

/// Apply the migrations embedded from `packages/api/migrations`.
pub async fn migrate(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
