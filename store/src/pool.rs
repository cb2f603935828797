//! Postgres connection pool setup (spec §5, SPEC_FULL.md §5 ambient stack).

use sqlx::postgres::{PgPoolOptions, PgConnectOptions};
use sqlx::ConnectOptions;
use std::str::FromStr;
use std::time::Duration;

/// Build the shared pool for one agent process: steady-state 10
/// connections, headroom to 30 (spec's "max overflow 20" realised as a flat
/// ceiling since sqlx doesn't distinguish core/overflow pools), idle
/// connections recycled after 1 hour, and a `before_acquire` ping
/// implementing `pool_pre_ping`.
pub async fn connect(database_url: &str) -> Result<sqlx::PgPool, sqlx::Error> {
    let connect_options = PgConnectOptions::from_str(database_url)?.disable_statement_logging();

    PgPoolOptions::new()
        .max_connections(30)
        .min_connections(0)
        .idle_timeout(Duration::from_secs(3600))
        .before_acquire(|conn, _meta| {
            Box::pin(async move {
                use sqlx::Executor;
                conn.execute("SELECT 1").await?;
                Ok(true)
            })
        })
        .connect_with(connect_options)
        .await
}

/// Run pending migrations. Every agent calls this at boot; guards in the
/// `.sql` files make concurrent first-boots safe.
pub async fn migrate(pool: &sqlx::PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await
}
