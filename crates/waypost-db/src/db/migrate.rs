//! Embedded schema migrations.
//!
//! Migrations run once at startup. Diesel's migration bookkeeping keeps
//! the run idempotent: the first run creates the `redirect` table,
//! re-running with no pending migrations is a no-op.

use diesel::Connection;
use diesel_async::AsyncPgConnection;
use diesel_async::async_connection_wrapper::AsyncConnectionWrapper;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// ## Summary
/// Applies any pending embedded migrations against the given database.
///
/// Runs on a blocking thread because diesel's migration harness is
/// synchronous.
///
/// ## Errors
/// Returns an error if the connection cannot be established or a
/// migration fails to apply.
#[tracing::instrument(skip(database_url))]
pub async fn run_pending_migrations(database_url: &str) -> anyhow::Result<()> {
    let database_url = database_url.to_owned();

    tokio::task::spawn_blocking(move || {
        let mut conn: AsyncConnectionWrapper<AsyncPgConnection> =
            AsyncConnectionWrapper::establish(&database_url)?;

        let applied = conn
            .run_pending_migrations(MIGRATIONS)
            .map_err(|e| anyhow::anyhow!("Migration failed: {e}"))?;

        if applied.is_empty() {
            tracing::debug!("No pending migrations");
        } else {
            tracing::info!(count = applied.len(), "Applied pending migrations");
        }

        Ok::<_, anyhow::Error>(())
    })
    .await??;

    Ok(())
}
