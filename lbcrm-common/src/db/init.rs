//! Local mirror initialization
//!
//! Opens (creating if needed) the SQLite mirror of the hosted tables and
//! brings its schema up to date.

use crate::db::migrations::run_migrations;
use crate::db::table_schemas::{create_all_tables, sync_all_table_schemas};
use crate::Result;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::time::Duration;
use tracing::info;

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Open the mirror database at `db_path` and prepare its schema
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    // Pragmas are per connection, so they go on the connect options
    let options = SqliteConnectOptions::new()
        .filename(db_path)
        .create_if_missing(true)
        .foreign_keys(true)
        .busy_timeout(BUSY_TIMEOUT);
    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    prepare_schema(&pool).await?;

    Ok(pool)
}

/// Create missing tables, add missing columns, then run versioned migrations
///
/// Idempotent; safe to call on every startup.
pub async fn prepare_schema(pool: &SqlitePool) -> Result<()> {
    // Phase 1: CREATE TABLE IF NOT EXISTS
    create_all_tables(pool).await?;

    // Phase 2: add columns missing from older mirrors
    sync_all_table_schemas(pool).await?;

    // Phase 3: versioned migrations
    run_migrations(pool).await?;

    Ok(())
}
