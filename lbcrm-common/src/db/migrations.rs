//! Versioned migrations for the local mirror
//!
//! Applied versions are recorded in `schema_version`. Column additions are
//! left to schema sync; a migration covers what sync cannot express.
//! Existing entries are never edited: append a new one and keep each
//! statement safe to run twice.

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// One schema step
struct Migration {
    version: i32,
    description: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "index sales by customer",
        sql: "CREATE INDEX IF NOT EXISTS idx_vendas_cliente_id ON vendas(cliente_id)",
    },
    Migration {
        version: 2,
        description: "index last purchases by category",
        sql: "CREATE INDEX IF NOT EXISTS idx_ultima_compra_categoria ON ultima_compra(categoria_tempo)",
    },
];

/// Version reached once every migration has run
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

pub async fn create_schema_version_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        "CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        )",
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Highest applied version, 0 for a fresh file
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let tracked: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name = 'schema_version'",
    )
    .fetch_one(pool)
    .await?;
    if tracked == 0 {
        return Ok(0);
    }

    let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
        .fetch_one(pool)
        .await?;
    Ok(version.unwrap_or(0))
}

/// Apply every migration newer than the recorded version
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    create_schema_version_table(pool).await?;
    let current = get_schema_version(pool).await?;

    if current > CURRENT_SCHEMA_VERSION {
        warn!(
            "Mirror schema v{} is newer than this build (v{})",
            current, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    for migration in MIGRATIONS.iter().filter(|m| m.version > current) {
        sqlx::query(migration.sql).execute(pool).await?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(migration.version)
            .execute(pool)
            .await?;
        info!("Migration v{} applied: {}", migration.version, migration.description);
    }

    info!("Mirror schema at v{}", CURRENT_SCHEMA_VERSION);
    Ok(())
}
