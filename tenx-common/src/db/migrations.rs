//! Database schema migrations
//!
//! Versioned migrations tracked in the `schema_version` table. Tables are
//! created with their current shape by [`crate::db::init`]; migrations hold
//! everything that must also reach databases created by older builds.
//!
//! # Migration Guidelines
//!
//! 1. **Never modify existing migrations** - older databases depend on them
//! 2. **Always add new migrations** - one function per schema change
//! 3. **Keep them idempotent** - check before altering
//! 4. **Use ALTER TABLE** - prefer it over DROP/CREATE to preserve data

use crate::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

/// Current schema version
///
/// **IMPORTANT:** Increment this when adding new migrations
pub const CURRENT_SCHEMA_VERSION: i32 = 2;

/// Get current schema version from database
///
/// Returns 0 if schema_version table doesn't exist or has no rows
pub async fn get_schema_version(pool: &SqlitePool) -> Result<i32> {
    let table_exists: bool = sqlx::query_scalar(
        r#"
        SELECT EXISTS(
            SELECT 1 FROM sqlite_master
            WHERE type='table' AND name='schema_version'
        )
        "#,
    )
    .fetch_one(pool)
    .await?;

    if !table_exists {
        return Ok(0);
    }

    let version: Option<i32> =
        sqlx::query_scalar("SELECT version FROM schema_version ORDER BY version DESC LIMIT 1")
            .fetch_optional(pool)
            .await?;

    Ok(version.unwrap_or(0))
}

async fn set_schema_version(pool: &SqlitePool, version: i32) -> Result<()> {
    sqlx::query("INSERT OR IGNORE INTO schema_version (version) VALUES (?)")
        .bind(version)
        .execute(pool)
        .await?;

    Ok(())
}

/// Run all pending migrations
pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    let current_version = get_schema_version(pool).await?;

    if current_version == CURRENT_SCHEMA_VERSION {
        info!("Database schema is up to date (v{})", current_version);
        return Ok(());
    }

    if current_version > CURRENT_SCHEMA_VERSION {
        warn!(
            "Database schema version ({}) is newer than code version ({})",
            current_version, CURRENT_SCHEMA_VERSION
        );
        return Ok(());
    }

    info!(
        "Running database migrations: v{} -> v{}",
        current_version, CURRENT_SCHEMA_VERSION
    );

    if current_version < 1 {
        migrate_v1(pool).await?;
        set_schema_version(pool, 1).await?;
        info!("Migration v1 completed");
    }

    if current_version < 2 {
        migrate_v2(pool).await?;
        set_schema_version(pool, 2).await?;
        info!("Migration v2 completed");
    }

    Ok(())
}

/// Migration v1: listing indexes
async fn migrate_v1(pool: &SqlitePool) -> Result<()> {
    let statements = [
        "CREATE INDEX IF NOT EXISTS idx_card_features_created_by ON card_features(created_by)",
        "CREATE INDEX IF NOT EXISTS idx_card_features_listing ON card_features(visibility, approval_status, created_at)",
        "CREATE INDEX IF NOT EXISTS idx_card_features_tech ON card_features(tech)",
        "CREATE INDEX IF NOT EXISTS idx_videos_created_at ON videos(created_at)",
        "CREATE INDEX IF NOT EXISTS idx_project_members_user ON project_members(user_id)",
        "CREATE INDEX IF NOT EXISTS idx_templates_category ON templates(category)",
    ];

    for sql in statements {
        sqlx::query(sql).execute(pool).await?;
    }

    Ok(())
}

/// Migration v2: import job `error` column and per-user lookup index
///
/// Databases created before job failures were stored separately from the
/// progress message lack the `error` column.
async fn migrate_v2(pool: &SqlitePool) -> Result<()> {
    let has_column: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM pragma_table_info('import_jobs') WHERE name = 'error'",
    )
    .fetch_one(pool)
    .await?;

    if has_column == 0 {
        sqlx::query("ALTER TABLE import_jobs ADD COLUMN error TEXT")
            .execute(pool)
            .await?;
        info!("  Added error column to import_jobs table");
    }

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS idx_import_jobs_owner_status ON import_jobs(created_by, status)",
    )
    .execute(pool)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> SqlitePool {
        SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_get_schema_version_no_table() {
        let pool = setup_test_db().await;
        assert_eq!(get_schema_version(&pool).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_migrate_v2_adds_missing_error_column() {
        let pool = setup_test_db().await;

        // Table shape from before the error column existed
        sqlx::query(
            "CREATE TABLE import_jobs (id TEXT PRIMARY KEY, created_by TEXT, status TEXT NOT NULL)",
        )
        .execute(&pool)
        .await
        .unwrap();

        migrate_v2(&pool).await.unwrap();
        // Second run is a no-op
        migrate_v2(&pool).await.unwrap();

        let has_column: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM pragma_table_info('import_jobs') WHERE name = 'error'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(has_column, 1);
    }

    #[tokio::test]
    async fn test_run_migrations_complete_flow() {
        let pool = crate::db::init_memory_database().await.unwrap();
        assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);

        // Running again keeps the version and does not fail
        run_migrations(&pool).await.unwrap();
        let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_version")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(rows, CURRENT_SCHEMA_VERSION as i64);
    }
}
