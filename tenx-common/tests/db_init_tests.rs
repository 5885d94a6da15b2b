//! Database initialization tests
//!
//! Automatic creation of the database file and schema on first run, and
//! reopening an existing database without data loss.

use tenx_common::db::{get_schema_version, init_database, CURRENT_SCHEMA_VERSION};

const TABLES: &[&str] = &[
    "users",
    "card_features",
    "videos",
    "projects",
    "project_members",
    "project_cards",
    "templates",
    "import_jobs",
    "schema_version",
];

#[tokio::test]
async fn test_database_creation_when_missing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("nested").join("tenx.db");

    let pool = init_database(&db_path).await.expect("init database");
    assert!(db_path.exists(), "Database file was not created");

    for table in TABLES {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=?)",
        )
        .bind(table)
        .fetch_one(&pool)
        .await
        .unwrap();
        assert!(exists, "table {} missing", table);
    }

    assert_eq!(get_schema_version(&pool).await.unwrap(), CURRENT_SCHEMA_VERSION);
}

#[tokio::test]
async fn test_database_opens_existing() {
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("tenx.db");

    {
        let pool = init_database(&db_path).await.unwrap();
        sqlx::query(
            "INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
             VALUES ('u1', 'a@example.com', 'A', 'x', 'user', '2024-01-01T00:00:00.000000Z', '2024-01-01T00:00:00.000000Z')",
        )
        .execute(&pool)
        .await
        .unwrap();
        pool.close().await;
    }

    let pool = init_database(&db_path).await.unwrap();
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "existing rows must survive reopening");
}

#[tokio::test]
async fn test_foreign_keys_enforced() {
    let dir = tempfile::tempdir().unwrap();
    let pool = init_database(&dir.path().join("tenx.db")).await.unwrap();

    let result = sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role, added_at)
         VALUES ('missing-project', 'missing-user', 'owner', '2024-01-01T00:00:00.000000Z')",
    )
    .execute(&pool)
    .await;
    assert!(result.is_err(), "dangling references must be rejected");
}
