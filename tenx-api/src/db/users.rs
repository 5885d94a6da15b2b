//! User account queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tenx_common::auth::Role;
use tenx_common::db::{format_timestamp, now_timestamp, parse_timestamp, parse_uuid};
use tenx_common::{Error, Result};
use uuid::Uuid;

use super::like_pattern;
use crate::models::User;

const USER_COLUMNS: &str = "id, email, name, role, created_at, updated_at";

fn user_from_row(row: &SqliteRow) -> Result<User> {
    let role: String = row.get("role");
    Ok(User {
        id: parse_uuid(row.get("id"))?,
        email: row.get("email"),
        name: row.get("name"),
        role: Role::parse(&role)
            .ok_or_else(|| Error::Internal(format!("Invalid stored role '{}'", role)))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

/// Insert a new account
///
/// A duplicate email surfaces as a unique-constraint database error.
pub async fn insert_user(pool: &SqlitePool, user: &User, password_hash: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO users (id, email, name, password_hash, role, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(user.id.to_string())
    .bind(&user.email)
    .bind(&user.name)
    .bind(password_hash)
    .bind(user.role.as_str())
    .bind(format_timestamp(user.created_at))
    .bind(format_timestamp(user.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_user(pool: &SqlitePool, id: Uuid) -> Result<Option<User>> {
    let row = sqlx::query(&format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(user_from_row).transpose()
}

/// Account and its password hash, for login
pub async fn get_user_with_hash(pool: &SqlitePool, email: &str) -> Result<Option<(User, String)>> {
    let row = sqlx::query(&format!(
        "SELECT {}, password_hash FROM users WHERE email = ?",
        USER_COLUMNS
    ))
    .bind(email)
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let user = user_from_row(&row)?;
            Ok(Some((user, row.get("password_hash"))))
        }
        None => Ok(None),
    }
}

pub async fn get_user_by_email(pool: &SqlitePool, email: &str) -> Result<Option<User>> {
    Ok(get_user_with_hash(pool, email).await?.map(|(user, _)| user))
}

pub async fn email_exists(pool: &SqlitePool, email: &str) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM users WHERE email = ?)")
        .bind(email)
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Update name and/or password hash; returns the updated account
pub async fn update_profile(
    pool: &SqlitePool,
    id: Uuid,
    name: Option<&str>,
    password_hash: Option<&str>,
) -> Result<Option<User>> {
    sqlx::query(
        r#"
        UPDATE users
        SET name = COALESCE(?, name),
            password_hash = COALESCE(?, password_hash),
            updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(name)
    .bind(password_hash)
    .bind(now_timestamp())
    .bind(id.to_string())
    .execute(pool)
    .await?;

    get_user(pool, id).await
}

pub async fn set_role(pool: &SqlitePool, id: Uuid, role: Role) -> Result<Option<User>> {
    let result = sqlx::query("UPDATE users SET role = ?, updated_at = ? WHERE id = ?")
        .bind(role.as_str())
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_user(pool, id).await
}

/// Delete an account; returns whether it existed
///
/// Cards, videos, projects and templates keep existing with a NULL owner;
/// memberships and import jobs are removed.
pub async fn delete_user(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM users WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Accounts matching `search` (email or name), newest first
pub async fn list_users(
    pool: &SqlitePool,
    search: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<User>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM users
        WHERE (? IS NULL OR LOWER(email) LIKE ? ESCAPE '\' OR LOWER(name) LIKE ? ESCAPE '\')
        ORDER BY created_at DESC, id
        LIMIT ? OFFSET ?
        "#,
        USER_COLUMNS
    ))
    .bind(search)
    .bind(search.map(like_pattern))
    .bind(search.map(like_pattern))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(user_from_row).collect()
}

pub async fn count_users(pool: &SqlitePool, search: Option<&str>) -> Result<i64> {
    let count: i64 = sqlx::query_scalar(
        r#"
        SELECT COUNT(*) FROM users
        WHERE (? IS NULL OR LOWER(email) LIKE ? ESCAPE '\' OR LOWER(name) LIKE ? ESCAPE '\')
        "#,
    )
    .bind(search)
    .bind(search.map(like_pattern))
    .bind(search.map(like_pattern))
    .fetch_one(pool)
    .await?;
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use tenx_common::db::init_memory_database;

    fn user(email: &str, name: &str) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            email: email.to_string(),
            name: name.to_string(),
            role: Role::User,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let pool = init_memory_database().await.unwrap();
        let u = user("dev@example.com", "Dev");
        insert_user(&pool, &u, "hash").await.unwrap();

        let loaded = get_user(&pool, u.id).await.unwrap().unwrap();
        assert_eq!(loaded.email, "dev@example.com");

        let (_, hash) = get_user_with_hash(&pool, "dev@example.com").await.unwrap().unwrap();
        assert_eq!(hash, "hash");
        assert!(email_exists(&pool, "dev@example.com").await.unwrap());
    }

    #[tokio::test]
    async fn test_duplicate_email_is_unique_violation() {
        let pool = init_memory_database().await.unwrap();
        insert_user(&pool, &user("dup@example.com", "A"), "h").await.unwrap();
        let err = insert_user(&pool, &user("dup@example.com", "B"), "h").await.unwrap_err();
        match err {
            Error::Database(sqlx::Error::Database(db)) => assert!(db.is_unique_violation()),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_search_and_count() {
        let pool = init_memory_database().await.unwrap();
        insert_user(&pool, &user("alice@example.com", "Alice"), "h").await.unwrap();
        insert_user(&pool, &user("bob@example.com", "Bob_Smith"), "h").await.unwrap();

        assert_eq!(count_users(&pool, None).await.unwrap(), 2);
        assert_eq!(count_users(&pool, Some("ALICE")).await.unwrap(), 1);
        // Underscore is literal, not a wildcard
        assert_eq!(count_users(&pool, Some("b_s")).await.unwrap(), 1);
        assert_eq!(count_users(&pool, Some("o_s")).await.unwrap(), 0);

        let page = list_users(&pool, Some("bob"), 10, 0).await.unwrap();
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].name, "Bob_Smith");
    }

    #[tokio::test]
    async fn test_update_role_and_delete() {
        let pool = init_memory_database().await.unwrap();
        let u = user("x@example.com", "X");
        insert_user(&pool, &u, "h").await.unwrap();

        let updated = set_role(&pool, u.id, Role::Admin).await.unwrap().unwrap();
        assert_eq!(updated.role, Role::Admin);

        let renamed = update_profile(&pool, u.id, Some("Y"), None).await.unwrap().unwrap();
        assert_eq!(renamed.name, "Y");

        assert!(delete_user(&pool, u.id).await.unwrap());
        assert!(!delete_user(&pool, u.id).await.unwrap());
        assert!(set_role(&pool, u.id, Role::User).await.unwrap().is_none());
    }
}
