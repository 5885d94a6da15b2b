//! Template queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tenx_common::db::{format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use tenx_common::Result;
use uuid::Uuid;

use super::{from_json_column, like_pattern};
use crate::models::Template;

const TEMPLATE_COLUMNS: &str =
    "id, name, description, category, tags, github_url, zip_url, created_by, created_at, updated_at";

const TEMPLATE_FILTER: &str = r#"
    WHERE (? IS NULL OR LOWER(name) LIKE ? ESCAPE '\' OR LOWER(description) LIKE ? ESCAPE '\')
      AND (? IS NULL OR LOWER(category) = ?)
"#;

fn template_from_row(row: &SqliteRow) -> Result<Template> {
    Ok(Template {
        id: parse_uuid(row.get("id"))?,
        name: row.get("name"),
        description: row.get("description"),
        category: row.get("category"),
        tags: from_json_column("tags", row.get("tags"))?,
        github_url: row.get("github_url"),
        zip_url: row.get("zip_url"),
        created_by: parse_optional_uuid(row.get("created_by"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

pub async fn insert_template(pool: &SqlitePool, template: &Template) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO templates (
            id, name, description, category, tags, github_url, zip_url,
            created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(template.id.to_string())
    .bind(&template.name)
    .bind(&template.description)
    .bind(&template.category)
    .bind(serde_json::to_string(&template.tags)?)
    .bind(&template.github_url)
    .bind(&template.zip_url)
    .bind(template.created_by.map(|id| id.to_string()))
    .bind(format_timestamp(template.created_at))
    .bind(format_timestamp(template.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_template(pool: &SqlitePool, id: Uuid) -> Result<Option<Template>> {
    let row = sqlx::query(&format!("SELECT {} FROM templates WHERE id = ?", TEMPLATE_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(template_from_row).transpose()
}

pub async fn update_template(pool: &SqlitePool, template: &Template) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE templates
        SET name = ?, description = ?, category = ?, tags = ?, github_url = ?,
            zip_url = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&template.name)
    .bind(&template.description)
    .bind(&template.category)
    .bind(serde_json::to_string(&template.tags)?)
    .bind(&template.github_url)
    .bind(&template.zip_url)
    .bind(format_timestamp(template.updated_at))
    .bind(template.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_template(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM templates WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Templates matching the filters, alphabetical by name
pub async fn list_templates(
    pool: &SqlitePool,
    search: Option<&str>,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Template>> {
    let pattern = search.map(like_pattern);
    let category = category.map(|c| c.trim().to_lowercase());

    let rows = sqlx::query(&format!(
        "SELECT {} FROM templates {} ORDER BY LOWER(name), id LIMIT ? OFFSET ?",
        TEMPLATE_COLUMNS, TEMPLATE_FILTER
    ))
    .bind(search)
    .bind(&pattern)
    .bind(&pattern)
    .bind(&category)
    .bind(&category)
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(template_from_row).collect()
}

pub async fn count_templates(pool: &SqlitePool, search: Option<&str>, category: Option<&str>) -> Result<i64> {
    let pattern = search.map(like_pattern);
    let category = category.map(|c| c.trim().to_lowercase());

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM templates {}", TEMPLATE_FILTER))
        .bind(search)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&category)
        .bind(&category)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
