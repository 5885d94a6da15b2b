//! Video queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tenx_common::db::{format_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use tenx_common::Result;
use uuid::Uuid;

use super::like_pattern;
use crate::models::Video;

const VIDEO_COLUMNS: &str = "id, title, description, url, youtube_id, thumbnail_url, category, \
     card_feature_id, created_by, created_at, updated_at";

const VIDEO_FILTER: &str = r#"
    WHERE (? IS NULL OR LOWER(title) LIKE ? ESCAPE '\' OR LOWER(description) LIKE ? ESCAPE '\')
      AND (? IS NULL OR LOWER(category) = ?)
"#;

fn video_from_row(row: &SqliteRow) -> Result<Video> {
    Ok(Video {
        id: parse_uuid(row.get("id"))?,
        title: row.get("title"),
        description: row.get("description"),
        url: row.get("url"),
        youtube_id: row.get("youtube_id"),
        thumbnail_url: row.get("thumbnail_url"),
        category: row.get("category"),
        card_feature_id: parse_optional_uuid(row.get("card_feature_id"))?,
        created_by: parse_optional_uuid(row.get("created_by"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

pub async fn insert_video(pool: &SqlitePool, video: &Video) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO videos (
            id, title, description, url, youtube_id, thumbnail_url, category,
            card_feature_id, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(video.id.to_string())
    .bind(&video.title)
    .bind(&video.description)
    .bind(&video.url)
    .bind(&video.youtube_id)
    .bind(&video.thumbnail_url)
    .bind(&video.category)
    .bind(video.card_feature_id.map(|id| id.to_string()))
    .bind(video.created_by.map(|id| id.to_string()))
    .bind(format_timestamp(video.created_at))
    .bind(format_timestamp(video.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get_video(pool: &SqlitePool, id: Uuid) -> Result<Option<Video>> {
    let row = sqlx::query(&format!("SELECT {} FROM videos WHERE id = ?", VIDEO_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(video_from_row).transpose()
}

pub async fn update_video(pool: &SqlitePool, video: &Video) -> Result<()> {
    sqlx::query(
        r#"
        UPDATE videos
        SET title = ?, description = ?, url = ?, youtube_id = ?, thumbnail_url = ?,
            category = ?, card_feature_id = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&video.title)
    .bind(&video.description)
    .bind(&video.url)
    .bind(&video.youtube_id)
    .bind(&video.thumbnail_url)
    .bind(&video.category)
    .bind(video.card_feature_id.map(|id| id.to_string()))
    .bind(format_timestamp(video.updated_at))
    .bind(video.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_video(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM videos WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Videos matching the filters, newest first
pub async fn list_videos(
    pool: &SqlitePool,
    search: Option<&str>,
    category: Option<&str>,
    limit: i64,
    offset: i64,
) -> Result<Vec<Video>> {
    let pattern = search.map(like_pattern);
    let category = category.map(|c| c.trim().to_lowercase());

    let rows = sqlx::query(&format!(
        "SELECT {} FROM videos {} ORDER BY created_at DESC, id LIMIT ? OFFSET ?",
        VIDEO_COLUMNS, VIDEO_FILTER
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

    rows.iter().map(video_from_row).collect()
}

pub async fn count_videos(pool: &SqlitePool, search: Option<&str>, category: Option<&str>) -> Result<i64> {
    let pattern = search.map(like_pattern);
    let category = category.map(|c| c.trim().to_lowercase());

    let count: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM videos {}", VIDEO_FILTER))
        .bind(search)
        .bind(&pattern)
        .bind(&pattern)
        .bind(&category)
        .bind(&category)
        .fetch_one(pool)
        .await?;
    Ok(count)
}
