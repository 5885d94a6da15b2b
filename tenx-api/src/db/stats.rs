//! System-wide counts for the admin dashboard

use sqlx::{Row, SqlitePool};
use tenx_common::Result;

use crate::models::AdminStats;

async fn count(pool: &SqlitePool, sql: &str) -> Result<i64> {
    let n: i64 = sqlx::query_scalar(sql).fetch_one(pool).await?;
    Ok(n)
}

pub async fn admin_stats(pool: &SqlitePool) -> Result<AdminStats> {
    let mut stats = AdminStats {
        users: count(pool, "SELECT COUNT(*) FROM users").await?,
        admins: count(pool, "SELECT COUNT(*) FROM users WHERE role = 'admin'").await?,
        card_features: count(pool, "SELECT COUNT(*) FROM card_features").await?,
        videos: count(pool, "SELECT COUNT(*) FROM videos").await?,
        projects: count(pool, "SELECT COUNT(*) FROM projects").await?,
        templates: count(pool, "SELECT COUNT(*) FROM templates").await?,
        import_jobs_by_status: super::import_jobs::count_by_status(pool).await?,
        ..Default::default()
    };

    for status in ["pending", "approved", "rejected"] {
        stats.card_features_by_status.insert(status.to_string(), 0);
    }
    for row in sqlx::query("SELECT approval_status, COUNT(*) AS count FROM card_features GROUP BY approval_status")
        .fetch_all(pool)
        .await?
    {
        stats
            .card_features_by_status
            .insert(row.get("approval_status"), row.get("count"));
    }

    Ok(stats)
}
