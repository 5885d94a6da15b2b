//! Card feature queries

use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use tenx_common::db::{format_timestamp, now_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use tenx_common::{Error, Result};
use uuid::Uuid;

use super::{from_json_column, like_pattern};
use crate::models::card_feature::{CardTypeCount, TechCount};
use crate::models::{ApprovalStatus, CardFeature, CardFeatureStats, CardType, Visibility};

pub(crate) const CARD_COLUMNS: &str = "id, title, tech, language, description, card_type, visibility, \
     approval_status, screens, tags, created_by, created_at, updated_at";

/// Which cards a listing may return
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListScope {
    /// Public and approved only
    Public,
    /// Public and approved, plus everything owned by the user
    PublicOrOwnedBy(Uuid),
    /// Only cards owned by the user
    OwnedBy(Uuid),
    /// Every card (administrators)
    All,
}

/// Listing filters
#[derive(Debug, Clone)]
pub struct CardFilter {
    pub scope: ListScope,
    pub search: Option<String>,
    pub tech: Option<String>,
    pub language: Option<String>,
    pub card_type: Option<CardType>,
}

impl CardFilter {
    pub fn new(scope: ListScope) -> Self {
        Self {
            scope,
            search: None,
            tech: None,
            language: None,
            card_type: None,
        }
    }

    fn push_where(&self, qb: &mut QueryBuilder<'_, Sqlite>) {
        qb.push(" WHERE 1 = 1");
        match self.scope {
            ListScope::Public => {
                qb.push(" AND visibility = 'public' AND approval_status = 'approved'");
            }
            ListScope::PublicOrOwnedBy(owner) => {
                qb.push(" AND ((visibility = 'public' AND approval_status = 'approved') OR created_by = ");
                qb.push_bind(owner.to_string());
                qb.push(")");
            }
            ListScope::OwnedBy(owner) => {
                qb.push(" AND created_by = ");
                qb.push_bind(owner.to_string());
            }
            ListScope::All => {}
        }

        if let Some(search) = self.search.as_deref().filter(|s| !s.trim().is_empty()) {
            let pattern = like_pattern(search);
            qb.push(" AND (LOWER(title) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR LOWER(description) LIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR LOWER(tech) LIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }
        if let Some(tech) = self.tech.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND LOWER(tech) = ");
            qb.push_bind(tech.trim().to_lowercase());
        }
        if let Some(language) = self.language.as_deref().filter(|s| !s.trim().is_empty()) {
            qb.push(" AND LOWER(language) = ");
            qb.push_bind(language.trim().to_lowercase());
        }
        if let Some(card_type) = self.card_type {
            qb.push(" AND card_type = ");
            qb.push_bind(card_type.as_str());
        }
    }
}

pub(crate) fn card_from_row(row: &SqliteRow) -> Result<CardFeature> {
    let card_type: String = row.get("card_type");
    let visibility: String = row.get("visibility");
    let approval: String = row.get("approval_status");

    Ok(CardFeature {
        id: parse_uuid(row.get("id"))?,
        title: row.get("title"),
        tech: row.get("tech"),
        language: row.get("language"),
        description: row.get("description"),
        card_type: CardType::parse(&card_type)
            .ok_or_else(|| Error::Internal(format!("Invalid stored card_type '{}'", card_type)))?,
        visibility: Visibility::parse(&visibility)
            .ok_or_else(|| Error::Internal(format!("Invalid stored visibility '{}'", visibility)))?,
        approval_status: ApprovalStatus::parse(&approval)
            .ok_or_else(|| Error::Internal(format!("Invalid stored approval_status '{}'", approval)))?,
        screens: from_json_column("screens", row.get("screens"))?,
        tags: from_json_column("tags", row.get("tags"))?,
        created_by: parse_optional_uuid(row.get("created_by"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

/// Insert a card using any executor (pool or open transaction)
pub async fn insert_card<'e, E>(executor: E, card: &CardFeature) -> Result<()>
where
    E: sqlx::Executor<'e, Database = Sqlite>,
{
    let screens = serde_json::to_string(&card.screens)?;
    let tags = serde_json::to_string(&card.tags)?;

    sqlx::query(
        r#"
        INSERT INTO card_features (
            id, title, tech, language, description, card_type, visibility,
            approval_status, screens, tags, created_by, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(card.id.to_string())
    .bind(&card.title)
    .bind(&card.tech)
    .bind(&card.language)
    .bind(&card.description)
    .bind(card.card_type.as_str())
    .bind(card.visibility.as_str())
    .bind(card.approval_status.as_str())
    .bind(screens)
    .bind(tags)
    .bind(card.created_by.map(|id| id.to_string()))
    .bind(format_timestamp(card.created_at))
    .bind(format_timestamp(card.updated_at))
    .execute(executor)
    .await?;

    Ok(())
}

/// Insert all cards in one transaction; nothing is stored on failure
pub async fn insert_cards(pool: &SqlitePool, cards: &[CardFeature]) -> Result<()> {
    let mut tx = pool.begin().await?;
    for card in cards {
        insert_card(&mut *tx, card).await?;
    }
    tx.commit().await?;
    Ok(())
}

pub async fn get_card(pool: &SqlitePool, id: Uuid) -> Result<Option<CardFeature>> {
    let row = sqlx::query(&format!("SELECT {} FROM card_features WHERE id = ?", CARD_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(card_from_row).transpose()
}

pub async fn card_exists(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM card_features WHERE id = ?)")
        .bind(id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(exists)
}

/// Persist every mutable column of `card`
pub async fn update_card(pool: &SqlitePool, card: &CardFeature) -> Result<()> {
    let screens = serde_json::to_string(&card.screens)?;
    let tags = serde_json::to_string(&card.tags)?;

    sqlx::query(
        r#"
        UPDATE card_features
        SET title = ?, tech = ?, language = ?, description = ?, card_type = ?,
            visibility = ?, approval_status = ?, screens = ?, tags = ?, updated_at = ?
        WHERE id = ?
        "#,
    )
    .bind(&card.title)
    .bind(&card.tech)
    .bind(&card.language)
    .bind(&card.description)
    .bind(card.card_type.as_str())
    .bind(card.visibility.as_str())
    .bind(card.approval_status.as_str())
    .bind(screens)
    .bind(tags)
    .bind(format_timestamp(card.updated_at))
    .bind(card.id.to_string())
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn delete_card(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM card_features WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Filtered listing, newest first
pub async fn list_cards(
    pool: &SqlitePool,
    filter: &CardFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<CardFeature>> {
    let mut qb = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM card_features", CARD_COLUMNS));
    filter.push_where(&mut qb);
    qb.push(" ORDER BY created_at DESC, id LIMIT ");
    qb.push_bind(limit);
    qb.push(" OFFSET ");
    qb.push_bind(offset);

    let rows = qb.build().fetch_all(pool).await?;
    rows.iter().map(card_from_row).collect()
}

pub async fn count_cards(pool: &SqlitePool, filter: &CardFilter) -> Result<i64> {
    let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM card_features");
    filter.push_where(&mut qb);

    let count: i64 = qb.build_query_scalar().fetch_one(pool).await?;
    Ok(count)
}

/// Aggregates over publicly listed cards
pub async fn stats(pool: &SqlitePool) -> Result<CardFeatureStats> {
    const PUBLIC: &str = "visibility = 'public' AND approval_status = 'approved'";

    let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM card_features WHERE {}", PUBLIC))
        .fetch_one(pool)
        .await?;

    let by_tech: Vec<TechCount> = sqlx::query(&format!(
        "SELECT tech, COUNT(*) AS count FROM card_features WHERE {} GROUP BY tech ORDER BY count DESC, tech",
        PUBLIC
    ))
    .fetch_all(pool)
    .await?
    .iter()
    .map(|row| TechCount {
        tech: row.get("tech"),
        count: row.get("count"),
    })
    .collect();

    let mut by_card_type = Vec::new();
    for row in sqlx::query(&format!(
        "SELECT card_type, COUNT(*) AS count FROM card_features WHERE {} GROUP BY card_type ORDER BY card_type",
        PUBLIC
    ))
    .fetch_all(pool)
    .await?
    {
        let card_type: String = row.get("card_type");
        if let Some(card_type) = CardType::parse(&card_type) {
            by_card_type.push(CardTypeCount {
                card_type,
                count: row.get("count"),
            });
        }
    }

    Ok(CardFeatureStats {
        total,
        by_tech,
        by_card_type,
    })
}

/// Moderation queue: pending cards, oldest first
pub async fn list_pending(pool: &SqlitePool, limit: i64, offset: i64) -> Result<Vec<CardFeature>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {} FROM card_features
        WHERE approval_status = 'pending'
        ORDER BY created_at ASC, id
        LIMIT ? OFFSET ?
        "#,
        CARD_COLUMNS
    ))
    .bind(limit)
    .bind(offset)
    .fetch_all(pool)
    .await?;

    rows.iter().map(card_from_row).collect()
}

pub async fn count_pending(pool: &SqlitePool) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM card_features WHERE approval_status = 'pending'")
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Record a moderation decision; returns the updated card
pub async fn set_approval(
    pool: &SqlitePool,
    id: Uuid,
    status: ApprovalStatus,
) -> Result<Option<CardFeature>> {
    let result = sqlx::query("UPDATE card_features SET approval_status = ?, updated_at = ? WHERE id = ?")
        .bind(status.as_str())
        .bind(now_timestamp())
        .bind(id.to_string())
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Ok(None);
    }
    get_card(pool, id).await
}
