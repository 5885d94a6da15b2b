//! Project, membership and project card queries

use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tenx_common::db::{format_timestamp, now_timestamp, parse_optional_uuid, parse_timestamp, parse_uuid};
use tenx_common::{Error, Result};
use uuid::Uuid;

use super::card_features::{card_from_row, CARD_COLUMNS};
use crate::models::{Project, ProjectCard, ProjectMember, ProjectRole};

const PROJECT_COLUMNS: &str = "id, name, description, created_by, created_at, updated_at";

fn project_from_row(row: &SqliteRow) -> Result<Project> {
    Ok(Project {
        id: parse_uuid(row.get("id"))?,
        name: row.get("name"),
        description: row.get("description"),
        created_by: parse_optional_uuid(row.get("created_by"))?,
        created_at: parse_timestamp(row.get("created_at"))?,
        updated_at: parse_timestamp(row.get("updated_at"))?,
    })
}

fn parse_role(value: &str) -> Result<ProjectRole> {
    ProjectRole::parse(value).ok_or_else(|| Error::Internal(format!("Invalid stored project role '{}'", value)))
}

// ========================================
// Projects
// ========================================

/// Insert the project and its owner membership in one transaction
pub async fn insert_with_owner(pool: &SqlitePool, project: &Project, owner: Uuid) -> Result<()> {
    let mut tx = pool.begin().await?;

    sqlx::query(
        r#"
        INSERT INTO projects (id, name, description, created_by, created_at, updated_at)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(project.id.to_string())
    .bind(&project.name)
    .bind(&project.description)
    .bind(project.created_by.map(|id| id.to_string()))
    .bind(format_timestamp(project.created_at))
    .bind(format_timestamp(project.updated_at))
    .execute(&mut *tx)
    .await?;

    sqlx::query("INSERT INTO project_members (project_id, user_id, role, added_at) VALUES (?, ?, 'owner', ?)")
        .bind(project.id.to_string())
        .bind(owner.to_string())
        .bind(format_timestamp(project.created_at))
        .execute(&mut *tx)
        .await?;

    tx.commit().await?;
    Ok(())
}

pub async fn get_project(pool: &SqlitePool, id: Uuid) -> Result<Option<Project>> {
    let row = sqlx::query(&format!("SELECT {} FROM projects WHERE id = ?", PROJECT_COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(project_from_row).transpose()
}

/// Projects `user_id` belongs to, newest first
pub async fn list_for_member(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Project>> {
    let rows = sqlx::query(
        r#"
        SELECT p.id, p.name, p.description, p.created_by, p.created_at, p.updated_at
        FROM projects p
        JOIN project_members m ON m.project_id = p.id
        WHERE m.user_id = ?
        ORDER BY p.created_at DESC, p.id
        "#,
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(project_from_row).collect()
}

pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Project>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM projects ORDER BY created_at DESC, id",
        PROJECT_COLUMNS
    ))
    .fetch_all(pool)
    .await?;

    rows.iter().map(project_from_row).collect()
}

pub async fn update_project(pool: &SqlitePool, project: &Project) -> Result<()> {
    sqlx::query("UPDATE projects SET name = ?, description = ?, updated_at = ? WHERE id = ?")
        .bind(&project.name)
        .bind(&project.description)
        .bind(format_timestamp(project.updated_at))
        .bind(project.id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a project; memberships and card links cascade
pub async fn delete_project(pool: &SqlitePool, id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM projects WHERE id = ?")
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

// ========================================
// Members
// ========================================

/// Role of `user_id` in the project, `None` when not a member
pub async fn member_role(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> Result<Option<ProjectRole>> {
    let role: Option<String> =
        sqlx::query_scalar("SELECT role FROM project_members WHERE project_id = ? AND user_id = ?")
            .bind(project_id.to_string())
            .bind(user_id.to_string())
            .fetch_optional(pool)
            .await?;

    role.as_deref().map(parse_role).transpose()
}

/// Members with account details, owners first
pub async fn list_members(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<ProjectMember>> {
    let rows = sqlx::query(
        r#"
        SELECT m.user_id, u.email, u.name, m.role, m.added_at
        FROM project_members m
        JOIN users u ON u.id = m.user_id
        WHERE m.project_id = ?
        ORDER BY CASE m.role WHEN 'owner' THEN 0 ELSE 1 END, m.added_at, u.email
        "#,
    )
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let role: String = row.get("role");
            Ok(ProjectMember {
                user_id: parse_uuid(row.get("user_id"))?,
                email: row.get("email"),
                name: row.get("name"),
                role: parse_role(&role)?,
                added_at: parse_timestamp(row.get("added_at"))?,
            })
        })
        .collect()
}

/// Add a membership; an existing one is a unique-constraint error
pub async fn add_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid, role: ProjectRole) -> Result<()> {
    sqlx::query("INSERT INTO project_members (project_id, user_id, role, added_at) VALUES (?, ?, ?, ?)")
        .bind(project_id.to_string())
        .bind(user_id.to_string())
        .bind(role.as_str())
        .bind(now_timestamp())
        .execute(pool)
        .await?;
    Ok(())
}

pub async fn remove_member(pool: &SqlitePool, project_id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM project_members WHERE project_id = ? AND user_id = ?")
        .bind(project_id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

pub async fn count_owners(pool: &SqlitePool, project_id: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM project_members WHERE project_id = ? AND role = 'owner'")
            .bind(project_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

// ========================================
// Cards
// ========================================

pub async fn count_cards(pool: &SqlitePool, project_id: Uuid) -> Result<i64> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM project_cards WHERE project_id = ?")
        .bind(project_id.to_string())
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// Cards in the project in `position` order
pub async fn list_cards(pool: &SqlitePool, project_id: Uuid) -> Result<Vec<ProjectCard>> {
    let rows = sqlx::query(&format!(
        r#"
        SELECT {}, pc.position, pc.added_at
        FROM project_cards pc
        JOIN card_features ON card_features.id = pc.card_feature_id
        WHERE pc.project_id = ?
        ORDER BY pc.position
        "#,
        CARD_COLUMNS
    ))
    .bind(project_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(ProjectCard {
                position: row.get("position"),
                added_at: parse_timestamp(row.get("added_at"))?,
                card: card_from_row(row)?,
            })
        })
        .collect()
}

/// Append a card after the current last position; returns that position
///
/// The position is computed in the same statement as the insert. A card
/// already in the project is a unique-constraint error.
pub async fn add_card(pool: &SqlitePool, project_id: Uuid, card_id: Uuid) -> Result<i64> {
    let position: i64 = sqlx::query_scalar(
        r#"
        INSERT INTO project_cards (project_id, card_feature_id, position, added_at)
        SELECT ?, ?, COALESCE(MAX(position), -1) + 1, ?
        FROM project_cards WHERE project_id = ?
        RETURNING position
        "#,
    )
    .bind(project_id.to_string())
    .bind(card_id.to_string())
    .bind(now_timestamp())
    .bind(project_id.to_string())
    .fetch_one(pool)
    .await?;
    Ok(position)
}

pub async fn remove_card(pool: &SqlitePool, project_id: Uuid, card_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM project_cards WHERE project_id = ? AND card_feature_id = ?")
        .bind(project_id.to_string())
        .bind(card_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}
