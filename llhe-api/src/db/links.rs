//! Fragment link persistence

use llhe_common::time::{from_db, to_db};
use llhe_common::{Link, Result};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

pub async fn insert(pool: &SqlitePool, link: &Link) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO fragment_links (id, source_id, target_id, link_type, score, reason, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(link.id.to_string())
    .bind(link.source_id.to_string())
    .bind(link.target_id.to_string())
    .bind(&link.link_type)
    .bind(link.score)
    .bind(&link.reason)
    .bind(to_db(&link.created_at))
    .execute(pool)
    .await?;
    Ok(())
}

/// Links whose source is `fragment_id`, strongest first
pub async fn outbound(pool: &SqlitePool, fragment_id: Uuid) -> Result<Vec<Link>> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, target_id, link_type, score, reason, created_at
        FROM fragment_links
        WHERE source_id = ?
        ORDER BY score DESC, created_at
        "#,
    )
    .bind(fragment_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_link).collect()
}

/// Links whose target is `fragment_id`, strongest first
pub async fn inbound(pool: &SqlitePool, fragment_id: Uuid) -> Result<Vec<Link>> {
    let rows = sqlx::query(
        r#"
        SELECT id, source_id, target_id, link_type, score, reason, created_at
        FROM fragment_links
        WHERE target_id = ?
        ORDER BY score DESC, created_at
        "#,
    )
    .bind(fragment_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_link).collect()
}

/// Remove every link touching `fragment_id`; returns the number removed
pub async fn delete_for_fragment(pool: &SqlitePool, fragment_id: Uuid) -> Result<u64> {
    let result = sqlx::query("DELETE FROM fragment_links WHERE source_id = ? OR target_id = ?")
        .bind(fragment_id.to_string())
        .bind(fragment_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

fn row_to_link(row: &SqliteRow) -> Result<Link> {
    let id: String = row.try_get("id")?;
    let source_id: String = row.try_get("source_id")?;
    let target_id: String = row.try_get("target_id")?;
    let created_at: String = row.try_get("created_at")?;

    Ok(Link {
        id: parse_uuid(&id)?,
        source_id: parse_uuid(&source_id)?,
        target_id: parse_uuid(&target_id)?,
        link_type: row.try_get("link_type")?,
        score: row.try_get("score")?,
        reason: row.try_get("reason")?,
        created_at: from_db(&created_at)?,
    })
}
