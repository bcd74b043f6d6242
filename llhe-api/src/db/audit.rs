//! Audit log

use chrono::{DateTime, Utc};
use llhe_common::time::{from_db, now, to_db};
use llhe_common::Result;
use serde::Serialize;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AuditEntry {
    pub id: Uuid,
    pub user_id: Uuid,
    pub action: String,
    pub entity_type: String,
    pub entity_id: Uuid,
    pub details: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub async fn record(
    pool: &SqlitePool,
    user_id: Uuid,
    action: &str,
    entity_type: &str,
    entity_id: Uuid,
    details: serde_json::Value,
) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO audit_log (id, user_id, action, entity_type, entity_id, details, created_at)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(Uuid::new_v4().to_string())
    .bind(user_id.to_string())
    .bind(action)
    .bind(entity_type)
    .bind(entity_id.to_string())
    .bind(details.to_string())
    .bind(to_db(&now()))
    .execute(pool)
    .await?;

    tracing::debug!(%user_id, action, entity_type, %entity_id, "Audit entry recorded");
    Ok(())
}

/// Entries about one entity, oldest first
pub async fn list_for_entity(pool: &SqlitePool, entity_type: &str, entity_id: Uuid) -> Result<Vec<AuditEntry>> {
    let rows = sqlx::query(
        r#"
        SELECT id, user_id, action, entity_type, entity_id, details, created_at
        FROM audit_log
        WHERE entity_type = ? AND entity_id = ?
        ORDER BY created_at, rowid
        "#,
    )
    .bind(entity_type)
    .bind(entity_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| -> Result<AuditEntry> {
            let id: String = row.try_get("id")?;
            let user_id: String = row.try_get("user_id")?;
            let entity_id: String = row.try_get("entity_id")?;
            let details: String = row.try_get("details")?;
            let created_at: String = row.try_get("created_at")?;
            Ok(AuditEntry {
                id: parse_uuid(&id)?,
                user_id: parse_uuid(&user_id)?,
                action: row.try_get("action")?,
                entity_type: row.try_get("entity_type")?,
                entity_id: parse_uuid(&entity_id)?,
                details: serde_json::from_str(&details)?,
                created_at: from_db(&created_at)?,
            })
        })
        .collect()
}
