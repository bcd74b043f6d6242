//! Verification request queue

use chrono::{DateTime, Utc};
use llhe_common::models::{VerificationRequest, VerificationStatus};
use llhe_common::time::{from_db, to_db};
use llhe_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_optional_uuid, parse_uuid};

const COLUMNS: &str = "id, fragment_id, requester_id, kind, status, notes, reviewer_id, created_at, reviewed_at";

pub async fn insert(pool: &SqlitePool, request: &VerificationRequest) -> Result<()> {
    sqlx::query(&format!(
        "INSERT INTO verification_requests ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        COLUMNS
    ))
    .bind(request.id.to_string())
    .bind(request.fragment_id.to_string())
    .bind(request.requester_id.to_string())
    .bind(&request.kind)
    .bind(request.status.as_str())
    .bind(&request.notes)
    .bind(request.reviewer_id.map(|id| id.to_string()))
    .bind(to_db(&request.created_at))
    .bind(request.reviewed_at.as_ref().map(to_db))
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<VerificationRequest>> {
    let row = sqlx::query(&format!("SELECT {} FROM verification_requests WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;
    row.as_ref().map(row_to_request).transpose()
}

/// Requests newest first, optionally limited to one status
pub async fn list(pool: &SqlitePool, status: Option<VerificationStatus>) -> Result<Vec<VerificationRequest>> {
    let rows = match status {
        Some(status) => {
            sqlx::query(&format!(
                "SELECT {} FROM verification_requests WHERE status = ? ORDER BY created_at DESC",
                COLUMNS
            ))
            .bind(status.as_str())
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query(&format!(
                "SELECT {} FROM verification_requests ORDER BY created_at DESC",
                COLUMNS
            ))
            .fetch_all(pool)
            .await?
        }
    };
    rows.iter().map(row_to_request).collect()
}

/// Apply a reviewer decision to an open request
///
/// Returns false when the request is missing or already decided.
pub async fn decide(
    pool: &SqlitePool,
    id: Uuid,
    status: VerificationStatus,
    reviewer_id: Uuid,
    notes: Option<&str>,
    reviewed_at: DateTime<Utc>,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE verification_requests
        SET status = ?, reviewer_id = ?, notes = COALESCE(?, notes), reviewed_at = ?
        WHERE id = ? AND status IN ('PENDING', 'NEEDS_INFO')
        "#,
    )
    .bind(status.as_str())
    .bind(reviewer_id.to_string())
    .bind(notes)
    .bind(to_db(&reviewed_at))
    .bind(id.to_string())
    .execute(pool)
    .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_request(row: &SqliteRow) -> Result<VerificationRequest> {
    let id: String = row.try_get("id")?;
    let fragment_id: String = row.try_get("fragment_id")?;
    let requester_id: String = row.try_get("requester_id")?;
    let status: String = row.try_get("status")?;
    let reviewer_id: Option<String> = row.try_get("reviewer_id")?;
    let created_at: String = row.try_get("created_at")?;
    let reviewed_at: Option<String> = row.try_get("reviewed_at")?;

    Ok(VerificationRequest {
        id: parse_uuid(&id)?,
        fragment_id: parse_uuid(&fragment_id)?,
        requester_id: parse_uuid(&requester_id)?,
        kind: row.try_get("kind")?,
        status: status.parse()?,
        notes: row.try_get("notes")?,
        reviewer_id: parse_optional_uuid(reviewer_id)?,
        created_at: from_db(&created_at)?,
        reviewed_at: reviewed_at.as_deref().map(from_db).transpose()?,
    })
}
