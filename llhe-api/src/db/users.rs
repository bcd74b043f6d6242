//! Users, sessions and one-time login tokens
//!
//! Tokens are never stored in the clear; callers pass the SHA-256 digest.

use chrono::{DateTime, Utc};
use llhe_common::models::User;
use llhe_common::time::{from_db, now, to_db};
use llhe_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

/// Find the user with `email` (case-insensitive), creating it if absent
pub async fn upsert_by_email(pool: &SqlitePool, email: &str) -> Result<User> {
    let email = email.trim().to_lowercase();

    sqlx::query("INSERT INTO users (id, email, created_at) VALUES (?, ?, ?) ON CONFLICT(email) DO NOTHING")
        .bind(Uuid::new_v4().to_string())
        .bind(&email)
        .bind(to_db(&now()))
        .execute(pool)
        .await?;

    let row = sqlx::query("SELECT id, email, created_at FROM users WHERE email = ?")
        .bind(&email)
        .fetch_one(pool)
        .await?;
    row_to_user(&row)
}

pub async fn insert_login_token(
    pool: &SqlitePool,
    token_hash: &str,
    email: &str,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO login_tokens (token_hash, email, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_hash)
        .bind(email.trim().to_lowercase())
        .bind(to_db(&now()))
        .bind(to_db(&expires_at))
        .execute(pool)
        .await?;
    Ok(())
}

/// Mark an unused, unexpired login token as used and return its email
///
/// A single UPDATE, so two concurrent callbacks cannot both succeed.
pub async fn consume_login_token(pool: &SqlitePool, token_hash: &str) -> Result<Option<String>> {
    let stamp = to_db(&now());
    let email: Option<String> = sqlx::query_scalar(
        r#"
        UPDATE login_tokens SET used_at = ?
        WHERE token_hash = ? AND used_at IS NULL AND expires_at > ?
        RETURNING email
        "#,
    )
    .bind(&stamp)
    .bind(token_hash)
    .bind(&stamp)
    .fetch_optional(pool)
    .await?;
    Ok(email)
}

pub async fn create_session(
    pool: &SqlitePool,
    token_hash: &str,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
) -> Result<()> {
    sqlx::query("INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)")
        .bind(token_hash)
        .bind(user_id.to_string())
        .bind(to_db(&now()))
        .bind(to_db(&expires_at))
        .execute(pool)
        .await?;
    Ok(())
}

/// User owning an unexpired session
pub async fn session_user(pool: &SqlitePool, token_hash: &str) -> Result<Option<User>> {
    let row = sqlx::query(
        r#"
        SELECT u.id, u.email, u.created_at
        FROM sessions s JOIN users u ON u.id = s.user_id
        WHERE s.token_hash = ? AND s.expires_at > ?
        "#,
    )
    .bind(token_hash)
    .bind(to_db(&now()))
    .fetch_optional(pool)
    .await?;
    row.as_ref().map(row_to_user).transpose()
}

pub async fn delete_session(pool: &SqlitePool, token_hash: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
        .bind(token_hash)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn row_to_user(row: &SqliteRow) -> Result<User> {
    let id: String = row.try_get("id")?;
    let created_at: String = row.try_get("created_at")?;
    Ok(User {
        id: parse_uuid(&id)?,
        email: row.try_get("email")?,
        created_at: from_db(&created_at)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use llhe_common::db::open_in_memory;

    #[tokio::test]
    async fn test_upsert_is_idempotent_and_lowercases() {
        let pool = open_in_memory().await.unwrap();
        let a = upsert_by_email(&pool, "Reader@Example.com").await.unwrap();
        let b = upsert_by_email(&pool, "reader@example.com ").await.unwrap();
        assert_eq!(a.id, b.id);
        assert_eq!(a.email, "reader@example.com");
    }

    #[tokio::test]
    async fn test_login_token_is_single_use() {
        let pool = open_in_memory().await.unwrap();
        insert_login_token(&pool, "hash-1", "a@example.com", now() + Duration::minutes(15))
            .await
            .unwrap();

        assert_eq!(
            consume_login_token(&pool, "hash-1").await.unwrap().as_deref(),
            Some("a@example.com")
        );
        assert!(consume_login_token(&pool, "hash-1").await.unwrap().is_none());
        assert!(consume_login_token(&pool, "unknown").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_expired_login_token_rejected() {
        let pool = open_in_memory().await.unwrap();
        insert_login_token(&pool, "old", "a@example.com", now() - Duration::seconds(1))
            .await
            .unwrap();
        assert!(consume_login_token(&pool, "old").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sessions() {
        let pool = open_in_memory().await.unwrap();
        let user = upsert_by_email(&pool, "s@example.com").await.unwrap();

        create_session(&pool, "live", user.id, now() + Duration::hours(24)).await.unwrap();
        create_session(&pool, "stale", user.id, now() - Duration::hours(1)).await.unwrap();

        assert_eq!(session_user(&pool, "live").await.unwrap().map(|u| u.id), Some(user.id));
        assert!(session_user(&pool, "stale").await.unwrap().is_none());

        assert!(delete_session(&pool, "live").await.unwrap());
        assert!(session_user(&pool, "live").await.unwrap().is_none());
    }
}
