//! Fragment persistence
//!
//! Array columns (tags, themes, emotions, media, embedding) are JSON text.
//! Filters on them use `json_each`.

use llhe_common::time::{from_db, to_db};
use llhe_common::{Fragment, Result, Visibility};
use sqlx::sqlite::SqliteRow;
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;

const COLUMNS: &str = "id, user_id, title, content, event_at, visibility, tags, themes, emotions, \
                       status, media, embedding, created_at, updated_at";

/// Optional list filters; `None` means "any"
#[derive(Debug, Clone, Default)]
pub struct FragmentFilter {
    /// Case-insensitive substring of title or content
    pub q: Option<String>,
    pub visibility: Option<Visibility>,
    pub tag: Option<String>,
    pub theme: Option<String>,
    pub emotion: Option<String>,
}

pub async fn insert(pool: &SqlitePool, fragment: &Fragment) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO fragments (
            id, user_id, title, content, event_at, visibility, tags, themes, emotions,
            status, media, embedding, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(fragment.id.to_string())
    .bind(fragment.user_id.to_string())
    .bind(&fragment.title)
    .bind(&fragment.content)
    .bind(to_db(&fragment.event_at))
    .bind(fragment.visibility.as_str())
    .bind(serde_json::to_string(&fragment.tags)?)
    .bind(serde_json::to_string(&fragment.themes)?)
    .bind(serde_json::to_string(&fragment.emotions)?)
    .bind(fragment.status.as_str())
    .bind(serde_json::to_string(&fragment.media)?)
    .bind(embedding_json(&fragment.embedding)?)
    .bind(to_db(&fragment.created_at))
    .bind(to_db(&fragment.updated_at))
    .execute(pool)
    .await?;

    Ok(())
}

pub async fn get(pool: &SqlitePool, id: Uuid) -> Result<Option<Fragment>> {
    let row = sqlx::query(&format!("SELECT {} FROM fragments WHERE id = ?", COLUMNS))
        .bind(id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(row_to_fragment).transpose()
}

/// Number of a user's fragments matching `filter`
pub async fn count_for_user(pool: &SqlitePool, user_id: Uuid, filter: &FragmentFilter) -> Result<i64> {
    let mut count = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM fragments WHERE user_id = ");
    count.push_bind(user_id.to_string());
    push_filters(&mut count, filter);
    Ok(count.build_query_scalar::<i64>().fetch_one(pool).await?)
}

/// One page of a user's fragments matching `filter`, newest first
pub async fn list_for_user(
    pool: &SqlitePool,
    user_id: Uuid,
    filter: &FragmentFilter,
    limit: i64,
    offset: i64,
) -> Result<Vec<Fragment>> {
    let mut select = QueryBuilder::<Sqlite>::new(format!("SELECT {} FROM fragments WHERE user_id = ", COLUMNS));
    select.push_bind(user_id.to_string());
    push_filters(&mut select, filter);
    select.push(" ORDER BY created_at DESC, id LIMIT ");
    select.push_bind(limit);
    select.push(" OFFSET ");
    select.push_bind(offset);

    let rows = select.build().fetch_all(pool).await?;
    rows.iter().map(row_to_fragment).collect()
}

/// Every fragment a user owns, newest first
pub async fn all_for_user(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Fragment>> {
    let rows = sqlx::query(&format!(
        "SELECT {} FROM fragments WHERE user_id = ? ORDER BY created_at DESC, id",
        COLUMNS
    ))
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(row_to_fragment).collect()
}

/// Write every mutable column; scoped by id and owner
///
/// Returns false when no row matched. `user_id` and `created_at` are never
/// written.
pub async fn update_owned(pool: &SqlitePool, fragment: &Fragment) -> Result<bool> {
    let result = sqlx::query(
        r#"
        UPDATE fragments SET
            title = ?, content = ?, event_at = ?, visibility = ?, tags = ?, themes = ?,
            emotions = ?, status = ?, media = ?, embedding = ?, updated_at = ?
        WHERE id = ? AND user_id = ?
        "#,
    )
    .bind(&fragment.title)
    .bind(&fragment.content)
    .bind(to_db(&fragment.event_at))
    .bind(fragment.visibility.as_str())
    .bind(serde_json::to_string(&fragment.tags)?)
    .bind(serde_json::to_string(&fragment.themes)?)
    .bind(serde_json::to_string(&fragment.emotions)?)
    .bind(fragment.status.as_str())
    .bind(serde_json::to_string(&fragment.media)?)
    .bind(embedding_json(&fragment.embedding)?)
    .bind(to_db(&fragment.updated_at))
    .bind(fragment.id.to_string())
    .bind(fragment.user_id.to_string())
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// Store an embedding computed outside the analysis flow (search cache)
pub async fn set_embedding(pool: &SqlitePool, id: Uuid, embedding: &[f32]) -> Result<()> {
    sqlx::query("UPDATE fragments SET embedding = ? WHERE id = ?")
        .bind(serde_json::to_string(embedding)?)
        .bind(id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a fragment; scoped by id and owner
pub async fn delete_owned(pool: &SqlitePool, id: Uuid, user_id: Uuid) -> Result<bool> {
    let result = sqlx::query("DELETE FROM fragments WHERE id = ? AND user_id = ?")
        .bind(id.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

fn push_filters(qb: &mut QueryBuilder<'_, Sqlite>, filter: &FragmentFilter) {
    if let Some(q) = filter.q.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        let pattern = format!("%{}%", escape_like(q));
        qb.push(" AND (title LIKE ");
        qb.push_bind(pattern.clone());
        qb.push(" ESCAPE '\\' OR content LIKE ");
        qb.push_bind(pattern);
        qb.push(" ESCAPE '\\')");
    }
    if let Some(visibility) = filter.visibility {
        qb.push(" AND visibility = ");
        qb.push_bind(visibility.as_str());
    }
    for (column, value) in [
        ("tags", &filter.tag),
        ("themes", &filter.theme),
        ("emotions", &filter.emotion),
    ] {
        if let Some(value) = value {
            qb.push(format!(
                " AND EXISTS (SELECT 1 FROM json_each(fragments.{}) WHERE json_each.value = ",
                column
            ));
            qb.push_bind(value.clone());
            qb.push(")");
        }
    }
}

fn escape_like(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn embedding_json(embedding: &Option<Vec<f32>>) -> Result<Option<String>> {
    Ok(embedding.as_ref().map(serde_json::to_string).transpose()?)
}

fn row_to_fragment(row: &SqliteRow) -> Result<Fragment> {
    let id: String = row.try_get("id")?;
    let user_id: String = row.try_get("user_id")?;
    let event_at: String = row.try_get("event_at")?;
    let visibility: String = row.try_get("visibility")?;
    let tags: String = row.try_get("tags")?;
    let themes: String = row.try_get("themes")?;
    let emotions: String = row.try_get("emotions")?;
    let status: String = row.try_get("status")?;
    let media: String = row.try_get("media")?;
    let embedding: Option<String> = row.try_get("embedding")?;
    let created_at: String = row.try_get("created_at")?;
    let updated_at: String = row.try_get("updated_at")?;

    Ok(Fragment {
        id: parse_uuid(&id)?,
        user_id: parse_uuid(&user_id)?,
        title: row.try_get("title")?,
        content: row.try_get("content")?,
        event_at: from_db(&event_at)?,
        visibility: visibility.parse()?,
        tags: serde_json::from_str(&tags)?,
        themes: serde_json::from_str(&themes)?,
        emotions: serde_json::from_str(&emotions)?,
        status: status.parse()?,
        media: serde_json::from_str(&media)?,
        embedding: embedding.as_deref().map(serde_json::from_str::<Vec<f32>>).transpose()?,
        created_at: from_db(&created_at)?,
        updated_at: from_db(&updated_at)?,
    })
}
