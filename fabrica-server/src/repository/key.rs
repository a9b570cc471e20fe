//! Key Repository
//!
//! Handles all database operations related to SSH keys.

use fabrica_core::domain::key::SshKey;
use fabrica_core::dto::key::CreateKey;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Store a new key
pub async fn create(pool: &SqlitePool, req: CreateKey) -> Result<SshKey, sqlx::Error> {
    let key = SshKey {
        id: Uuid::new_v4(),
        name: req.name,
        username: req.username,
        data: req.data,
        password: req.password.filter(|p| !p.is_empty()),
        created_at: chrono::Utc::now(),
    };

    sqlx::query(
        r#"
        INSERT INTO keys (id, name, username, data, password, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(key.id)
    .bind(&key.name)
    .bind(&key.username)
    .bind(&key.data)
    .bind(&key.password)
    .bind(key.created_at)
    .execute(pool)
    .await?;

    Ok(key)
}

/// Find a key by ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<SshKey>, sqlx::Error> {
    let row = sqlx::query_as::<_, KeyRow>(
        r#"
        SELECT id, name, username, data, password, created_at
        FROM keys
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all keys
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<SshKey>, sqlx::Error> {
    let rows = sqlx::query_as::<_, KeyRow>(
        r#"
        SELECT id, name, username, data, password, created_at
        FROM keys
        ORDER BY name ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete a key by ID
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM keys WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct KeyRow {
    id: Uuid,
    name: String,
    username: String,
    data: String,
    password: Option<String>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<KeyRow> for SshKey {
    fn from(row: KeyRow) -> Self {
        SshKey {
            id: row.id,
            name: row.name,
            username: row.username,
            data: row.data,
            password: row.password,
            created_at: row.created_at,
        }
    }
}
