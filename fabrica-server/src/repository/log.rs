//! Log Repository
//!
//! Handles all database operations related to build logs.

use fabrica_core::domain::log::LogRecord;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Append one log record to a build
pub async fn append(pool: &SqlitePool, build_id: Uuid, message: &str) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO build_logs (build_id, message, created_at)
        VALUES ($1, $2, $3)
        "#,
    )
    .bind(build_id)
    .bind(message)
    .bind(chrono::Utc::now())
    .execute(pool)
    .await?;

    Ok(())
}

/// Get all log records for a build, in append order
pub async fn find_by_build(pool: &SqlitePool, build_id: Uuid) -> Result<Vec<LogRecord>, sqlx::Error> {
    let rows = sqlx::query_as::<_, LogRow>(
        r#"
        SELECT build_id, message, created_at
        FROM build_logs
        WHERE build_id = $1
        ORDER BY id ASC
        "#,
    )
    .bind(build_id)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete all logs for a build
pub async fn delete_by_build(pool: &SqlitePool, build_id: Uuid) -> Result<u64, sqlx::Error> {
    let result = sqlx::query("DELETE FROM build_logs WHERE build_id = $1")
        .bind(build_id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected())
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct LogRow {
    build_id: Uuid,
    message: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<LogRow> for LogRecord {
    fn from(row: LogRow) -> Self {
        LogRecord {
            build_id: row.build_id,
            message: row.message,
            created_at: row.created_at,
        }
    }
}
