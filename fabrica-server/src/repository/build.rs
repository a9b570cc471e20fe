//! Build Repository
//!
//! Handles all database operations related to builds.

use fabrica_core::domain::build::{Build, BuildRequest, BuildStatus};
use sqlx::SqlitePool;
use uuid::Uuid;

/// Create a new queued build in the database
pub async fn create(pool: &SqlitePool, req: &BuildRequest) -> Result<Build, sqlx::Error> {
    let id = Uuid::new_v4();
    let now = chrono::Utc::now();

    let build = Build {
        id,
        name: req.name.clone(),
        repo: req.repo.clone(),
        branch: req.branch.clone(),
        distro: req.distro.clone(),
        key_id: req.key_id,
        status: BuildStatus::Queued,
        container: None,
        download: None,
        duration: 0,
        created_at: now,
        logs: Vec::new(),
    };

    sqlx::query(
        r#"
        INSERT INTO builds (id, name, repo, branch, distro, key_id, status, duration, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8)
        "#,
    )
    .bind(id)
    .bind(&build.name)
    .bind(&build.repo)
    .bind(&build.branch)
    .bind(&build.distro)
    .bind(build.key_id)
    .bind(build.status.as_str())
    .bind(now)
    .execute(pool)
    .await?;

    Ok(build)
}

/// Find a build by ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Build>, sqlx::Error> {
    let row = sqlx::query_as::<_, BuildRow>(
        r#"
        SELECT id, name, repo, branch, distro, key_id, status, container, download,
               duration, created_at
        FROM builds
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all builds, newest first
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Build>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BuildRow>(
        r#"
        SELECT id, name, repo, branch, distro, key_id, status, container, download,
               duration, created_at
        FROM builds
        ORDER BY created_at DESC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// List the builds of one repository URL, newest first
pub async fn list_for_repo(pool: &SqlitePool, repo: &str) -> Result<Vec<Build>, sqlx::Error> {
    let rows = sqlx::query_as::<_, BuildRow>(
        r#"
        SELECT id, name, repo, branch, distro, key_id, status, container, download,
               duration, created_at
        FROM builds
        WHERE repo = $1
        ORDER BY created_at DESC
        "#,
    )
    .bind(repo)
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Update build status
pub async fn update_status(
    pool: &SqlitePool,
    id: Uuid,
    status: BuildStatus,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE builds SET status = $1 WHERE id = $2")
        .bind(status.as_str())
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record the final status and run duration
pub async fn finish(
    pool: &SqlitePool,
    id: Uuid,
    status: BuildStatus,
    duration: i64,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE builds SET status = $1, duration = $2 WHERE id = $3")
        .bind(status.as_str())
        .bind(duration)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Mark every queued or running build as failed
///
/// Runs do not survive a restart, so their records are closed at startup.
pub async fn fail_unfinished(pool: &SqlitePool) -> Result<Vec<Uuid>, sqlx::Error> {
    let ids: Vec<Uuid> = sqlx::query_scalar(
        r#"
        UPDATE builds SET status = $1
        WHERE status IN ($2, $3)
        RETURNING id
        "#,
    )
    .bind(BuildStatus::Failed.as_str())
    .bind(BuildStatus::Queued.as_str())
    .bind(BuildStatus::InProgress.as_str())
    .fetch_all(pool)
    .await?;

    Ok(ids)
}

/// Record the container a build runs in
pub async fn set_container(pool: &SqlitePool, id: Uuid, container: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE builds SET container = $1 WHERE id = $2")
        .bind(container)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Record where the build's artifact was staged
pub async fn set_download(pool: &SqlitePool, id: Uuid, path: &str) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE builds SET download = $1 WHERE id = $2")
        .bind(path)
        .bind(id)
        .execute(pool)
        .await?;

    Ok(())
}

/// Delete a build by ID
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM builds WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct BuildRow {
    id: Uuid,
    name: String,
    repo: String,
    branch: String,
    distro: String,
    key_id: Option<Uuid>,
    status: String,
    container: Option<String>,
    download: Option<String>,
    duration: i64,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<BuildRow> for Build {
    fn from(row: BuildRow) -> Self {
        let status = row.status.parse().unwrap_or(BuildStatus::Failed);

        Build {
            id: row.id,
            name: row.name,
            repo: row.repo,
            branch: row.branch,
            distro: row.distro,
            key_id: row.key_id,
            status,
            container: row.container,
            download: row.download,
            duration: row.duration,
            created_at: row.created_at,
            logs: Vec::new(),
        }
    }
}
