use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::str::FromStr;
use std::time::Duration;

pub async fn create_pool(database_url: &str) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .foreign_keys(true);

    SqlitePoolOptions::new()
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
}

pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    // Create builds table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS builds (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            repo TEXT NOT NULL,
            branch TEXT NOT NULL,
            distro TEXT NOT NULL,
            key_id BLOB,
            status TEXT NOT NULL,
            container TEXT,
            download TEXT,
            duration INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create build logs table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS build_logs (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            build_id BLOB NOT NULL REFERENCES builds(id) ON DELETE CASCADE,
            message TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create keys table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS keys (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            username TEXT NOT NULL,
            data TEXT NOT NULL,
            password TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    // Create watched repositories table
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS repos (
            id BLOB PRIMARY KEY,
            name TEXT NOT NULL,
            repo TEXT NOT NULL,
            branch TEXT NOT NULL,
            key_id BLOB,
            created_at TEXT NOT NULL,
            UNIQUE (repo, branch)
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_builds_repo ON builds(repo)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_builds_created_at ON builds(created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_build_logs_build_id ON build_logs(build_id, id)")
        .execute(pool)
        .await?;

    tracing::info!("Database migrations completed successfully");
    Ok(())
}

/// Migrated in-memory database on a single connection
/// Checks that the database answers
pub async fn ping(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query("SELECT 1").execute(pool).await?;
    Ok(())
}

#[cfg(test)]
pub async fn test_pool() -> SqlitePool {
    let options = SqliteConnectOptions::from_str("sqlite::memory:")
        .unwrap()
        .foreign_keys(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None)
        .connect_with(options)
        .await
        .unwrap();
    run_migrations(&pool).await.unwrap();
    pool
}
