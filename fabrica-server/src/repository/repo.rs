//! Repo Repository
//!
//! Handles all database operations related to watched repositories.

use fabrica_core::domain::repo::Repo;
use sqlx::SqlitePool;
use uuid::Uuid;

/// Store a new repository
pub async fn create(pool: &SqlitePool, repo: &Repo) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO repos (id, name, repo, branch, key_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6)
        "#,
    )
    .bind(repo.id)
    .bind(&repo.name)
    .bind(&repo.repo)
    .bind(&repo.branch)
    .bind(repo.key_id)
    .bind(repo.created_at)
    .execute(pool)
    .await?;

    Ok(())
}

/// Find a repository by ID
pub async fn find_by_id(pool: &SqlitePool, id: Uuid) -> Result<Option<Repo>, sqlx::Error> {
    let row = sqlx::query_as::<_, RepoRow>(
        r#"
        SELECT id, name, repo, branch, key_id, created_at
        FROM repos
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// Find a repository by URL and branch
pub async fn find_by_url(
    pool: &SqlitePool,
    repo: &str,
    branch: &str,
) -> Result<Option<Repo>, sqlx::Error> {
    let row = sqlx::query_as::<_, RepoRow>(
        r#"
        SELECT id, name, repo, branch, key_id, created_at
        FROM repos
        WHERE repo = $1 AND branch = $2
        "#,
    )
    .bind(repo)
    .bind(branch)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(|r| r.into()))
}

/// List all repositories
pub async fn list_all(pool: &SqlitePool) -> Result<Vec<Repo>, sqlx::Error> {
    let rows = sqlx::query_as::<_, RepoRow>(
        r#"
        SELECT id, name, repo, branch, key_id, created_at
        FROM repos
        ORDER BY name ASC, branch ASC
        "#,
    )
    .fetch_all(pool)
    .await?;

    Ok(rows.into_iter().map(|r| r.into()).collect())
}

/// Delete a repository by ID
pub async fn delete(pool: &SqlitePool, id: Uuid) -> Result<bool, sqlx::Error> {
    let result = sqlx::query("DELETE FROM repos WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

// =============================================================================
// Database Row Types
// =============================================================================

#[derive(sqlx::FromRow)]
struct RepoRow {
    id: Uuid,
    name: String,
    repo: String,
    branch: String,
    key_id: Option<Uuid>,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl From<RepoRow> for Repo {
    fn from(row: RepoRow) -> Self {
        Repo {
            id: row.id,
            name: row.name,
            repo: row.repo,
            branch: row.branch,
            key_id: row.key_id,
            created_at: row.created_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn repo(branch: &str) -> Repo {
        Repo {
            id: Uuid::new_v4(),
            name: "myapp".to_string(),
            repo: "https://example.com/org/myapp.git".to_string(),
            branch: branch.to_string(),
            key_id: None,
            created_at: chrono::Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_find_delete() {
        let pool = test_pool().await;
        let main = repo("main");
        create(&pool, &main).await.unwrap();

        let found = find_by_id(&pool, main.id).await.unwrap().unwrap();
        assert_eq!(found.name, "myapp");
        assert_eq!(found.branch, "main");
        assert_eq!(found.key_id, None);

        let by_url = find_by_url(&pool, &main.repo, "main").await.unwrap().unwrap();
        assert_eq!(by_url.id, main.id);
        assert!(find_by_url(&pool, &main.repo, "dev").await.unwrap().is_none());

        assert!(delete(&pool, main.id).await.unwrap());
        assert!(!delete(&pool, main.id).await.unwrap());
        assert!(find_by_id(&pool, main.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_url_and_branch_are_unique() {
        let pool = test_pool().await;
        create(&pool, &repo("main")).await.unwrap();
        create(&pool, &repo("dev")).await.unwrap();

        assert!(create(&pool, &repo("main")).await.is_err());
        assert_eq!(list_all(&pool).await.unwrap().len(), 2);
    }
}
