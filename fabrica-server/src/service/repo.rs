//! Repo Service
//!
//! Business logic for watched repositories and their builds.

use fabrica_core::domain::build::{Build, project_name};
use fabrica_core::domain::repo::Repo;
use fabrica_core::dto::repo::CreateRepo;
use fabrica_runner::BuildOrchestrator;
use sqlx::SqlitePool;
use thiserror::Error;
use uuid::Uuid;

use crate::repository::{build_repository, key_repository, repo_repository};
use crate::service::build_service::{self, BuildServiceError, is_name_char};

/// Service error type
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("Repository {0} not found")]
    NotFound(Uuid),

    #[error("Key {0} not found")]
    KeyNotFound(Uuid),

    #[error("Repository {0} ({1}) is already registered")]
    AlreadyExists(String, String),

    #[error("{0}")]
    ValidationError(String),

    #[error("database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    #[error(transparent)]
    Build(#[from] BuildServiceError),
}

/// Register a repository
pub async fn create(pool: &SqlitePool, req: CreateRepo) -> Result<Repo, RepoError> {
    let repo = validate_repo(req)?;

    if let Some(key_id) = repo.key_id {
        key_repository::find_by_id(pool, key_id)
            .await?
            .ok_or(RepoError::KeyNotFound(key_id))?;
    }

    if repo_repository::find_by_url(pool, &repo.repo, &repo.branch)
        .await?
        .is_some()
    {
        return Err(RepoError::AlreadyExists(repo.repo, repo.branch));
    }

    repo_repository::create(pool, &repo).await?;
    tracing::info!("Repository created: {} ({} {})", repo.id, repo.repo, repo.branch);

    Ok(repo)
}

/// List all repositories
pub async fn list(pool: &SqlitePool) -> Result<Vec<Repo>, RepoError> {
    let repos = repo_repository::list_all(pool).await?;
    Ok(repos)
}

/// List the builds launched for a repository's URL
pub async fn builds(pool: &SqlitePool, id: Uuid) -> Result<Vec<Build>, RepoError> {
    let repo = repo_repository::find_by_id(pool, id)
        .await?
        .ok_or(RepoError::NotFound(id))?;

    let builds = build_repository::list_for_repo(pool, &repo.repo).await?;
    Ok(builds)
}

/// Delete a repository, and optionally its finished builds
///
/// Builds still running are left alone. Returns the number of builds deleted.
pub async fn delete(
    pool: &SqlitePool,
    orchestrator: &BuildOrchestrator,
    id: Uuid,
    delete_builds: bool,
) -> Result<usize, RepoError> {
    let repo = repo_repository::find_by_id(pool, id)
        .await?
        .ok_or(RepoError::NotFound(id))?;

    let mut deleted = 0;
    if delete_builds {
        for build in build_repository::list_for_repo(pool, &repo.repo).await? {
            if !build.status.is_finished() {
                tracing::warn!("Keeping build {} of {}: it is {}", build.id, repo.repo, build.status);
                continue;
            }
            build_service::delete(pool, orchestrator, build.id).await?;
            deleted += 1;
        }
    }

    repo_repository::delete(pool, id).await?;
    tracing::info!("Repository {} deleted with {} builds", id, deleted);

    Ok(deleted)
}

// =============================================================================
// Validation
// =============================================================================

fn validate_repo(req: CreateRepo) -> Result<Repo, RepoError> {
    let url = req.repo.trim().to_string();
    if url.is_empty() {
        return Err(RepoError::ValidationError(
            "repo cannot be empty".to_string(),
        ));
    }

    let branch = req.branch.trim().to_string();
    if branch.is_empty() {
        return Err(RepoError::ValidationError(
            "branch cannot be empty".to_string(),
        ));
    }

    let name = match req.name.as_deref().map(str::trim).filter(|n| !n.is_empty()) {
        Some(name) => name.to_string(),
        None => project_name(&url).ok_or_else(|| {
            RepoError::ValidationError(format!("cannot derive a project name from '{}'", url))
        })?,
    };
    if name == "." || name == ".." || !name.chars().all(is_name_char) {
        return Err(RepoError::ValidationError(format!(
            "invalid project name '{}'",
            name
        )));
    }

    let key_id = match req.key_id.as_deref().map(str::trim).filter(|k| !k.is_empty()) {
        Some(key_id) => Some(Uuid::parse_str(key_id).map_err(|_| {
            RepoError::ValidationError(format!("invalid keyId '{}'", key_id))
        })?),
        None => None,
    };

    Ok(Repo {
        id: Uuid::new_v4(),
        name,
        repo: url,
        branch,
        key_id,
        created_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testing::{orchestrator, wait_for_build};
    use fabrica_core::domain::build::BuildStatus;
    use fabrica_core::dto::build::CreateBuild;

    const URL: &str = "https://example.com/org/myapp.git";

    fn create_repo(repo: &str) -> CreateRepo {
        CreateRepo {
            name: None,
            repo: repo.to_string(),
            branch: "master".to_string(),
            key_id: None,
        }
    }

    fn create_build(repo: &str) -> CreateBuild {
        CreateBuild {
            name: None,
            repo: repo.to_string(),
            branch: "master".to_string(),
            key_id: None,
            distro: "focal".to_string(),
        }
    }

    #[test]
    fn test_validate_repo() {
        let repo = validate_repo(create_repo(" git@example.com:org/myapp.git ")).unwrap();
        assert_eq!(repo.name, "myapp");
        assert_eq!(repo.repo, "git@example.com:org/myapp.git");

        assert!(validate_repo(create_repo("")).is_err());

        let mut req = create_repo(URL);
        req.branch = " ".to_string();
        assert!(validate_repo(req).is_err());

        let mut req = create_repo(URL);
        req.key_id = Some("nope".to_string());
        assert!(validate_repo(req).is_err());
    }

    #[tokio::test]
    async fn test_create_rejects_duplicates_and_unknown_keys() {
        let pool = test_pool().await;

        create(&pool, create_repo(URL)).await.unwrap();
        assert!(matches!(
            create(&pool, create_repo(URL)).await,
            Err(RepoError::AlreadyExists(..))
        ));

        let mut other_branch = create_repo(URL);
        other_branch.branch = "stable".to_string();
        create(&pool, other_branch).await.unwrap();

        let mut req = create_repo("https://example.com/org/other.git");
        req.key_id = Some(Uuid::new_v4().to_string());
        assert!(matches!(
            create(&pool, req).await,
            Err(RepoError::KeyNotFound(_))
        ));

        assert_eq!(list(&pool).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_builds_of_repo() {
        let pool = test_pool().await;
        let (orchestrator, _root) = orchestrator(&pool);
        let repo = create(&pool, create_repo(URL)).await.unwrap();

        let build = build_service::launch(&pool, orchestrator.clone(), create_build(URL))
            .await
            .unwrap();
        let other = build_service::launch(
            &pool,
            orchestrator,
            create_build("https://example.com/org/other.git"),
        )
        .await
        .unwrap();
        wait_for_build(&pool, build.id).await;
        wait_for_build(&pool, other.id).await;

        let found = builds(&pool, repo.id).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, build.id);
        assert!(matches!(
            builds(&pool, Uuid::new_v4()).await,
            Err(RepoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_with_builds() {
        let pool = test_pool().await;
        let (orchestrator, _root) = orchestrator(&pool);
        let repo = create(&pool, create_repo(URL)).await.unwrap();

        let finished = build_service::launch(&pool, orchestrator.clone(), create_build(URL))
            .await
            .unwrap();
        wait_for_build(&pool, finished.id).await;

        // A queued record that never ran
        let request = fabrica_core::domain::build::BuildRequest {
            name: "myapp".to_string(),
            repo: URL.to_string(),
            branch: "master".to_string(),
            key_id: None,
            distro: "focal".to_string(),
        };
        let queued = build_repository::create(&pool, &request).await.unwrap();

        let deleted = delete(&pool, &orchestrator, repo.id, true).await.unwrap();
        assert_eq!(deleted, 1);

        let remaining = build_repository::list_for_repo(&pool, URL).await.unwrap();
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, queued.id);
        assert_eq!(remaining[0].status, BuildStatus::Queued);
        assert!(matches!(
            delete(&pool, &orchestrator, repo.id, true).await,
            Err(RepoError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_keeps_builds_by_default() {
        let pool = test_pool().await;
        let (orchestrator, _root) = orchestrator(&pool);
        let repo = create(&pool, create_repo(URL)).await.unwrap();
        let build = build_service::launch(&pool, orchestrator.clone(), create_build(URL))
            .await
            .unwrap();
        wait_for_build(&pool, build.id).await;

        assert_eq!(delete(&pool, &orchestrator, repo.id, false).await.unwrap(), 0);
        assert!(list(&pool).await.unwrap().is_empty());
        assert_eq!(build_service::list(&pool).await.unwrap().len(), 1);
    }
}
