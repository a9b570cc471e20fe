//! API Module
//!
//! HTTP API layer for the server.
//! Each submodule handles endpoints for a specific domain.

pub mod build;
pub mod check;
pub mod error;
pub mod health;
pub mod key;
pub mod repo;

use axum::{
    Router,
    routing::{delete, get, post},
};
use fabrica_runner::BuildOrchestrator;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

/// Shared handler state
#[derive(Clone)]
pub struct AppState {
    pub pool: SqlitePool,
    pub orchestrator: Arc<BuildOrchestrator>,
}

/// Create the main API router with all endpoints
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health check
        .route("/health", get(health::health_check))
        // Build endpoints
        .route("/v1/build", post(build::launch_build))
        .route("/v1/builds", get(build::list_builds))
        .route("/v1/builds/{id}", get(build::get_build))
        .route("/v1/builds/{id}", delete(build::delete_build))
        .route("/v1/builds/{id}/download", get(build::download_artifact))
        // Repository endpoints
        .route("/v1/repos", get(repo::list_repos))
        .route("/v1/repos", post(repo::create_repo))
        .route("/v1/repos/{id}", delete(repo::delete_repo))
        .route("/v1/repos/{id}/builds", get(repo::list_repo_builds))
        // Environment checks
        .route("/v1/check/images", get(check::check_images))
        .route("/v1/check/connections", get(check::check_connections))
        // Key endpoints
        .route("/v1/keys", get(key::list_keys))
        .route("/v1/keys", post(key::create_key))
        .route("/v1/keys/{id}", delete(key::delete_key))
        // Add state and middleware
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::testing::{orchestrator, wait_for_build};
    use axum::body::Body;
    use axum::http::{Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;
    use uuid::Uuid;

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Vec<u8>) {
        let builder = Request::builder().method(method).uri(uri);
        let request = match body {
            Some(body) => builder
                .header(header::CONTENT_TYPE, "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };

        let response = app.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, bytes.to_vec())
    }

    fn json_body(bytes: &[u8]) -> Value {
        serde_json::from_slice(bytes).unwrap()
    }

    async fn app() -> (Router, SqlitePool, tempfile::TempDir) {
        let pool = test_pool().await;
        let (orchestrator, root) = orchestrator(&pool);
        let router = create_router(AppState {
            pool: pool.clone(),
            orchestrator,
        });
        (router, pool, root)
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _pool, _root) = app().await;
        let (status, body) = send(&app, "GET", "/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"OK");
    }

    #[tokio::test]
    async fn test_build_lifecycle() {
        let (app, pool, _root) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/build",
            Some(json!({"repo": "https://example.com/org/myapp.git", "distro": "focal"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let created = json_body(&body);
        assert_eq!(created["status"], "queued");
        assert_eq!(created["branch"], "master");
        let id: Uuid = created["id"].as_str().unwrap().parse().unwrap();

        wait_for_build(&pool, id).await;

        let (status, body) = send(&app, "GET", &format!("/v1/builds/{}", id), None).await;
        assert_eq!(status, StatusCode::OK);
        let build = json_body(&body);
        assert_eq!(build["status"], "complete");
        assert!(!build["logs"].as_array().unwrap().is_empty());

        let (status, body) = send(&app, "GET", "/v1/builds", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

        let (status, body) =
            send(&app, "GET", &format!("/v1/builds/{}/download", id), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, b"snap");

        let (status, _) = send(&app, "DELETE", &format!("/v1/builds/{}", id), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, "GET", &format!("/v1/builds/{}", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(json_body(&body)["error"].as_str().unwrap().contains("not found"));
    }

    #[tokio::test]
    async fn test_invalid_build_request() {
        let (app, _pool, _root) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/build",
            Some(json!({"repo": "", "distro": "focal"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json_body(&body)["error"], "repo cannot be empty");

        let (status, _) = send(
            &app,
            "POST",
            "/v1/build",
            Some(json!({
                "repo": "https://example.com/org/app.git",
                "distro": "focal",
                "keyId": Uuid::new_v4().to_string(),
            })),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_download_of_failed_build() {
        let (app, pool, _root) = app().await;

        let (status, body) = send(
            &app,
            "POST",
            "/v1/build",
            Some(json!({"repo": "https://example.com/org/broken.git", "distro": "focal"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let id: Uuid = json_body(&body)["id"].as_str().unwrap().parse().unwrap();
        wait_for_build(&pool, id).await;

        let (status, _) = send(&app, "GET", &format!("/v1/builds/{}/download", id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_repo_endpoints() {
        let (app, pool, _root) = app().await;
        let url = "https://example.com/org/myapp.git";

        let (status, body) = send(&app, "POST", "/v1/repos", Some(json!({"repo": url}))).await;
        assert_eq!(status, StatusCode::CREATED);
        let repo = json_body(&body);
        assert_eq!(repo["name"], "myapp");
        assert_eq!(repo["branch"], "master");
        let id = repo["id"].as_str().unwrap().to_string();

        let (status, _) = send(&app, "POST", "/v1/repos", Some(json!({"repo": url}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&app, "GET", "/v1/repos", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body).as_array().unwrap().len(), 1);

        let (_, body) = send(
            &app,
            "POST",
            "/v1/build",
            Some(json!({"repo": url, "distro": "focal"})),
        )
        .await;
        let build_id: Uuid = json_body(&body)["id"].as_str().unwrap().parse().unwrap();
        wait_for_build(&pool, build_id).await;

        let uri = format!("/v1/repos/{}/builds", id);
        let (status, body) = send(&app, "GET", &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json_body(&body)[0]["id"], build_id.to_string());

        let uri = format!("/v1/repos/{}?deleteBuilds=true", id);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = send(&app, "GET", &format!("/v1/builds/{}", build_id), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_check_endpoints() {
        let (app, _pool, _root) = app().await;

        let (status, body) = send(&app, "GET", "/v1/check/images", None).await;
        assert_eq!(status, StatusCode::OK);
        let images = json_body(&body);
        let focal = images
            .as_array()
            .unwrap()
            .iter()
            .find(|image| image["distro"] == "focal")
            .unwrap();
        assert_eq!(focal["alias"], "fabrica-focal");
        assert_eq!(focal["available"], true);

        let (status, body) = send(&app, "GET", "/v1/check/connections", None).await;
        assert_eq!(status, StatusCode::OK);
        let connections = json_body(&body);
        assert_eq!(connections.as_array().unwrap().len(), 3);
        assert!(
            connections
                .as_array()
                .unwrap()
                .iter()
                .all(|c| c["connected"] == true)
        );
    }

    #[tokio::test]
    async fn test_key_endpoints() {
        let (app, _pool, _root) = app().await;

        let (status, _) = send(
            &app,
            "POST",
            "/v1/keys",
            Some(json!({"name": "deploy", "data": "not base64!"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(
            &app,
            "POST",
            "/v1/keys",
            Some(json!({"name": "deploy", "username": "git", "data": "a2V5", "password": "hunter2"})),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        let key = json_body(&body);
        assert_eq!(key["has_password"], true);
        assert!(key.get("data").is_none());

        let (status, body) = send(&app, "GET", "/v1/keys", None).await;
        assert_eq!(status, StatusCode::OK);
        let text = String::from_utf8(body).unwrap();
        assert!(text.contains("deploy"));
        assert!(!text.contains("hunter2"));

        let uri = format!("/v1/keys/{}", key["id"].as_str().unwrap());
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, _) = send(&app, "DELETE", &uri, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}
