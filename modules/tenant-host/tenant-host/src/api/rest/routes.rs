use std::sync::Arc;

use axum::routing::{get, post};
use axum::{Extension, Router};

use super::handlers;
use crate::domain::service::TenantHostService;

pub const BASE_PATH: &str = "/apphost/v1";

/// Build the tenant host REST router nested under [`BASE_PATH`].
pub fn router(service: Arc<TenantHostService>) -> Router {
    let api = Router::new()
        .route("/tenants", get(handlers::list_tenants))
        .route("/tenants/{id}", get(handlers::get_tenant))
        .route("/tenants/{id}/health", get(handlers::health))
        .route("/tenants/{id}/selftest", get(handlers::selftest))
        .route("/tenants/{id}/upstream/{*path}", get(handlers::passthrough))
        .route("/tenants/{id}/lock", get(handlers::get_lock))
        .route(
            "/tenants/{id}/tasks/{task_id}/lock",
            post(handlers::acquire_lock).delete(handlers::release_lock),
        )
        .route(
            "/tenants/{id}/settings",
            get(handlers::get_settings).patch(handlers::patch_settings),
        )
        .route(
            "/tenants/{id}/files/{*path}",
            get(handlers::read_file).put(handlers::write_file),
        )
        .route("/tenants/{id}/sql/query", post(handlers::sql_query))
        .route("/tenants/{id}/sql/execute", post(handlers::sql_execute))
        .route("/registry/reload", post(handlers::reload_registry))
        .layer(Extension(service));

    Router::new().nest(BASE_PATH, api)
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use super::*;
    use crate::config::TenantHostConfig;
    use crate::domain::ports::{UpstreamClient, UpstreamError, UpstreamResponse};
    use crate::domain::registry::RegistryEntry;
    use crate::module::TenantHostModule;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use bytes::Bytes;
    use serde_json::{Value, json};
    use tower::ServiceExt as _;

    struct FixedUpstream {
        status: Option<u16>,
    }

    #[async_trait]
    impl UpstreamClient for FixedUpstream {
        async fn get(&self, url: &str) -> Result<UpstreamResponse, UpstreamError> {
            match self.status {
                Some(status) => Ok(UpstreamResponse {
                    status,
                    content_type: Some("application/json".to_owned()),
                    body: Bytes::from(format!(r#"{{"url":"{url}"}}"#)),
                }),
                None => Err(UpstreamError::Transport("connection refused".to_owned())),
            }
        }
    }

    fn entry(id: &str, upstream: Option<&str>) -> RegistryEntry {
        RegistryEntry {
            id: id.to_owned(),
            name: id.to_owned(),
            permissions: vec!["files".to_owned()],
            upstream_base_url: upstream.map(str::to_owned),
            health_path: upstream.map(|_| "/h".to_owned()),
        }
    }

    fn module(root: &std::path::Path, upstream_status: Option<u16>) -> TenantHostModule {
        let mut cfg = TenantHostConfig::default();
        cfg.registry.tenants = vec![
            entry("gym-tracker", None),
            entry("notes", None),
            entry("feed", Some("https://feed.example")),
        ];
        TenantHostModule::with_upstream(
            &cfg,
            root.to_path_buf(),
            Arc::new(FixedUpstream {
                status: upstream_status,
            }),
        )
        .unwrap()
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let mut req = Request::builder().method(method).uri(uri);
        let body = match body {
            Some(v) => {
                req = req.header("content-type", "application/json");
                Body::from(v.to_string())
            }
            None => Body::empty(),
        };
        let response = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let json = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::String(
                String::from_utf8_lossy(&bytes).into_owned(),
            ))
        };
        (status, json)
    }

    #[tokio::test]
    async fn lists_registered_tenants() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants", None).await;
        assert_eq!(status, StatusCode::OK);
        let ids: Vec<&str> = json
            .as_array()
            .unwrap()
            .iter()
            .map(|t| t["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, vec!["feed", "gym-tracker", "notes"]);
        assert_eq!(json[0]["external"], true);
        assert!(json[0].get("upstream_base_url").is_none());
    }

    #[tokio::test]
    async fn invalid_and_unknown_ids_are_problems() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/Bad_Id/health", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "TENANT_INVALID_ID");
        assert_eq!(json["instance"], "/apphost/v1/tenants/Bad_Id/health");

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/ghost/settings", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(json["code"], "TENANT_UNKNOWN");
        assert!(!dir.path().join("ghost").exists());
    }

    #[tokio::test]
    async fn health_reports_local_and_registry_sources() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/notes/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["ok"], true);
        assert_eq!(json["source"], "local");
        assert!(json.get("status").is_none());

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/feed/health", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["source"], "registry");
        assert_eq!(json["status"], 200);
    }

    #[tokio::test]
    async fn failed_upstream_health_is_bad_gateway() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), None);
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/feed/health", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["ok"], false);
        assert_eq!(json["id"], "feed");
        assert_eq!(json["source"], "registry");
        assert!(json["error"].as_str().unwrap().contains("refused"));
        assert!(json.get("status").is_none());
    }

    #[tokio::test]
    async fn upstream_error_status_is_reported_in_health_body() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(503));
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/feed/health", None).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(json["ok"], false);
        assert_eq!(json["status"], 503);
        assert_eq!(json["error"], "upstream returned status 503");
    }

    #[tokio::test]
    async fn passthrough_returns_upstream_body() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) =
            send(&app, "GET", "/apphost/v1/tenants/feed/upstream/api/posts", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["url"], "https://feed.example/api/posts");

        let (status, _) =
            send(&app, "GET", "/apphost/v1/tenants/notes/upstream/api/posts", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn lock_conflict_returns_holder() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();
        let uri = "/apphost/v1/tenants/notes/tasks/digest/lock";

        let (status, json) = send(&app, "POST", uri, Some(json!({"session_id": "human"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["locked"], true);
        assert_eq!(json["lock"]["session_id"], "human");

        let (status, json) = send(&app, "POST", uri, Some(json!({"session_id": "agent"}))).await;
        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(json["ok"], false);
        assert_eq!(json["lock"]["session_id"], "human");

        let (_, json) = send(&app, "GET", "/apphost/v1/tenants/notes/lock?task_id=digest", None).await;
        assert_eq!(json["locked"], true);

        let (status, json) = send(&app, "DELETE", &format!("{uri}?session_id=human"), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["released"], true);

        let (_, json) = send(&app, "GET", "/apphost/v1/tenants/notes/lock", None).await;
        assert_eq!(json["locked"], false);
        assert_eq!(json["lock"], Value::Null);
    }

    #[tokio::test]
    async fn settings_patch_then_get() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();
        let uri = "/apphost/v1/tenants/notes/settings";

        let (status, json) = send(
            &app,
            "PATCH",
            uri,
            Some(json!({"automation_enabled": true, "digest.hour": 7})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["settings"]["automation_enabled"], true);

        let (_, json) = send(&app, "PATCH", uri, Some(json!({"digest.hour": null}))).await;
        assert!(json["settings"].get("digest.hour").is_none());

        let (_, json) = send(&app, "GET", uri, None).await;
        assert_eq!(json["settings"], json!({"automation_enabled": true}));
    }

    #[tokio::test]
    async fn files_round_trip_and_escape() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let req = Request::builder()
            .method("PUT")
            .uri("/apphost/v1/tenants/gym-tracker/files/logs/ping.txt")
            .body(Body::from("ping @ T"))
            .unwrap();
        let response = app.clone().oneshot(req).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let (status, body) =
            send(&app, "GET", "/apphost/v1/tenants/gym-tracker/files/logs/ping.txt", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, Value::String("ping @ T".to_owned()));

        let (status, json) =
            send(&app, "GET", "/apphost/v1/tenants/gym-tracker/files/a/../../app.db", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["code"], "TENANT_PATH_ESCAPE");
    }

    #[tokio::test]
    async fn sql_guardrail_and_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) = send(
            &app,
            "POST",
            "/apphost/v1/tenants/notes/sql/execute",
            Some(json!({"statement": "PRAGMA foreign_keys=OFF"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(json["code"], "TENANT_SQL_REJECTED");

        let (status, _) = send(
            &app,
            "POST",
            "/apphost/v1/tenants/notes/sql/execute",
            Some(json!({"statement": "CREATE TABLE notes (id INTEGER PRIMARY KEY, body TEXT)"})),
        )
        .await;
        assert_eq!(status, StatusCode::OK);

        let (_, json) = send(
            &app,
            "POST",
            "/apphost/v1/tenants/notes/sql/execute",
            Some(json!({"statement": "INSERT INTO notes (body) VALUES (?)", "params": ["hello"]})),
        )
        .await;
        assert_eq!(json["rows_affected"], 1);

        let (_, json) = send(
            &app,
            "POST",
            "/apphost/v1/tenants/notes/sql/query",
            Some(json!({"statement": "SELECT * FROM notes WHERE id = ?", "params": [1]})),
        )
        .await;
        assert_eq!(json["columns"], json!(["id", "body"]));
        assert_eq!(json["rows"], json!([[1, "hello"]]));
    }

    #[tokio::test]
    async fn selftest_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let m = module(dir.path(), Some(200));
        let app = m.router();

        let (status, json) = send(&app, "GET", "/apphost/v1/tenants/gym-tracker/selftest", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["matches"], true);
        assert_eq!(json["written"], json["read"]);
        assert_eq!(json["rows"]["rows"].as_array().unwrap().len(), 1);
    }
}
