//! Shared fixtures for server tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use drones_game::MatchLocks;
use drones_server::{AppState, ArenaRepository, DbStore, EventHub, router};
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::NamedTempFile;
use tower::ServiceExt;

/// Creates a temporary database file with schema applied. The file handle
/// must stay in scope to keep the database alive.
pub fn setup_test_db() -> (NamedTempFile, ArenaRepository) {
    let db_file = NamedTempFile::new().expect("Failed to create temp file");
    let db_path = db_file.path().to_str().expect("Invalid path").to_string();
    let repo = ArenaRepository::new(db_path);
    repo.run_migrations().expect("Migrations failed");
    (db_file, repo)
}

pub struct TestApp {
    pub _db: NamedTempFile,
    pub state: AppState,
    pub router: Router,
}

/// Full application over a fresh database.
pub fn test_app() -> TestApp {
    let (db, repo) = setup_test_db();
    let state = AppState::assemble(
        Arc::new(DbStore::new(repo)),
        MatchLocks::new(Duration::from_millis(500)),
        EventHub::new(),
    );
    let router = router(state.clone());
    TestApp {
        _db: db,
        state,
        router,
    }
}

impl TestApp {
    /// Sends one request and returns status plus decoded JSON body.
    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router is infallible");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body readable")
            .to_bytes();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        self.send(Request::get(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post(&self, uri: &str, body: Value) -> (StatusCode, Value) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Registers a player and returns its id.
    pub async fn register(&self, name: &str) -> i64 {
        let (status, body) = self
            .post("/players", serde_json::json!({ "name": name }))
            .await;
        assert_eq!(status, StatusCode::CREATED, "register {name}: {body}");
        body["data"]["id"].as_i64().expect("player id")
    }
}
