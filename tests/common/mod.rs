//! Shared helpers for integration tests

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::net::TcpListener;
use url::Url;

use focusflow_timer::models::ActivityInfo;
use focusflow_timer::services::{
    FileStore, HttpSessionStore, MockTimeProvider, SessionStore, TimerService, TimerSettings,
};

pub fn math() -> ActivityInfo {
    ActivityInfo::new("ev1", "Math", "Calculus", "#ff0000")
}

pub fn physics() -> ActivityInfo {
    ActivityInfo::new("ev2", "Physics", "Mechanics", "#00ff00")
}

pub fn fixed_clock() -> MockTimeProvider {
    MockTimeProvider::new_from_ymd_hms(2025, 3, 1, 9, 0, 0).unwrap()
}

/// A timer over a state file inside a temporary directory
pub struct FileBackedTimer {
    pub dir: TempDir,
    pub clock: MockTimeProvider,
}

impl FileBackedTimer {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
            clock: fixed_clock(),
        }
    }

    pub fn state_path(&self) -> PathBuf {
        self.dir.path().join("timer-state.json")
    }

    /// Open the state file and build a timer over it, like an app start
    pub fn open(&self, sessions: Arc<dyn SessionStore>) -> TimerService {
        TimerService::new(
            Arc::new(FileStore::open(self.state_path()).unwrap()),
            Arc::new(self.clock.clone()),
            sessions,
            TimerSettings::default(),
        )
    }

    pub fn stored(&self) -> Value {
        read_json(&self.state_path())
    }
}

pub fn read_json(path: &Path) -> Value {
    match std::fs::read_to_string(path) {
        Ok(raw) => serde_json::from_str(&raw).unwrap(),
        Err(_) => json!({}),
    }
}

/// Stand-in for the application API's study-session endpoint
#[derive(Clone)]
pub struct FakeApi {
    pub base_url: Url,
    received: Arc<Mutex<Vec<(Value, Option<String>)>>>,
    status: Arc<Mutex<StatusCode>>,
}

impl FakeApi {
    pub async fn spawn() -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let status = Arc::new(Mutex::new(StatusCode::CREATED));

        let app = Router::new()
            .route("/api/study-sessions", post(create_study_session))
            .with_state((received.clone(), status.clone()));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        Self {
            base_url: Url::parse(&format!("http://{addr}")).unwrap(),
            received,
            status,
        }
    }

    pub fn respond_with(&self, status: StatusCode) {
        *self.status.lock().unwrap() = status;
    }

    pub fn received(&self) -> Vec<(Value, Option<String>)> {
        self.received.lock().unwrap().clone()
    }

    pub fn client(&self, auth_cookie: Option<&str>) -> HttpSessionStore {
        HttpSessionStore::from_base_url(
            &self.base_url,
            auth_cookie.map(str::to_string),
            Duration::from_secs(5),
        )
        .unwrap()
    }
}

type FakeState = (
    Arc<Mutex<Vec<(Value, Option<String>)>>>,
    Arc<Mutex<StatusCode>>,
);

async fn create_study_session(
    State((received, status)): State<FakeState>,
    headers: axum::http::HeaderMap,
    Json(body): Json<Value>,
) -> (StatusCode, Json<Value>) {
    let cookie = headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    received.lock().unwrap().push((body, cookie));

    let status = *status.lock().unwrap();
    if status.is_success() {
        (status, Json(json!({ "id": "ss_1" })))
    } else {
        (status, Json(json!({ "error": "Internal server error" })))
    }
}
