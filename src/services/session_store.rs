//! Session Store Collaborator
//!
//! The external service that records finished study sessions. The timer only
//! talks to it through [`SessionStore`]; production uses HTTP.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::COOKIE;
use tokio::sync::Semaphore;
use tracing::debug;
use url::Url;

use crate::error::AppResult;
use crate::models::StudySessionRequest;
use crate::services::commit::CommitError;

/// Path of the study-sessions endpoint relative to the API base URL
pub const STUDY_SESSIONS_PATH: &str = "/api/study-sessions";

/// Records a finished study interval
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn create_study_session(&self, request: &StudySessionRequest) -> Result<(), CommitError>;
}

/// Session store reached over HTTP
#[derive(Debug, Clone)]
pub struct HttpSessionStore {
    client: reqwest::Client,
    endpoint: Url,
    auth_cookie: Option<String>,
}

impl HttpSessionStore {
    pub fn new(client: reqwest::Client, endpoint: Url, auth_cookie: Option<String>) -> Self {
        Self {
            client,
            endpoint,
            auth_cookie,
        }
    }

    /// Build a store posting to `{base_url}/api/study-sessions`
    pub fn from_base_url(
        base_url: &Url,
        auth_cookie: Option<String>,
        connect_timeout: Duration,
    ) -> AppResult<Self> {
        let endpoint = base_url.join(STUDY_SESSIONS_PATH)?;
        let client = reqwest::Client::builder()
            .connect_timeout(connect_timeout)
            .build()?;

        Ok(Self::new(client, endpoint, auth_cookie))
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl SessionStore for HttpSessionStore {
    async fn create_study_session(&self, request: &StudySessionRequest) -> Result<(), CommitError> {
        let mut builder = self.client.post(self.endpoint.clone()).json(request);
        if let Some(cookie) = &self.auth_cookie {
            builder = builder.header(COOKIE, cookie);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| {
                if e.is_builder() {
                    CommitError::InvalidEndpoint(e.to_string())
                } else {
                    CommitError::Network(e.to_string())
                }
            })?;

        let status = response.status();
        if status.is_success() {
            debug!(endpoint = %self.endpoint, status = status.as_u16(), "Study session stored");
            return Ok(());
        }

        // Error bodies look like {"error": "..."}; fall back to the reason phrase
        let message = response
            .json::<serde_json::Value>()
            .await
            .ok()
            .and_then(|body| body.get("error").and_then(|e| e.as_str()).map(str::to_string))
            .unwrap_or_else(|| status.canonical_reason().unwrap_or("unknown").to_string());

        Err(CommitError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// In-process session store that records every request.
///
/// Can be told to fail, and can be gated so calls stay in flight until
/// [`RecordingSessionStore::release`] is called.
#[derive(Debug, Default)]
pub struct RecordingSessionStore {
    requests: Mutex<Vec<StudySessionRequest>>,
    failure: Mutex<Option<CommitError>>,
    gate: Option<Arc<Semaphore>>,
}

impl RecordingSessionStore {
    /// Store that accepts every session
    pub fn new() -> Self {
        Self::default()
    }

    /// Store that rejects every session with `error`
    pub fn failing(error: CommitError) -> Self {
        let store = Self::new();
        store.set_failure(Some(error));
        store
    }

    /// Store whose calls block until released
    pub fn gated() -> Self {
        Self {
            gate: Some(Arc::new(Semaphore::new(0))),
            ..Self::default()
        }
    }

    /// Change the answer for subsequent calls
    pub fn set_failure(&self, failure: Option<CommitError>) {
        *lock(&self.failure) = failure;
    }

    /// Let one blocked call proceed
    pub fn release(&self) {
        if let Some(gate) = &self.gate {
            gate.add_permits(1);
        }
    }

    pub fn requests(&self) -> Vec<StudySessionRequest> {
        lock(&self.requests).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.requests).len()
    }
}

#[async_trait]
impl SessionStore for RecordingSessionStore {
    async fn create_study_session(&self, request: &StudySessionRequest) -> Result<(), CommitError> {
        lock(&self.requests).push(request.clone());

        if let Some(gate) = &self.gate {
            let permit = gate
                .acquire()
                .await
                .map_err(|e| CommitError::Network(e.to_string()))?;
            permit.forget();
        }

        match lock(&self.failure).clone() {
            Some(error) => Err(error),
            None => Ok(()),
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        extract::State,
        http::{header, HeaderMap, StatusCode},
        routing::post,
        Json, Router,
    };
    use serde_json::{json, Value};
    use tokio::net::TcpListener;

    type Seen = Arc<Mutex<Vec<(Value, Option<String>)>>>;

    /// Serve a fake study-sessions endpoint answering with `status`
    async fn spawn_endpoint(status: StatusCode) -> (Url, Seen) {
        let seen: Seen = Arc::new(Mutex::new(Vec::new()));

        let handler = move |State(seen): State<Seen>, headers: HeaderMap, Json(body): Json<Value>| async move {
            let cookie = headers
                .get(header::COOKIE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            seen.lock().unwrap().push((body, cookie));
            if status.is_success() {
                (status, Json(json!({ "id": "s1" })))
            } else {
                (status, Json(json!({ "error": "Internal server error" })))
            }
        };

        let app = Router::new()
            .route(STUDY_SESSIONS_PATH, post(handler))
            .with_state(seen.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });

        (Url::parse(&format!("http://{addr}")).unwrap(), seen)
    }

    #[tokio::test]
    async fn test_http_store_posts_wire_body() {
        let (base, seen) = spawn_endpoint(StatusCode::OK).await;
        let store = HttpSessionStore::from_base_url(
            &base,
            Some("session_token=abc".to_string()),
            Duration::from_secs(5),
        )
        .unwrap();

        let result = store
            .create_study_session(&StudySessionRequest::new("ev1", 7000))
            .await;

        assert!(result.is_ok());
        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].0, json!({ "eventId": "ev1", "durationMs": 7000 }));
        assert_eq!(seen[0].1.as_deref(), Some("session_token=abc"));
    }

    #[tokio::test]
    async fn test_http_store_maps_server_error() {
        let (base, _seen) = spawn_endpoint(StatusCode::INTERNAL_SERVER_ERROR).await;
        let store = HttpSessionStore::from_base_url(&base, None, Duration::from_secs(5)).unwrap();

        let result = store
            .create_study_session(&StudySessionRequest::new("ev1", 1))
            .await;

        assert_eq!(
            result,
            Err(CommitError::Rejected {
                status: 500,
                message: "Internal server error".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_http_store_maps_unreachable_host() {
        // Bind then drop to get a port nothing listens on
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let base = Url::parse(&format!("http://{addr}")).unwrap();
        let store = HttpSessionStore::from_base_url(&base, None, Duration::from_secs(1)).unwrap();

        let result = store
            .create_study_session(&StudySessionRequest::new("ev1", 1))
            .await;

        assert!(matches!(result, Err(CommitError::Network(_))));
    }

    #[test]
    fn test_endpoint_ignores_base_path() {
        let base = Url::parse("http://localhost:3000/dashboard").unwrap();
        let store = HttpSessionStore::from_base_url(&base, None, Duration::from_secs(1)).unwrap();

        assert_eq!(store.endpoint().as_str(), "http://localhost:3000/api/study-sessions");
    }

    #[tokio::test]
    async fn test_recording_store_switches_answer() {
        let store = RecordingSessionStore::failing(CommitError::Network("offline".into()));
        let request = StudySessionRequest::new("ev1", 10);

        assert!(store.create_study_session(&request).await.is_err());
        store.set_failure(None);
        assert!(store.create_study_session(&request).await.is_ok());
        assert_eq!(store.call_count(), 2);
    }
}
