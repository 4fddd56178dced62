//! Commit Protocol
//!
//! Outcome and failure types for ending a session, and the timeout wrapper
//! around the single outbound call to the session store.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::models::StudySessionRequest;
use crate::services::session_store::SessionStore;

/// Reasons a commit did not persist the session. All of them leave the
/// session intact and may be retried by calling `end` again.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommitError {
    #[error("Session store unreachable: {0}")]
    Network(String),

    #[error("Session store rejected the session ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Session store did not answer within {after_ms}ms")]
    Timeout { after_ms: u64 },

    #[error("Session store endpoint is invalid: {0}")]
    InvalidEndpoint(String),

    #[error("Commit was interrupted before the session store answered")]
    Interrupted,
}

impl CommitError {
    /// Stable code for API responses and logs
    pub fn code(&self) -> &'static str {
        match self {
            CommitError::Network(_) => "CommitNetworkError",
            CommitError::Rejected { .. } => "CommitRejected",
            CommitError::Timeout { .. } => "CommitTimeout",
            CommitError::InvalidEndpoint(_) => "CommitInvalidEndpoint",
            CommitError::Interrupted => "CommitInterrupted",
        }
    }
}

/// A session that was durably recorded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CommittedSession {
    pub session_id: Uuid,
    pub session_subject_ref: String,
    pub duration_ms: u64,
    /// Where the caller should navigate next
    pub next_route: String,
}

/// Why `end` did nothing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum SkipReason {
    Idle,
    AlreadyEnding,
}

/// Result of `end`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndOutcome {
    Committed(CommittedSession),
    Skipped(SkipReason),
    Failed(CommitError),
}

impl EndOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, EndOutcome::Committed(_))
    }
}

/// Issue one commit, treating an elapsed `timeout` as a failure
pub async fn commit_with_timeout(
    store: &dyn SessionStore,
    request: &StudySessionRequest,
    timeout: Duration,
) -> Result<(), CommitError> {
    match tokio::time::timeout(timeout, store.create_study_session(request)).await {
        Ok(result) => result,
        Err(_) => Err(CommitError::Timeout {
            after_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }),
    }
}
