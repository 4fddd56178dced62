//! Study Session Commit Model
//!
//! Wire body sent to the session store when a timer ends.

use serde::{Deserialize, Serialize};

/// Request to record a finished study interval.
///
/// Field names on the wire (`eventId`, `durationMs`) match the study-sessions
/// endpoint of the web application.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StudySessionRequest {
    #[serde(rename = "eventId")]
    pub session_subject_ref: String,

    #[serde(rename = "durationMs")]
    pub duration_ms: u64,
}

impl StudySessionRequest {
    pub fn new(session_subject_ref: impl Into<String>, duration_ms: u64) -> Self {
        Self {
            session_subject_ref: session_subject_ref.into(),
            duration_ms,
        }
    }
}
