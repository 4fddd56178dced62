//! Timer Session Model
//!
//! The single persistent entity of the study timer: which activity is being
//! timed, its display metadata, and enough timing state to recompute elapsed
//! time from the wall clock. Also holds the on-disk record format.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use strum::Display;
use uuid::Uuid;

/// Public lifecycle status of the timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, Default)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TimerStatus {
    #[default]
    Idle,
    Running,
    Paused,
    /// A commit is in flight; guards against re-entrant `end`
    Ending,
}

/// Status a session can be stored with. `Idle` and `Ending` are never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ActiveStatus {
    Running,
    Paused,
}

impl From<ActiveStatus> for TimerStatus {
    fn from(status: ActiveStatus) -> Self {
        match status {
            ActiveStatus::Running => TimerStatus::Running,
            ActiveStatus::Paused => TimerStatus::Paused,
        }
    }
}

/// Display metadata for the activity being timed, looked up by the UI before
/// calling `start`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityInfo {
    pub session_subject_ref: String,
    pub label: String,
    pub category_label: String,
    pub category_color: String,
}

impl ActivityInfo {
    pub fn new(
        session_subject_ref: impl Into<String>,
        label: impl Into<String>,
        category_label: impl Into<String>,
        category_color: impl Into<String>,
    ) -> Self {
        Self {
            session_subject_ref: session_subject_ref.into(),
            label: label.into(),
            category_label: category_label.into(),
            category_color: category_color.into(),
        }
    }

    /// Validate the activity before a session is created from it
    pub fn validate(&self) -> Result<(), TimerSessionError> {
        if self.session_subject_ref.trim().is_empty() {
            return Err(TimerSessionError::MissingSubjectRef);
        }
        Ok(())
    }
}

/// In-memory state of a non-idle session
///
/// While running, `start_instant` is set and elapsed is `now - start_instant`.
/// While paused, `start_instant` is `None` and `accumulated_ms` is the frozen value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveSession {
    /// Correlation id minted when the session starts
    pub session_id: Uuid,
    pub activity: ActivityInfo,
    pub status: ActiveStatus,
    pub start_instant: Option<DateTime<Utc>>,
    pub accumulated_ms: u64,
}

impl ActiveSession {
    /// Begin a new running session at `now`
    pub fn begin(activity: ActivityInfo, now: DateTime<Utc>) -> Self {
        Self {
            session_id: Uuid::new_v4(),
            activity,
            status: ActiveStatus::Running,
            start_instant: Some(now),
            accumulated_ms: 0,
        }
    }

    pub fn subject_ref(&self) -> &str {
        &self.activity.session_subject_ref
    }

    pub fn is_running(&self) -> bool {
        self.status == ActiveStatus::Running
    }

    /// Elapsed milliseconds as of `now`, never negative
    pub fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.status, self.start_instant) {
            (ActiveStatus::Running, Some(start)) => millis_between(start, now),
            _ => self.accumulated_ms,
        }
    }

    /// Freeze elapsed time and clear the start instant
    pub fn pause(&mut self, now: DateTime<Utc>) {
        self.accumulated_ms = self.elapsed_ms(now);
        self.start_instant = None;
        self.status = ActiveStatus::Paused;
    }

    /// Resume so that elapsed continues from the frozen value
    pub fn resume(&mut self, now: DateTime<Utc>) {
        self.start_instant = Some(start_for_elapsed(now, self.accumulated_ms));
        self.status = ActiveStatus::Running;
    }

    /// Build the durable record, freezing the live elapsed value into it
    pub fn to_record(&self, now: DateTime<Utc>) -> TimerRecord {
        TimerRecord {
            session_id: self.session_id,
            session_subject_ref: self.activity.session_subject_ref.clone(),
            label: self.activity.label.clone(),
            category_label: self.activity.category_label.clone(),
            category_color: self.activity.category_color.clone(),
            status: self.status,
            start_instant: self.start_instant,
            accumulated_elapsed_ms: self.elapsed_ms(now),
            saved_at: Some(now),
        }
    }

    /// Rebuild a session from its durable record at instant `now`.
    ///
    /// A running record continues as if the process had never stopped:
    /// elapsed becomes `accumulated + (now - saved_at)`. Without a usable
    /// `saved_at` (missing, or ahead of `now`) elapsed resumes from exactly
    /// `accumulated`.
    pub fn from_record(record: TimerRecord, now: DateTime<Utc>) -> Result<Self, TimerSessionError> {
        record.validate()?;

        let TimerRecord {
            session_id,
            session_subject_ref,
            label,
            category_label,
            category_color,
            status,
            accumulated_elapsed_ms,
            saved_at,
            ..
        } = record;

        let start_instant = match status {
            ActiveStatus::Paused => None,
            ActiveStatus::Running => {
                let offline_ms = saved_at
                    .filter(|saved| *saved <= now)
                    .map_or(0, |saved| millis_between(saved, now));
                Some(start_for_elapsed(
                    now,
                    accumulated_elapsed_ms.saturating_add(offline_ms),
                ))
            }
        };

        Ok(Self {
            session_id,
            activity: ActivityInfo {
                session_subject_ref,
                label,
                category_label,
                category_color,
            },
            status,
            start_instant,
            accumulated_ms: accumulated_elapsed_ms,
        })
    }
}

/// Durable form of a session, stored as camelCase JSON
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerRecord {
    pub session_id: Uuid,
    pub session_subject_ref: String,
    pub label: String,
    pub category_label: String,
    pub category_color: String,
    pub status: ActiveStatus,
    pub start_instant: Option<DateTime<Utc>>,
    pub accumulated_elapsed_ms: u64,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,
}

impl TimerRecord {
    /// Reject records that cannot describe a live session
    pub fn validate(&self) -> Result<(), TimerSessionError> {
        if self.session_subject_ref.trim().is_empty() {
            return Err(TimerSessionError::MissingSubjectRef);
        }

        if self.status == ActiveStatus::Running && self.start_instant.is_none() {
            return Err(TimerSessionError::InconsistentRecord(
                "running record without start instant".to_string(),
            ));
        }

        Ok(())
    }
}

/// Milliseconds from `start` to `now`, clamped at zero
pub fn millis_between(start: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    u64::try_from((now - start).num_milliseconds()).unwrap_or(0)
}

fn start_for_elapsed(now: DateTime<Utc>, elapsed_ms: u64) -> DateTime<Utc> {
    let elapsed = i64::try_from(elapsed_ms).unwrap_or(i64::MAX);
    Duration::try_milliseconds(elapsed)
        .and_then(|elapsed| now.checked_sub_signed(elapsed))
        .unwrap_or(DateTime::<Utc>::MIN_UTC)
}

/// Timer session validation errors
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TimerSessionError {
    #[error("Timer session requires a subject reference")]
    MissingSubjectRef,

    #[error("Timer session record is inconsistent: {0}")]
    InconsistentRecord(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).single().unwrap()
    }

    fn at(ms: i64) -> DateTime<Utc> {
        t0() + Duration::milliseconds(ms)
    }

    fn math() -> ActivityInfo {
        ActivityInfo::new("ev1", "Math", "Calculus", "#ff0000")
    }

    #[test]
    fn test_begin_starts_running_at_zero() {
        let session = ActiveSession::begin(math(), t0());

        assert_eq!(session.status, ActiveStatus::Running);
        assert_eq!(session.elapsed_ms(t0()), 0);
        assert_eq!(session.elapsed_ms(at(5000)), 5000);
    }

    #[test]
    fn test_pause_resume_excludes_paused_interval() {
        let mut session = ActiveSession::begin(math(), t0());

        session.pause(at(4000));
        assert_eq!(session.start_instant, None);
        assert_eq!(session.elapsed_ms(at(60_000)), 4000);

        session.resume(at(60_000));
        assert_eq!(session.elapsed_ms(at(61_500)), 5500);
    }

    #[test]
    fn test_backward_clock_clamps_to_zero() {
        let session = ActiveSession::begin(math(), t0());
        assert_eq!(session.elapsed_ms(at(-2000)), 0);
    }

    #[test]
    fn test_record_round_trip_continues_running_time() {
        let session = ActiveSession::begin(math(), t0());
        let record = session.to_record(at(3000));
        assert_eq!(record.accumulated_elapsed_ms, 3000);

        let restored = ActiveSession::from_record(record, at(10_000)).unwrap();
        assert!(restored.is_running());
        assert_eq!(restored.elapsed_ms(at(10_000)), 10_000);
        assert_eq!(restored.session_id, session.session_id);
    }

    #[test]
    fn test_record_without_saved_at_resumes_from_accumulated() {
        let session = ActiveSession::begin(math(), t0());
        let mut record = session.to_record(at(3000));
        record.saved_at = None;

        let restored = ActiveSession::from_record(record, at(10_000)).unwrap();
        assert_eq!(restored.elapsed_ms(at(10_000)), 3000);
    }

    #[test]
    fn test_record_saved_in_future_ignores_offline_gap() {
        let session = ActiveSession::begin(math(), t0());
        let record = session.to_record(at(3000));

        let restored = ActiveSession::from_record(record, at(1000)).unwrap();
        assert_eq!(restored.elapsed_ms(at(1000)), 3000);
    }

    #[test]
    fn test_paused_record_stays_frozen() {
        let mut session = ActiveSession::begin(math(), t0());
        session.pause(at(2500));
        let record = session.to_record(at(9000));

        let restored = ActiveSession::from_record(record, at(20_000)).unwrap();
        assert_eq!(restored.status, ActiveStatus::Paused);
        assert_eq!(restored.elapsed_ms(at(30_000)), 2500);
    }

    #[test]
    fn test_record_json_shape() {
        let session = ActiveSession::begin(math(), t0());
        let json = serde_json::to_value(session.to_record(at(1000))).unwrap();

        assert_eq!(json["sessionSubjectRef"], "ev1");
        assert_eq!(json["categoryColor"], "#ff0000");
        assert_eq!(json["status"], "running");
        assert_eq!(json["accumulatedElapsedMs"], 1000);
        assert!(json.get("savedAt").is_some());
    }

    #[test]
    fn test_ending_status_is_not_a_record_status() {
        let session = ActiveSession::begin(math(), t0());
        let mut json = serde_json::to_value(session.to_record(t0())).unwrap();
        json["status"] = "ending".into();

        assert!(serde_json::from_value::<TimerRecord>(json).is_err());
    }

    #[test]
    fn test_record_validation() {
        let session = ActiveSession::begin(math(), t0());

        let mut record = session.to_record(t0());
        record.session_subject_ref = "  ".to_string();
        assert_eq!(record.validate(), Err(TimerSessionError::MissingSubjectRef));

        let mut record = session.to_record(t0());
        record.start_instant = None;
        assert!(matches!(
            ActiveSession::from_record(record, t0()),
            Err(TimerSessionError::InconsistentRecord(_))
        ));
    }

    #[test]
    fn test_activity_validation() {
        assert!(math().validate().is_ok());
        assert_eq!(
            ActivityInfo::new("", "Math", "Calculus", "#ff0000").validate(),
            Err(TimerSessionError::MissingSubjectRef)
        );
    }

    #[test]
    fn test_status_display() {
        assert_eq!(TimerStatus::Ending.to_string(), "ending");
        assert_eq!(TimerStatus::from(ActiveStatus::Paused), TimerStatus::Paused);
    }
}
