//! Timer Service
//!
//! The study timer state machine. Owns the current session, computes elapsed
//! time from the wall clock, persists after every applied transition, and runs
//! the single-flight commit when a session ends.
//!
//! Transitions that do not apply (pausing an idle timer, resuming a running
//! one, anything timing-related while a commit is in flight) are no-ops: they
//! return without saving and without error.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, Instrument};
use uuid::Uuid;

use crate::logging;
use crate::models::{
    ActiveSession, ActivityInfo, OverlaySize, Position, StudySessionRequest, TimerRecord,
    TimerSessionError, TimerStatus, Viewport,
};
use crate::services::commit::{
    commit_with_timeout, CommitError, CommittedSession, EndOutcome, SkipReason,
};
use crate::services::drag_position::{OverlayPositionManager, SnapSettings};
use crate::services::durable_store::{DurableStore, ALL_TIMER_KEYS, TIMER_KEY};
use crate::services::presentation::{format_elapsed, restore_route, PresentationController};
use crate::services::session_store::SessionStore;
use crate::services::time_provider::TimeProvider;

/// Knobs the state machine needs from configuration
#[derive(Debug, Clone, PartialEq)]
pub struct TimerSettings {
    /// Upper bound on the commit call
    pub commit_timeout: Duration,
    /// Whether display refresh ticks also write the session record
    pub persist_on_tick: bool,
    /// Route handed back to the caller after a successful commit
    pub results_route: String,
    pub viewport: Viewport,
    pub overlay_size: OverlaySize,
    pub snap: SnapSettings,
}

impl Default for TimerSettings {
    fn default() -> Self {
        Self {
            commit_timeout: Duration::from_secs(10),
            persist_on_tick: true,
            results_route: "/dashboard/analytics".to_string(),
            viewport: Viewport::default(),
            overlay_size: OverlaySize::default(),
            snap: SnapSettings::default(),
        }
    }
}

/// What `start` did
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StartOutcome {
    /// New session from idle
    Started,
    /// Same subject already active; timing untouched, ensured running
    Reentered,
    /// A different subject was active and has been dropped without commit
    #[serde(rename_all = "camelCase")]
    Replaced {
        previous_subject_ref: String,
        abandoned_elapsed_ms: u64,
    },
    /// A commit is in flight
    Ignored,
}

/// Commit error as shown to the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SnapshotError {
    pub code: &'static str,
    pub message: String,
}

impl From<&CommitError> for SnapshotError {
    fn from(error: &CommitError) -> Self {
        Self {
            code: error.code(),
            message: error.to_string(),
        }
    }
}

/// Point-in-time view of the timer for rendering
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimerSnapshot {
    pub session_id: Option<Uuid>,
    pub session_subject_ref: Option<String>,
    pub label: String,
    pub category_label: String,
    pub category_color: String,
    pub status: TimerStatus,
    pub elapsed_ms: u64,
    pub formatted_elapsed: String,
    pub is_minimized: bool,
    pub error: Option<SnapshotError>,
    pub position: Position,
}

/// Everything the floating overlay needs to render for a given page
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OverlayView {
    pub visible: bool,
    pub position: Position,
    pub restore_route: Option<String>,
    pub formatted_elapsed: String,
}

struct TimerInner {
    session: Option<ActiveSession>,
    /// Final elapsed frozen while a commit is in flight
    ending: Option<u64>,
    presentation: PresentationController,
    overlay: OverlayPositionManager,
    last_error: Option<CommitError>,
    /// Keys a commit could not clear
    stale_keys: Vec<&'static str>,
}

impl TimerInner {
    fn status(&self) -> TimerStatus {
        match (&self.session, self.ending) {
            (None, _) => TimerStatus::Idle,
            (Some(_), Some(_)) => TimerStatus::Ending,
            (Some(session), None) => session.status.into(),
        }
    }

    fn elapsed_ms(&self, now: DateTime<Utc>) -> u64 {
        match (self.ending, &self.session) {
            (Some(frozen), _) => frozen,
            (None, Some(session)) => session.elapsed_ms(now),
            (None, None) => 0,
        }
    }

    fn snapshot(&self, now: DateTime<Utc>) -> TimerSnapshot {
        let elapsed_ms = self.elapsed_ms(now);
        let activity = self.session.as_ref().map(|s| &s.activity);

        TimerSnapshot {
            session_id: self.session.as_ref().map(|s| s.session_id),
            session_subject_ref: activity.map(|a| a.session_subject_ref.clone()),
            label: activity.map(|a| a.label.clone()).unwrap_or_default(),
            category_label: activity.map(|a| a.category_label.clone()).unwrap_or_default(),
            category_color: activity.map(|a| a.category_color.clone()).unwrap_or_default(),
            status: self.status(),
            elapsed_ms,
            formatted_elapsed: format_elapsed(elapsed_ms),
            is_minimized: self.presentation.is_minimized(),
            error: self.last_error.as_ref().map(SnapshotError::from),
            position: self.overlay.position(),
        }
    }

    fn session_label(&self) -> String {
        self.session
            .as_ref()
            .map_or_else(|| "none".to_string(), |s| s.session_id.to_string())
    }
}

/// The study timer. Cheap to clone; clones share one timer.
#[derive(Clone)]
pub struct TimerService {
    inner: Arc<Mutex<TimerInner>>,
    store: Arc<dyn DurableStore>,
    clock: Arc<dyn TimeProvider>,
    sessions: Arc<dyn SessionStore>,
    settings: Arc<TimerSettings>,
    snapshots: Arc<watch::Sender<TimerSnapshot>>,
    statuses: Arc<watch::Sender<TimerStatus>>,
}

impl TimerService {
    /// Build the timer, recovering any session left in `store`
    pub fn new(
        store: Arc<dyn DurableStore>,
        clock: Arc<dyn TimeProvider>,
        sessions: Arc<dyn SessionStore>,
        settings: TimerSettings,
    ) -> Self {
        let now = clock.now_utc();
        let session = restore_session(store.as_ref(), now);

        let mut presentation = PresentationController::load(store.as_ref());
        if session.is_none() {
            presentation.reset();
        }

        let overlay = OverlayPositionManager::load(
            store.as_ref(),
            settings.viewport,
            settings.overlay_size,
            settings.snap,
        );

        let inner = TimerInner {
            session,
            ending: None,
            presentation,
            overlay,
            last_error: None,
            stale_keys: Vec::new(),
        };

        if let Some(session) = &inner.session {
            logging::log_timer_transition(
                &session.session_id.to_string(),
                "restore_from_storage",
                inner.status(),
                inner.elapsed_ms(now),
            );
        }

        let (snapshots, _) = watch::channel(inner.snapshot(now));
        let (statuses, _) = watch::channel(inner.status());

        Self {
            inner: Arc::new(Mutex::new(inner)),
            store,
            clock,
            sessions,
            settings: Arc::new(settings),
            snapshots: Arc::new(snapshots),
            statuses: Arc::new(statuses),
        }
    }

    pub fn settings(&self) -> &TimerSettings {
        &self.settings
    }

    /// Current view of the timer
    pub fn snapshot(&self) -> TimerSnapshot {
        let now = self.clock.now_utc();
        self.lock().snapshot(now)
    }

    pub fn status(&self) -> TimerStatus {
        self.lock().status()
    }

    /// Elapsed milliseconds right now, excluding paused intervals
    pub fn elapsed_ms(&self) -> u64 {
        let now = self.clock.now_utc();
        self.lock().elapsed_ms(now)
    }

    pub fn is_minimized(&self) -> bool {
        self.lock().presentation.is_minimized()
    }

    /// Snapshots published on every transition and refresh tick
    pub fn subscribe(&self) -> watch::Receiver<TimerSnapshot> {
        self.snapshots.subscribe()
    }

    /// Status changes only
    pub fn subscribe_status(&self) -> watch::Receiver<TimerStatus> {
        self.statuses.subscribe()
    }

    /// Start timing `activity`.
    ///
    /// Starting the subject that is already active keeps its elapsed time and
    /// only makes sure it is running and not minimized. Starting a different
    /// subject drops the active one without committing it.
    pub fn start(&self, activity: ActivityInfo) -> Result<StartOutcome, TimerSessionError> {
        activity.validate()?;

        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.ending.is_some() {
            debug!(subject_ref = %activity.session_subject_ref, "Ignoring start while a commit is in flight");
            return Ok(StartOutcome::Ignored);
        }
        self.clear_stale_keys(&mut inner);

        let outcome = match inner.session.take() {
            Some(mut current) if current.subject_ref() == activity.session_subject_ref => {
                if !current.is_running() {
                    current.resume(now);
                }
                inner.session = Some(current);
                StartOutcome::Reentered
            }
            Some(previous) => {
                let abandoned_elapsed_ms = previous.elapsed_ms(now);
                logging::log_warning(
                    &format!(
                        "dropping uncommitted session for {} after {abandoned_elapsed_ms}ms",
                        previous.subject_ref()
                    ),
                    "start replaced active session",
                    Some(&previous.session_id.to_string()),
                );
                inner.session = Some(ActiveSession::begin(activity, now));
                StartOutcome::Replaced {
                    previous_subject_ref: previous.activity.session_subject_ref,
                    abandoned_elapsed_ms,
                }
            }
            None => {
                inner.session = Some(ActiveSession::begin(activity, now));
                StartOutcome::Started
            }
        };

        inner.presentation.restore();
        if outcome != StartOutcome::Reentered {
            inner.last_error = None;
        }

        self.commit_transition(&inner, now, "start");
        Ok(outcome)
    }

    /// Freeze elapsed time. No-op unless running.
    pub fn pause(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.ending.is_some() {
            return ignored("pause", &inner);
        }
        let applied = match inner.session.as_mut() {
            Some(session) if session.is_running() => {
                session.pause(now);
                true
            }
            _ => false,
        };
        if !applied {
            return ignored("pause", &inner);
        }

        self.commit_transition(&inner, now, "pause");
        true
    }

    /// Continue from the frozen elapsed time. No-op unless paused.
    pub fn resume(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.ending.is_some() {
            return ignored("resume", &inner);
        }
        let applied = match inner.session.as_mut() {
            Some(session) if !session.is_running() => {
                session.resume(now);
                true
            }
            _ => false,
        };
        if !applied {
            return ignored("resume", &inner);
        }

        self.commit_transition(&inner, now, "resume");
        true
    }

    /// Switch to the floating overlay. Status and elapsed time are untouched.
    pub fn minimize(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.session.is_none() || !inner.presentation.minimize() {
            return ignored("minimize", &inner);
        }

        self.commit_transition(&inner, now, "minimize");
        true
    }

    /// Back to the full timer view. Status and elapsed time are untouched.
    pub fn restore(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.session.is_none() || !inner.presentation.restore() {
            return ignored("restore", &inner);
        }
        // The overlay goes away, so does any drag on it
        inner.overlay.cancel_drag();

        self.commit_transition(&inner, now, "restore");
        true
    }

    /// Display refresh. While running, republishes the live elapsed time and,
    /// if configured, freezes it into storage for reload recovery.
    pub fn tick(&self) -> Option<u64> {
        let now = self.clock.now_utc();
        let inner = self.lock();

        if inner.status() != TimerStatus::Running {
            return None;
        }

        if self.settings.persist_on_tick {
            self.save_session(&inner, now);
        }

        let snapshot = inner.snapshot(now);
        let elapsed_ms = snapshot.elapsed_ms;
        self.snapshots.send_replace(snapshot);
        Some(elapsed_ms)
    }

    /// End the session: record it with the session store, then clear it.
    ///
    /// At most one commit is in flight; a second `end` meanwhile returns
    /// `Skipped(AlreadyEnding)` without calling the store. On failure the
    /// session is left exactly as it was before `end` with the error retained.
    ///
    /// The commit runs on its own task, so dropping the returned future (a
    /// client hanging up mid-request) does not abandon it halfway.
    pub async fn end(&self) -> EndOutcome {
        let (request, guard) = match self.begin_end() {
            Ok(started) => started,
            Err(reason) => return EndOutcome::Skipped(reason),
        };

        let timer = self.clone();
        let commit = tokio::spawn(async move { timer.finish_end(request, guard).await });

        match commit.await {
            Ok(outcome) => outcome,
            Err(e) => {
                logging::log_error(&e.to_string(), "commit task", None);
                EndOutcome::Failed(CommitError::Interrupted)
            }
        }
    }

    /// Freeze the session into ENDING and build the commit request
    fn begin_end(&self) -> Result<(StudySessionRequest, EndingGuard), SkipReason> {
        let (request, session_id) = {
            let now = self.clock.now_utc();
            let mut inner = self.lock();

            if inner.ending.is_some() {
                debug!(session_id = %inner.session_label(), "Ignoring end while a commit is in flight");
                return Err(SkipReason::AlreadyEnding);
            }

            let Some(session) = inner.session.as_ref() else {
                debug!("Ignoring end while idle");
                return Err(SkipReason::Idle);
            };

            let duration_ms = session.elapsed_ms(now);
            let request = StudySessionRequest::new(session.subject_ref(), duration_ms);
            let session_id = session.session_id;

            inner.ending = Some(duration_ms);
            inner.last_error = None;
            self.publish(&inner, now);
            logging::log_timer_transition(
                &session_id.to_string(),
                "end",
                TimerStatus::Ending,
                duration_ms,
            );

            (request, session_id)
        };

        // Created after the lock is released; its drop takes the lock
        let guard = EndingGuard {
            timer: self.clone(),
            session_id,
            armed: true,
        };
        Ok((request, guard))
    }

    /// Run the commit and apply its result
    async fn finish_end(&self, request: StudySessionRequest, guard: EndingGuard) -> EndOutcome {
        let session_id = guard.session_id;
        let span = crate::commit_span!(session_id, request.session_subject_ref);
        let result = commit_with_timeout(
            self.sessions.as_ref(),
            &request,
            self.settings.commit_timeout,
        )
        .instrument(span)
        .await;

        guard.disarm();
        let now = self.clock.now_utc();
        let mut inner = self.lock();
        inner.ending = None;

        let failure = result.as_ref().err().map(ToString::to_string);
        logging::log_commit_outcome(
            &session_id.to_string(),
            &request.session_subject_ref,
            request.duration_ms,
            failure.as_deref(),
        );

        match result {
            Ok(()) => {
                inner.stale_keys = ALL_TIMER_KEYS.to_vec();
                self.clear_stale_keys(&mut inner);

                inner.session = None;
                inner.presentation.reset();
                inner.overlay.reset();
                inner.last_error = None;
                self.publish(&inner, now);

                EndOutcome::Committed(CommittedSession {
                    session_id,
                    session_subject_ref: request.session_subject_ref,
                    duration_ms: request.duration_ms,
                    next_route: self.settings.results_route.clone(),
                })
            }
            Err(error) => {
                inner.last_error = Some(error.clone());
                self.publish(&inner, now);
                EndOutcome::Failed(error)
            }
        }
    }

    /// Remove timer keys a committed session left behind. Keys that still
    /// cannot be removed are kept for the next attempt.
    fn clear_stale_keys(&self, inner: &mut TimerInner) {
        inner.stale_keys.retain(|key| match self.store.remove(key) {
            Ok(()) => false,
            Err(e) => {
                logging::log_error(&e.to_string(), &format!("clear timer storage key {key}"), None);
                true
            }
        });
    }

    /// Clear a retained commit error
    pub fn dismiss_error(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if inner.last_error.take().is_none() {
            return false;
        }
        self.publish(&inner, now);
        true
    }

    /// Overlay state for the page at `current_path`
    pub fn overlay_view(&self, current_path: &str) -> OverlayView {
        let now = self.clock.now_utc();
        let inner = self.lock();
        let subject_ref = inner.session.as_ref().map(ActiveSession::subject_ref);

        OverlayView {
            visible: inner.presentation.overlay_visible(subject_ref, current_path),
            position: inner.overlay.position(),
            restore_route: subject_ref.map(restore_route),
            formatted_elapsed: format_elapsed(inner.elapsed_ms(now)),
        }
    }

    /// Report the viewport size; clamps the overlay into it
    pub fn set_viewport(&self, viewport: Viewport) -> Position {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        let position = inner.overlay.set_viewport(viewport, self.store.as_ref());
        self.publish(&inner, now);
        position
    }

    /// Begin dragging the overlay. No-op while idle.
    pub fn begin_drag(&self, pointer: Position) -> bool {
        let mut inner = self.lock();
        if inner.session.is_none() {
            return false;
        }
        inner.overlay.begin_drag(pointer);
        true
    }

    pub fn drag_to(&self, pointer: Position) -> Option<Position> {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if !inner.overlay.drag_to(pointer) {
            return None;
        }
        self.publish(&inner, now);
        Some(inner.overlay.position())
    }

    /// Release the overlay; snaps and persists the final position
    pub fn end_drag(&self) -> Option<Position> {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        let position = inner.overlay.end_drag(self.store.as_ref())?;
        self.publish(&inner, now);
        Some(position)
    }

    pub fn cancel_drag(&self) -> bool {
        let now = self.clock.now_utc();
        let mut inner = self.lock();

        if !inner.overlay.cancel_drag() {
            return false;
        }
        self.publish(&inner, now);
        true
    }

    fn lock(&self) -> MutexGuard<'_, TimerInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Persist, publish and log an applied transition
    fn commit_transition(&self, inner: &TimerInner, now: DateTime<Utc>, operation: &str) {
        let session_label = inner.session_label();
        let span = crate::timer_span!(operation, session_label);
        let _entered = span.enter();

        self.save_session(inner, now);
        inner.presentation.save(self.store.as_ref());
        self.publish(inner, now);

        let status = inner.status();
        let elapsed_ms = inner.elapsed_ms(now);
        span.record("status", tracing::field::display(status));
        span.record("elapsed_ms", elapsed_ms);
        logging::log_timer_transition(&session_label, operation, status, elapsed_ms);
    }

    /// Write the session record. Skipped while a commit is in flight so the
    /// stored copy stays the recoverable pre-end state.
    fn save_session(&self, inner: &TimerInner, now: DateTime<Utc>) {
        let Some(session) = &inner.session else {
            return;
        };
        if inner.ending.is_some() {
            return;
        }

        let result = serde_json::to_string(&session.to_record(now))
            .map_err(|e| e.to_string())
            .and_then(|raw| self.store.set(TIMER_KEY, &raw).map_err(|e| e.to_string()));

        if let Err(e) = result {
            logging::log_warning(&e, "save timer session", Some(&session.session_id.to_string()));
        }
    }

    fn publish(&self, inner: &TimerInner, now: DateTime<Utc>) {
        let snapshot = inner.snapshot(now);
        let status = snapshot.status;

        self.statuses.send_if_modified(|current| {
            if *current == status {
                false
            } else {
                *current = status;
                true
            }
        });
        self.snapshots.send_replace(snapshot);
    }
}

/// Puts the timer back to its pre-end state if the commit task goes away
/// before applying a result
struct EndingGuard {
    timer: TimerService,
    session_id: Uuid,
    armed: bool,
}

impl EndingGuard {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for EndingGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let now = self.timer.clock.now_utc();
        let mut inner = self.timer.lock();
        if inner.ending.take().is_none() {
            return;
        }
        inner.last_error = Some(CommitError::Interrupted);
        self.timer.publish(&inner, now);
        logging::log_warning(
            "commit did not complete, session kept for retry",
            "end",
            Some(&self.session_id.to_string()),
        );
    }
}

fn ignored(operation: &str, inner: &TimerInner) -> bool {
    debug!(
        operation = %operation,
        status = %inner.status(),
        session_id = %inner.session_label(),
        "Transition not applicable, ignoring"
    );
    false
}

/// Load the stored session, discarding anything that cannot be recovered
fn restore_session(store: &dyn DurableStore, now: DateTime<Utc>) -> Option<ActiveSession> {
    let raw = match store.get(TIMER_KEY) {
        Ok(Some(raw)) => raw,
        Ok(None) => return None,
        Err(e) => {
            logging::log_warning(&e.to_string(), "load timer session", None);
            return None;
        }
    };

    let restored = serde_json::from_str::<TimerRecord>(&raw)
        .map_err(|e| e.to_string())
        .and_then(|record| ActiveSession::from_record(record, now).map_err(|e| e.to_string()));

    match restored {
        Ok(session) => Some(session),
        Err(reason) => {
            logging::log_storage_recovered(TIMER_KEY, &reason);
            if let Err(e) = store.remove(TIMER_KEY) {
                logging::log_warning(&e.to_string(), "discard timer session", None);
            }
            None
        }
    }
}
