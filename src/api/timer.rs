//! Timer API Endpoints
//!
//! Run-state and presentation transitions. Every transition answers with
//! whether it applied plus the resulting snapshot; no-ops are not errors.

use axum::{extract::State, routing::{get, post}, Json, Router};
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::ActivityInfo;
use crate::services::{
    CommittedSession, EndOutcome, SkipReason, StartOutcome, TimerService, TimerSnapshot,
};

/// Create timer API routes
pub fn create_timer_routes() -> Router<TimerService> {
    Router::new()
        .route("/", get(get_timer))
        .route("/start", post(start_timer))
        .route("/pause", post(pause_timer))
        .route("/resume", post(resume_timer))
        .route("/minimize", post(minimize_timer))
        .route("/restore", post(restore_timer))
        .route("/end", post(end_timer))
        .route("/error/dismiss", post(dismiss_error))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub outcome: StartOutcome,
    pub timer: TimerSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionResponse {
    pub applied: bool,
    pub timer: TimerSnapshot,
}

#[derive(Debug, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum EndResponse {
    Committed { session: CommittedSession },
    Skipped { reason: SkipReason },
}

/// Get current timer state
pub async fn get_timer(State(timer): State<TimerService>) -> Json<TimerSnapshot> {
    Json(timer.snapshot())
}

/// Start (or re-enter) a session for an activity
pub async fn start_timer(
    State(timer): State<TimerService>,
    Json(activity): Json<ActivityInfo>,
) -> AppResult<Json<StartResponse>> {
    let outcome = timer.start(activity)?;

    Ok(Json(StartResponse {
        outcome,
        timer: timer.snapshot(),
    }))
}

pub async fn pause_timer(State(timer): State<TimerService>) -> Json<TransitionResponse> {
    transition(&timer, TimerService::pause)
}

pub async fn resume_timer(State(timer): State<TimerService>) -> Json<TransitionResponse> {
    transition(&timer, TimerService::resume)
}

pub async fn minimize_timer(State(timer): State<TimerService>) -> Json<TransitionResponse> {
    transition(&timer, TimerService::minimize)
}

pub async fn restore_timer(State(timer): State<TimerService>) -> Json<TransitionResponse> {
    transition(&timer, TimerService::restore)
}

/// End the session and commit it. A failed commit answers 502 and keeps the
/// session so the caller can retry.
pub async fn end_timer(State(timer): State<TimerService>) -> AppResult<Json<EndResponse>> {
    match timer.end().await {
        EndOutcome::Committed(session) => Ok(Json(EndResponse::Committed { session })),
        EndOutcome::Skipped(reason) => Ok(Json(EndResponse::Skipped { reason })),
        EndOutcome::Failed(error) => Err(AppError::Commit(error)),
    }
}

pub async fn dismiss_error(State(timer): State<TimerService>) -> Json<TransitionResponse> {
    transition(&timer, TimerService::dismiss_error)
}

fn transition(timer: &TimerService, apply: fn(&TimerService) -> bool) -> Json<TransitionResponse> {
    let applied = apply(timer);
    Json(TransitionResponse {
        applied,
        timer: timer.snapshot(),
    })
}
