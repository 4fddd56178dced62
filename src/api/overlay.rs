//! Overlay API Endpoints
//!
//! Visibility of the minimized overlay and its drag session.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, AppResult};
use crate::models::{Position, Viewport};
use crate::services::{OverlayView, TimerService};

/// Create overlay API routes
pub fn create_overlay_routes() -> Router<TimerService> {
    Router::new()
        .route("/", get(get_overlay))
        .route("/viewport", post(set_viewport))
        .route("/drag/start", post(drag_start))
        .route("/drag/move", post(drag_move))
        .route("/drag/end", post(drag_end))
        .route("/drag/cancel", post(drag_cancel))
}

#[derive(Debug, Deserialize)]
pub struct OverlayQuery {
    /// Path of the page the UI is currently showing
    #[serde(default = "root_path")]
    pub path: String,
}

fn root_path() -> String {
    "/".to_string()
}

#[derive(Debug, Serialize)]
pub struct DragResponse {
    pub applied: bool,
    pub position: Position,
}

pub async fn get_overlay(
    State(timer): State<TimerService>,
    Query(query): Query<OverlayQuery>,
) -> Json<OverlayView> {
    Json(timer.overlay_view(&query.path))
}

pub async fn set_viewport(
    State(timer): State<TimerService>,
    Json(viewport): Json<Viewport>,
) -> AppResult<Json<DragResponse>> {
    let valid = |v: f64| v.is_finite() && v > 0.0;
    if !valid(viewport.width) || !valid(viewport.height) {
        return Err(AppError::bad_request("viewport dimensions must be positive"));
    }

    Ok(Json(DragResponse {
        applied: true,
        position: timer.set_viewport(viewport),
    }))
}

pub async fn drag_start(
    State(timer): State<TimerService>,
    Json(pointer): Json<Position>,
) -> AppResult<Json<DragResponse>> {
    let pointer = finite(pointer)?;
    let applied = timer.begin_drag(pointer);
    Ok(Json(DragResponse {
        applied,
        position: timer.snapshot().position,
    }))
}

pub async fn drag_move(
    State(timer): State<TimerService>,
    Json(pointer): Json<Position>,
) -> AppResult<Json<DragResponse>> {
    let pointer = finite(pointer)?;
    Ok(Json(settled(&timer, timer.drag_to(pointer))))
}

pub async fn drag_end(State(timer): State<TimerService>) -> Json<DragResponse> {
    let released = timer.end_drag();
    Json(settled(&timer, released))
}

pub async fn drag_cancel(State(timer): State<TimerService>) -> Json<DragResponse> {
    let applied = timer.cancel_drag();
    Json(DragResponse {
        applied,
        position: timer.snapshot().position,
    })
}

fn settled(timer: &TimerService, moved: Option<Position>) -> DragResponse {
    match moved {
        Some(position) => DragResponse {
            applied: true,
            position,
        },
        None => DragResponse {
            applied: false,
            position: timer.snapshot().position,
        },
    }
}

fn finite(pointer: Position) -> AppResult<Position> {
    if pointer.x.is_finite() && pointer.y.is_finite() {
        Ok(pointer)
    } else {
        Err(AppError::bad_request("pointer coordinates must be finite"))
    }
}
