//! API module for FocusFlow Timer
//!
//! Local JSON control surface for a UI shell.

pub mod overlay;
pub mod timer;

use axum::{routing::get, Json, Router};
use serde_json::{json, Value};

use crate::services::TimerService;

/// All API routes, bound to one timer
pub fn router(timer: TimerService) -> Router {
    Router::new()
        .nest("/api/timer", timer::create_timer_routes())
        .nest("/api/overlay", overlay::create_overlay_routes())
        .route("/api/health", get(health_check))
        .with_state(timer)
}

async fn health_check() -> Json<Value> {
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}
