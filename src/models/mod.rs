//! Models module for FocusFlow Timer
//!
//! Contains the timer entity, its durable record, overlay geometry and the
//! commit request body.

pub mod overlay;
pub mod study_session;
pub mod timer_session;

// Re-export commonly used types
pub use overlay::{OverlaySize, Position, Viewport};
pub use study_session::StudySessionRequest;
pub use timer_session::{
    ActiveSession, ActiveStatus, ActivityInfo, TimerRecord, TimerSessionError, TimerStatus,
};
