//! Services module for FocusFlow Timer
//!
//! The timer state machine and the collaborators it is composed from.

pub mod commit;
pub mod display_refresh;
pub mod drag_position;
pub mod durable_store;
pub mod presentation;
pub mod session_store;
pub mod time_provider;
pub mod timer_service;

// Re-export commonly used services
pub use commit::{CommitError, CommittedSession, EndOutcome, SkipReason};
pub use display_refresh::DisplayRefresher;
pub use drag_position::{OverlayPositionManager, SnapSettings};
pub use durable_store::{DurableStore, FileStore, MemoryStore, StoreError};
pub use presentation::{format_elapsed, restore_route, PresentationController};
pub use session_store::{HttpSessionStore, RecordingSessionStore, SessionStore};
pub use time_provider::{MockTimeProvider, SystemTimeProvider, TimeProvider};
pub use timer_service::{OverlayView, StartOutcome, TimerService, TimerSettings, TimerSnapshot};
