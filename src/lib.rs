//! FocusFlow Timer
//!
//! Study session timer that survives reloads, can be minimized into a
//! draggable overlay, and records each finished session exactly once.

pub mod api;
pub mod config;
pub mod error;
pub mod logging;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{AppError, AppResult};
pub use services::TimerService;
