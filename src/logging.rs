//! Logging configuration for FocusFlow Timer
//!
//! Structured logging setup and the event helpers used by the timer.

use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter, Registry,
};

use crate::models::TimerStatus;

/// Initialize the application logging system.
///
/// `RUST_LOG` overrides `log_level`. Calling this more than once keeps the
/// first subscriber.
pub fn init_logging(log_level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("focusflow_timer={log_level},tower_http={log_level}"))
    });

    // JSON layer for production, compact console output always
    let json_layer = json.then(|| {
        fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_target(true)
            .with_file(true)
            .with_line_number(true)
    });

    let console_layer = fmt::layer()
        .with_target(false)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_ansi(true);

    let installed = Registry::default()
        .with(env_filter)
        .with(console_layer)
        .with(json_layer)
        .try_init();

    if installed.is_ok() {
        tracing::info!(json = json, "Logging system initialized");
    }
}

/// Create a span for timer operations
#[macro_export]
macro_rules! timer_span {
    ($operation:expr, $session_id:expr) => {
        tracing::info_span!(
            "timer_operation",
            operation = %$operation,
            session_id = %$session_id,
            status = tracing::field::Empty,
            elapsed_ms = tracing::field::Empty,
        )
    };
}

/// Create a span around a session commit
#[macro_export]
macro_rules! commit_span {
    ($session_id:expr, $subject_ref:expr) => {
        tracing::info_span!(
            "session_commit",
            session_id = %$session_id,
            subject_ref = %$subject_ref,
        )
    };
}

/// Log application startup
pub fn log_startup() {
    tracing::info!(
        version = env!("CARGO_PKG_VERSION"),
        git_commit = option_env!("GIT_COMMIT").unwrap_or("unknown"),
        "FocusFlow Timer starting up"
    );
}

/// Log an applied timer transition
pub fn log_timer_transition(session_id: &str, operation: &str, status: TimerStatus, elapsed_ms: u64) {
    tracing::info!(
        session_id = %session_id,
        operation = %operation,
        status = %status,
        elapsed_ms = elapsed_ms,
        "Timer state changed"
    );
}

/// Log the result of a commit; `failure` carries the error text
pub fn log_commit_outcome(
    session_id: &str,
    subject_ref: &str,
    duration_ms: u64,
    failure: Option<&str>,
) {
    match failure {
        None => tracing::info!(
            session_id = %session_id,
            subject_ref = %subject_ref,
            duration_ms = duration_ms,
            "Study session committed"
        ),
        Some(error) => tracing::warn!(
            session_id = %session_id,
            subject_ref = %subject_ref,
            duration_ms = duration_ms,
            error = %error,
            "Study session commit failed, session kept for retry"
        ),
    }
}

/// Log a storage entry that was unreadable and has been discarded
pub fn log_storage_recovered(key: &str, reason: &str) {
    tracing::warn!(
        key = %key,
        reason = %reason,
        "Discarded unreadable stored timer state"
    );
}

/// Log error with context
pub fn log_error(error: &str, context: &str, session_id: Option<&str>) {
    tracing::error!(
        error = %error,
        context = %context,
        session_id = ?session_id,
        "Application error occurred"
    );
}

/// Log warning with context
pub fn log_warning(warning: &str, context: &str, session_id: Option<&str>) {
    tracing::warn!(
        warning = %warning,
        context = %context,
        session_id = ?session_id,
        "Application warning"
    );
}
