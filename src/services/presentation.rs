//! Minimize/Restore Controller
//!
//! Whether the timer renders full-screen or as the floating overlay. This is
//! orthogonal to run state: nothing here touches status or elapsed time.

use crate::logging;
use crate::services::durable_store::{DurableStore, MINIMIZED_KEY};

/// Presentation state of the timer
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PresentationController {
    is_minimized: bool,
}

impl PresentationController {
    /// Restore the minimized flag, defaulting to not minimized when the key
    /// is missing or malformed
    pub fn load(store: &dyn DurableStore) -> Self {
        let is_minimized = match store.get(MINIMIZED_KEY) {
            Ok(Some(raw)) => serde_json::from_str::<bool>(&raw).unwrap_or_else(|e| {
                logging::log_storage_recovered(MINIMIZED_KEY, &e.to_string());
                if let Err(e) = store.remove(MINIMIZED_KEY) {
                    logging::log_warning(&e.to_string(), "discard minimized flag", None);
                }
                false
            }),
            Ok(None) => false,
            Err(e) => {
                logging::log_warning(&e.to_string(), "load minimized flag", None);
                false
            }
        };

        Self { is_minimized }
    }

    pub fn is_minimized(&self) -> bool {
        self.is_minimized
    }

    /// Returns true when the flag changed
    pub fn minimize(&mut self) -> bool {
        !std::mem::replace(&mut self.is_minimized, true)
    }

    /// Returns true when the flag changed
    pub fn restore(&mut self) -> bool {
        std::mem::replace(&mut self.is_minimized, false)
    }

    pub fn reset(&mut self) {
        self.is_minimized = false;
    }

    pub fn save(&self, store: &dyn DurableStore) {
        let value = if self.is_minimized { "true" } else { "false" };
        if let Err(e) = store.set(MINIMIZED_KEY, value) {
            logging::log_warning(&e.to_string(), "save minimized flag", None);
        }
    }

    /// The overlay shows only for a minimized session, and never on top of
    /// that session's own full timer page
    pub fn overlay_visible(&self, session_subject_ref: Option<&str>, current_path: &str) -> bool {
        match session_subject_ref {
            Some(subject_ref) => {
                let route = restore_route(subject_ref);
                let on_timer_page = current_path
                    .strip_prefix(route.as_str())
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(['/', '?', '#']));
                self.is_minimized && !on_timer_page
            }
            None => false,
        }
    }
}

/// Full timer page for a session, the navigation target paired with `restore`
pub fn restore_route(session_subject_ref: &str) -> String {
    format!("/timer/{session_subject_ref}")
}

/// Render elapsed milliseconds as `HH:MM:SS`; hours do not wrap at 24
pub fn format_elapsed(elapsed_ms: u64) -> String {
    let total_seconds = elapsed_ms / 1000;
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;

    format!("{hours:02}:{minutes:02}:{seconds:02}")
}
