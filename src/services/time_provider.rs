//! Time Provider Trait and Implementations
//!
//! Wall-clock source for elapsed-time computation. Elapsed time is always
//! derived as `now - start`, so a provider only has to answer "what time is it".
//! Tests swap in [`MockTimeProvider`] to move time explicitly.

use chrono::{DateTime, TimeZone, Utc};
use std::sync::{Arc, Mutex};

/// Trait for providing the current wall-clock instant
pub trait TimeProvider: Send + Sync {
    /// Get the current UTC time
    fn now_utc(&self) -> DateTime<Utc>;
}

/// System time provider for production use
#[derive(Debug, Clone, Default)]
pub struct SystemTimeProvider;

impl SystemTimeProvider {
    /// Create a new system time provider
    pub fn new() -> Self {
        Self
    }
}

impl TimeProvider for SystemTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Mock time provider for testing
///
/// Clones share the same underlying instant, so a test can keep one handle
/// and hand another to the timer.
#[derive(Debug, Clone)]
pub struct MockTimeProvider {
    current_time: Arc<Mutex<DateTime<Utc>>>,
}

impl MockTimeProvider {
    /// Create a new mock time provider starting from the given time
    pub fn new(start_time: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start_time)),
        }
    }

    /// Create a mock time provider starting from now
    pub fn new_from_now() -> Self {
        Self::new(Utc::now())
    }

    /// Create a mock time provider starting from a specific date/time
    pub fn new_from_ymd_hms(
        year: i32,
        month: u32,
        day: u32,
        hour: u32,
        min: u32,
        sec: u32,
    ) -> Option<Self> {
        Utc.with_ymd_and_hms(year, month, day, hour, min, sec)
            .single()
            .map(Self::new)
    }

    /// Advance the mock time by the specified duration
    pub fn advance(&self, duration: chrono::Duration) {
        if let Ok(mut time) = self.current_time.lock() {
            *time += duration;
        }
    }

    /// Advance the mock time by the specified number of milliseconds
    pub fn advance_millis(&self, millis: i64) {
        self.advance(chrono::Duration::milliseconds(millis));
    }

    /// Advance the mock time by the specified number of seconds
    pub fn advance_seconds(&self, seconds: i64) {
        self.advance(chrono::Duration::seconds(seconds));
    }

    /// Move the mock time backwards, as a system clock adjustment would
    pub fn rewind_millis(&self, millis: i64) {
        self.advance(chrono::Duration::milliseconds(-millis));
    }

    /// Get the current mock time
    pub fn current_time(&self) -> DateTime<Utc> {
        if let Ok(time) = self.current_time.lock() {
            *time
        } else {
            Utc::now() // Fallback to system time if lock fails
        }
    }
}

impl Default for MockTimeProvider {
    fn default() -> Self {
        Self::new_from_now()
    }
}

impl TimeProvider for MockTimeProvider {
    fn now_utc(&self) -> DateTime<Utc> {
        self.current_time()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_time_provider() {
        let provider = SystemTimeProvider::new();
        let now = provider.now_utc();

        // System time should be reasonable (within last minute)
        let system_now = Utc::now();
        assert!((system_now - now).num_seconds().abs() < 60);
    }

    #[test]
    fn test_mock_time_provider() {
        let provider = MockTimeProvider::new_from_ymd_hms(2025, 1, 7, 10, 30, 0).unwrap();
        let start_time = Utc.with_ymd_and_hms(2025, 1, 7, 10, 30, 0).single().unwrap();

        assert_eq!(provider.now_utc(), start_time);
    }

    #[test]
    fn test_mock_time_advance() {
        let provider = MockTimeProvider::new_from_ymd_hms(2025, 1, 7, 10, 30, 0).unwrap();
        let start_time = provider.now_utc();

        provider.advance_seconds(5);
        provider.advance_millis(250);

        assert_eq!((provider.now_utc() - start_time).num_milliseconds(), 5250);
    }

    #[test]
    fn test_clones_share_time() {
        let provider = MockTimeProvider::new_from_ymd_hms(2025, 1, 7, 10, 30, 0).unwrap();
        let handle = provider.clone();

        handle.advance_millis(1000);

        assert_eq!(provider.now_utc(), handle.now_utc());
    }

    #[test]
    fn test_rewind_moves_clock_backwards() {
        let provider = MockTimeProvider::new_from_ymd_hms(2025, 1, 7, 10, 30, 0).unwrap();
        let start_time = provider.now_utc();

        provider.rewind_millis(3000);

        assert_eq!((start_time - provider.now_utc()).num_milliseconds(), 3000);
    }
}
