// SPDX-License-Identifier: MIT

//! Clock abstraction for testable time handling

use chrono::{DateTime, Duration as ChronoDuration, NaiveDate, Utc};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// A clock that provides both monotonic and wall-clock time
pub trait Clock: Clone + Send + Sync + 'static {
    fn now(&self) -> Instant;

    /// Wall-clock timestamp, used for state-file stamps and backup names
    fn timestamp(&self) -> DateTime<Utc>;

    /// Calendar date, used for encounter dates and card latency
    fn today(&self) -> NaiveDate {
        self.timestamp().date_naive()
    }
}

/// Real system clock
#[derive(Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn timestamp(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<Instant>>,
    wall: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self {
            current: Arc::new(Mutex::new(Instant::now())),
            wall: Arc::new(Mutex::new(Utc::now())),
        }
    }

    /// Advance both the monotonic and wall clocks by the given duration
    pub fn advance(&self, duration: Duration) {
        let mut current = self.current.lock().unwrap_or_else(|e| e.into_inner());
        *current += duration;
        drop(current);
        let mut wall = self.wall.lock().unwrap_or_else(|e| e.into_inner());
        if let Ok(delta) = ChronoDuration::from_std(duration) {
            *wall += delta;
        }
    }

    /// Pin the wall clock to a specific timestamp
    pub fn set_wall(&self, timestamp: DateTime<Utc>) {
        let mut wall = self.wall.lock().unwrap_or_else(|e| e.into_inner());
        *wall = timestamp;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now(&self) -> Instant {
        *self.current.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn timestamp(&self) -> DateTime<Utc> {
        *self.wall.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
