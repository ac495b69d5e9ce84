//! Clock access for time-sensitive operations.
//!
//! Everything that compares against "now" (bid deadlines, sweep
//! selection, auto-extension) takes a [`TimeSource`] parameter rather
//! than reading the system clock, so the `mock-time` feature can pin
//! and advance time deterministically in tests.

use jiff::Timestamp;
#[cfg(feature = "mock-time")]
use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct TimeSource {
    #[cfg(feature = "mock-time")]
    time: Arc<Mutex<Timestamp>>,
}

#[cfg(not(feature = "mock-time"))]
impl TimeSource {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        Self {}
    }

    pub fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

#[cfg(feature = "mock-time")]
impl TimeSource {
    pub fn new(initial_time: Timestamp) -> Self {
        Self {
            time: Arc::new(Mutex::new(initial_time)),
        }
    }

    pub fn now(&self) -> Timestamp {
        *self.time.lock().unwrap()
    }

    pub fn advance(&self, duration: jiff::Span) {
        *self.time.lock().unwrap() += duration;
    }

    pub fn set(&self, time: Timestamp) {
        *self.time.lock().unwrap() = time;
    }
}
