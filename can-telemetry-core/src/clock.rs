//! Time sources for the ingestion store
//!
//! The store reads two clocks: a monotonic one for frame timestamps, cycle
//! times and staleness, and the wall clock for display/export only.

use std::sync::Mutex;
use std::time::Instant;

/// Time source used by the store
pub trait Clock: Send + Sync {
    /// Monotonic milliseconds since the clock was created
    fn monotonic_ms(&self) -> f64;

    /// Wall-clock milliseconds since the Unix epoch
    fn wall_ms(&self) -> i64;
}

/// Real clock: `Instant` for monotonic time, chrono for wall time
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn monotonic_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }

    fn wall_ms(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Hand-driven clock for tests and replays. Wall time follows monotonic time
/// from a fixed epoch offset.
#[derive(Debug)]
pub struct ManualClock {
    now_ms: Mutex<f64>,
    wall_origin_ms: i64,
}

impl ManualClock {
    pub fn new(wall_origin_ms: i64) -> Self {
        Self {
            now_ms: Mutex::new(0.0),
            wall_origin_ms,
        }
    }

    /// Jump to an absolute monotonic time
    pub fn set(&self, now_ms: f64) {
        *self.now_ms.lock().unwrap_or_else(|e| e.into_inner()) = now_ms;
    }

    /// Move the clock forward
    pub fn advance(&self, delta_ms: f64) {
        *self.now_ms.lock().unwrap_or_else(|e| e.into_inner()) += delta_ms;
    }
}

impl Clock for ManualClock {
    fn monotonic_ms(&self) -> f64 {
        *self.now_ms.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn wall_ms(&self) -> i64 {
        self.wall_origin_ms + self.monotonic_ms() as i64
    }
}
