//! Monotonic session-relative clock.
//!
//! Both producer streams stamp their items with durations measured from the
//! same session origin, so the correlator compares plain [`Duration`]s and
//! never touches wall-clock time.

use std::time::{Duration, Instant};

/// Clock anchored at session start.
#[derive(Debug, Clone, Copy)]
pub struct SessionClock {
    origin: Instant,
}

impl SessionClock {
    /// Anchor a new clock at the current instant.
    pub fn start() -> Self {
        Self {
            origin: Instant::now(),
        }
    }

    /// Time elapsed since session start.
    pub fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}
