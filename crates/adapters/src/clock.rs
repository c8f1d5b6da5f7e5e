//! Time sources for a run.

use std::fmt;
use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Duration, TimeZone, Utc};

/// Source of timestamps for a run.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time according to this clock.
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Replayable clock: starts at a fixed instant and advances by a fixed step
/// on every read.
///
/// Two instances built with the same arguments and read the same number of
/// times return identical timestamp sequences.
#[derive(Debug)]
pub struct DeterministicClock {
    start: DateTime<Utc>,
    step_ms: i64,
    ticks: AtomicI64,
}

impl DeterministicClock {
    /// Clock starting at `start_ms` (milliseconds since the UNIX epoch),
    /// advancing 1 ms per read.
    pub fn new(start_ms: i64) -> Self {
        Self::with_step(start_ms, 1)
    }

    /// Clock starting at `start_ms`, advancing `step_ms` per read.
    pub fn with_step(start_ms: i64, step_ms: i64) -> Self {
        Self {
            start: Utc
                .timestamp_millis_opt(start_ms)
                .single()
                .unwrap_or_default(),
            step_ms,
            ticks: AtomicI64::new(0),
        }
    }

    /// Number of reads served so far.
    pub fn reads(&self) -> i64 {
        self.ticks.load(Ordering::SeqCst)
    }
}

impl Default for DeterministicClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for DeterministicClock {
    fn now(&self) -> DateTime<Utc> {
        let tick = self.ticks.fetch_add(1, Ordering::SeqCst);
        self.start + Duration::milliseconds(tick.saturating_mul(self.step_ms))
    }
}
