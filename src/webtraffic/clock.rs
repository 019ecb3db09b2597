//! Processing-time clock abstraction.
//!
//! Window assignment and closure run on the time at which the counter
//! observes a record, never on the event's embedded `timestamp` field.
//! Putting the clock behind a trait keeps the windowing engine deterministic
//! under test while the job runs on wall time.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Source of processing time, in milliseconds since the Unix epoch.
pub trait ProcessingTimeClock: Send + Sync {
    /// Current processing time in milliseconds
    fn now_millis(&self) -> i64;
}

/// Wall-clock time source used by the running job.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        SystemClock
    }
}

impl ProcessingTimeClock for SystemClock {
    fn now_millis(&self) -> i64 {
        // SystemTime before the epoch only happens on badly misconfigured
        // hosts; treat it as time zero rather than panicking the pipeline.
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }
}

/// Manually advanced clock for deterministic windowing tests.
///
/// Clones share the same underlying time, so a clock handed to several
/// pipeline shards advances them all together.
#[derive(Debug, Default, Clone)]
pub struct ManualClock {
    now_ms: Arc<AtomicI64>,
}

impl ManualClock {
    /// Create a clock starting at time zero
    pub fn new() -> Self {
        Self::starting_at(0)
    }

    /// Create a clock starting at the given millisecond timestamp
    pub fn starting_at(now_ms: i64) -> Self {
        Self {
            now_ms: Arc::new(AtomicI64::new(now_ms)),
        }
    }

    /// Move the clock forward by `delta_ms` milliseconds
    pub fn advance(&self, delta_ms: i64) {
        self.now_ms.fetch_add(delta_ms, Ordering::SeqCst);
    }

    /// Jump the clock to an absolute millisecond timestamp
    pub fn set(&self, now_ms: i64) {
        self.now_ms.store(now_ms, Ordering::SeqCst);
    }
}

impl ProcessingTimeClock for ManualClock {
    fn now_millis(&self) -> i64 {
        self.now_ms.load(Ordering::SeqCst)
    }
}
