//! Injectable clock (spec §9 design note: "treat it as an injected
//! dependency so tests can substitute a deterministic clock").

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Instant, SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_millis(&self) -> u64;
}

/// Real wall-clock time, monotonic enough for TTL comparisons within one
/// process lifetime.
pub struct SystemClock {
    start: Instant,
    start_millis: u64,
}

impl Default for SystemClock {
    fn default() -> Self {
        let start_millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
            .as_millis() as u64;
        Self {
            start: Instant::now(),
            start_millis,
        }
    }
}

impl Clock for SystemClock {
    fn now_millis(&self) -> u64 {
        self.start_millis + self.start.elapsed().as_millis() as u64
    }
}

/// A fake clock for deterministic TTL tests.
#[derive(Default)]
pub struct FakeClock {
    millis: AtomicU64,
}

impl FakeClock {
    pub fn advance(&self, millis: u64) {
        self.millis.fetch_add(millis, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> u64 {
        self.millis.load(Ordering::SeqCst)
    }
}
