//! Wall-clock abstraction. Lease expiry is computed against seconds
//! since an arbitrary epoch; tests inject a [`FakeClock`] instead of
//! sleeping so expiry scenarios run instantly and deterministically.
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub trait Clock: Send + Sync {
    fn now_secs(&self) -> u32;
}

#[derive(Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_secs(&self) -> u32 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs() as u32)
            .unwrap_or(0)
    }
}

/// Deterministic clock for tests: starts at `0` and only advances when
/// told to.
#[derive(Debug, Default)]
pub struct FakeClock {
    secs: AtomicU32,
}

impl FakeClock {
    pub fn new(start_secs: u32) -> Self {
        Self {
            secs: AtomicU32::new(start_secs),
        }
    }

    pub fn advance(&self, secs: u32) {
        self.secs.fetch_add(secs, Ordering::SeqCst);
    }

    pub fn set(&self, secs: u32) {
        self.secs.store(secs, Ordering::SeqCst);
    }
}

impl Clock for FakeClock {
    fn now_secs(&self) -> u32 {
        self.secs.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fake_clock_advances_on_demand() {
        let c = FakeClock::new(10);
        assert_eq!(c.now_secs(), 10);
        c.advance(5);
        assert_eq!(c.now_secs(), 15);
        c.set(100);
        assert_eq!(c.now_secs(), 100);
    }

    #[test]
    fn system_clock_is_nonzero() {
        let c = SystemClock;
        assert!(c.now_secs() > 0);
    }
}
