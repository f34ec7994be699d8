use crate::time::{Clock, SystemClock};
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Metrics {
    start_secs: u32,
    pub hits_total: AtomicU64,
    pub misses_total: AtomicU64,
    pub leases_granted_total: AtomicU64,
    pub leases_rejected_total: AtomicU64,
    pub evictions_total: AtomicU64,
    pub malformed_frames_total: AtomicU64,
    pub reassembly_discarded_total: AtomicU64,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            start_secs: SystemClock.now_secs(),
            hits_total: AtomicU64::new(0),
            misses_total: AtomicU64::new(0),
            leases_granted_total: AtomicU64::new(0),
            leases_rejected_total: AtomicU64::new(0),
            evictions_total: AtomicU64::new(0),
            malformed_frames_total: AtomicU64::new(0),
            reassembly_discarded_total: AtomicU64::new(0),
        }
    }

    pub fn uptime_secs(&self) -> u32 {
        SystemClock.now_secs().saturating_sub(self.start_secs)
    }

    pub fn inc_hit(&self) {
        self.hits_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_miss(&self) {
        self.misses_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_lease_granted(&self) {
        self.leases_granted_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_lease_rejected(&self) {
        self.leases_rejected_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_evictions(&self, n: u64) {
        self.evictions_total.fetch_add(n, Ordering::Relaxed);
    }
    pub fn inc_malformed_frame(&self) {
        self.malformed_frames_total.fetch_add(1, Ordering::Relaxed);
    }
    pub fn inc_reassembly_discarded(&self) {
        self.reassembly_discarded_total.fetch_add(1, Ordering::Relaxed);
    }
}
