//! Lease-based anti-stampede cache.
//!
//! A [`Cache`] pairs a [`crate::store::value_store::ValueStore`] with a
//! fixed number of lease buckets. A cache miss grants the first caller a
//! single-writer lease so only one request recomputes the value while
//! concurrent callers for the same key are rejected outright (instead of
//! recomputing redundantly, i.e. a thundering herd).
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;

use crate::config::ceil_power_of_two;
use crate::hash::{compute_hash_key_and_index, hash_key};
use crate::metrics::Metrics;
use crate::store::value_store::ValueStore;
use crate::time::Clock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GetStatus {
    Found,
    LeaseGranted,
    LeaseRejected,
}

#[derive(Debug, Clone)]
pub struct GetResult {
    pub status: GetStatus,
    pub lease_id: u32,
    pub value: Option<Bytes>,
}

#[derive(Debug, Clone, Copy, Default)]
struct LeaseSlot {
    occupied: bool,
    hash_key: u32,
    lease_id: u32,
    expires_at: u32,
}

impl LeaseSlot {
    fn is_expired(&self, now: u32) -> bool {
        now >= self.expires_at
    }
}

/// One lease bucket: a small fixed-size array of slots, linearly
/// scanned on every operation (`leaseListSize` defaults to 16, so this
/// is cheaper than maintaining an intrusive LRU list).
struct LeaseList {
    slots: Vec<LeaseSlot>,
    next_lease_id: u32,
    timeout_secs: u32,
}

impl LeaseList {
    fn new(size: u32, timeout_secs: u32) -> Self {
        let size = ceil_power_of_two(size);
        Self {
            slots: vec![LeaseSlot::default(); size as usize],
            next_lease_id: 0,
            timeout_secs,
        }
    }

    fn next_id(&mut self) -> u32 {
        // Lease IDs start at 1: 0 is reserved to mean "no lease".
        self.next_lease_id = self.next_lease_id.wrapping_add(1);
        if self.next_lease_id == 0 {
            self.next_lease_id = 1;
        }
        self.next_lease_id
    }

    fn find(&self, hash_key: u32) -> Option<usize> {
        self.slots
            .iter()
            .position(|s| s.occupied && s.hash_key == hash_key)
    }

    /// A free slot, or else the slot with the oldest (smallest)
    /// `grantedAt` — equivalent to the smallest `expires_at`, since
    /// every slot in a list shares the same `timeout_secs`.
    fn free_or_oldest(&self) -> usize {
        self.slots
            .iter()
            .position(|s| !s.occupied)
            .unwrap_or_else(|| {
                self.slots
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, s)| s.expires_at)
                    .map(|(i, _)| i)
                    .expect("lease list is never empty")
            })
    }

    /// Try to grant a lease for `hash_key`. Returns `None` if another
    /// unexpired lease already occupies a slot for this key.
    fn get_lease(&mut self, hash_key: u32, now: u32) -> Option<u32> {
        let index = match self.find(hash_key) {
            Some(i) if !self.slots[i].is_expired(now) => return None,
            Some(i) => i,
            None => self.free_or_oldest(),
        };

        let lease_id = self.next_id();
        self.slots[index] = LeaseSlot {
            occupied: true,
            hash_key,
            lease_id,
            expires_at: now + self.timeout_secs,
        };
        Some(lease_id)
    }

    /// Clear the slot if it still holds `lease_id` for `hash_key`.
    fn delete_lease(&mut self, hash_key: u32, lease_id: u32) -> bool {
        match self.find(hash_key) {
            Some(i) if self.slots[i].lease_id == lease_id => {
                self.slots[i] = LeaseSlot::default();
                true
            }
            _ => false,
        }
    }

    /// Clear the slot unconditionally, regardless of which lease it holds.
    fn force_delete(&mut self, hash_key: u32) {
        if let Some(i) = self.find(hash_key) {
            self.slots[i] = LeaseSlot::default();
        }
    }
}

pub struct Cache {
    leases: Vec<Mutex<LeaseList>>,
    mask: u32,
    store: ValueStore,
    clock: Arc<dyn Clock>,
}

impl Cache {
    pub fn new(
        num_buckets: u32,
        lease_list_size: u32,
        lease_timeout_secs: u32,
        num_value_segments: usize,
        segment_capacity_bytes: usize,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let num_buckets = ceil_power_of_two(num_buckets);
        let leases = (0..num_buckets)
            .map(|_| Mutex::new(LeaseList::new(lease_list_size, lease_timeout_secs)))
            .collect();

        Self {
            leases,
            mask: num_buckets - 1,
            store: ValueStore::new(num_value_segments, segment_capacity_bytes),
            clock,
        }
    }

    fn locate(&self, key: &[u8]) -> (u64, u32, &Mutex<LeaseList>) {
        let hash = hash_key(key);
        let (tag, index) = compute_hash_key_and_index(hash, self.mask);
        (hash, tag, &self.leases[index as usize])
    }

    pub fn get(&self, key: &[u8], metrics: &Metrics) -> GetResult {
        let (hash, tag, list) = self.locate(key);

        if let Some(value) = self.store.get(key, hash) {
            metrics.inc_hit();
            return GetResult {
                status: GetStatus::Found,
                lease_id: 0,
                value: Some(value),
            };
        }
        metrics.inc_miss();

        let now = self.clock.now_secs();
        let mut guard = list.lock();
        match guard.get_lease(tag, now) {
            Some(lease_id) => {
                metrics.inc_lease_granted();
                GetResult {
                    status: GetStatus::LeaseGranted,
                    lease_id,
                    value: None,
                }
            }
            None => {
                metrics.inc_lease_rejected();
                GetResult {
                    status: GetStatus::LeaseRejected,
                    lease_id: 0,
                    value: None,
                }
            }
        }
    }

    pub fn set(&self, key: &[u8], lease_id: u32, value: Bytes, metrics: &Metrics) -> bool {
        let (hash, tag, list) = self.locate(key);

        let deleted = list.lock().delete_lease(tag, lease_id);
        if !deleted {
            return false;
        }

        self.store.put(key, hash, value, metrics);
        true
    }

    pub fn invalidate(&self, key: &[u8], _metrics: &Metrics) -> bool {
        let (hash, tag, list) = self.locate(key);
        list.lock().force_delete(tag);
        self.store.delete(key, hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::FakeClock;

    fn new_cache(clock: Arc<FakeClock>) -> Cache {
        Cache::new(8, 16, 30, 4, 1 << 20, clock)
    }

    #[test]
    fn get_rejected_on_second_miss() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = new_cache(clock);
        let metrics = Metrics::new();

        let r1 = cache.get(b"key1", &metrics);
        assert_eq!(r1.status, GetStatus::LeaseGranted);
        assert_eq!(r1.lease_id, 1);

        let r2 = cache.get(b"key1", &metrics);
        assert_eq!(r2.status, GetStatus::LeaseRejected);
        assert_eq!(r2.lease_id, 0);
    }

    #[test]
    fn set_ok_after_lease_granted() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = new_cache(clock);
        let metrics = Metrics::new();

        let r1 = cache.get(b"key1", &metrics);
        assert!(cache.set(b"key1", r1.lease_id, Bytes::from_static(b"value1"), &metrics));

        let r2 = cache.get(b"key1", &metrics);
        assert_eq!(r2.status, GetStatus::Found);
        assert_eq!(r2.value.unwrap(), Bytes::from_static(b"value1"));
    }

    #[test]
    fn set_not_affected_after_invalidate() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = new_cache(clock);
        let metrics = Metrics::new();

        let r1 = cache.get(b"key1", &metrics);
        assert!(!cache.invalidate(b"key1", &metrics));
        assert!(!cache.set(b"key1", r1.lease_id, Bytes::from_static(b"value1"), &metrics));

        let r2 = cache.get(b"key1", &metrics);
        assert_eq!(r2.status, GetStatus::LeaseGranted);
        assert_eq!(r2.lease_id, 2);
    }

    #[test]
    fn invalidate_affected_after_set() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = new_cache(clock);
        let metrics = Metrics::new();

        let r1 = cache.get(b"key1", &metrics);
        assert!(cache.set(b"key1", r1.lease_id, Bytes::from_static(b"value1"), &metrics));
        assert!(cache.invalidate(b"key1", &metrics));

        let r2 = cache.get(b"key1", &metrics);
        assert_eq!(r2.status, GetStatus::LeaseGranted);
        assert_eq!(r2.lease_id, 2);
    }

    #[test]
    fn double_set_not_ok() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = new_cache(clock);
        let metrics = Metrics::new();

        let r1 = cache.get(b"key1", &metrics);
        assert!(cache.set(b"key1", r1.lease_id, Bytes::from_static(b"value1"), &metrics));
        assert!(!cache.set(b"key1", r1.lease_id, Bytes::from_static(b"value2"), &metrics));

        let r2 = cache.get(b"key1", &metrics);
        assert_eq!(r2.status, GetStatus::Found);
        assert_eq!(r2.value.unwrap(), Bytes::from_static(b"value1"));
    }

    #[test]
    fn lease_granted_again_after_timeout() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = Cache::new(8, 16, 2, 4, 1 << 20, clock.clone());
        let metrics = Metrics::new();

        let r1 = cache.get(b"key", &metrics);
        assert_eq!(r1.status, GetStatus::LeaseGranted);
        assert_eq!(r1.lease_id, 1);

        clock.advance(3);

        let r2 = cache.get(b"key", &metrics);
        assert_eq!(r2.status, GetStatus::LeaseGranted);
        assert_eq!(r2.lease_id, 2);
    }

    #[test]
    fn lease_rejected_before_timeout() {
        let clock = Arc::new(FakeClock::new(0));
        let cache = Cache::new(8, 16, 2, 4, 1 << 20, clock.clone());
        let metrics = Metrics::new();

        let r1 = cache.get(b"key", &metrics);
        assert_eq!(r1.status, GetStatus::LeaseGranted);

        clock.advance(1);

        let r2 = cache.get(b"key", &metrics);
        assert_eq!(r2.status, GetStatus::LeaseRejected);
    }

    #[test]
    fn distinct_keys_sharing_a_bucket_hold_independent_leases() {
        // Two hash_keys colliding on the same LeaseList must not clobber
        // each other's slot: the list is a scanned array, not a
        // second-level direct-mapped table.
        let mut list = LeaseList::new(4, 30);
        let a = list.get_lease(1, 0).unwrap();
        let b = list.get_lease(2, 0).unwrap();
        assert_ne!(a, b);

        // `a`'s lease is still rejected on a second LGET for key 1...
        assert!(list.get_lease(1, 0).is_none());
        // ...and key 2's lease is unaffected.
        assert!(list.delete_lease(2, b));
        assert!(!list.delete_lease(1, a + 100));
        assert!(list.delete_lease(1, a));
    }

    #[test]
    fn full_bucket_evicts_the_oldest_unexpired_slot() {
        let mut list = LeaseList::new(2, 1000);
        let first = list.get_lease(1, 0).unwrap();
        let _second = list.get_lease(2, 10).unwrap();

        // Both slots are occupied and unexpired; a third distinct key
        // must evict the oldest grant (key 1, granted at t=0).
        let third = list.get_lease(3, 20).unwrap();
        assert!(list.find(1).is_none());
        assert!(list.find(2).is_some());
        assert!(list.find(3).is_some());
        assert_ne!(first, third);
    }
}
