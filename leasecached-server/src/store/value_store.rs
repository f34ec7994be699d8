//! Fixed-capacity value storage backing the lease cache. Each key hashes
//! into one of `num_segments` independent shards; a shard holds its
//! entries in a [`DashMap`] plus a FIFO ring of keys used to evict the
//! oldest entry once the shard's byte budget is exceeded.
use bytes::Bytes;
use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;

use crate::metrics::Metrics;

struct Segment {
    map: DashMap<Vec<u8>, Bytes>,
    order: Mutex<VecDeque<Vec<u8>>>,
    capacity_bytes: usize,
    used_bytes: Mutex<usize>,
}

impl Segment {
    fn new(capacity_bytes: usize) -> Self {
        Self {
            map: DashMap::new(),
            order: Mutex::new(VecDeque::new()),
            capacity_bytes,
            used_bytes: Mutex::new(0),
        }
    }

    fn entry_size(key: &[u8], value: &[u8]) -> usize {
        key.len() + value.len()
    }

    fn put(&self, key: &[u8], value: Bytes, metrics: &Metrics) {
        let added = Self::entry_size(key, &value);

        if let Some(old) = self.map.insert(key.to_vec(), value) {
            let mut used = self.used_bytes.lock();
            *used = used.saturating_sub(Self::entry_size(key, &old));
        } else {
            self.order.lock().push_back(key.to_vec());
        }

        {
            let mut used = self.used_bytes.lock();
            *used += added;
        }

        self.evict_until_within_capacity(metrics);
    }

    fn evict_until_within_capacity(&self, metrics: &Metrics) {
        loop {
            if *self.used_bytes.lock() <= self.capacity_bytes {
                return;
            }
            let oldest = match self.order.lock().pop_front() {
                Some(k) => k,
                None => return,
            };
            if let Some((_, value)) = self.map.remove(&oldest) {
                let mut used = self.used_bytes.lock();
                *used = used.saturating_sub(Self::entry_size(&oldest, &value));
                metrics.inc_evictions(1);
            }
        }
    }

    fn get(&self, key: &[u8]) -> Option<Bytes> {
        self.map.get(key).map(|v| v.clone())
    }

    fn delete(&self, key: &[u8]) -> bool {
        match self.map.remove(key) {
            Some((_, value)) => {
                let mut used = self.used_bytes.lock();
                *used = used.saturating_sub(Self::entry_size(key, &value));
                true
            }
            None => false,
        }
    }
}

pub struct ValueStore {
    segments: Vec<Segment>,
    mask: usize,
}

impl ValueStore {
    pub fn new(num_segments: usize, segment_capacity_bytes: usize) -> Self {
        let num_segments = num_segments.next_power_of_two().max(1);
        let segments = (0..num_segments)
            .map(|_| Segment::new(segment_capacity_bytes))
            .collect();
        Self {
            segments,
            mask: num_segments - 1,
        }
    }

    fn segment_for(&self, hash: u64) -> &Segment {
        let index = (hash as usize >> 16) & self.mask;
        &self.segments[index]
    }

    pub fn put(&self, key: &[u8], hash: u64, value: Bytes, metrics: &Metrics) {
        self.segment_for(hash).put(key, value, metrics);
    }

    pub fn get(&self, key: &[u8], hash: u64) -> Option<Bytes> {
        self.segment_for(hash).get(key)
    }

    pub fn delete(&self, key: &[u8], hash: u64) -> bool {
        self.segment_for(hash).delete(key)
    }

    pub fn len(&self) -> usize {
        self.segments.iter().map(|s| s.map.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
