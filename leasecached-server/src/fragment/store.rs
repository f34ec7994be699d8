//! Reassembles fragmented batch payloads that arrived as several UDP
//! datagrams. Fragments are collected into a fixed-size byte ring keyed
//! by `batchID`; once every byte of a batch has been collected, [`Store::get`]
//! returns the complete payload and frees its slot.
use std::collections::HashMap;

const BATCH_HEADER_SIZE: usize = 8; // batchID: u64

#[derive(Debug, Clone)]
struct BatchInfo {
    index: usize,
    length: u32,
    /// Sorted, non-overlapping `[start, end)` byte ranges received so
    /// far. Tracked (rather than a running sum of fragment sizes) so a
    /// retransmitted or overlapping fragment can't inflate `collected`
    /// past what has actually been written.
    ranges: Vec<(u32, u32)>,
}

impl BatchInfo {
    fn collected(&self) -> u32 {
        self.ranges.iter().map(|(s, e)| e - s).sum()
    }

    /// Merge `[start, end)` into the covered-range set.
    fn mark_covered(&mut self, start: u32, end: u32) {
        let mut start = start;
        let mut end = end;
        let mut i = 0;
        while i < self.ranges.len() {
            let (s, e) = self.ranges[i];
            if e < start {
                i += 1;
                continue;
            }
            if s > end {
                break;
            }
            start = start.min(s);
            end = end.max(e);
            self.ranges.remove(i);
        }
        self.ranges.insert(i, (start, end));
    }
}

pub struct Store {
    batches: HashMap<u64, BatchInfo>,
    buf: Vec<u8>,
    first: usize,
    size: usize,
    max_length: u32,
}

impl Store {
    pub fn new(buf_size: usize) -> Self {
        Self::with_max_length(buf_size, u32::MAX)
    }

    /// `max_length` rejects any batch claiming a reassembled size above
    /// the configured `maxBatchSize`, regardless of ring capacity.
    pub fn with_max_length(buf_size: usize, max_length: u32) -> Self {
        Self {
            batches: HashMap::new(),
            buf: vec![0u8; buf_size],
            first: 0,
            size: 0,
            max_length,
        }
    }

    fn read_at(&self, out: &mut [u8], index: usize) {
        let max = self.buf.len();
        let index = index % max;
        let first_part = (max - index).min(out.len());
        out[..first_part].copy_from_slice(&self.buf[index..index + first_part]);
        if first_part < out.len() {
            let remaining = out.len() - first_part;
            out[first_part..].copy_from_slice(&self.buf[..remaining]);
        }
    }

    fn write_at(&mut self, index: usize, data: &[u8]) {
        let max = self.buf.len();
        let index = index % max;
        let first_part = (max - index).min(data.len());
        self.buf[index..index + first_part].copy_from_slice(&data[..first_part]);
        if first_part < data.len() {
            let remaining = &data[first_part..];
            self.buf[..remaining.len()].copy_from_slice(remaining);
        }
    }

    fn unused_size(&self) -> usize {
        self.buf.len() - self.size
    }

    fn reclaim(&mut self, n: usize) {
        self.first = (self.first + n) % self.buf.len();
        self.size -= n;
    }

    fn delete_least_recent(&mut self, length: u32) {
        let needed = BATCH_HEADER_SIZE + length as usize;
        let mut header = [0u8; BATCH_HEADER_SIZE];
        while self.unused_size() < needed {
            if self.batches.is_empty() {
                // Nothing left to reclaim; the ring is smaller than `needed`.
                break;
            }
            self.read_at(&mut header, self.first);
            let batch_id = u64::from_le_bytes(header);
            if let Some(info) = self.batches.remove(&batch_id) {
                self.reclaim(BATCH_HEADER_SIZE + info.length as usize);
            } else {
                break;
            }
        }
    }

    /// Record one fragment. Returns `true` once `batch_id`'s payload is
    /// fully collected (i.e. this call completed the batch).
    pub fn put(&mut self, batch_id: u64, length: u32, offset: u32, data: &[u8]) -> bool {
        if length > self.max_length || offset + data.len() as u32 > length {
            self.batches.remove(&batch_id);
            return false;
        }

        if !self.batches.contains_key(&batch_id) {
            self.delete_least_recent(length);

            let index = (self.first + self.size) % self.buf.len();
            let header = batch_id.to_le_bytes();
            self.write_at(index, &header);
            self.size += BATCH_HEADER_SIZE + length as usize;

            self.batches.insert(batch_id, BatchInfo { index, length, ranges: Vec::new() });
        }

        let info = self.batches.get_mut(&batch_id).expect("just inserted");
        let write_index = info.index + BATCH_HEADER_SIZE + offset as usize;
        self.write_at(write_index, data);

        let info = self.batches.get_mut(&batch_id).expect("just inserted");
        info.mark_covered(offset, offset + data.len() as u32);
        info.collected() == info.length
    }

    /// Retrieve and remove a fully collected batch's payload, freeing
    /// the ring space it occupied so later `put`s can reclaim it.
    pub fn get(&mut self, batch_id: u64) -> Option<Vec<u8>> {
        let info = self.batches.remove(&batch_id)?;
        let mut out = vec![0u8; info.length as usize];
        self.read_at(&mut out, info.index + BATCH_HEADER_SIZE);
        // Batches occupy the ring contiguously in insertion order, so only
        // the oldest live batch sits at `self.first`; reclaiming anything
        // else would advance `first` past bytes that still belong to that
        // older, still-incomplete batch. A batch retrieved out of order
        // stays counted in `size` until eviction or a later in-order `get`
        // walks the ring back to it.
        if info.index == self.first {
            self.reclaim(BATCH_HEADER_SIZE + info.length as usize);
        }
        Some(out)
    }
}
