//! Owns every processor and the Fragment Reassembly Store. The single
//! UDP reader thread calls [`Receiver::recv`] once per datagram; this
//! module never touches a socket directly so it can be driven by tests.
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use leasecached_proto::parse_data_frame_header;

use crate::fragment::Store as FragmentStore;
use crate::metrics::Metrics;
use crate::processor::Processor;
use crate::queue::ClientAddress;

pub struct Receiver {
    processors: Vec<Arc<Processor>>,
    sequence: AtomicU64,
    fragments: Mutex<FragmentStore>,
    metrics: Arc<Metrics>,
    handles: Mutex<Vec<std::thread::JoinHandle<()>>>,
}

impl Receiver {
    pub fn new(
        processors: Vec<Arc<Processor>>,
        fragment_store_size: usize,
        max_batch_size: u32,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            processors,
            sequence: AtomicU64::new(0),
            fragments: Mutex::new(FragmentStore::with_max_length(fragment_store_size, max_batch_size)),
            metrics,
            handles: Mutex::new(Vec::new()),
        }
    }

    /// The processors this receiver dispatches to, in round-robin order.
    /// Exposed so tests can drain a specific processor's queue without
    /// spawning the background threads `run_in_background` would.
    pub fn processors(&self) -> &[Arc<Processor>] {
        &self.processors
    }

    /// Handle one received datagram. Parses the outer frame, reassembles
    /// fragments as needed, and hands the decoded command-list payload
    /// to the next processor in round-robin order.
    pub fn recv(&self, addr: ClientAddress, datagram: &[u8]) {
        let (header, consumed) = match parse_data_frame_header(datagram) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("malformed outer frame from {:?}", addr);
                self.metrics.inc_malformed_frame();
                return;
            }
        };

        let remainder = &datagram[consumed..];

        let payload: Vec<u8> = if !header.fragmented {
            remainder.to_vec()
        } else {
            let mut fragments = self.fragments.lock();
            let filled = fragments.put(header.batch_id, header.length, header.offset, remainder);
            if !filled {
                return;
            }
            match fragments.get(header.batch_id) {
                Some(data) => data,
                None => {
                    self.metrics.inc_reassembly_discarded();
                    return;
                }
            }
        };

        self.dispatch(addr, &payload);
    }

    fn dispatch(&self, addr: ClientAddress, payload: &[u8]) {
        let n = self.processors.len() as u64;
        loop {
            let seq = self.sequence.fetch_add(1, Ordering::Relaxed);
            let index = (seq % n) as usize;
            let processor = &self.processors[index];
            if processor.queue().is_appendable(payload.len()) {
                processor.queue().append(addr, payload);
                return;
            }
        }
    }

    /// Spawn one consumer thread per processor. Each thread runs that
    /// processor's `run` loop until `shutdown` drains and stops it.
    pub fn run_in_background(self: &Arc<Self>) {
        let mut handles = self.handles.lock();
        for processor in &self.processors {
            let processor = processor.clone();
            handles.push(std::thread::spawn(move || processor.run()));
        }
    }

    pub fn shutdown(&self) {
        for processor in &self.processors {
            processor.queue().stop();
        }
        let mut handles = self.handles.lock();
        for handle in handles.drain(..) {
            let _ = handle.join();
        }
    }
}
