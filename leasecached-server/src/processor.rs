//! Owns one Command Queue and turns its raw datagram payloads into
//! cache operations, assembling the response batch and sending it back
//! (fragmenting it across several datagrams when it doesn't fit in one).
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use bytes::{BufMut, BytesMut};
use leasecached_proto::{
    build_data_frame_entry_header, build_data_frame_header, parse_data_frame_entry,
    response, CommandHandler, DataFrameHeader, Parser,
};
use parking_lot::Mutex;

use crate::metrics::Metrics;
use crate::net::ResponseSender;
use crate::queue::{ClientAddress, CommandQueue, MIN_COMMAND_SCRATCH_SIZE};
use crate::store::lease::{Cache, GetStatus};

/// One worker: a Command Queue, a Parser (owned by `run`'s stack frame),
/// a Lease Cache reference, and the fixed scratch buffers the spec
/// requires so the hot path never allocates once the server is up —
/// `current_command_data` (the queue's raw payload, copied out of the
/// ring once per command), `send_data` (the assembled response batch),
/// and `send_frame` (one outgoing datagram's worth of framing). All
/// three are cleared and reused on every iteration instead of being
/// reallocated.
pub struct Processor {
    queue: Arc<CommandQueue>,
    cache: Arc<Cache>,
    sender: Arc<dyn ResponseSender>,
    metrics: Arc<Metrics>,

    max_result_package_size: usize,
    next_batch_id: AtomicU64,

    current_command_data: Mutex<Vec<u8>>,
    send_data: Mutex<BytesMut>,
    send_frame: Mutex<BytesMut>,
}

impl Processor {
    pub fn new(
        queue: Arc<CommandQueue>,
        cache: Arc<Cache>,
        sender: Arc<dyn ResponseSender>,
        metrics: Arc<Metrics>,
        max_result_package_size: usize,
    ) -> Self {
        Self {
            queue,
            cache,
            sender,
            metrics,
            max_result_package_size,
            next_batch_id: AtomicU64::new(1),
            current_command_data: Mutex::new(vec![0u8; MIN_COMMAND_SCRATCH_SIZE]),
            send_data: Mutex::new(BytesMut::with_capacity(MIN_COMMAND_SCRATCH_SIZE)),
            send_frame: Mutex::new(BytesMut::with_capacity(max_result_package_size)),
        }
    }

    pub fn queue(&self) -> &Arc<CommandQueue> {
        &self.queue
    }

    /// Drain the queue until shutdown, dispatching and responding to
    /// each raw command in turn. Returns once `waitAvailable` reports
    /// the queue stopped and drained.
    pub fn run(&self) {
        let mut parser = Parser::new();
        loop {
            if !self.queue.wait_available() {
                return;
            }
            let mut cmd_buf = self.current_command_data.lock();
            let (addr, len, commit_to) = self.queue.next_raw_command(&mut cmd_buf);
            self.process_one(&mut parser, addr, &cmd_buf[..len]);
            drop(cmd_buf);
            self.queue.commit(commit_to);
        }
    }

    fn process_one(&self, parser: &mut Parser, addr: ClientAddress, payload: &[u8]) {
        let mut send_data = self.send_data.lock();
        send_data.clear();
        let mut rest = payload;

        while !rest.is_empty() {
            let (request_id, entry_bytes, next) = match parse_data_frame_entry(rest) {
                Ok(parsed) => parsed,
                Err(_) => {
                    tracing::warn!("malformed entry in batch from {:?}", addr);
                    self.metrics.inc_malformed_frame();
                    break;
                }
            };

            let mut handler = Dispatcher {
                cache: &self.cache,
                metrics: &self.metrics,
                request_id,
                out: &mut *send_data,
            };

            if let Err(err) = parser.process(entry_bytes, &mut handler) {
                write_entry(&mut *send_data, request_id, |body| {
                    response::write_error(body, &err.to_string());
                });
            }

            rest = &rest[next..];
        }

        self.send_response(addr, &send_data[..]);
    }

    fn send_response(&self, addr: ClientAddress, send_data: &[u8]) {
        if send_data.is_empty() {
            return;
        }

        let batch_id = self.next_batch_id.fetch_add(1, Ordering::Relaxed);
        let frame_capacity = self.max_result_package_size;
        let mut frame = self.send_frame.lock();

        if send_data.len() + 8 <= frame_capacity {
            frame.clear();
            build_data_frame_header(&mut *frame, &DataFrameHeader::unfragmented(batch_id));
            frame.put_slice(send_data);
            self.try_send(addr, &frame[..]);
            return;
        }

        let total_len = send_data.len() as u32;
        let mut offset = 0usize;
        while offset < send_data.len() {
            let header_size = 16;
            let chunk = (frame_capacity - header_size).min(send_data.len() - offset);
            frame.clear();
            build_data_frame_header(
                &mut *frame,
                &DataFrameHeader::fragment(batch_id, total_len, offset as u32),
            );
            frame.put_slice(&send_data[offset..offset + chunk]);
            self.try_send(addr, &frame[..]);
            offset += chunk;
        }
    }

    fn try_send(&self, addr: ClientAddress, frame: &[u8]) {
        if let Err(err) = self.sender.send(addr, frame) {
            tracing::warn!("send failed to {:?}: {}", addr, err);
        }
    }
}

fn write_entry(out: &mut BytesMut, request_id: u64, build_body: impl FnOnce(&mut BytesMut)) {
    let body_start = out.len();
    // Reserve the header now; the body length is only known afterwards.
    build_data_frame_entry_header(out, request_id, 0);
    let header_len_offset = body_start + 8;

    build_body(out);

    let body_len = (out.len() - body_start - 12) as u32;
    out[header_len_offset..header_len_offset + 4].copy_from_slice(&body_len.to_le_bytes());
}

struct Dispatcher<'a> {
    cache: &'a Cache,
    metrics: &'a Metrics,
    request_id: u64,
    out: &'a mut BytesMut,
}

impl<'a> CommandHandler for Dispatcher<'a> {
    fn on_lget(&mut self, key: &[u8]) {
        let result = self.cache.get(key, self.metrics);
        let request_id = self.request_id;
        write_entry(self.out, request_id, |body| match result.status {
            GetStatus::Found => {
                response::write_ok_hit(body, result.value.as_deref().unwrap_or(&[]));
            }
            GetStatus::LeaseGranted => {
                response::write_granted(body, result.lease_id);
            }
            GetStatus::LeaseRejected => {
                response::write_rejected(body);
            }
        });
    }

    fn on_lset(&mut self, key: &[u8], lease_id: u32, value: &[u8]) {
        let affected = self
            .cache
            .set(key, lease_id, bytes::Bytes::copy_from_slice(value), self.metrics);
        let request_id = self.request_id;
        write_entry(self.out, request_id, |body| {
            response::write_ok_bool(body, affected);
        });
    }

    fn on_del(&mut self, key: &[u8]) {
        let affected = self.cache.invalidate(key, self.metrics);
        let request_id = self.request_id;
        write_entry(self.out, request_id, |body| {
            response::write_ok_bool(body, affected);
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::net::test_support::RecordingSender;
    use crate::time::FakeClock;
    use leasecached_proto::{build_data_frame_entry, parse_data_frame_header};
    use std::sync::Arc;

    fn new_processor(sender: Arc<RecordingSender>) -> (Arc<Processor>, Arc<CommandQueue>) {
        let queue = Arc::new(CommandQueue::new(1 << 16));
        let clock = Arc::new(FakeClock::new(0));
        let cache = Arc::new(Cache::new(8, 16, 30, 4, 1 << 20, clock));
        let metrics = Arc::new(Metrics::new());
        let processor = Arc::new(Processor::new(queue.clone(), cache, sender, metrics, 1 << 15));
        (processor, queue)
    }

    fn addr() -> ClientAddress {
        ClientAddress { ip: [127, 0, 0, 1], port: 9000 }
    }

    #[test]
    fn lget_miss_then_lset_then_hit_produces_expected_responses() {
        let sender = Arc::new(RecordingSender::default());
        let (processor, _queue) = new_processor(sender.clone());
        let mut parser = Parser::new();

        let mut payload = BytesMut::new();
        build_data_frame_entry(&mut payload, 1, b"LGET key1\r\n");
        processor.process_one(&mut parser, addr(), &payload);

        let sent = sender.sent.lock();
        assert_eq!(sent.len(), 1);
        let (_, frame) = &sent[0];
        let (header, consumed) = parse_data_frame_header(frame).unwrap();
        assert!(!header.fragmented);
        assert!(frame[consumed..].windows(7).any(|w| w == b"GRANTED"));
    }

    #[test]
    fn empty_batch_sends_nothing() {
        let sender = Arc::new(RecordingSender::default());
        let (processor, _queue) = new_processor(sender.clone());
        let mut parser = Parser::new();

        processor.process_one(&mut parser, addr(), &[]);
        assert!(sender.sent.lock().is_empty());
    }

    #[test]
    fn parser_error_is_reported_as_error_entry() {
        let sender = Arc::new(RecordingSender::default());
        let (processor, _queue) = new_processor(sender.clone());
        let mut parser = Parser::new();

        let mut payload = BytesMut::new();
        build_data_frame_entry(&mut payload, 1, b"LGET\r\n");
        processor.process_one(&mut parser, addr(), &payload);

        let sent = sender.sent.lock();
        let (_, frame) = &sent[0];
        assert!(frame.windows(5).any(|w| w == b"ERROR"));
    }

    #[test]
    fn large_response_is_fragmented_across_datagrams() {
        let sender = Arc::new(RecordingSender::default());
        let queue = Arc::new(CommandQueue::new(1 << 20));
        let clock = Arc::new(FakeClock::new(0));
        let cache = Arc::new(Cache::new(8, 16, 30, 4, 1 << 20, clock));
        let metrics = Arc::new(Metrics::new());
        // Tiny max package size forces fragmentation for any nontrivial value.
        let processor = Arc::new(Processor::new(queue, cache.clone(), sender.clone(), metrics.clone(), 64));
        let mut parser = Parser::new();

        let big_value = vec![b'x'; 500];
        cache.set(b"key1", cache.get(b"key1", &metrics).lease_id, bytes::Bytes::from(big_value), &metrics);

        let mut payload = BytesMut::new();
        build_data_frame_entry(&mut payload, 1, b"LGET key1\r\n");
        processor.process_one(&mut parser, addr(), &payload);

        let sent = sender.sent.lock();
        assert!(sent.len() > 1);
        for (_, frame) in sent.iter() {
            let (header, _) = parse_data_frame_header(frame).unwrap();
            assert!(header.fragmented);
        }
    }
}
