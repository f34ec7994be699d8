//! Length-prefixed, request-ID-tagged entries carried inside a batch
//! payload: `[requestID: u64][dataLen: u32][data: dataLen bytes]`.
use bytes::{Buf, BufMut, BytesMut};

use crate::FrameError;

/// Size of an entry's header (`requestID` + `dataLen`), before its data.
pub const ENTRY_HEADER_SIZE: usize = 8 + 4;

/// Parse one entry from the front of `data`.
///
/// Returns `(request_id, entry_data, next_offset)` where `next_offset`
/// is how many bytes of `data` the entry (header + body) occupied, so
/// callers can slice `data[next_offset..]` to read the following entry.
pub fn parse_data_frame_entry(data: &[u8]) -> Result<(u64, &[u8], usize), FrameError> {
    if data.len() < ENTRY_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let mut p = data;
    let request_id = p.get_u64_le();
    let data_len = p.get_u32_le() as usize;

    if data.len() < ENTRY_HEADER_SIZE + data_len {
        return Err(FrameError::EntryTruncated);
    }

    let body = &data[ENTRY_HEADER_SIZE..ENTRY_HEADER_SIZE + data_len];
    Ok((request_id, body, ENTRY_HEADER_SIZE + data_len))
}

/// Write just the entry header (`requestID`, `dataLen`) — the caller
/// appends `data_len` bytes of body immediately afterwards.
pub fn build_data_frame_entry_header(out: &mut BytesMut, request_id: u64, data_len: usize) {
    out.put_u64_le(request_id);
    out.put_u32_le(data_len as u32);
}

/// Write a full entry (header + body) in one call.
pub fn build_data_frame_entry(out: &mut BytesMut, request_id: u64, data: &[u8]) {
    build_data_frame_entry_header(out, request_id, data.len());
    out.extend_from_slice(data);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_an_entry() {
        let mut buf = BytesMut::new();
        build_data_frame_entry(&mut buf, 50, b"LGET key01\r\n");

        let (request_id, body, next) = parse_data_frame_entry(&buf).unwrap();
        assert_eq!(request_id, 50);
        assert_eq!(body, b"LGET key01\r\n");
        assert_eq!(next, ENTRY_HEADER_SIZE + 12);
        assert_eq!(next, buf.len());
    }

    #[test]
    fn truncated_header_is_an_error() {
        assert_eq!(parse_data_frame_entry(&[0; 4]), Err(FrameError::Truncated));
    }

    #[test]
    fn truncated_body_is_an_error() {
        let mut buf = BytesMut::new();
        build_data_frame_entry_header(&mut buf, 1, 10);
        buf.extend_from_slice(b"short");
        assert_eq!(
            parse_data_frame_entry(&buf),
            Err(FrameError::EntryTruncated)
        );
    }

    #[test]
    fn consecutive_entries_chain_via_next_offset() {
        let mut buf = BytesMut::new();
        build_data_frame_entry(&mut buf, 1, b"LGET\r\n");
        build_data_frame_entry(&mut buf, 2, b"LGET key02\r\n");

        let (id1, body1, next1) = parse_data_frame_entry(&buf).unwrap();
        assert_eq!(id1, 1);
        assert_eq!(body1, b"LGET\r\n");

        let (id2, body2, next2) = parse_data_frame_entry(&buf[next1..]).unwrap();
        assert_eq!(id2, 2);
        assert_eq!(body2, b"LGET key02\r\n");
        assert_eq!(next1 + next2, buf.len());
    }
}
