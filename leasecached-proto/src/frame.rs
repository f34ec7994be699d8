//! Outer batch frame: discriminates a whole UDP datagram as either a
//! complete (unfragmented) request/response batch or one fragment of a
//! larger one, per the wire layout in the module overview.
use bytes::{Buf, BufMut, BytesMut};

use crate::FrameError;

const FRAGMENTED_BIT: u64 = 1 << 63;
const BATCH_ID_MASK: u64 = !FRAGMENTED_BIT;

/// Size of the outer header when `fragmented` is false.
pub const UNFRAGMENTED_HEADER_SIZE: usize = 8;
/// Size of the outer header when `fragmented` is true.
pub const FRAGMENTED_HEADER_SIZE: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataFrameHeader {
    pub batch_id: u64,
    pub fragmented: bool,
    /// Total reassembled payload length. Only meaningful when `fragmented`.
    pub length: u32,
    /// This fragment's start offset within the reassembled payload. Only meaningful when `fragmented`.
    pub offset: u32,
}

impl DataFrameHeader {
    pub fn unfragmented(batch_id: u64) -> Self {
        Self {
            batch_id,
            fragmented: false,
            length: 0,
            offset: 0,
        }
    }

    pub fn fragment(batch_id: u64, length: u32, offset: u32) -> Self {
        Self {
            batch_id,
            fragmented: true,
            length,
            offset,
        }
    }

    pub fn encoded_size(&self) -> usize {
        if self.fragmented {
            FRAGMENTED_HEADER_SIZE
        } else {
            UNFRAGMENTED_HEADER_SIZE
        }
    }
}

/// Parse the outer header from the start of `data`.
///
/// Returns the header plus the number of bytes it occupied, so the
/// caller can slice past it to reach the entry list / fragment payload.
pub fn parse_data_frame_header(data: &[u8]) -> Result<(DataFrameHeader, usize), FrameError> {
    if data.len() < UNFRAGMENTED_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let mut p = data;
    let raw_batch_id = p.get_u64_le();

    if raw_batch_id & FRAGMENTED_BIT == 0 {
        return Ok((
            DataFrameHeader::unfragmented(raw_batch_id),
            UNFRAGMENTED_HEADER_SIZE,
        ));
    }

    if data.len() < FRAGMENTED_HEADER_SIZE {
        return Err(FrameError::Truncated);
    }
    let length = p.get_u32_le();
    let offset = p.get_u32_le();
    Ok((
        DataFrameHeader::fragment(raw_batch_id & BATCH_ID_MASK, length, offset),
        FRAGMENTED_HEADER_SIZE,
    ))
}

/// Serialize the outer header. Returns the number of bytes written
/// (mirrors `encoded_size`).
pub fn build_data_frame_header(out: &mut BytesMut, header: &DataFrameHeader) -> usize {
    if !header.fragmented {
        out.put_u64_le(header.batch_id);
        return UNFRAGMENTED_HEADER_SIZE;
    }
    out.put_u64_le(header.batch_id | FRAGMENTED_BIT);
    out.put_u32_le(header.length);
    out.put_u32_le(header.offset);
    FRAGMENTED_HEADER_SIZE
}
