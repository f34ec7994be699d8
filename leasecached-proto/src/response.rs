//! Builders for the ASCII response bodies described in the wire
//! protocol overview. Each function appends its bytes to an existing
//! buffer rather than allocating, since the processor writes directly
//! into a fixed scratch buffer.
use bytes::{BufMut, BytesMut};

pub fn write_ok_hit(out: &mut BytesMut, value: &[u8]) {
    out.put_slice(b"OK ");
    write_usize(out, value.len());
    out.put_slice(b"\r\n");
    out.put_slice(value);
    out.put_slice(b"\r\n");
}

pub fn write_granted(out: &mut BytesMut, lease_id: u32) {
    out.put_slice(b"GRANTED ");
    write_u32(out, lease_id);
    out.put_slice(b"\r\n");
}

pub fn write_rejected(out: &mut BytesMut) {
    out.put_slice(b"REJECTED\r\n");
}

pub fn write_ok_bool(out: &mut BytesMut, affected: bool) {
    out.put_slice(if affected { b"OK 1\r\n" } else { b"OK 0\r\n" });
}

pub fn write_error(out: &mut BytesMut, message: &str) {
    out.put_slice(b"ERROR ");
    out.put_slice(message.as_bytes());
    out.put_slice(b"\r\n");
}

fn write_u32(out: &mut BytesMut, v: u32) {
    write_usize(out, v as usize);
}

fn write_usize(out: &mut BytesMut, v: usize) {
    let mut tmp = [0u8; 20];
    let mut i = tmp.len();
    if v == 0 {
        out.put_u8(b'0');
        return;
    }
    let mut n = v;
    while n > 0 {
        i -= 1;
        tmp[i] = b'0' + (n % 10) as u8;
        n /= 10;
    }
    out.put_slice(&tmp[i..]);
}
