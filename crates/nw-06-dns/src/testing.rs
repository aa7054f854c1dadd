//! Fake resolver replies for tests.

use bytes::{BufMut, Bytes, BytesMut};

/// Turn a query into a response carrying `answers` as (type, rdata) records
/// whose owner name points back at the question.
pub(crate) fn respond(query: &[u8], rcode: u8, answers: &[(u16, Vec<u8>)]) -> Bytes {
    let mut buf = BytesMut::from(query);
    buf[2] |= 0x80;
    buf[3] = (buf[3] & 0xF0) | rcode;
    buf[6..8].copy_from_slice(&(answers.len() as u16).to_be_bytes());
    for (record_type, data) in answers {
        buf.put_u16(0xC00C);
        buf.put_u16(*record_type);
        buf.put_u16(1);
        buf.put_u32(300);
        buf.put_u16(data.len() as u16);
        buf.put_slice(data);
    }
    buf.freeze()
}
