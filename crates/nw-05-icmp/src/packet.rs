//! ICMP echo packet layout.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared_types::ProtocolError;

use crate::checksum::{internet_checksum, verify};

/// Echo request message type.
pub const ECHO_REQUEST: u8 = 8;
/// Echo reply message type.
pub const ECHO_REPLY: u8 = 0;
/// Type, code, checksum, identifier, sequence.
pub const HEADER_LEN: usize = 8;
/// Header plus the origin timestamp.
pub const PACKET_LEN: usize = HEADER_LEN + 8;

const IPV4_MIN_HEADER: usize = 20;
const IPV4_PROTOCOL_OFFSET: usize = 9;

/// One echo request or reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EchoPacket {
    pub kind: u8,
    pub code: u8,
    pub identifier: u16,
    pub sequence: u16,
    /// Origin instant in monotonic nanoseconds.
    pub timestamp_ns: u64,
}

impl EchoPacket {
    pub fn request(identifier: u16, sequence: u16, timestamp_ns: u64) -> Self {
        Self {
            kind: ECHO_REQUEST,
            code: 0,
            identifier,
            sequence,
            timestamp_ns,
        }
    }

    /// The reply a well-behaved host sends back for this packet.
    pub fn to_reply(&self) -> Self {
        Self {
            kind: ECHO_REPLY,
            code: 0,
            ..*self
        }
    }

    /// Identifier in the high half, sequence in the low half.
    pub fn correlation_id(&self) -> u32 {
        (u32::from(self.identifier) << 16) | u32::from(self.sequence)
    }

    /// Serialize with the checksum computed over the whole packet.
    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(PACKET_LEN);
        buf.put_u8(self.kind);
        buf.put_u8(self.code);
        buf.put_u16(0);
        buf.put_u16(self.identifier);
        buf.put_u16(self.sequence);
        buf.put_u64(self.timestamp_ns);

        let checksum = internet_checksum(&buf);
        buf[2..4].copy_from_slice(&checksum.to_be_bytes());
        buf.freeze()
    }

    /// Parse a bare ICMP message, verifying its checksum.
    ///
    /// Bytes after the timestamp are ignored.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        if payload.len() < PACKET_LEN {
            return Err(ProtocolError::Truncated {
                expected: PACKET_LEN,
                actual: payload.len(),
            });
        }
        if !verify(payload) {
            return Err(ProtocolError::Malformed("ICMP checksum mismatch".into()));
        }

        let mut buf = payload;
        let kind = buf.get_u8();
        let code = buf.get_u8();
        buf.advance(2);
        Ok(Self {
            kind,
            code,
            identifier: buf.get_u16(),
            sequence: buf.get_u16(),
            timestamp_ns: buf.get_u64(),
        })
    }
}

/// Strip a leading IPv4 header, as delivered by raw sockets.
///
/// Payloads whose version nibble is not 4 are returned unchanged (echo
/// types 0 and 8 never look like one). The header's protocol field must be
/// `protocol`.
pub fn strip_ipv4_header(payload: &[u8], protocol: u8) -> Result<&[u8], ProtocolError> {
    let Some(&first) = payload.first() else {
        return Ok(payload);
    };
    if first >> 4 != 4 {
        return Ok(payload);
    }

    let header_len = usize::from(first & 0x0F) * 4;
    if header_len < IPV4_MIN_HEADER {
        return Err(ProtocolError::Malformed(format!(
            "IPv4 header length {} below minimum",
            header_len
        )));
    }
    if payload.len() < header_len {
        return Err(ProtocolError::Truncated {
            expected: header_len,
            actual: payload.len(),
        });
    }
    let carried = payload[IPV4_PROTOCOL_OFFSET];
    if carried != protocol {
        return Err(ProtocolError::UnexpectedType {
            expected: protocol,
            actual: carried,
        });
    }
    Ok(&payload[header_len..])
}
