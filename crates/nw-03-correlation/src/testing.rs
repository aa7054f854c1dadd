//! Minimal codec for exercising connections without a real protocol.
//!
//! Wire format: 4-byte big-endian correlation id followed by a UTF-8 body.
//! A body starting with `ERR ` decodes as a peer-reported error status.

use std::net::SocketAddr;

use bytes::{Buf, BufMut, Bytes, BytesMut};
use shared_types::ProtocolError;

use crate::domain::{CorrelationId, IdSpace};
use crate::ports::{CorrelationCodec, Decoded};

/// Id-prefixed text messages.
#[derive(Debug, Clone, Copy)]
pub struct TaggedCodec {
    space: IdSpace,
}

impl TaggedCodec {
    pub fn new(space: IdSpace) -> Self {
        Self { space }
    }

    /// Build a wire frame by hand (stray or duplicate replies).
    pub fn frame(id: u32, body: &str) -> Bytes {
        let mut buf = BytesMut::with_capacity(4 + body.len());
        buf.put_u32(id);
        buf.put_slice(body.as_bytes());
        buf.freeze()
    }
}

impl Default for TaggedCodec {
    fn default() -> Self {
        Self::new(IdSpace::SNMP)
    }
}

impl CorrelationCodec for TaggedCodec {
    type Request = String;
    type Response = String;

    fn id_space(&self) -> IdSpace {
        self.space
    }

    fn encode(&self, id: CorrelationId, request: &String) -> Result<Bytes, ProtocolError> {
        if request.is_empty() {
            return Err(ProtocolError::Malformed("empty request".into()));
        }
        Ok(Self::frame(id.as_u32(), request))
    }

    fn decode(&self, _from: SocketAddr, payload: &[u8]) -> Result<Decoded<String>, ProtocolError> {
        if payload.len() < 4 {
            return Err(ProtocolError::Truncated {
                expected: 4,
                actual: payload.len(),
            });
        }
        let mut buf = payload;
        let id = CorrelationId::new(u64::from(buf.get_u32()) & self.space.mask());

        let Ok(body) = std::str::from_utf8(buf) else {
            return Ok(Decoded::err(id, ProtocolError::Malformed("body is not UTF-8".into())));
        };
        match body.strip_prefix("ERR ") {
            Some(status) => Ok(Decoded::err(
                id,
                ProtocolError::ErrorStatus {
                    status: status.trim().parse().unwrap_or(1),
                    index: 0,
                },
            )),
            None => Ok(Decoded::ok(id, body.to_string())),
        }
    }
}
