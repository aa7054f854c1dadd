//! [`CorrelationCodec`] for DNS queries.

use std::net::SocketAddr;

use bytes::Bytes;
use nw_03_correlation::{CorrelationCodec, CorrelationId, Decoded, IdSpace};
use shared_types::ProtocolError;

use crate::message::{DnsQuery, DnsResponse, HEADER_LEN};

/// DNS over the transaction-id field.
#[derive(Debug, Clone, Copy, Default)]
pub struct DnsCodec;

impl CorrelationCodec for DnsCodec {
    type Request = DnsQuery;
    type Response = DnsResponse;

    fn id_space(&self) -> IdSpace {
        IdSpace::DNS
    }

    fn encode(&self, id: CorrelationId, query: &DnsQuery) -> Result<Bytes, ProtocolError> {
        query.encode(id.as_u16())
    }

    /// Datagrams without a full header or without the QR bit carry no
    /// usable id; anything wrong after the header fails the matching query.
    fn decode(
        &self,
        _from: SocketAddr,
        payload: &[u8],
    ) -> Result<Decoded<DnsResponse>, ProtocolError> {
        if payload.len() < HEADER_LEN {
            return Err(ProtocolError::Truncated {
                expected: HEADER_LEN,
                actual: payload.len(),
            });
        }
        if payload[2] & 0x80 == 0 {
            return Err(ProtocolError::Malformed("QR bit not set".into()));
        }
        let id = CorrelationId::from(u16::from_be_bytes([payload[0], payload[1]]));
        Ok(match DnsResponse::parse(payload) {
            Ok(response) => Decoded::ok(id, response),
            Err(error) => Decoded::err(id, error),
        })
    }
}
