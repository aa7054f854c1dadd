//! [`CorrelationCodec`] for SNMPv2c.

use std::net::SocketAddr;

use bytes::Bytes;
use nw_03_correlation::{CorrelationCodec, CorrelationId, Decoded, IdSpace};
use shared_types::{ProtocolError, SnmpConfig};
use tracing::trace;

use crate::oid::Oid;
use crate::pdu::{Message, Pdu, PduType, VarBind};

/// Operations the client issues.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpRequest {
    Get(Oid),
    GetBulk(Oid),
}

impl SnmpRequest {
    pub fn oid(&self) -> &Oid {
        match self {
            Self::Get(oid) | Self::GetBulk(oid) => oid,
        }
    }
}

/// Request-id correlated SNMPv2c.
#[derive(Debug, Clone)]
pub struct SnmpCodec {
    community: String,
    bulk_size: u32,
}

impl SnmpCodec {
    pub fn new(community: &str, bulk_size: u32) -> Self {
        Self {
            community: community.to_string(),
            bulk_size,
        }
    }

    pub fn from_config(config: &SnmpConfig) -> Self {
        Self::new(&config.community, config.bulk_size)
    }
}

/// The request-id carried for a correlation id (negative above `i32::MAX`).
pub fn request_id(id: CorrelationId) -> i32 {
    id.as_u32() as i32
}

fn correlation_id(request_id: i32) -> CorrelationId {
    CorrelationId::from(request_id as u32)
}

impl CorrelationCodec for SnmpCodec {
    type Request = SnmpRequest;
    type Response = Vec<VarBind>;

    fn id_space(&self) -> IdSpace {
        IdSpace::SNMP
    }

    fn encode(&self, id: CorrelationId, request: &SnmpRequest) -> Result<Bytes, ProtocolError> {
        let pdu = match request {
            SnmpRequest::Get(oid) => Pdu::get(request_id(id), [oid.clone()]),
            SnmpRequest::GetBulk(oid) => Pdu::get_bulk(request_id(id), oid.clone(), self.bulk_size),
        };
        Ok(Message::new(&self.community, pdu).encode())
    }

    fn decode(
        &self,
        from: SocketAddr,
        payload: &[u8],
    ) -> Result<Decoded<Vec<VarBind>>, ProtocolError> {
        let message = match Message::decode(payload) {
            Ok(message) => message,
            Err(error) => {
                // Fail the request if at least its id survived
                return match Message::peek_request_id(payload) {
                    Ok((PduType::Response, id)) => Ok(Decoded::err(correlation_id(id), error)),
                    _ => Err(error),
                };
            }
        };

        let pdu = message.pdu;
        if pdu.kind != PduType::Response {
            trace!(from = %from, kind = ?pdu.kind, "Ignoring non-response PDU");
            return Err(ProtocolError::UnexpectedType {
                expected: PduType::Response.tag(),
                actual: pdu.kind.tag(),
            });
        }
        let id = correlation_id(pdu.request_id);
        if pdu.error_status != 0 {
            return Ok(Decoded::err(
                id,
                ProtocolError::ErrorStatus {
                    status: pdu.error_status as u32,
                    index: pdu.error_index as u32,
                },
            ));
        }
        Ok(Decoded::ok(id, pdu.bindings))
    }
}
