//! Protocol seam: where the correlation id lives on the wire.

use std::net::SocketAddr;

use bytes::Bytes;
use shared_types::ProtocolError;

use crate::domain::{CorrelationId, IdSpace};

/// A decoded response, already attributed to a request.
#[derive(Debug, Clone, PartialEq)]
pub struct Decoded<R> {
    pub id: CorrelationId,
    /// `Err` when the id was readable but the rest of the message was not,
    /// or when the peer reported a protocol-level error.
    pub outcome: Result<R, ProtocolError>,
}

impl<R> Decoded<R> {
    pub fn ok(id: CorrelationId, response: R) -> Self {
        Self {
            id,
            outcome: Ok(response),
        }
    }

    pub fn err(id: CorrelationId, error: ProtocolError) -> Self {
        Self {
            id,
            outcome: Err(error),
        }
    }
}

/// Encodes requests carrying a correlation id and reads the id back out of
/// responses.
///
/// Returning `Err` from [`decode`](Self::decode) means no id could be
/// recovered; the datagram is dropped without affecting any request.
pub trait CorrelationCodec: Send + Sync + 'static {
    type Request: Send + 'static;
    type Response: Send + 'static;

    /// Width of the id field.
    fn id_space(&self) -> IdSpace;

    fn encode(&self, id: CorrelationId, request: &Self::Request) -> Result<Bytes, ProtocolError>;

    fn decode(
        &self,
        from: SocketAddr,
        payload: &[u8],
    ) -> Result<Decoded<Self::Response>, ProtocolError>;

    /// Per-request destination. `None` sends to the connection's target.
    fn destination(&self, _request: &Self::Request) -> Option<SocketAddr> {
        None
    }
}
