//! SNMPv2c messages.
//!
//! ```text
//! Message ::= SEQUENCE { version INTEGER (1), community OCTET STRING, pdu }
//! PDU     ::= [tag] { request-id, error-status, error-index,
//!                     SEQUENCE OF SEQUENCE { name OID, value } }
//! ```
//!
//! GetBulkRequest reuses the two error fields as non-repeaters and
//! max-repetitions.

use std::fmt;
use std::net::Ipv4Addr;

use bytes::{Bytes, BytesMut};
use shared_types::ProtocolError;

use crate::ber::{self, BerReader};
use crate::oid::Oid;

/// SNMPv2c on the wire.
pub const VERSION_2C: i64 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PduType {
    Get,
    GetNext,
    Response,
    GetBulk,
}

impl PduType {
    pub const fn tag(self) -> u8 {
        match self {
            Self::Get => 0xA0,
            Self::GetNext => 0xA1,
            Self::Response => 0xA2,
            Self::GetBulk => 0xA5,
        }
    }

    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0xA0 => Some(Self::Get),
            0xA1 => Some(Self::GetNext),
            0xA2 => Some(Self::Response),
            0xA5 => Some(Self::GetBulk),
            _ => None,
        }
    }
}

/// A variable binding's value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnmpValue {
    Integer(i64),
    OctetString(Bytes),
    Null,
    Oid(Oid),
    IpAddress(Ipv4Addr),
    Counter32(u32),
    Gauge32(u32),
    TimeTicks(u32),
    Opaque(Bytes),
    Counter64(u64),
    NoSuchObject,
    NoSuchInstance,
    EndOfMibView,
}

impl SnmpValue {
    /// One of the v2c exception markers rather than data.
    pub fn is_exception(&self) -> bool {
        matches!(
            self,
            Self::NoSuchObject | Self::NoSuchInstance | Self::EndOfMibView
        )
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        match self {
            Self::Integer(value) => ber::put_integer(buf, ber::INTEGER, *value),
            Self::OctetString(bytes) => ber::put_tlv(buf, ber::OCTET_STRING, bytes),
            Self::Null => ber::put_tlv(buf, ber::NULL, &[]),
            Self::Oid(oid) => {
                let mut content = BytesMut::new();
                oid.encode_content(&mut content);
                ber::put_tlv(buf, ber::OBJECT_IDENTIFIER, &content);
            }
            Self::IpAddress(ip) => ber::put_tlv(buf, ber::IP_ADDRESS, &ip.octets()),
            Self::Counter32(value) => ber::put_unsigned(buf, ber::COUNTER32, u64::from(*value)),
            Self::Gauge32(value) => ber::put_unsigned(buf, ber::GAUGE32, u64::from(*value)),
            Self::TimeTicks(value) => ber::put_unsigned(buf, ber::TIMETICKS, u64::from(*value)),
            Self::Opaque(bytes) => ber::put_tlv(buf, ber::OPAQUE, bytes),
            Self::Counter64(value) => ber::put_unsigned(buf, ber::COUNTER64, *value),
            Self::NoSuchObject => ber::put_tlv(buf, ber::NO_SUCH_OBJECT, &[]),
            Self::NoSuchInstance => ber::put_tlv(buf, ber::NO_SUCH_INSTANCE, &[]),
            Self::EndOfMibView => ber::put_tlv(buf, ber::END_OF_MIB_VIEW, &[]),
        }
    }

    pub fn decode(tag: u8, content: &[u8]) -> Result<Self, ProtocolError> {
        Ok(match tag {
            ber::INTEGER => Self::Integer(ber::decode_integer(content)?),
            ber::OCTET_STRING => Self::OctetString(Bytes::copy_from_slice(content)),
            ber::NULL => Self::Null,
            ber::OBJECT_IDENTIFIER => Self::Oid(Oid::decode_content(content)?),
            ber::IP_ADDRESS => match content {
                [a, b, c, d] => Self::IpAddress(Ipv4Addr::new(*a, *b, *c, *d)),
                _ => {
                    return Err(ProtocolError::Malformed(format!(
                        "IpAddress of {} bytes",
                        content.len()
                    )))
                }
            },
            ber::COUNTER32 => Self::Counter32(unsigned32(content)?),
            ber::GAUGE32 => Self::Gauge32(unsigned32(content)?),
            ber::TIMETICKS => Self::TimeTicks(unsigned32(content)?),
            ber::OPAQUE => Self::Opaque(Bytes::copy_from_slice(content)),
            ber::COUNTER64 => Self::Counter64(ber::decode_unsigned(content)?),
            ber::NO_SUCH_OBJECT => Self::NoSuchObject,
            ber::NO_SUCH_INSTANCE => Self::NoSuchInstance,
            ber::END_OF_MIB_VIEW => Self::EndOfMibView,
            other => {
                return Err(ProtocolError::Malformed(format!(
                    "unknown value tag {:#04x}",
                    other
                )))
            }
        })
    }
}

fn unsigned32(content: &[u8]) -> Result<u32, ProtocolError> {
    let value = ber::decode_unsigned(content)?;
    u32::try_from(value)
        .map_err(|_| ProtocolError::Malformed(format!("{} does not fit 32 bits", value)))
}

impl fmt::Display for SnmpValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(value) => write!(f, "{}", value),
            Self::OctetString(bytes) => write!(f, "{}", String::from_utf8_lossy(bytes)),
            Self::Null => f.write_str("null"),
            Self::Oid(oid) => write!(f, "{}", oid),
            Self::IpAddress(ip) => write!(f, "{}", ip),
            Self::Counter32(value) | Self::Gauge32(value) | Self::TimeTicks(value) => {
                write!(f, "{}", value)
            }
            Self::Opaque(bytes) => write!(f, "opaque({} bytes)", bytes.len()),
            Self::Counter64(value) => write!(f, "{}", value),
            Self::NoSuchObject => f.write_str("noSuchObject"),
            Self::NoSuchInstance => f.write_str("noSuchInstance"),
            Self::EndOfMibView => f.write_str("endOfMibView"),
        }
    }
}

/// One `name = value` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VarBind {
    pub oid: Oid,
    pub value: SnmpValue,
}

impl VarBind {
    pub fn new(oid: Oid, value: SnmpValue) -> Self {
        Self { oid, value }
    }

    /// Request binding: the name with a NULL value.
    pub fn null(oid: Oid) -> Self {
        Self::new(oid, SnmpValue::Null)
    }
}

/// A protocol data unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pdu {
    pub kind: PduType,
    pub request_id: i32,
    /// error-status, or non-repeaters for GetBulk.
    pub error_status: i32,
    /// error-index, or max-repetitions for GetBulk.
    pub error_index: i32,
    pub bindings: Vec<VarBind>,
}

impl Pdu {
    pub fn get(request_id: i32, oids: impl IntoIterator<Item = Oid>) -> Self {
        Self {
            kind: PduType::Get,
            request_id,
            error_status: 0,
            error_index: 0,
            bindings: oids.into_iter().map(VarBind::null).collect(),
        }
    }

    /// GetBulk with no non-repeaters.
    pub fn get_bulk(request_id: i32, oid: Oid, max_repetitions: u32) -> Self {
        Self {
            kind: PduType::GetBulk,
            request_id,
            error_status: 0,
            error_index: i32::try_from(max_repetitions).unwrap_or(i32::MAX),
            bindings: vec![VarBind::null(oid)],
        }
    }

    pub fn response(request_id: i32, bindings: Vec<VarBind>) -> Self {
        Self {
            kind: PduType::Response,
            request_id,
            error_status: 0,
            error_index: 0,
            bindings,
        }
    }

    /// Response reporting `status` at 1-based binding `index`.
    pub fn error(request_id: i32, status: i32, index: i32) -> Self {
        Self {
            error_status: status,
            error_index: index,
            ..Self::response(request_id, Vec::new())
        }
    }
}

/// A complete v2c message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub community: Bytes,
    pub pdu: Pdu,
}

impl Message {
    pub fn new(community: &str, pdu: Pdu) -> Self {
        Self {
            community: Bytes::copy_from_slice(community.as_bytes()),
            pdu,
        }
    }

    pub fn encode(&self) -> Bytes {
        let mut buf = BytesMut::new();
        ber::put_constructed(&mut buf, ber::SEQUENCE, |message| {
            ber::put_integer(message, ber::INTEGER, VERSION_2C);
            ber::put_tlv(message, ber::OCTET_STRING, &self.community);
            ber::put_constructed(message, self.pdu.kind.tag(), |pdu| {
                ber::put_integer(pdu, ber::INTEGER, i64::from(self.pdu.request_id));
                ber::put_integer(pdu, ber::INTEGER, i64::from(self.pdu.error_status));
                ber::put_integer(pdu, ber::INTEGER, i64::from(self.pdu.error_index));
                ber::put_constructed(pdu, ber::SEQUENCE, |list| {
                    for binding in &self.pdu.bindings {
                        ber::put_constructed(list, ber::SEQUENCE, |pair| {
                            let mut name = BytesMut::new();
                            binding.oid.encode_content(&mut name);
                            ber::put_tlv(pair, ber::OBJECT_IDENTIFIER, &name);
                            binding.value.encode(pair);
                        });
                    }
                });
            });
        });
        buf.freeze()
    }

    pub fn decode(payload: &[u8]) -> Result<Self, ProtocolError> {
        let (community, kind, mut pdu) = open(payload)?;
        let request_id = read_i32(&mut pdu)?;
        let error_status = read_i32(&mut pdu)?;
        let error_index = read_i32(&mut pdu)?;

        let mut list = pdu.enter(ber::SEQUENCE)?;
        let mut bindings = Vec::new();
        while !list.is_empty() {
            let mut pair = list.enter(ber::SEQUENCE)?;
            let oid = Oid::decode_content(pair.expect(ber::OBJECT_IDENTIFIER)?)?;
            let (tag, content) = pair.read_tlv()?;
            bindings.push(VarBind::new(oid, SnmpValue::decode(tag, content)?));
        }

        Ok(Self {
            community: Bytes::copy_from_slice(community),
            pdu: Pdu {
                kind,
                request_id,
                error_status,
                error_index,
                bindings,
            },
        })
    }

    /// Read just far enough to find the PDU type and request-id.
    pub fn peek_request_id(payload: &[u8]) -> Result<(PduType, i32), ProtocolError> {
        let (_, kind, mut pdu) = open(payload)?;
        Ok((kind, read_i32(&mut pdu)?))
    }
}

/// Walk the envelope: returns community, PDU type and a reader on the PDU
/// content.
fn open(payload: &[u8]) -> Result<(&[u8], PduType, BerReader<'_>), ProtocolError> {
    let mut message = BerReader::new(payload).enter(ber::SEQUENCE)?;
    let version = message.read_integer()?;
    if version != VERSION_2C {
        return Err(ProtocolError::Malformed(format!(
            "SNMP version {} is not v2c",
            version
        )));
    }
    let community = message.read_octets()?;
    let (tag, content) = message.read_tlv()?;
    let kind = PduType::from_tag(tag).ok_or(ProtocolError::UnexpectedType {
        expected: PduType::Response.tag(),
        actual: tag,
    })?;
    Ok((community, kind, BerReader::new(content)))
}

fn read_i32(reader: &mut BerReader<'_>) -> Result<i32, ProtocolError> {
    let value = reader.read_integer()?;
    i32::try_from(value).map_err(|_| ProtocolError::Malformed(format!("{} exceeds 32 bits", value)))
}
