//! DNS header, question and address records.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use bytes::{BufMut, Bytes, BytesMut};
use shared_types::ProtocolError;

pub const HEADER_LEN: usize = 12;
/// Recursion desired.
pub const FLAGS_QUERY: u16 = 0x0100;
const FLAG_RESPONSE: u16 = 0x8000;
const CLASS_IN: u16 = 1;

const MAX_LABEL: usize = 63;
const MAX_NAME: usize = 253;
const POINTER_MASK: u8 = 0xC0;
/// A 255-byte wire name holds at most 127 one-byte labels.
const MAX_LABELS: usize = 127;

/// Address record types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordType {
    A,
    Aaaa,
}

impl RecordType {
    pub const fn code(self) -> u16 {
        match self {
            Self::A => 1,
            Self::Aaaa => 28,
        }
    }

    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            1 => Some(Self::A),
            28 => Some(Self::Aaaa),
            _ => None,
        }
    }

    /// Record type matching an address family.
    pub fn for_addr(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Self::A,
            IpAddr::V6(_) => Self::Aaaa,
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::A => f.write_str("A"),
            Self::Aaaa => f.write_str("AAAA"),
        }
    }
}

/// One question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsQuery {
    pub name: String,
    pub record_type: RecordType,
}

impl DnsQuery {
    pub fn new(name: impl Into<String>, record_type: RecordType) -> Self {
        Self {
            name: name.into(),
            record_type,
        }
    }

    /// Header with `id`, RD set, one question, class IN.
    pub fn encode(&self, id: u16) -> Result<Bytes, ProtocolError> {
        let mut buf = BytesMut::with_capacity(HEADER_LEN + self.name.len() + 6);
        buf.put_u16(id);
        buf.put_u16(FLAGS_QUERY);
        buf.put_u16(1); // QDCOUNT
        buf.put_u16(0);
        buf.put_u16(0);
        buf.put_u16(0);
        encode_name(&self.name, &mut buf)?;
        buf.put_u16(self.record_type.code());
        buf.put_u16(CLASS_IN);
        Ok(buf.freeze())
    }
}

/// Write `name` as length-prefixed labels ending with the root label.
pub fn encode_name(name: &str, buf: &mut BytesMut) -> Result<(), ProtocolError> {
    let name = name.strip_suffix('.').unwrap_or(name);
    if name.is_empty() {
        return Err(ProtocolError::InvalidName("empty name".into()));
    }
    if name.len() > MAX_NAME {
        return Err(ProtocolError::InvalidName(format!(
            "name is {} bytes, limit {}",
            name.len(),
            MAX_NAME
        )));
    }
    for label in name.split('.') {
        if label.is_empty() || label.len() > MAX_LABEL {
            return Err(ProtocolError::InvalidName(format!(
                "label {:?} must be 1 to {} bytes",
                label, MAX_LABEL
            )));
        }
        buf.put_u8(label.len() as u8);
        buf.put_slice(label.as_bytes());
    }
    buf.put_u8(0);
    Ok(())
}

/// A decoded response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsResponse {
    pub id: u16,
    pub rcode: u8,
    pub answer_count: u16,
    /// A and AAAA answers, in packet order.
    pub addresses: Vec<IpAddr>,
    /// The full datagram.
    pub packet: Bytes,
}

impl DnsResponse {
    /// Parse a response datagram. The QR bit must be set.
    pub fn parse(payload: &[u8]) -> Result<Self, ProtocolError> {
        let mut reader = Reader::new(payload);
        let id = reader.u16()?;
        let flags = reader.u16()?;
        if flags & FLAG_RESPONSE == 0 {
            return Err(ProtocolError::Malformed("QR bit not set".into()));
        }
        let question_count = reader.u16()?;
        let answer_count = reader.u16()?;
        reader.skip(4)?; // NSCOUNT, ARCOUNT

        for _ in 0..question_count {
            reader.skip_name()?;
            reader.skip(4)?;
        }

        let mut addresses = Vec::new();
        for _ in 0..answer_count {
            reader.skip_name()?;
            let record_type = reader.u16()?;
            reader.skip(6)?; // CLASS, TTL
            let length = usize::from(reader.u16()?);
            let data = reader.take(length)?;
            match (RecordType::from_code(record_type), data.len()) {
                (Some(RecordType::A), 4) => {
                    addresses.push(Ipv4Addr::new(data[0], data[1], data[2], data[3]).into());
                }
                (Some(RecordType::Aaaa), 16) => {
                    let mut octets = [0u8; 16];
                    octets.copy_from_slice(data);
                    addresses.push(Ipv6Addr::from(octets).into());
                }
                _ => {}
            }
        }

        Ok(Self {
            id,
            rcode: (flags & 0x000F) as u8,
            answer_count,
            addresses,
            packet: Bytes::copy_from_slice(payload),
        })
    }
}

/// Bounds-checked cursor over a datagram.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], ProtocolError> {
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(ProtocolError::Truncated {
                expected: end,
                actual: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn skip(&mut self, len: usize) -> Result<(), ProtocolError> {
        self.take(len).map(|_| ())
    }

    fn u8(&mut self) -> Result<u8, ProtocolError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, ProtocolError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    /// Skip a possibly compressed name. A pointer ends the name in place.
    fn skip_name(&mut self) -> Result<(), ProtocolError> {
        for _ in 0..=MAX_LABELS {
            let length = self.u8()?;
            if length == 0 {
                return Ok(());
            }
            if length & POINTER_MASK == POINTER_MASK {
                return self.skip(1);
            }
            if length & POINTER_MASK != 0 {
                return Err(ProtocolError::Malformed(format!(
                    "reserved label type {:#04x}",
                    length
                )));
            }
            self.skip(usize::from(length))?;
        }
        Err(ProtocolError::Malformed("name has too many labels".into()))
    }
}
