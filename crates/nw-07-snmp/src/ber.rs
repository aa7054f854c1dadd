//! Basic Encoding Rules, restricted to what SNMPv2c uses.

use bytes::{BufMut, BytesMut};
use shared_types::ProtocolError;

pub const INTEGER: u8 = 0x02;
pub const OCTET_STRING: u8 = 0x04;
pub const NULL: u8 = 0x05;
pub const OBJECT_IDENTIFIER: u8 = 0x06;
pub const SEQUENCE: u8 = 0x30;

pub const IP_ADDRESS: u8 = 0x40;
pub const COUNTER32: u8 = 0x41;
pub const GAUGE32: u8 = 0x42;
pub const TIMETICKS: u8 = 0x43;
pub const OPAQUE: u8 = 0x44;
pub const COUNTER64: u8 = 0x46;

pub const NO_SUCH_OBJECT: u8 = 0x80;
pub const NO_SUCH_INSTANCE: u8 = 0x81;
pub const END_OF_MIB_VIEW: u8 = 0x82;

// ============================================================================
// Writing
// ============================================================================

/// Append a definite-length header.
pub fn put_length(buf: &mut BytesMut, len: usize) {
    if len < 0x80 {
        buf.put_u8(len as u8);
        return;
    }
    let bytes = (len as u64).to_be_bytes();
    let skip = bytes.iter().take_while(|b| **b == 0).count();
    buf.put_u8(0x80 | (bytes.len() - skip) as u8);
    buf.put_slice(&bytes[skip..]);
}

/// Append a complete tag-length-value.
pub fn put_tlv(buf: &mut BytesMut, tag: u8, content: &[u8]) {
    buf.put_u8(tag);
    put_length(buf, content.len());
    buf.put_slice(content);
}

/// Append a constructed value whose content is written by `write`.
pub fn put_constructed<F>(buf: &mut BytesMut, tag: u8, write: F)
where
    F: FnOnce(&mut BytesMut),
{
    let mut content = BytesMut::new();
    write(&mut content);
    put_tlv(buf, tag, &content);
}

/// Two's-complement INTEGER (or another signed tag) in minimal form.
pub fn put_integer(buf: &mut BytesMut, tag: u8, value: i64) {
    let bytes = value.to_be_bytes();
    let mut start = 0;
    while start < bytes.len() - 1 {
        let redundant = (bytes[start] == 0x00 && bytes[start + 1] & 0x80 == 0)
            || (bytes[start] == 0xFF && bytes[start + 1] & 0x80 != 0);
        if !redundant {
            break;
        }
        start += 1;
    }
    put_tlv(buf, tag, &bytes[start..]);
}

/// Unsigned application integer (Counter32, Gauge32, TimeTicks, Counter64).
pub fn put_unsigned(buf: &mut BytesMut, tag: u8, value: u64) {
    let bytes = value.to_be_bytes();
    let skip = bytes[..7].iter().take_while(|b| **b == 0).count();
    let significant = &bytes[skip..];
    if significant[0] & 0x80 != 0 {
        let mut padded = Vec::with_capacity(significant.len() + 1);
        padded.push(0);
        padded.extend_from_slice(significant);
        put_tlv(buf, tag, &padded);
    } else {
        put_tlv(buf, tag, significant);
    }
}

// ============================================================================
// Reading
// ============================================================================

/// Cursor over BER-encoded bytes.
#[derive(Debug, Clone)]
pub struct BerReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> BerReader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    pub fn is_empty(&self) -> bool {
        self.pos >= self.data.len()
    }

    pub fn peek_tag(&self) -> Option<u8> {
        self.data.get(self.pos).copied()
    }

    fn byte(&mut self) -> Result<u8, ProtocolError> {
        let byte = *self.data.get(self.pos).ok_or(ProtocolError::Truncated {
            expected: self.pos + 1,
            actual: self.data.len(),
        })?;
        self.pos += 1;
        Ok(byte)
    }

    fn length(&mut self) -> Result<usize, ProtocolError> {
        let first = self.byte()?;
        if first & 0x80 == 0 {
            return Ok(usize::from(first));
        }
        let count = usize::from(first & 0x7F);
        if count == 0 || count > 4 {
            return Err(ProtocolError::Malformed(format!(
                "unsupported BER length form {:#04x}",
                first
            )));
        }
        let mut len = 0usize;
        for _ in 0..count {
            len = (len << 8) | usize::from(self.byte()?);
        }
        Ok(len)
    }

    /// Read any TLV, returning its tag and content.
    pub fn read_tlv(&mut self) -> Result<(u8, &'a [u8]), ProtocolError> {
        let tag = self.byte()?;
        let len = self.length()?;
        let end = self.pos + len;
        if end > self.data.len() {
            return Err(ProtocolError::Truncated {
                expected: end,
                actual: self.data.len(),
            });
        }
        let content = &self.data[self.pos..end];
        self.pos = end;
        Ok((tag, content))
    }

    /// Read a TLV that must carry `tag`.
    pub fn expect(&mut self, tag: u8) -> Result<&'a [u8], ProtocolError> {
        let (actual, content) = self.read_tlv()?;
        if actual != tag {
            return Err(ProtocolError::UnexpectedType {
                expected: tag,
                actual,
            });
        }
        Ok(content)
    }

    /// Enter a constructed value that must carry `tag`.
    pub fn enter(&mut self, tag: u8) -> Result<BerReader<'a>, ProtocolError> {
        self.expect(tag).map(BerReader::new)
    }

    pub fn read_integer(&mut self) -> Result<i64, ProtocolError> {
        decode_integer(self.expect(INTEGER)?)
    }

    pub fn read_octets(&mut self) -> Result<&'a [u8], ProtocolError> {
        self.expect(OCTET_STRING)
    }
}

/// Decode two's-complement content.
pub fn decode_integer(content: &[u8]) -> Result<i64, ProtocolError> {
    if content.is_empty() || content.len() > 8 {
        return Err(ProtocolError::Malformed(format!(
            "integer of {} bytes",
            content.len()
        )));
    }
    let negative = content[0] & 0x80 != 0;
    let mut value: i64 = if negative { -1 } else { 0 };
    for byte in content {
        value = (value << 8) | i64::from(*byte);
    }
    Ok(value)
}

/// Decode unsigned content, allowing one leading zero pad byte.
pub fn decode_unsigned(content: &[u8]) -> Result<u64, ProtocolError> {
    let content = match content {
        [0, rest @ ..] if !rest.is_empty() => rest,
        other => other,
    };
    if content.is_empty() || content.len() > 8 {
        return Err(ProtocolError::Malformed(format!(
            "unsigned integer of {} bytes",
            content.len()
        )));
    }
    Ok(content
        .iter()
        .fold(0u64, |value, byte| (value << 8) | u64::from(*byte)))
}
