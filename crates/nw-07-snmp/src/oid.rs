//! Object identifiers.

use std::fmt;
use std::str::FromStr;

use bytes::{BufMut, BytesMut};
use shared_types::ProtocolError;

/// A dotted object identifier such as `1.3.6.1.2.1.1.1.0`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Oid(Vec<u32>);

impl Oid {
    /// At least two arcs; the first is 0, 1 or 2, and the second below 40
    /// unless the first is 2.
    pub fn new(arcs: Vec<u32>) -> Result<Self, ProtocolError> {
        match arcs.as_slice() {
            [first, second, ..] if *first < 2 && *second < 40 => Ok(Self(arcs)),
            [2, _, ..] => Ok(Self(arcs)),
            _ => Err(ProtocolError::Malformed(format!(
                "invalid OID arcs {:?}",
                arcs
            ))),
        }
    }

    pub fn arcs(&self) -> &[u32] {
        &self.0
    }

    /// `true` if `self` lies in the subtree rooted at `prefix` (inclusive).
    pub fn starts_with(&self, prefix: &Oid) -> bool {
        self.0.starts_with(&prefix.0)
    }

    /// A child OID with `arc` appended.
    pub fn child(&self, arc: u32) -> Oid {
        let mut arcs = self.0.clone();
        arcs.push(arc);
        Oid(arcs)
    }

    /// BER content octets (without tag and length).
    pub fn encode_content(&self, buf: &mut BytesMut) {
        put_base128(buf, u64::from(self.0[0]) * 40 + u64::from(self.0[1]));
        for arc in &self.0[2..] {
            put_base128(buf, u64::from(*arc));
        }
    }

    /// Parse BER content octets.
    pub fn decode_content(content: &[u8]) -> Result<Self, ProtocolError> {
        if content.is_empty() {
            return Err(ProtocolError::Malformed("empty OID".into()));
        }
        let mut values = Vec::new();
        let mut current: u64 = 0;
        for (i, byte) in content.iter().enumerate() {
            current = (current << 7) | u64::from(byte & 0x7F);
            if current > u64::from(u32::MAX) * 40 {
                return Err(ProtocolError::Malformed("OID arc overflow".into()));
            }
            if byte & 0x80 == 0 {
                values.push(current);
                current = 0;
            } else if i == content.len() - 1 {
                return Err(ProtocolError::Truncated {
                    expected: content.len() + 1,
                    actual: content.len(),
                });
            }
        }

        let first = values[0];
        let (a, b) = match first {
            0..=39 => (0, first),
            40..=79 => (1, first - 40),
            _ => (2, first - 80),
        };
        let mut arcs = Vec::with_capacity(values.len() + 1);
        arcs.push(a as u32);
        arcs.push(arc(b)?);
        for value in &values[1..] {
            arcs.push(arc(*value)?);
        }
        Ok(Self(arcs))
    }
}

fn arc(value: u64) -> Result<u32, ProtocolError> {
    u32::try_from(value)
        .map_err(|_| ProtocolError::Malformed(format!("OID arc {} too large", value)))
}

fn put_base128(buf: &mut BytesMut, value: u64) {
    let mut groups = [0u8; 10];
    let mut count = 0;
    let mut rest = value;
    loop {
        groups[count] = (rest & 0x7F) as u8;
        count += 1;
        rest >>= 7;
        if rest == 0 {
            break;
        }
    }
    for i in (0..count).rev() {
        let more = if i > 0 { 0x80 } else { 0 };
        buf.put_u8(groups[i] | more);
    }
}

impl FromStr for Oid {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.strip_prefix('.').unwrap_or(s);
        let arcs = trimmed
            .split('.')
            .map(|part| {
                part.parse::<u32>()
                    .map_err(|_| ProtocolError::Malformed(format!("invalid OID {:?}", s)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Self::new(arcs)
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut arcs = self.0.iter();
        if let Some(first) = arcs.next() {
            write!(f, "{}", first)?;
        }
        for arc in arcs {
            write!(f, ".{}", arc)?;
        }
        Ok(())
    }
}
