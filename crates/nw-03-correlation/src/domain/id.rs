//! Correlation ids and their allocation.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Width of a protocol's correlation field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IdSpace {
    bits: u8,
}

impl IdSpace {
    /// DNS transaction id.
    pub const DNS: Self = Self::bits(16);
    /// ICMP echo identifier (high 16 bits) and sequence (low 16 bits).
    pub const ICMP: Self = Self::bits(32);
    /// SNMP request-id.
    pub const SNMP: Self = Self::bits(32);

    /// An id space of `bits` width, clamped to `1..=64`.
    pub const fn bits(bits: u8) -> Self {
        let bits = if bits == 0 {
            1
        } else if bits > 64 {
            64
        } else {
            bits
        };
        Self { bits }
    }

    pub const fn width(&self) -> u8 {
        self.bits
    }

    /// Largest representable id.
    pub const fn mask(&self) -> u64 {
        if self.bits == 64 {
            u64::MAX
        } else {
            (1u64 << self.bits) - 1
        }
    }

    pub const fn contains(&self, value: u64) -> bool {
        value & !self.mask() == 0
    }
}

/// Numeric token embedded in a request and echoed by its response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CorrelationId(u64);

impl CorrelationId {
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    pub const fn value(&self) -> u64 {
        self.0
    }

    /// Low 16 bits, as carried by a DNS header.
    pub const fn as_u16(&self) -> u16 {
        self.0 as u16
    }

    /// Low 32 bits, as carried by ICMP and SNMP.
    pub const fn as_u32(&self) -> u32 {
        self.0 as u32
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u16> for CorrelationId {
    fn from(value: u16) -> Self {
        Self(u64::from(value))
    }
}

impl From<u32> for CorrelationId {
    fn from(value: u32) -> Self {
        Self(u64::from(value))
    }
}

/// Lock-free monotonic id source, wrapping to zero at the id space width.
///
/// Allocation is synchronous so the caller learns the id before the request
/// reaches the connection's execution queue.
#[derive(Debug)]
pub struct CorrelationIdAllocator {
    space: IdSpace,
    next: AtomicU64,
}

impl CorrelationIdAllocator {
    pub fn new(space: IdSpace) -> Self {
        Self::starting_at(space, 0)
    }

    /// First allocation returns `start` (masked to the space).
    pub fn starting_at(space: IdSpace, start: u64) -> Self {
        Self {
            space,
            next: AtomicU64::new(start & space.mask()),
        }
    }

    pub fn space(&self) -> IdSpace {
        self.space
    }

    pub fn allocate(&self) -> CorrelationId {
        let raw = self.next.fetch_add(1, Ordering::Relaxed);
        CorrelationId(raw & self.space.mask())
    }
}
