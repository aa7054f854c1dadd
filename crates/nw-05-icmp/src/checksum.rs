//! RFC 1071 Internet checksum.

/// One's-complement sum of 16-bit big-endian words, folded and complemented.
///
/// An odd trailing byte is padded with zero. Summing a packet whose checksum
/// field already holds this value yields zero.
pub fn internet_checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut words = data.chunks_exact(2);
    for word in &mut words {
        sum += u32::from(u16::from_be_bytes([word[0], word[1]]));
    }
    if let [last] = words.remainder() {
        sum += u32::from(*last) << 8;
    }
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }
    !(sum as u16)
}

/// `true` when `data` (checksum field included) sums to zero.
pub fn verify(data: &[u8]) -> bool {
    internet_checksum(data) == 0
}
