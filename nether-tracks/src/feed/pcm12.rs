//! Packed 12-bit sample expansion
//!
//! Three stored bytes hold two 12-bit samples. Each expands to a signed
//! 16-bit sample written big-endian:
//!
//! ```text
//! b0 b1 b2  ->  s0 = ((b1 & 0x0f) << 8 | b0) << 4 - 0x8000
//!               s1 = ((b1 & 0xf0) << 4 | b2) << 4 - 0x8000
//! ```
//!
//! Cursors advance in decoded bytes: 3 packed bytes become 4 decoded bytes.

/// Packed bytes per group
pub const PACKED_GROUP: usize = 3;

/// Decoded bytes per group
pub const DECODED_GROUP: usize = 4;

/// Expand packed 12-bit data; a trailing partial group is ignored
pub fn decode_12bit(packed: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(packed.len() / PACKED_GROUP * DECODED_GROUP);
    for group in packed.chunks_exact(PACKED_GROUP) {
        let (b0, b1, b2) = (group[0] as u16, group[1] as u16, group[2] as u16);
        let s0 = ((((b1 & 0x0f) << 8) | b0) << 4).wrapping_sub(0x8000);
        let s1 = ((((b1 & 0xf0) << 4) | b2) << 4).wrapping_sub(0x8000);
        out.extend_from_slice(&s0.to_be_bytes());
        out.extend_from_slice(&s1.to_be_bytes());
    }
    out
}

/// Decoded length of `packed_len` stored bytes
pub fn decoded_len(packed_len: usize) -> usize {
    packed_len / PACKED_GROUP * DECODED_GROUP
}

/// Stored offset of a decoded-byte cursor
pub fn packed_offset(decoded_offset: usize) -> usize {
    decoded_offset / DECODED_GROUP * PACKED_GROUP
}
