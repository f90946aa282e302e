//! Bit-level field accessors
//!
//! Every metadata field of an RX buffer frame fits inside a single byte, so
//! extraction is a shift and a mask. Multi-byte fields are assembled by the
//! decoder from several single-byte reads.

/// Extract `width` bits starting at bit `bit_start` (LSB first) of the byte at
/// `byte_offset`.
///
/// Never panics: an offset past the end of `bytes`, a zero width or a start
/// bit outside the byte yields 0, and the width is clipped to the byte.
pub fn take_bits(bytes: &[u8], byte_offset: usize, bit_start: u8, width: u8) -> u32 {
    let Some(&byte) = bytes.get(byte_offset) else {
        return 0;
    };
    if width == 0 || bit_start >= 8 {
        return 0;
    }

    let width = width.min(8 - bit_start);
    let mask = (1u32 << width) - 1;
    ((byte as u32) >> bit_start) & mask
}

/// Read a whole byte, or 0 past the end of `bytes`
pub fn take_byte(bytes: &[u8], byte_offset: usize) -> u8 {
    take_bits(bytes, byte_offset, 0, 8) as u8
}

/// Read a single flag bit
pub fn take_flag(bytes: &[u8], byte_offset: usize, bit: u8) -> bool {
    take_bits(bytes, byte_offset, bit, 1) != 0
}

/// Sign-extend the low `bit_length` bits of `value` (two's complement)
///
/// Values with the top bit set map to `value - 2^bit_length`; other values
/// are returned unchanged. Bits above `bit_length` are ignored.
pub fn sign_extend(value: u32, bit_length: u32) -> i32 {
    if bit_length == 0 {
        return 0;
    }
    if bit_length >= 32 {
        return value as i32;
    }

    let value = value & ((1u32 << bit_length) - 1);
    if value >= 1u32 << (bit_length - 1) {
        (value as i64 - (1i64 << bit_length)) as i32
    } else {
        value as i32
    }
}
