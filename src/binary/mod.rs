//! Typed wire primitives.
//!
//! - Varints are LEB128 style: 7 data bits per byte, the high bit marks a
//!   continuation, groups are little-endian, and at most 9 bytes are used.
//! - Fixed-width integers and floats are little-endian.
//! - Strings are a varint byte length followed by the raw UTF-8 bytes.
//! - Booleans are a varint 0 or 1.
//!
//! [`BinarySerializer`] and [`BinaryDeserializer`] own a compression codec
//! and decide per call whether a primitive goes through it. Packet tags and
//! other protocol framing always travel raw; block payloads travel inside a
//! compressed region opened with `enter_compressed`/`exit_compressed` (or the
//! `compressed` closure helper, which keeps the pair balanced).
mod deserializer;
mod serializer;

pub use deserializer::BinaryDeserializer;
pub use serializer::BinarySerializer;

pub const MAX_VARINT_LEN: usize = 9;

/// Encodes `value` into `out`, returning the number of bytes used.
pub fn encode_varint(mut value: u64, out: &mut [u8; MAX_VARINT_LEN]) -> usize {
    for (i, slot) in out.iter_mut().enumerate() {
        let mut byte = (value & 0x7f) as u8;
        value >>= 7;
        if value != 0 && i + 1 < MAX_VARINT_LEN {
            byte |= 0x80;
        }
        *slot = byte;
        if byte & 0x80 == 0 {
            return i + 1;
        }
    }
    MAX_VARINT_LEN
}
