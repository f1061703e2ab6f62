//! Checksummed compression framing.
//!
//! When compression is negotiated, block payloads travel as a sequence of
//! independent frames:
//!
//! ```text
//! | checksum (16) | method (1) | compressed size (4) | decompressed size (4) | payload |
//! ```
//!
//! - The checksum is CityHash128 v1.0.2 over everything after it (the 9-byte
//!   header plus payload), written as two little-endian 64-bit halves.
//! - The compressed size counts the 9-byte header.
//! - Frames never share dictionaries; each flush of the writer yields exactly one.
//!
//! [`CompressedWriter`] and [`CompressedReader`] expose the same buffered
//! surface as the plain transports they wrap, so the binary primitives can be
//! pointed at either one.
pub mod city;
mod reader;
mod writer;

use std::{fmt, str::FromStr};

pub use reader::CompressedReader;
pub use writer::{CompressedWriter, encode_frame};

use crate::{Error, Result};

pub const CHECKSUM_SIZE: usize = 16;
pub const HEADER_SIZE: usize = 9;

pub const METHOD_LZ4: u8 = 0x82;
pub const METHOD_NONE: u8 = 0x02;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionMethod {
    #[default]
    Lz4,
    None,
}

impl CompressionMethod {
    pub fn byte(self) -> u8 {
        match self {
            CompressionMethod::Lz4 => METHOD_LZ4,
            CompressionMethod::None => METHOD_NONE,
        }
    }

    pub fn from_byte(byte: u8) -> Result<Self> {
        match byte {
            METHOD_LZ4 => Ok(CompressionMethod::Lz4),
            METHOD_NONE => Ok(CompressionMethod::None),
            other => Err(Error::UnsupportedCompressionMethod(other)),
        }
    }
}

impl FromStr for CompressionMethod {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "lz4" => Ok(CompressionMethod::Lz4),
            "none" => Ok(CompressionMethod::None),
            other => Err(Error::Config(format!("unknown compression method '{other}'"))),
        }
    }
}

impl fmt::Display for CompressionMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionMethod::Lz4 => write!(f, "lz4"),
            CompressionMethod::None => write!(f, "none"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_bytes() {
        assert_eq!(CompressionMethod::from_byte(0x82).unwrap(), CompressionMethod::Lz4);
        assert_eq!(CompressionMethod::from_byte(0x02).unwrap(), CompressionMethod::None);
        assert!(matches!(
            CompressionMethod::from_byte(0x7f),
            Err(Error::UnsupportedCompressionMethod(0x7f))
        ));
    }

    #[test]
    fn method_from_config_string() {
        assert_eq!("LZ4".parse::<CompressionMethod>().unwrap(), CompressionMethod::Lz4);
        assert!("zstd".parse::<CompressionMethod>().is_err());
    }
}
