use log::trace;

use crate::{
    Error, Result,
    buffer::BufferedRead,
    compress::CompressedReader,
};

use super::MAX_VARINT_LEN;

pub struct BinaryDeserializer<R: BufferedRead> {
    codec: CompressedReader<R>,
    compression: bool,
    in_compressed: bool,
}

impl<R: BufferedRead> BinaryDeserializer<R> {
    /// With `compression` set, compressed regions are read as checksummed frames.
    pub fn new(inner: R, compression: bool) -> Self {
        Self {
            codec: CompressedReader::new(inner, true),
            compression,
            in_compressed: false,
        }
    }

    /// Turns frame checksum verification on or off. It is on by default.
    pub fn with_checksum_verification(self, verify: bool) -> Self {
        let Self {
            codec,
            compression,
            in_compressed,
        } = self;
        Self {
            codec: CompressedReader::new(codec.into_inner(), verify),
            compression,
            in_compressed,
        }
    }

    pub fn get_ref(&self) -> &R {
        self.codec.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut R {
        self.codec.get_mut()
    }

    pub fn is_compressed(&self) -> bool {
        self.compression && self.in_compressed
    }

    pub fn enter_compressed(&mut self) -> Result<()> {
        if self.in_compressed {
            return Err(Error::violation(
                "raw read region",
                "compressed region already open",
            ));
        }
        self.in_compressed = true;
        Ok(())
    }

    pub fn exit_compressed(&mut self) -> Result<()> {
        if !self.in_compressed {
            return Err(Error::violation(
                "open compressed region",
                "no compressed region to close",
            ));
        }
        self.in_compressed = false;
        if self.compression && self.codec.remaining() > 0 {
            trace!(
                "{} decompressed bytes left for the next compressed region",
                self.codec.remaining()
            );
        }
        Ok(())
    }

    /// Runs `f` inside a compressed region, closing it even when `f` fails.
    pub fn compressed<T>(&mut self, f: impl FnOnce(&mut Self) -> Result<T>) -> Result<T> {
        self.enter_compressed()?;
        let out = f(self);
        let exit = self.exit_compressed();
        let value = out?;
        exit?;
        Ok(value)
    }

    fn source(&mut self) -> &mut dyn BufferedRead {
        if self.compression && self.in_compressed {
            &mut self.codec
        } else {
            self.codec.get_mut()
        }
    }

    pub fn read_varint(&mut self) -> Result<u64> {
        let source = self.source();
        let mut value = 0u64;
        for i in 0..MAX_VARINT_LEN {
            let byte = source.read_byte()?;
            value |= ((byte & 0x7f) as u64) << (7 * i);
            if byte & 0x80 == 0 {
                break;
            }
        }
        Ok(value)
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_varint()? != 0)
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        self.source().read_byte()
    }

    pub fn read_i8(&mut self) -> Result<i8> {
        Ok(self.read_u8()? as i8)
    }

    fn read_array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut buf = [0u8; N];
        self.source().read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        Ok(u16::from_le_bytes(self.read_array()?))
    }

    pub fn read_i16(&mut self) -> Result<i16> {
        Ok(i16::from_le_bytes(self.read_array()?))
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        Ok(u32::from_le_bytes(self.read_array()?))
    }

    pub fn read_i32(&mut self) -> Result<i32> {
        Ok(i32::from_le_bytes(self.read_array()?))
    }

    pub fn read_u64(&mut self) -> Result<u64> {
        Ok(u64::from_le_bytes(self.read_array()?))
    }

    pub fn read_i64(&mut self) -> Result<i64> {
        Ok(i64::from_le_bytes(self.read_array()?))
    }

    pub fn read_f32(&mut self) -> Result<f32> {
        Ok(f32::from_bits(self.read_u32()?))
    }

    pub fn read_f64(&mut self) -> Result<f64> {
        Ok(f64::from_bits(self.read_u64()?))
    }

    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        self.source().read_bytes(count)
    }

    /// Varint-prefixed bytes, without any UTF-8 check.
    pub fn read_binary(&mut self) -> Result<Vec<u8>> {
        let len = self.read_varint()? as usize;
        if len == 0 {
            return Ok(Vec::new());
        }
        self.read_bytes(len)
    }

    pub fn read_str(&mut self) -> Result<String> {
        let bytes = self.read_binary()?;
        String::from_utf8(bytes).map_err(|e| Error::violation("UTF-8 string", e.to_string()))
    }
}
