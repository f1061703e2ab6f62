use crate::{
    Error, Result,
    buffer::{BufferedWrite, DEFAULT_BUFFER_SIZE},
    compress::{CompressedWriter, CompressionMethod},
};

use super::{MAX_VARINT_LEN, encode_varint};

pub struct BinarySerializer<W: BufferedWrite> {
    codec: CompressedWriter<W>,
    compression: bool,
    in_compressed: bool,
}

impl<W: BufferedWrite> BinarySerializer<W> {
    /// `compression` is the negotiated frame method, or `None` to always write raw.
    pub fn new(inner: W, compression: Option<CompressionMethod>) -> Self {
        Self::with_frame_capacity(inner, compression, DEFAULT_BUFFER_SIZE)
    }

    pub fn with_frame_capacity(
        inner: W,
        compression: Option<CompressionMethod>,
        capacity: usize,
    ) -> Self {
        Self {
            codec: CompressedWriter::new(inner, capacity, compression.unwrap_or_default()),
            compression: compression.is_some(),
            in_compressed: false,
        }
    }

    pub fn get_ref(&self) -> &W {
        self.codec.get_ref()
    }

    pub fn get_mut(&mut self) -> &mut W {
        self.codec.get_mut()
    }

    pub fn into_inner(self) -> W {
        let Self { codec, .. } = self;
        codec.into_inner()
    }

    pub fn is_compressed(&self) -> bool {
        self.compression && self.in_compressed
    }

    pub fn enter_compressed(&mut self) -> Result<()> {
        if self.in_compressed {
            return Err(Error::violation(
                "raw write region",
                "compressed region already open",
            ));
        }
        self.in_compressed = true;
        Ok(())
    }

    /// Closes the compressed region, forcing out the frame in progress.
    pub fn exit_compressed(&mut self) -> Result<()> {
        if !self.in_compressed {
            return Err(Error::violation(
                "open compressed region",
                "no compressed region to close",
            ));
        }
        self.in_compressed = false;
        if self.compression {
            self.codec.flush(true)?;
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

    fn target(&mut self) -> &mut dyn BufferedWrite {
        if self.compression && self.in_compressed {
            &mut self.codec
        } else {
            self.codec.get_mut()
        }
    }

    /// Flushes the active view and the raw transport beneath it.
    pub fn flush_to_target(&mut self, force: bool) -> Result<()> {
        if self.compression && self.in_compressed {
            self.codec.flush(force)?;
        }
        self.codec.get_mut().flush(force)
    }

    pub fn write_varint(&mut self, value: u64) -> Result<()> {
        let mut buf = [0u8; MAX_VARINT_LEN];
        let len = encode_varint(value, &mut buf);
        self.target().write_bytes(&buf[..len])
    }

    pub fn write_bool(&mut self, value: bool) -> Result<()> {
        self.write_varint(value as u64)
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.target().write_byte(value)
    }

    pub fn write_i8(&mut self, value: i8) -> Result<()> {
        self.target().write_byte(value as u8)
    }

    pub fn write_u16(&mut self, value: u16) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_i16(&mut self, value: i16) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_u32(&mut self, value: u32) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_i32(&mut self, value: i32) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_u64(&mut self, value: u64) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_i64(&mut self, value: i64) -> Result<()> {
        self.target().write_bytes(&value.to_le_bytes())
    }

    pub fn write_f32(&mut self, value: f32) -> Result<()> {
        self.write_u32(value.to_bits())
    }

    pub fn write_f64(&mut self, value: f64) -> Result<()> {
        self.write_u64(value.to_bits())
    }

    pub fn write_str(&mut self, value: &str) -> Result<()> {
        self.write_varint(value.len() as u64)?;
        self.target().write_bytes(value.as_bytes())
    }

    pub fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.target().write_bytes(bytes)
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{BufferedReader, BufferedWriter, ByteArrayWriter};

    use super::*;
    use crate::binary::BinaryDeserializer;

    #[test]
    fn fixed_width_little_endian() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        ser.write_u16(0x0102).unwrap();
        ser.write_i32(-2).unwrap();
        ser.write_f64(1.5).unwrap();
        let bytes = ser.into_inner().into_bytes();

        assert_eq!(&bytes[..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..6], &[0xfe, 0xff, 0xff, 0xff]);
        assert_eq!(&bytes[6..], &1.5f64.to_bits().to_le_bytes());
    }

    #[test]
    fn switch_is_noop_without_compression() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        ser.compressed(|s| s.write_u8(7)).unwrap();
        assert_eq!(ser.into_inner().into_bytes(), vec![7]);
    }

    #[test]
    fn compressed_region_is_framed() {
        let sink = BufferedWriter::new(Vec::new(), 1024);
        let mut ser = BinarySerializer::new(sink, Some(CompressionMethod::Lz4));

        ser.write_varint(2).unwrap();
        ser.compressed(|s| {
            s.write_str("payload")?;
            s.write_u64(42)
        })
        .unwrap();
        ser.write_varint(4).unwrap();
        ser.flush_to_target(true).unwrap();

        let bytes = ser.into_inner().get_ref().clone();
        assert_eq!(bytes[0], 2);
        assert_eq!(bytes[1 + 16], 0x82);
        assert_eq!(*bytes.last().unwrap(), 4);

        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 32), true);
        assert_eq!(de.read_varint().unwrap(), 2);
        de.enter_compressed().unwrap();
        assert_eq!(de.read_str().unwrap(), "payload");
        assert_eq!(de.read_u64().unwrap(), 42);
        de.exit_compressed().unwrap();
        assert_eq!(de.read_varint().unwrap(), 4);
    }

    #[test]
    fn unbalanced_switch_is_rejected() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        assert!(ser.exit_compressed().is_err());
        ser.enter_compressed().unwrap();
        assert!(ser.enter_compressed().is_err());
    }
}
