use log::trace;

use crate::{
    Error, Result,
    buffer::BufferedWrite,
};

use super::{CHECKSUM_SIZE, CompressionMethod, HEADER_SIZE, city::checksum_bytes};

/// Builds one complete frame (checksum, header and payload) for `plain`.
pub fn encode_frame(method: CompressionMethod, plain: &[u8]) -> Result<Vec<u8>> {
    let payload = match method {
        CompressionMethod::Lz4 => lz4_flex::block::compress(plain),
        CompressionMethod::None => plain.to_vec(),
    };
    let compressed_size = u32::try_from(HEADER_SIZE + payload.len())
        .map_err(|_| Error::Compression(format!("frame of {} bytes too large", payload.len())))?;
    let decompressed_size = u32::try_from(plain.len())
        .map_err(|_| Error::Compression(format!("frame of {} bytes too large", plain.len())))?;

    let mut frame = Vec::with_capacity(CHECKSUM_SIZE + HEADER_SIZE + payload.len());
    frame.extend_from_slice(&[0; CHECKSUM_SIZE]);
    frame.push(method.byte());
    frame.extend_from_slice(&compressed_size.to_le_bytes());
    frame.extend_from_slice(&decompressed_size.to_le_bytes());
    frame.extend_from_slice(&payload);

    let checksum = checksum_bytes(&frame[CHECKSUM_SIZE..]);
    frame[..CHECKSUM_SIZE].copy_from_slice(&checksum);
    Ok(frame)
}

/// Collects plaintext up to `capacity` bytes and emits it as a single frame on flush.
pub struct CompressedWriter<W: BufferedWrite> {
    inner: W,
    plain: Vec<u8>,
    capacity: usize,
    method: CompressionMethod,
}

impl<W: BufferedWrite> CompressedWriter<W> {
    pub fn new(inner: W, capacity: usize, method: CompressionMethod) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner,
            plain: Vec::with_capacity(capacity),
            capacity,
            method,
        }
    }

    /// The raw transport underneath, for writes that must bypass compression.
    pub fn get_mut(&mut self) -> &mut W {
        &mut self.inner
    }

    pub fn get_ref(&self) -> &W {
        &self.inner
    }

    /// Unwraps the transport. Plaintext not yet flushed is discarded.
    pub fn into_inner(self) -> W {
        self.inner
    }

    pub fn pending(&self) -> usize {
        self.plain.len()
    }

    fn flush_frame(&mut self) -> Result<()> {
        if self.plain.is_empty() {
            return Ok(());
        }
        let frame = encode_frame(self.method, &self.plain)?;
        trace!(
            "writing {} frame: {} -> {} bytes",
            self.method,
            self.plain.len(),
            frame.len()
        );
        self.inner.write_bytes_now(&frame)?;
        self.plain.clear();
        Ok(())
    }
}

impl<W: BufferedWrite> BufferedWrite for CompressedWriter<W> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.plain.len() == self.capacity {
            self.flush_frame()?;
        }
        self.plain.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.capacity - self.plain.len();
            if room == 0 {
                self.flush_frame()?;
                continue;
            }
            let n = room.min(bytes.len());
            self.plain.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn write_bytes_now(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)?;
        self.flush_frame()
    }

    fn flush(&mut self, force: bool) -> Result<()> {
        if force || self.plain.len() == self.capacity {
            self.flush_frame()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::BufferedWriter;

    use super::*;

    #[test]
    fn frame_header_layout() {
        let plain = b"hello hello hello hello";
        let frame = encode_frame(CompressionMethod::Lz4, plain).unwrap();

        assert_eq!(frame[16], 0x82);
        let compressed = u32::from_le_bytes(frame[17..21].try_into().unwrap()) as usize;
        let decompressed = u32::from_le_bytes(frame[21..25].try_into().unwrap()) as usize;
        assert_eq!(compressed, frame.len() - 16);
        assert_eq!(decompressed, plain.len());
        assert_eq!(&frame[..16], &checksum_bytes(&frame[16..]));
    }

    #[test]
    fn none_method_keeps_payload() {
        let frame = encode_frame(CompressionMethod::None, b"abc").unwrap();
        assert_eq!(frame[16], 0x02);
        assert_eq!(&frame[25..], b"abc");
    }

    #[test]
    fn one_frame_per_flush() {
        let sink = BufferedWriter::new(Vec::new(), 1024);
        let mut writer = CompressedWriter::new(sink, 1024, CompressionMethod::None);

        writer.write_bytes(b"abc").unwrap();
        writer.flush(true).unwrap();
        writer.flush(true).unwrap();
        writer.write_bytes(b"de").unwrap();
        writer.flush(true).unwrap();

        let written = writer.get_ref().get_ref();
        assert_eq!(written.len(), (25 + 3) + (25 + 2));
    }

    #[test]
    fn full_buffer_emits_frame() {
        let sink = BufferedWriter::new(Vec::new(), 1024);
        let mut writer = CompressedWriter::new(sink, 4, CompressionMethod::None);
        writer.write_bytes(&[1, 2, 3, 4, 5]).unwrap();

        assert_eq!(writer.get_ref().get_ref().len(), 25 + 4);
        assert_eq!(writer.pending(), 1);
    }
}
