use log::trace;

use crate::{
    Error, Result,
    buffer::BufferedRead,
};

use super::{CHECKSUM_SIZE, CompressionMethod, HEADER_SIZE, city::city_hash128};

/// Serves plaintext out of frames pulled one at a time from `inner`.
pub struct CompressedReader<R: BufferedRead> {
    inner: R,
    plain: Vec<u8>,
    pos: usize,
    verify_checksum: bool,
}

impl<R: BufferedRead> CompressedReader<R> {
    pub fn new(inner: R, verify_checksum: bool) -> Self {
        Self {
            inner,
            plain: Vec::new(),
            pos: 0,
            verify_checksum,
        }
    }

    /// The raw transport underneath, for reads that must bypass compression.
    pub fn get_mut(&mut self) -> &mut R {
        &mut self.inner
    }

    pub fn get_ref(&self) -> &R {
        &self.inner
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    /// Decompressed bytes still waiting to be consumed.
    pub fn remaining(&self) -> usize {
        self.plain.len() - self.pos
    }

    fn next_frame(&mut self) -> Result<()> {
        let mut checksum = [0u8; CHECKSUM_SIZE];
        self.inner.read_exact(&mut checksum)?;
        let mut header = [0u8; HEADER_SIZE];
        self.inner.read_exact(&mut header)?;

        let method = CompressionMethod::from_byte(header[0])?;
        let compressed_size = u32::from_le_bytes([header[1], header[2], header[3], header[4]]);
        let decompressed_size = u32::from_le_bytes([header[5], header[6], header[7], header[8]]);
        let payload_size = (compressed_size as usize)
            .checked_sub(HEADER_SIZE)
            .ok_or_else(|| {
                Error::Compression(format!("compressed size {compressed_size} below header size"))
            })?;
        let payload = self.inner.read_bytes(payload_size)?;
        trace!("read {method} frame: {compressed_size} -> {decompressed_size} bytes");

        if self.verify_checksum {
            let (low, high) = {
                let mut covered = Vec::with_capacity(HEADER_SIZE + payload.len());
                covered.extend_from_slice(&header);
                covered.extend_from_slice(&payload);
                city_hash128(&covered)
            };
            let expected = u128::from_le_bytes(checksum);
            let actual = ((high as u128) << 64) | low as u128;
            if expected != actual {
                return Err(Error::ChecksumMismatch { expected, actual });
            }
        }

        self.plain = match method {
            CompressionMethod::Lz4 => {
                // one LZ4 length byte never expands past 255 output bytes
                let limit = payload.len().saturating_mul(255).saturating_add(64);
                if decompressed_size as usize > limit {
                    return Err(Error::Compression(format!(
                        "{} byte lz4 payload cannot expand to {decompressed_size} bytes",
                        payload.len()
                    )));
                }
                lz4_flex::block::decompress(&payload, decompressed_size as usize)
                    .map_err(|e| Error::Compression(format!("lz4 decompress: {e}")))?
            }
            CompressionMethod::None => {
                if payload.len() != decompressed_size as usize {
                    return Err(Error::Compression(format!(
                        "raw frame carries {} bytes, header declares {decompressed_size}",
                        payload.len()
                    )));
                }
                payload
            }
        };
        self.pos = 0;
        Ok(())
    }
}

impl<R: BufferedRead> BufferedRead for CompressedReader<R> {
    fn read_byte(&mut self) -> Result<u8> {
        while self.pos == self.plain.len() {
            self.next_frame()?;
        }
        let byte = self.plain[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.plain.len() {
                self.next_frame()?;
                continue;
            }
            let n = (self.plain.len() - self.pos).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.plain[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }
}
