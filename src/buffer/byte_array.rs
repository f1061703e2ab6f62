use std::mem;

use crate::Result;

use super::BufferedWrite;

const INITIAL_CAPACITY: usize = 64;

/// In-memory buffered writer used to assemble one column before it is flushed.
///
/// The working buffer doubles until it reaches `ceiling`; after that every
/// full buffer is parked in a chunk list, so appending never reallocates the
/// bytes already written.
#[derive(Debug, Clone)]
pub struct ByteArrayWriter {
    chunks: Vec<Vec<u8>>,
    current: Vec<u8>,
    capacity: usize,
    ceiling: usize,
}

impl ByteArrayWriter {
    pub fn new(ceiling: usize) -> Self {
        let ceiling = ceiling.max(1);
        let capacity = INITIAL_CAPACITY.min(ceiling);
        Self {
            chunks: Vec::new(),
            current: Vec::with_capacity(capacity),
            capacity,
            ceiling,
        }
    }

    pub fn len(&self) -> usize {
        self.chunks.iter().map(Vec::len).sum::<usize>() + self.current.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Accumulated bytes, oldest chunk first.
    pub fn chunks(&self) -> impl Iterator<Item = &[u8]> {
        self.chunks
            .iter()
            .map(Vec::as_slice)
            .chain(std::iter::once(self.current.as_slice()))
            .filter(|c| !c.is_empty())
    }

    pub fn into_bytes(mut self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.len());
        for chunk in self.chunks.drain(..) {
            out.extend_from_slice(&chunk);
        }
        out.extend_from_slice(&self.current);
        out
    }

    pub fn clear(&mut self) {
        self.chunks.clear();
        self.current.clear();
    }

    fn make_room(&mut self) {
        if self.capacity < self.ceiling {
            self.capacity = (self.capacity * 2).min(self.ceiling);
            self.current.reserve_exact(self.capacity - self.current.len());
        } else {
            let full = mem::replace(&mut self.current, Vec::with_capacity(self.capacity));
            self.chunks.push(full);
        }
    }
}

impl BufferedWrite for ByteArrayWriter {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.current.len() == self.capacity {
            self.make_room();
        }
        self.current.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.capacity - self.current.len();
            if room == 0 {
                self.make_room();
                continue;
            }
            let n = room.min(bytes.len());
            self.current.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn write_bytes_now(&mut self, bytes: &[u8]) -> Result<()> {
        self.write_bytes(bytes)
    }

    fn flush(&mut self, force: bool) -> Result<()> {
        if force && !self.current.is_empty() {
            let full = mem::replace(&mut self.current, Vec::with_capacity(self.capacity));
            self.chunks.push(full);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grows_then_chunks() {
        let mut writer = ByteArrayWriter::new(128);
        let data: Vec<u8> = (0..=255).cycle().take(1000).collect();
        writer.write_bytes(&data).unwrap();

        assert_eq!(writer.len(), 1000);
        assert!(writer.chunks().count() > 1);
        assert!(writer.chunks().all(|c| c.len() <= 128));
        assert_eq!(writer.into_bytes(), data);
    }

    #[test]
    fn forced_flush_keeps_bytes() {
        let mut writer = ByteArrayWriter::new(16);
        writer.write_byte(1).unwrap();
        writer.flush(true).unwrap();
        writer.write_byte(2).unwrap();

        assert_eq!(writer.chunks().collect::<Vec<_>>(), vec![&[1u8][..], &[2u8][..]]);
        writer.clear();
        assert!(writer.is_empty());
    }
}
