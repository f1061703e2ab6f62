use std::io::Write;

use log::trace;

use crate::Result;

use super::BufferedWrite;

pub struct BufferedWriter<W: Write> {
    sink: W,
    buf: Vec<u8>,
    capacity: usize,
}

impl<W: Write> BufferedWriter<W> {
    pub fn new(sink: W, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            sink,
            buf: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn get_ref(&self) -> &W {
        &self.sink
    }

    pub fn get_mut(&mut self) -> &mut W {
        &mut self.sink
    }

    pub fn pending(&self) -> usize {
        self.buf.len()
    }

    fn push(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        trace!("pushing {} buffered bytes", self.buf.len());
        self.sink.write_all(&self.buf)?;
        self.sink.flush()?;
        self.buf.clear();
        Ok(())
    }
}

impl<W: Write> BufferedWrite for BufferedWriter<W> {
    fn write_byte(&mut self, byte: u8) -> Result<()> {
        if self.buf.len() == self.capacity {
            self.push()?;
        }
        self.buf.push(byte);
        Ok(())
    }

    fn write_bytes(&mut self, mut bytes: &[u8]) -> Result<()> {
        while !bytes.is_empty() {
            let room = self.capacity - self.buf.len();
            if room == 0 {
                self.push()?;
                continue;
            }
            let n = room.min(bytes.len());
            self.buf.extend_from_slice(&bytes[..n]);
            bytes = &bytes[n..];
        }
        Ok(())
    }

    fn write_bytes_now(&mut self, bytes: &[u8]) -> Result<()> {
        self.push()?;
        self.sink.write_all(bytes)?;
        self.sink.flush()?;
        Ok(())
    }

    fn flush(&mut self, force: bool) -> Result<()> {
        if force || self.buf.len() == self.capacity {
            self.push()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn buffers_until_capacity() {
        let mut writer = BufferedWriter::new(Vec::new(), 4);
        writer.write_bytes(&[1, 2, 3]).unwrap();
        assert!(writer.get_ref().is_empty());

        writer.write_bytes(&[4, 5]).unwrap();
        assert_eq!(writer.get_ref(), &vec![1, 2, 3, 4]);
        assert_eq!(writer.pending(), 1);
    }

    #[test]
    fn soft_flush_only_pushes_full_buffer() {
        let mut writer = BufferedWriter::new(Vec::new(), 4);
        writer.write_byte(9).unwrap();
        writer.flush(false).unwrap();
        assert!(writer.get_ref().is_empty());

        writer.flush(true).unwrap();
        assert_eq!(writer.get_ref(), &vec![9]);
    }

    #[test]
    fn write_now_keeps_order() {
        let mut writer = BufferedWriter::new(Vec::new(), 16);
        writer.write_bytes(&[1, 2]).unwrap();
        writer.write_bytes_now(&[3, 4]).unwrap();
        assert_eq!(writer.get_ref(), &vec![1, 2, 3, 4]);
        assert_eq!(writer.pending(), 0);
    }
}
