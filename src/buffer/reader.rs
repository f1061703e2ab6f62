use std::io::{self, Read};

use crate::{Error, Result};

use super::BufferedRead;

pub struct BufferedReader<R: Read> {
    source: R,
    buf: Vec<u8>,
    pos: usize,
    limit: usize,
}

impl<R: Read> BufferedReader<R> {
    pub fn new(source: R, capacity: usize) -> Self {
        Self {
            source,
            buf: vec![0; capacity.max(1)],
            pos: 0,
            limit: 0,
        }
    }

    pub fn get_ref(&self) -> &R {
        &self.source
    }

    pub fn get_mut(&mut self) -> &mut R {
        &mut self.source
    }

    /// Bytes already pulled from the source but not yet consumed.
    pub fn available(&self) -> usize {
        self.limit - self.pos
    }

    fn refill(&mut self) -> Result<()> {
        loop {
            match self.source.read(&mut self.buf) {
                Ok(0) => return Err(Error::EndOfStream),
                Ok(n) => {
                    self.pos = 0;
                    self.limit = n;
                    return Ok(());
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl<R: Read> BufferedRead for BufferedReader<R> {
    fn read_byte(&mut self) -> Result<u8> {
        if self.pos == self.limit {
            self.refill()?;
        }
        let byte = self.buf[self.pos];
        self.pos += 1;
        Ok(byte)
    }

    fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        let mut filled = 0;
        while filled < out.len() {
            if self.pos == self.limit {
                self.refill()?;
            }
            let n = (self.limit - self.pos).min(out.len() - filled);
            out[filled..filled + n].copy_from_slice(&self.buf[self.pos..self.pos + n]);
            self.pos += n;
            filled += n;
        }
        Ok(())
    }
}
