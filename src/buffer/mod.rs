//! Fixed-capacity byte buffering over a sink or source.
//!
//! Every other layer of the engine reads and writes through the two traits
//! defined here. A socket is wrapped by [`BufferedWriter`] and
//! [`BufferedReader`]; per-column payloads being assembled for an insert are
//! accumulated by [`ByteArrayWriter`], which has no live sink at all and
//! grows into a list of chunks instead.
//!
//! # See Also
//!
//! - [`compress`](crate::compress): frames built on top of these buffers.
//! - [`binary`](crate::binary): typed primitives written through them.
mod byte_array;
mod reader;
mod writer;

pub use byte_array::ByteArrayWriter;
pub use reader::BufferedReader;
pub use writer::BufferedWriter;

use crate::Result;

/// Default capacity used for socket buffers when none is configured.
pub const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// Largest slice [`BufferedRead::read_bytes`] allocates ahead of the data.
pub const READ_CHUNK_SIZE: usize = 64 * 1024;

pub trait BufferedWrite {
    fn write_byte(&mut self, byte: u8) -> Result<()>;

    /// Buffers `bytes`, pushing full buffers to the sink as needed.
    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()>;

    /// Writes `bytes` past the buffer. Anything already buffered goes out first.
    fn write_bytes_now(&mut self, bytes: &[u8]) -> Result<()>;

    /// Pushes pending bytes to the sink. Without `force` only a full buffer is pushed.
    fn flush(&mut self, force: bool) -> Result<()>;
}

pub trait BufferedRead {
    fn read_byte(&mut self) -> Result<u8>;

    fn read_exact(&mut self, out: &mut [u8]) -> Result<()>;

    /// Reads `count` bytes. Memory grows with the bytes actually received,
    /// so a corrupt length fails at end of stream instead of allocating it.
    fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(count.min(READ_CHUNK_SIZE));
        while out.len() < count {
            let start = out.len();
            out.resize(start + (count - start).min(READ_CHUNK_SIZE), 0);
            self.read_exact(&mut out[start..])?;
        }
        Ok(out)
    }
}
