use crate::{
    Error, Result,
    binary::{BinaryDeserializer, BinarySerializer},
    buffer::{BufferedRead, BufferedWrite},
};

const FIELD_END: u64 = 0;
const FIELD_IS_OVERFLOWS: u64 = 1;
const FIELD_BUCKET_NUM: u64 = 2;

/// Per-block info fields sent ahead of the column count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockSettings {
    pub is_overflows: bool,
    pub bucket_num: i32,
}

impl Default for BlockSettings {
    fn default() -> Self {
        Self {
            is_overflows: false,
            bucket_num: -1,
        }
    }
}

impl BlockSettings {
    pub fn write<W: BufferedWrite>(&self, out: &mut BinarySerializer<W>) -> Result<()> {
        out.write_varint(FIELD_IS_OVERFLOWS)?;
        out.write_bool(self.is_overflows)?;
        out.write_varint(FIELD_BUCKET_NUM)?;
        out.write_i32(self.bucket_num)?;
        out.write_varint(FIELD_END)
    }

    pub fn read<R: BufferedRead>(de: &mut BinaryDeserializer<R>) -> Result<Self> {
        let mut settings = Self::default();
        loop {
            match de.read_varint()? {
                FIELD_END => return Ok(settings),
                FIELD_IS_OVERFLOWS => settings.is_overflows = de.read_bool()?,
                FIELD_BUCKET_NUM => settings.bucket_num = de.read_i32()?,
                other => {
                    return Err(Error::violation("block info field 0, 1 or 2", other.to_string()));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::buffer::{BufferedReader, ByteArrayWriter};

    use super::*;

    #[test]
    fn default_layout() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        BlockSettings::default().write(&mut ser).unwrap();
        let bytes = ser.into_inner().into_bytes();
        assert_eq!(bytes, vec![1, 0, 2, 0xff, 0xff, 0xff, 0xff, 0]);

        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 4), false);
        assert_eq!(BlockSettings::read(&mut de).unwrap(), BlockSettings::default());
    }

    #[test]
    fn unknown_field_is_violation() {
        let bytes = [3u8, 0];
        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 4), false);
        assert!(matches!(
            BlockSettings::read(&mut de),
            Err(Error::ProtocolViolation { .. })
        ));
    }
}
