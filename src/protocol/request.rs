use std::collections::BTreeMap;

use crate::{
    Result,
    binary::BinarySerializer,
    block::Block,
    buffer::BufferedWrite,
    config::SettingValue,
};

use super::{
    CLIENT_REVISION, CLIENT_VERSION_MAJOR, CLIENT_VERSION_MINOR, ClientContext,
    REVISION_WITH_CLIENT_INFO, REVISION_WITH_TEMPORARY_TABLES, STAGE_COMPLETE, client_packet,
};

/// A packet sent by the client.
#[derive(Debug)]
pub enum Request<'a> {
    Hello {
        client_name: &'a str,
        database: &'a str,
        user: &'a str,
        password: &'a str,
    },
    Query {
        query_id: &'a str,
        client: &'a ClientContext,
        settings: &'a BTreeMap<String, SettingValue>,
        compression: bool,
        sql: &'a str,
    },
    /// A block for `table`; an empty block ends a data stream.
    Data { table: &'a str, block: &'a Block },
    Cancel,
    Ping,
}

impl Request<'_> {
    /// Encodes the packet. `revision` is the negotiated revision.
    pub fn write<W: BufferedWrite>(&self, out: &mut BinarySerializer<W>, revision: u64) -> Result<()> {
        match self {
            Request::Hello {
                client_name,
                database,
                user,
                password,
            } => {
                out.write_varint(client_packet::HELLO)?;
                out.write_str(client_name)?;
                out.write_varint(CLIENT_VERSION_MAJOR)?;
                out.write_varint(CLIENT_VERSION_MINOR)?;
                out.write_varint(CLIENT_REVISION)?;
                out.write_str(database)?;
                out.write_str(user)?;
                out.write_str(password)
            }
            Request::Query {
                query_id,
                client,
                settings,
                compression,
                sql,
            } => {
                out.write_varint(client_packet::QUERY)?;
                out.write_str(query_id)?;
                if revision >= REVISION_WITH_CLIENT_INFO {
                    client.write(out, revision)?;
                }
                write_settings(out, settings)?;
                out.write_varint(STAGE_COMPLETE)?;
                out.write_bool(*compression)?;
                out.write_str(sql)
            }
            Request::Data { table, block } => {
                out.write_varint(client_packet::DATA)?;
                if revision >= REVISION_WITH_TEMPORARY_TABLES {
                    out.write_str(table)?;
                }
                out.compressed(|out| block.write(out))
            }
            Request::Cancel => out.write_varint(client_packet::CANCEL),
            Request::Ping => out.write_varint(client_packet::PING),
        }
    }
}

/// Settings in the typed encoding: name, value, and an empty name to finish.
fn write_settings<W: BufferedWrite>(
    out: &mut BinarySerializer<W>,
    settings: &BTreeMap<String, SettingValue>,
) -> Result<()> {
    for (name, value) in settings {
        out.write_str(name)?;
        match value {
            SettingValue::Bool(v) => out.write_bool(*v)?,
            SettingValue::UInt64(v) | SettingValue::Seconds(v) | SettingValue::Milliseconds(v) => {
                out.write_varint(*v)?
            }
            SettingValue::Float(_) | SettingValue::String(_) => out.write_str(&value.to_string())?,
        }
    }
    out.write_str("")
}

#[cfg(test)]
mod tests {
    use crate::{
        binary::BinaryDeserializer,
        buffer::{BufferedReader, ByteArrayWriter},
        compress::CompressionMethod,
        protocol::ServerContext,
        types::DataType,
    };

    use super::*;

    fn encode(request: &Request<'_>, compression: Option<CompressionMethod>) -> Vec<u8> {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(256), compression);
        request.write(&mut ser, CLIENT_REVISION).unwrap();
        ser.flush_to_target(true).unwrap();
        ser.into_inner().into_bytes()
    }

    #[test]
    fn hello_layout() {
        let bytes = encode(
            &Request::Hello {
                client_name: "chnative",
                database: "default",
                user: "u",
                password: "",
            },
            None,
        );
        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 16), false);
        assert_eq!(de.read_varint().unwrap(), client_packet::HELLO);
        assert_eq!(de.read_str().unwrap(), "chnative");
        assert_eq!(de.read_varint().unwrap(), CLIENT_VERSION_MAJOR);
        assert_eq!(de.read_varint().unwrap(), CLIENT_VERSION_MINOR);
        assert_eq!(de.read_varint().unwrap(), CLIENT_REVISION);
        assert_eq!(de.read_str().unwrap(), "default");
        assert_eq!(de.read_str().unwrap(), "u");
        assert_eq!(de.read_str().unwrap(), "");
    }

    #[test]
    fn query_carries_typed_settings() {
        let client = ClientContext {
            client_name: "c".into(),
            client_hostname: "h".into(),
            initial_address: "a".into(),
        };
        let mut settings = BTreeMap::new();
        settings.insert("max_threads".to_string(), SettingValue::UInt64(300));
        settings.insert("ratio".to_string(), SettingValue::Float(0.5));
        let bytes = encode(
            &Request::Query {
                query_id: "q1",
                client: &client,
                settings: &settings,
                compression: true,
                sql: "SELECT 1",
            },
            None,
        );

        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 16), false);
        assert_eq!(de.read_varint().unwrap(), client_packet::QUERY);
        assert_eq!(de.read_str().unwrap(), "q1");
        // skip the client info block
        let mut info = BinarySerializer::new(ByteArrayWriter::new(64), None);
        client.write(&mut info, CLIENT_REVISION).unwrap();
        de.read_bytes(info.into_inner().len()).unwrap();

        assert_eq!(de.read_str().unwrap(), "max_threads");
        assert_eq!(de.read_varint().unwrap(), 300);
        assert_eq!(de.read_str().unwrap(), "ratio");
        assert_eq!(de.read_str().unwrap(), "0.5");
        assert_eq!(de.read_str().unwrap(), "");
        assert_eq!(de.read_varint().unwrap(), STAGE_COMPLETE);
        assert!(de.read_bool().unwrap());
        assert_eq!(de.read_str().unwrap(), "SELECT 1");
    }

    #[test]
    fn data_block_is_compressed_after_raw_table_name() {
        let mut block = Block::for_insert([("n", DataType::UInt8)]).unwrap();
        block.set_value(0, 9u8).unwrap();
        block.append_row().unwrap();

        let bytes = encode(
            &Request::Data {
                table: "",
                block: &block,
            },
            Some(CompressionMethod::Lz4),
        );
        assert_eq!(bytes[0], client_packet::DATA as u8);
        assert_eq!(bytes[1], 0);
        assert_eq!(bytes[2 + 16], 0x82);

        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 16), true);
        de.read_varint().unwrap();
        de.read_str().unwrap();
        let read = de
            .compressed(|de| Block::read(de, &ServerContext::default()))
            .unwrap();
        assert_eq!(read.value(0, 0), Some(&crate::types::Value::UInt(9)));
    }
}
