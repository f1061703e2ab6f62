//! Scripted loopback server for session tests.
use std::{
    net::{TcpListener, TcpStream},
    thread::{self, JoinHandle},
    time::Duration,
};

use crate::{
    binary::{BinaryDeserializer, BinarySerializer},
    block::{Block, Column},
    buffer::{BufferedReader, BufferedWriter},
    compress::CompressionMethod,
    config::ClientConfig,
    types::{DataType, Value},
};

use super::{CLIENT_REVISION, ServerContext, client_packet, server_packet};

pub(crate) struct FakeConn {
    reader: BinaryDeserializer<BufferedReader<TcpStream>>,
    writer: BinarySerializer<BufferedWriter<TcpStream>>,
    server: ServerContext,
}

impl FakeConn {
    fn new(stream: TcpStream, compression: bool) -> Self {
        let write_half = stream.try_clone().unwrap();
        Self {
            reader: BinaryDeserializer::new(BufferedReader::new(stream, 4096), compression),
            writer: BinarySerializer::new(
                BufferedWriter::new(write_half, 4096),
                compression.then_some(CompressionMethod::Lz4),
            ),
            server: ServerContext {
                name: "FakeHouse".into(),
                major_version: 21,
                minor_version: 8,
                revision: CLIENT_REVISION,
                timezone: chrono_tz::Asia::Singapore,
                display_name: "fake".into(),
                version_patch: 7,
            },
        }
    }

    fn flush(&mut self) {
        self.writer.flush_to_target(true).unwrap();
    }

    pub fn read_kind(&mut self) -> u64 {
        self.reader.read_varint().unwrap()
    }

    /// Reads the client Hello and answers it. Returns false if the login was refused.
    fn handshake(&mut self) -> bool {
        assert_eq!(self.read_kind(), client_packet::HELLO);
        self.reader.read_str().unwrap();
        for _ in 0..3 {
            self.reader.read_varint().unwrap();
        }
        let _database = self.reader.read_str().unwrap();
        let user = self.reader.read_str().unwrap();
        let _password = self.reader.read_str().unwrap();
        if user == "bad" {
            self.write_exception(516, "Authentication failed");
            return false;
        }

        let server = self.server.clone();
        self.writer.write_varint(server_packet::HELLO).unwrap();
        self.writer.write_str(&server.name).unwrap();
        self.writer.write_varint(server.major_version).unwrap();
        self.writer.write_varint(server.minor_version).unwrap();
        self.writer.write_varint(server.revision).unwrap();
        self.writer.write_str(server.timezone.name()).unwrap();
        self.writer.write_str(&server.display_name).unwrap();
        self.writer.write_varint(server.version_patch).unwrap();
        self.flush();
        true
    }

    /// Reads a Query and the empty block after it. Returns the SQL text.
    pub fn read_query(&mut self) -> String {
        assert_eq!(self.read_kind(), client_packet::QUERY);
        let r = &mut self.reader;
        r.read_str().unwrap();
        // client info
        r.read_varint().unwrap();
        for _ in 0..3 {
            r.read_str().unwrap();
        }
        r.read_varint().unwrap();
        for _ in 0..3 {
            r.read_str().unwrap();
        }
        for _ in 0..3 {
            r.read_varint().unwrap();
        }
        r.read_str().unwrap();
        r.read_varint().unwrap();
        // settings
        loop {
            let name = r.read_str().unwrap();
            if name.is_empty() {
                break;
            }
            r.read_varint().unwrap();
        }
        assert_eq!(r.read_varint().unwrap(), super::STAGE_COMPLETE);
        r.read_varint().unwrap();
        let sql = r.read_str().unwrap();
        assert!(self.read_data().is_empty());
        sql
    }

    pub fn read_data(&mut self) -> Block {
        assert_eq!(self.read_kind(), client_packet::DATA);
        self.reader.read_str().unwrap();
        let server = self.server.clone();
        self.reader
            .compressed(|r| Block::read(r, &server))
            .unwrap()
    }

    fn write_block(&mut self, kind: u64, block: &Block) {
        self.writer.write_varint(kind).unwrap();
        self.writer.write_str("").unwrap();
        self.writer.compressed(|w| block.write(w)).unwrap();
        self.flush();
    }

    pub fn write_data(&mut self, block: &Block) {
        self.write_block(server_packet::DATA, block);
    }

    pub fn write_totals(&mut self, block: &Block) {
        self.write_block(server_packet::TOTALS, block);
    }

    pub fn write_progress(&mut self, rows: u64) {
        self.writer.write_varint(server_packet::PROGRESS).unwrap();
        self.writer.write_varint(rows).unwrap();
        self.writer.write_varint(rows * 8).unwrap();
        self.writer.write_varint(0).unwrap();
        self.flush();
    }

    pub fn write_profile(&mut self) {
        self.writer.write_varint(server_packet::PROFILE_INFO).unwrap();
        for v in [3u64, 2, 24] {
            self.writer.write_varint(v).unwrap();
        }
        self.writer.write_bool(false).unwrap();
        self.writer.write_varint(0).unwrap();
        self.writer.write_bool(false).unwrap();
        self.flush();
    }

    pub fn write_pong(&mut self) {
        self.writer.write_varint(server_packet::PONG).unwrap();
        self.flush();
    }

    pub fn write_end_of_stream(&mut self) {
        self.writer.write_varint(server_packet::END_OF_STREAM).unwrap();
        self.flush();
    }

    pub fn write_exception(&mut self, code: i32, message: &str) {
        self.writer.write_varint(server_packet::EXCEPTION).unwrap();
        self.writer.write_i32(code).unwrap();
        self.writer.write_str("DB::Exception").unwrap();
        self.writer.write_str(message).unwrap();
        self.writer.write_str("").unwrap();
        self.writer.write_u8(0).unwrap();
        self.flush();
    }
}

/// Starts a one-connection server running `script` after the handshake.
pub(crate) fn spawn_server<F>(compression: bool, script: F) -> (ClientConfig, JoinHandle<()>)
where
    F: FnOnce(&mut FakeConn) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut conn = FakeConn::new(stream, compression);
        if conn.handshake() {
            script(&mut conn);
        }
    });
    let config = ClientConfig::new("127.0.0.1", port)
        .with_compression(if compression { "lz4" } else { "disabled" })
        .with_query_timeout(Duration::from_secs(5));
    (config, handle)
}

/// Single `n UInt64` column.
pub(crate) fn int_block(values: &[u64]) -> Block {
    let values = values.iter().map(|v| Value::UInt(*v)).collect::<Vec<_>>();
    let rows = values.len();
    Block::from_columns(vec![Column::materialized("n", DataType::UInt64, values)], rows).unwrap()
}

pub(crate) fn id_name_header() -> Block {
    Block::from_columns(
        vec![
            Column::materialized("id", DataType::Int32, vec![]),
            Column::materialized("name", DataType::String, vec![]),
        ],
        0,
    )
    .unwrap()
}

pub(crate) fn id_name_country_header() -> Block {
    Block::from_columns(
        vec![
            Column::materialized("id", DataType::Int32, vec![]),
            Column::materialized("name", DataType::String, vec![]),
            Column::materialized("country", DataType::String, vec![]),
        ],
        0,
    )
    .unwrap()
}
