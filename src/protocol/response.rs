use std::fmt;

use crate::{
    Error, Result,
    binary::BinaryDeserializer,
    block::Block,
    buffer::BufferedRead,
};

use super::{
    REVISION_WITH_CLIENT_WRITE_INFO, REVISION_WITH_SERVER_DISPLAY_NAME,
    REVISION_WITH_SERVER_TIMEZONE, REVISION_WITH_TEMPORARY_TABLES,
    REVISION_WITH_TOTAL_ROWS_IN_PROGRESS, REVISION_WITH_VERSION_PATCH, ServerContext,
    local_timezone, server_packet,
};

/// Exception chain reported by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerException {
    pub code: i32,
    pub name: String,
    pub message: String,
    pub stack_trace: String,
    pub nested: Option<Box<ServerException>>,
}

impl ServerException {
    fn read<R: BufferedRead>(de: &mut BinaryDeserializer<R>) -> Result<Self> {
        let code = de.read_i32()?;
        let name = de.read_str()?;
        let message = de.read_str()?;
        let stack_trace = de.read_str()?;
        let nested = if de.read_u8()? != 0 {
            Some(Box::new(Self::read(de)?))
        } else {
            None
        };
        Ok(Self {
            code,
            name,
            message,
            stack_trace,
            nested,
        })
    }
}

impl From<ServerException> for Error {
    fn from(e: ServerException) -> Self {
        Error::Server {
            code: e.code,
            name: e.name,
            message: e.message,
        }
    }
}

/// Counters carried by a Progress packet. Each packet holds increments.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub rows: u64,
    pub bytes: u64,
    pub total_rows: u64,
    pub written_rows: u64,
    pub written_bytes: u64,
}

impl Progress {
    fn read<R: BufferedRead>(de: &mut BinaryDeserializer<R>, revision: u64) -> Result<Self> {
        let mut progress = Progress {
            rows: de.read_varint()?,
            bytes: de.read_varint()?,
            ..Progress::default()
        };
        if revision >= REVISION_WITH_TOTAL_ROWS_IN_PROGRESS {
            progress.total_rows = de.read_varint()?;
        }
        if revision >= REVISION_WITH_CLIENT_WRITE_INFO {
            progress.written_rows = de.read_varint()?;
            progress.written_bytes = de.read_varint()?;
        }
        Ok(progress)
    }

    pub fn accumulate(&mut self, other: &Progress) {
        self.rows += other.rows;
        self.bytes += other.bytes;
        self.total_rows += other.total_rows;
        self.written_rows += other.written_rows;
        self.written_bytes += other.written_bytes;
    }
}

/// Execution profile sent at the end of a query.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Profile {
    pub rows: u64,
    pub blocks: u64,
    pub bytes: u64,
    pub applied_limit: bool,
    pub rows_before_limit: u64,
    pub calculated_rows_before_limit: bool,
}

impl Profile {
    fn read<R: BufferedRead>(de: &mut BinaryDeserializer<R>) -> Result<Self> {
        Ok(Profile {
            rows: de.read_varint()?,
            blocks: de.read_varint()?,
            bytes: de.read_varint()?,
            applied_limit: de.read_bool()?,
            rows_before_limit: de.read_varint()?,
            calculated_rows_before_limit: de.read_bool()?,
        })
    }
}

/// A packet sent by the server.
#[derive(Debug)]
pub enum Response {
    Hello(ServerContext),
    Data { table: String, block: Block },
    Exception(ServerException),
    Progress(Progress),
    Pong,
    EndOfStream,
    ProfileInfo(Profile),
    Totals(Block),
    Extremes(Block),
    Log(Block),
    TableColumns { table: String, description: String },
}

impl Response {
    /// Decodes the next packet.
    ///
    /// `server` supplies the negotiated revision and the timezone for
    /// DateTime columns. It is ignored for Hello, which is what establishes it.
    pub fn read<R: BufferedRead>(
        de: &mut BinaryDeserializer<R>,
        server: &ServerContext,
    ) -> Result<Self> {
        let revision = server.negotiated_revision();
        let kind = de.read_varint()?;
        let response = match kind {
            server_packet::HELLO => Response::Hello(read_hello(de)?),
            server_packet::DATA => {
                let (table, block) = read_data(de, server, true)?;
                Response::Data { table, block }
            }
            server_packet::EXCEPTION => Response::Exception(ServerException::read(de)?),
            server_packet::PROGRESS => Response::Progress(Progress::read(de, revision)?),
            server_packet::PONG => Response::Pong,
            server_packet::END_OF_STREAM => Response::EndOfStream,
            server_packet::PROFILE_INFO => Response::ProfileInfo(Profile::read(de)?),
            server_packet::TOTALS => Response::Totals(read_data(de, server, true)?.1),
            server_packet::EXTREMES => Response::Extremes(read_data(de, server, true)?.1),
            server_packet::LOG => Response::Log(read_data(de, server, false)?.1),
            server_packet::TABLE_COLUMNS => Response::TableColumns {
                table: de.read_str()?,
                description: de.read_str()?,
            },
            other => return Err(Error::violation("server packet kind", other.to_string())),
        };
        Ok(response)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Response::Hello(_) => "Hello",
            Response::Data { .. } => "Data",
            Response::Exception(_) => "Exception",
            Response::Progress(_) => "Progress",
            Response::Pong => "Pong",
            Response::EndOfStream => "EndOfStream",
            Response::ProfileInfo(_) => "ProfileInfo",
            Response::Totals(_) => "Totals",
            Response::Extremes(_) => "Extremes",
            Response::Log(_) => "Log",
            Response::TableColumns { .. } => "TableColumns",
        }
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind())
    }
}

fn read_hello<R: BufferedRead>(de: &mut BinaryDeserializer<R>) -> Result<ServerContext> {
    let name = de.read_str()?;
    let major_version = de.read_varint()?;
    let minor_version = de.read_varint()?;
    let revision = de.read_varint()?;
    let mut server = ServerContext {
        name,
        major_version,
        minor_version,
        revision,
        timezone: local_timezone(),
        display_name: "localhost".into(),
        version_patch: 0,
    };
    let negotiated = server.negotiated_revision();

    if negotiated >= REVISION_WITH_SERVER_TIMEZONE {
        let tz_name = de.read_str()?;
        server.timezone = tz_name
            .parse()
            .map_err(|_| Error::violation("IANA timezone", tz_name))?;
    }
    if negotiated >= REVISION_WITH_SERVER_DISPLAY_NAME {
        server.display_name = de.read_str()?;
    }
    if negotiated >= REVISION_WITH_VERSION_PATCH {
        server.version_patch = de.read_varint()?;
    }
    Ok(server)
}

fn read_data<R: BufferedRead>(
    de: &mut BinaryDeserializer<R>,
    server: &ServerContext,
    compressed: bool,
) -> Result<(String, Block)> {
    let table = if server.negotiated_revision() >= REVISION_WITH_TEMPORARY_TABLES {
        de.read_str()?
    } else {
        String::new()
    };
    let block = if compressed {
        de.compressed(|de| Block::read(de, server))?
    } else {
        Block::read(de, server)?
    };
    Ok((table, block))
}
