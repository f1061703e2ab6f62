//! Native protocol session.
//!
//! This module speaks the request/response protocol of the server over one
//! TCP (or TLS) connection: handshake, keepalive pings, queries with
//! streamed results, and block inserts.
//!
//! # Overview
//!
//! Every packet starts with a varint kind tag that is always sent raw. What
//! follows depends on the kind. Block payloads (Data, Totals, Extremes) are
//! the only parts that go through the compression codec, and only when the
//! session negotiated compression; the table name in front of them stays
//! raw. Optional fields are gated on the revision both sides understand,
//! `min(client, server)`.
//!
//! A session is strictly sequential. Each request is written and flushed,
//! then responses are read until the one that ends the exchange. Responses
//! that are not the one awaited (progress, profile info, logs, table
//! columns) are decoded and skipped.
//!
//! # Key Components
//!
//! - [`Session`]: connection, handshake and the public operations.
//! - [`Request`] and [`Response`]: packet encoders and decoders.
//! - [`QueryResult`]: lazily pulls the Data responses of one query.
//! - [`PreparedInsert`]: binds parameters into rows and sends them in batches.
//! - [`ClientContext`] and [`ServerContext`]: identity of each side.
//!
//! # See Also
//!
//! - [`block`](crate::block): the payload of Data responses.
//! - [`config`](crate::config): connection settings.
mod context;
mod insert;
mod request;
mod response;
mod result;
mod session;
mod socket;
#[cfg(test)]
pub(crate) mod testing;

pub use context::{ClientContext, ServerContext, local_timezone};
pub use insert::PreparedInsert;
pub use request::Request;
pub use response::{Profile, Progress, Response, ServerException};
pub use result::QueryResult;
pub use session::Session;
pub use socket::SharedStream;

pub const CLIENT_VERSION_MAJOR: u64 = 1;
pub const CLIENT_VERSION_MINOR: u64 = 1;
pub const CLIENT_REVISION: u64 = 54401;

pub const REVISION_WITH_TEMPORARY_TABLES: u64 = 50264;
pub const REVISION_WITH_TOTAL_ROWS_IN_PROGRESS: u64 = 51554;
pub const REVISION_WITH_BLOCK_INFO: u64 = 51903;
pub const REVISION_WITH_CLIENT_INFO: u64 = 54032;
pub const REVISION_WITH_SERVER_TIMEZONE: u64 = 54058;
pub const REVISION_WITH_QUOTA_KEY: u64 = 54060;
pub const REVISION_WITH_SERVER_DISPLAY_NAME: u64 = 54372;
pub const REVISION_WITH_VERSION_PATCH: u64 = 54401;
pub const REVISION_WITH_CLIENT_WRITE_INFO: u64 = 54420;

/// Query processing stage requested by the client.
pub const STAGE_COMPLETE: u64 = 2;

pub mod client_packet {
    pub const HELLO: u64 = 0;
    pub const QUERY: u64 = 1;
    pub const DATA: u64 = 2;
    pub const CANCEL: u64 = 3;
    pub const PING: u64 = 4;
}

pub mod server_packet {
    pub const HELLO: u64 = 0;
    pub const DATA: u64 = 1;
    pub const EXCEPTION: u64 = 2;
    pub const PROGRESS: u64 = 3;
    pub const PONG: u64 = 4;
    pub const END_OF_STREAM: u64 = 5;
    pub const PROFILE_INFO: u64 = 6;
    pub const TOTALS: u64 = 7;
    pub const EXTREMES: u64 = 8;
    pub const LOG: u64 = 10;
    pub const TABLE_COLUMNS: u64 = 11;
}
