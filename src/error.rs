use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Every failure the protocol engine can report.
#[derive(Debug, Error)]
pub enum Error {
    #[error("unexpected end of stream")]
    EndOfStream,

    #[error("transport IO error: {0}")]
    Io(io::Error),

    #[error("timed out waiting for the server")]
    Timeout,

    #[error("unsupported compression method 0x{0:02x}")]
    UnsupportedCompressionMethod(u8),

    #[error("frame checksum mismatch: expected {expected:032x}, got {actual:032x}")]
    ChecksumMismatch { expected: u128, actual: u128 },

    #[error("compression error: {0}")]
    Compression(String),

    #[error("protocol violation: expected {expected}, got {actual}")]
    ProtocolViolation { expected: String, actual: String },

    #[error("server exception (code: {code}) {name}: {message}")]
    Server {
        code: i32,
        name: String,
        message: String,
    },

    #[error("failed to encode row value for column '{column}': {reason}")]
    RowEncoding { column: String, reason: String },

    #[error("syntax error at position {position}: {reason}")]
    Syntax { position: usize, reason: String },

    #[error("unknown column '{0}'")]
    UnknownColumn(String),

    #[error("unknown data type '{0}'")]
    UnknownType(String),

    #[error("block shape mismatch: {0}")]
    ShapeMismatch(String),

    #[error("tls error: {0}")]
    Tls(String),

    #[error("operation interrupted")]
    Interrupted,

    #[error("result stream already failed")]
    StreamPoisoned,

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl From<io::Error> for Error {
    fn from(value: io::Error) -> Self {
        match value.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => Error::Timeout,
            io::ErrorKind::UnexpectedEof => Error::EndOfStream,
            _ => Error::Io(value),
        }
    }
}

impl Error {
    pub(crate) fn violation(expected: impl Into<String>, actual: impl Into<String>) -> Self {
        Error::ProtocolViolation {
            expected: expected.into(),
            actual: actual.into(),
        }
    }

    /// True when the connection can no longer be trusted and must be dropped.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Error::RowEncoding { .. }
                | Error::Syntax { .. }
                | Error::UnknownColumn(_)
                | Error::Server { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_kinds_are_classified() {
        let err: Error = io::Error::new(io::ErrorKind::TimedOut, "slow").into();
        assert!(matches!(err, Error::Timeout));

        let err: Error = io::Error::new(io::ErrorKind::WouldBlock, "slow").into();
        assert!(matches!(err, Error::Timeout));

        let err: Error = io::Error::new(io::ErrorKind::UnexpectedEof, "eof").into();
        assert!(matches!(err, Error::EndOfStream));

        let err: Error = io::Error::new(io::ErrorKind::ConnectionReset, "reset").into();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn server_error_message_embeds_code() {
        let err = Error::Server {
            code: 60,
            name: "DB::Exception".into(),
            message: "Table default.t doesn't exist".into(),
        };
        assert!(err.to_string().contains("code: 60"));
        assert!(!err.is_fatal());
    }
}
