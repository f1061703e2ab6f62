use std::env;

use chrono_tz::Tz;

use crate::{Result, binary::BinarySerializer, buffer::BufferedWrite};

use super::{
    CLIENT_REVISION, CLIENT_VERSION_MAJOR, CLIENT_VERSION_MINOR, REVISION_WITH_QUOTA_KEY,
    REVISION_WITH_VERSION_PATCH,
};

const QUERY_KIND_INITIAL: u64 = 1;
const INTERFACE_TCP: u64 = 1;

/// Timezone used when the server does not announce one: `TZ`, or UTC.
pub fn local_timezone() -> Tz {
    env::var("TZ")
        .ok()
        .and_then(|name| name.trim_start_matches(':').parse().ok())
        .unwrap_or(Tz::UTC)
}

/// Static identity of this client, attached to every query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientContext {
    pub client_name: String,
    pub client_hostname: String,
    pub initial_address: String,
}

impl ClientContext {
    pub fn new(client_name: impl Into<String>, initial_address: impl Into<String>) -> Self {
        let client_hostname = hostname::get()
            .map(|h| h.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "localhost".into());
        Self {
            client_name: client_name.into(),
            client_hostname,
            initial_address: initial_address.into(),
        }
    }

    /// Writes the client info block of a Query request.
    ///
    /// The revision goes out twice: once in its own slot and once in the
    /// version patch slot that follows the quota key.
    pub fn write<W: BufferedWrite>(
        &self,
        out: &mut BinarySerializer<W>,
        revision: u64,
    ) -> Result<()> {
        out.write_varint(QUERY_KIND_INITIAL)?;
        out.write_str("")?;
        out.write_str("")?;
        out.write_str(&self.initial_address)?;
        out.write_varint(INTERFACE_TCP)?;
        out.write_str("")?;
        out.write_str(&self.client_hostname)?;
        out.write_str(&self.client_name)?;
        out.write_varint(CLIENT_VERSION_MAJOR)?;
        out.write_varint(CLIENT_VERSION_MINOR)?;
        out.write_varint(CLIENT_REVISION)?;
        if revision >= REVISION_WITH_QUOTA_KEY {
            out.write_str("")?;
        }
        if revision >= REVISION_WITH_VERSION_PATCH {
            out.write_varint(CLIENT_REVISION)?;
        }
        Ok(())
    }
}

/// What the server told us about itself during the handshake.
#[derive(Debug, Clone, PartialEq)]
pub struct ServerContext {
    pub name: String,
    pub major_version: u64,
    pub minor_version: u64,
    /// Revision the server announced.
    pub revision: u64,
    pub timezone: Tz,
    pub display_name: String,
    pub version_patch: u64,
}

impl ServerContext {
    /// Revision both sides understand; every optional field is gated on it.
    pub fn negotiated_revision(&self) -> u64 {
        self.revision.min(CLIENT_REVISION)
    }

    pub fn version(&self) -> String {
        format!(
            "{}.{}.{}",
            self.major_version, self.minor_version, self.version_patch
        )
    }
}

impl Default for ServerContext {
    fn default() -> Self {
        Self {
            name: String::new(),
            major_version: 0,
            minor_version: 0,
            revision: CLIENT_REVISION,
            timezone: local_timezone(),
            display_name: "localhost".into(),
            version_patch: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        binary::BinaryDeserializer,
        buffer::{BufferedReader, ByteArrayWriter},
    };

    use super::*;

    fn client() -> ClientContext {
        ClientContext {
            client_name: "chnative".into(),
            client_hostname: "box".into(),
            initial_address: "10.0.0.1:9000".into(),
        }
    }

    #[test]
    fn client_info_layout() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        client().write(&mut ser, CLIENT_REVISION).unwrap();
        let bytes = ser.into_inner().into_bytes();

        let mut de = BinaryDeserializer::new(BufferedReader::new(&bytes[..], 16), false);
        assert_eq!(de.read_varint().unwrap(), 1);
        assert_eq!(de.read_str().unwrap(), "");
        assert_eq!(de.read_str().unwrap(), "");
        assert_eq!(de.read_str().unwrap(), "10.0.0.1:9000");
        assert_eq!(de.read_varint().unwrap(), 1);
        assert_eq!(de.read_str().unwrap(), "");
        assert_eq!(de.read_str().unwrap(), "box");
        assert_eq!(de.read_str().unwrap(), "chnative");
        assert_eq!(de.read_varint().unwrap(), CLIENT_VERSION_MAJOR);
        assert_eq!(de.read_varint().unwrap(), CLIENT_VERSION_MINOR);
        assert_eq!(de.read_varint().unwrap(), CLIENT_REVISION);
        assert_eq!(de.read_str().unwrap(), "");
        assert_eq!(de.read_varint().unwrap(), CLIENT_REVISION);
        assert!(de.read_u8().is_err());
    }

    #[test]
    fn old_servers_get_short_client_info() {
        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        client().write(&mut ser, 54059).unwrap();
        let short = ser.into_inner().len();

        let mut ser = BinarySerializer::new(ByteArrayWriter::new(64), None);
        client().write(&mut ser, CLIENT_REVISION).unwrap();
        let full = ser.into_inner().len();

        // one empty quota key byte and a three byte revision varint
        assert_eq!(full - short, 4);
    }

    #[test]
    fn negotiated_revision_is_the_minimum() {
        let server = ServerContext {
            revision: 54_500,
            ..ServerContext::default()
        };
        assert_eq!(server.negotiated_revision(), CLIENT_REVISION);

        let server = ServerContext {
            revision: 54_000,
            ..ServerContext::default()
        };
        assert_eq!(server.negotiated_revision(), 54_000);
    }
}
