//! Connection configuration.
//!
//! A [`ClientConfig`] holds everything a [`Session`](crate::protocol::Session)
//! needs to connect: address, credentials, timeouts, socket options, TLS and
//! compression flags, plus the query settings sent with every request. It
//! can be filled in code through the `with_*` setters or loaded from a TOML
//! file where every field is optional:
//!
//! ```toml
//! host = "ch.internal"
//! port = 9440
//! ssl = true
//! compression = "lz4"
//!
//! [settings]
//! max_threads = 4
//! ```
use std::{collections::BTreeMap, fmt, fs, path::Path, time::Duration};

use serde::Deserialize;

use crate::{Error, Result, compress::CompressionMethod};

/// Value of a server-side query setting.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum SettingValue {
    Bool(bool),
    UInt64(u64),
    Float(f64),
    String(String),
    #[serde(skip_deserializing)]
    Seconds(u64),
    #[serde(skip_deserializing)]
    Milliseconds(u64),
}

impl fmt::Display for SettingValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingValue::Bool(v) => write!(f, "{}", *v as u8),
            SettingValue::UInt64(v) | SettingValue::Seconds(v) | SettingValue::Milliseconds(v) => {
                write!(f, "{v}")
            }
            SettingValue::Float(v) => write!(f, "{v}"),
            SettingValue::String(v) => write!(f, "{v}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub client_name: String,
    pub connect_timeout_ms: u64,
    pub query_timeout_ms: u64,
    pub tcp_keep_alive: bool,
    pub tcp_no_delay: bool,
    pub ssl: bool,
    pub skip_verification: bool,
    /// `lz4`, `none` (framed but uncompressed) or `disabled`.
    pub compression: String,
    pub send_buffer_size: usize,
    pub receive_buffer_size: usize,
    pub verify_checksum: bool,
    pub settings: BTreeMap<String, SettingValue>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 9000,
            database: "default".into(),
            user: "default".into(),
            password: String::new(),
            client_name: "chnative".into(),
            connect_timeout_ms: 10_000,
            query_timeout_ms: 60_000,
            tcp_keep_alive: true,
            tcp_no_delay: true,
            ssl: false,
            skip_verification: false,
            compression: "lz4".into(),
            send_buffer_size: 1024 * 1024,
            receive_buffer_size: 1024 * 1024,
            verify_checksum: true,
            settings: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            ..Self::default()
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text).map_err(|e| Error::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    pub fn validate(&self) -> Result<()> {
        if self.host.is_empty() {
            return Err(Error::Config("host must not be empty".into()));
        }
        if self.send_buffer_size == 0 || self.receive_buffer_size == 0 {
            return Err(Error::Config("buffer sizes must be positive".into()));
        }
        if self.connect_timeout_ms == 0 || self.query_timeout_ms == 0 {
            return Err(Error::Config("timeouts must be positive".into()));
        }
        self.compression_method()?;
        Ok(())
    }

    /// Frame method for compressed regions, or `None` when compression is off.
    pub fn compression_method(&self) -> Result<Option<CompressionMethod>> {
        match self.compression.as_str() {
            "disabled" | "false" => Ok(None),
            other => other.parse().map(Some),
        }
    }

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_millis(self.query_timeout_ms)
    }

    pub fn with_database(mut self, database: impl Into<String>) -> Self {
        self.database = database.into();
        self
    }

    pub fn with_credentials(mut self, user: impl Into<String>, password: impl Into<String>) -> Self {
        self.user = user.into();
        self.password = password.into();
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = compression.into();
        self
    }

    pub fn with_ssl(mut self, ssl: bool, skip_verification: bool) -> Self {
        self.ssl = ssl;
        self.skip_verification = skip_verification;
        self
    }

    pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
        self.query_timeout_ms = timeout.as_millis() as u64;
        self
    }

    pub fn with_verify_checksum(mut self, verify: bool) -> Self {
        self.verify_checksum = verify;
        self
    }

    pub fn with_setting(mut self, name: impl Into<String>, value: SettingValue) -> Self {
        self.settings.insert(name.into(), value);
        self
    }
}
