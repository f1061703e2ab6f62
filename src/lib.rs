pub mod binary;
pub mod block;
pub mod buffer;
pub mod cli;
pub mod compress;
pub mod config;
pub mod error;
pub mod insert;
pub mod protocol;
pub mod types;

pub use block::{Block, Column};
pub use cli::{Command, prompt};
pub use config::{ClientConfig, SettingValue};
pub use error::{Error, Result};
pub use protocol::{PreparedInsert, QueryResult, Session};
pub use types::{DataType, Value, parse_data_type};
