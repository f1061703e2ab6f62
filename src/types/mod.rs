//! Column type descriptors.
//!
//! A [`DataType`] is built from the textual type name the server sends with
//! every column (`Int32`, `Nullable(String)`, `Array(Tuple(UInt8, Date))`,
//! ...) by [`parse_data_type`]. Composite types are parsed by recursing on
//! their argument substrings; the negotiated [`ServerContext`] is threaded
//! through explicitly because some types (DateTime) depend on the server
//! timezone.
//!
//! Each descriptor knows its wire name, its default value, how to validate
//! and serialize a single [`Value`], how to bulk-deserialize a column of
//! values and how to parse a SQL literal through the insert lexer.
mod text;
mod value;
mod wire;

use std::fmt;

use chrono::{NaiveDate, NaiveDateTime, TimeZone};
use chrono_tz::Tz;

pub use value::Value;

use crate::{Error, Result, protocol::ServerContext};

/// Upper bound on slots reserved ahead of decoding a wire-supplied count.
pub(crate) const MAX_PREALLOCATED: usize = 4096;

#[derive(Debug, Clone, PartialEq)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    String,
    FixedString(usize),
    Date,
    /// `explicit` records whether the timezone was spelled out in the type name.
    DateTime {
        timezone: Tz,
        explicit: bool,
    },
    Nullable(Box<DataType>),
    Array(Box<DataType>),
    Tuple(Vec<DataType>),
}

impl DataType {
    /// Name as the server spells it, used when a column header is written back.
    pub fn name(&self) -> String {
        match self {
            DataType::Int8 => "Int8".into(),
            DataType::Int16 => "Int16".into(),
            DataType::Int32 => "Int32".into(),
            DataType::Int64 => "Int64".into(),
            DataType::UInt8 => "UInt8".into(),
            DataType::UInt16 => "UInt16".into(),
            DataType::UInt32 => "UInt32".into(),
            DataType::UInt64 => "UInt64".into(),
            DataType::Float32 => "Float32".into(),
            DataType::Float64 => "Float64".into(),
            DataType::String => "String".into(),
            DataType::FixedString(n) => format!("FixedString({n})"),
            DataType::Date => "Date".into(),
            DataType::DateTime { timezone, explicit } => {
                if *explicit {
                    format!("DateTime('{}')", timezone.name())
                } else {
                    "DateTime".into()
                }
            }
            DataType::Nullable(nested) => format!("Nullable({})", nested.name()),
            DataType::Array(nested) => format!("Array({})", nested.name()),
            DataType::Tuple(elements) => {
                let names: Vec<String> = elements.iter().map(DataType::name).collect();
                format!("Tuple({})", names.join(", "))
            }
        }
    }

    pub fn is_nullable(&self) -> bool {
        matches!(self, DataType::Nullable(_))
    }

    pub fn default_value(&self) -> Value {
        match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => Value::Int(0),
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                Value::UInt(0)
            }
            DataType::Float32 | DataType::Float64 => Value::Float(0.0),
            DataType::String | DataType::FixedString(_) => Value::String(String::new()),
            DataType::Date => Value::Date(NaiveDate::default()),
            DataType::DateTime { timezone, .. } => {
                Value::DateTime(timezone.from_utc_datetime(&NaiveDateTime::default()))
            }
            DataType::Nullable(_) => Value::Null,
            DataType::Array(_) => Value::Array(Vec::new()),
            DataType::Tuple(elements) => {
                Value::Tuple(elements.iter().map(DataType::default_value).collect())
            }
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Resolves a server type name into a descriptor.
pub fn parse_data_type(name: &str, server: &ServerContext) -> Result<DataType> {
    let name = name.trim();
    let (base, args) = match name.find('(') {
        Some(open) if name.ends_with(')') => (&name[..open], Some(&name[open + 1..name.len() - 1])),
        Some(_) => return Err(Error::UnknownType(name.to_string())),
        None => (name, None),
    };

    let ty = match (base.trim(), args) {
        ("Int8", None) => DataType::Int8,
        ("Int16", None) => DataType::Int16,
        ("Int32", None) => DataType::Int32,
        ("Int64", None) => DataType::Int64,
        ("UInt8", None) => DataType::UInt8,
        ("UInt16", None) => DataType::UInt16,
        ("UInt32", None) => DataType::UInt32,
        ("UInt64", None) => DataType::UInt64,
        ("Float32", None) => DataType::Float32,
        ("Float64", None) => DataType::Float64,
        ("String", None) => DataType::String,
        ("Date", None) => DataType::Date,
        ("DateTime", None) => DataType::DateTime {
            timezone: server.timezone,
            explicit: false,
        },
        ("DateTime", Some(args)) => {
            let tz_name = args.trim().trim_matches('\'');
            let timezone = tz_name
                .parse::<Tz>()
                .map_err(|_| Error::UnknownType(name.to_string()))?;
            DataType::DateTime {
                timezone,
                explicit: true,
            }
        }
        ("FixedString", Some(args)) => DataType::FixedString(
            args.trim()
                .parse::<usize>()
                .ok()
                .filter(|size| *size > 0)
                .ok_or_else(|| Error::UnknownType(name.to_string()))?,
        ),
        ("Nullable", Some(args)) => DataType::Nullable(Box::new(parse_data_type(args, server)?)),
        ("Array", Some(args)) => DataType::Array(Box::new(parse_data_type(args, server)?)),
        ("Tuple", Some(args)) => DataType::Tuple(
            split_type_args(args)
                .into_iter()
                .map(|arg| parse_data_type(arg, server))
                .collect::<Result<Vec<_>>>()?,
        ),
        _ => return Err(Error::UnknownType(name.to_string())),
    };
    Ok(ty)
}

/// Splits `a, Array(b), Tuple(c, d)` on top-level commas.
fn split_type_args(args: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0usize;
    let mut quoted = false;
    let mut start = 0;
    for (i, c) in args.char_indices() {
        match c {
            '\'' => quoted = !quoted,
            '(' if !quoted => depth += 1,
            ')' if !quoted => depth = depth.saturating_sub(1),
            ',' if !quoted && depth == 0 => {
                out.push(args[start..i].trim());
                start = i + 1;
            }
            _ => {}
        }
    }
    out.push(args[start..].trim());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server() -> ServerContext {
        ServerContext {
            timezone: chrono_tz::Asia::Singapore,
            ..ServerContext::default()
        }
    }

    #[test]
    fn parses_scalars() {
        let ctx = server();
        assert_eq!(parse_data_type("Int32", &ctx).unwrap(), DataType::Int32);
        assert_eq!(parse_data_type(" String ", &ctx).unwrap(), DataType::String);
        assert_eq!(
            parse_data_type("FixedString(16)", &ctx).unwrap(),
            DataType::FixedString(16)
        );
    }

    #[test]
    fn datetime_takes_server_timezone() {
        let ctx = server();
        assert_eq!(
            parse_data_type("DateTime", &ctx).unwrap(),
            DataType::DateTime {
                timezone: chrono_tz::Asia::Singapore,
                explicit: false
            }
        );
        let explicit = parse_data_type("DateTime('Europe/Berlin')", &ctx).unwrap();
        assert_eq!(explicit.name(), "DateTime('Europe/Berlin')");
    }

    #[test]
    fn parses_nested_composites() {
        let ctx = server();
        let name = "Array(Tuple(Nullable(Int64), Array(String), FixedString(3)))";
        let ty = parse_data_type(name, &ctx).unwrap();
        assert_eq!(
            ty,
            DataType::Array(Box::new(DataType::Tuple(vec![
                DataType::Nullable(Box::new(DataType::Int64)),
                DataType::Array(Box::new(DataType::String)),
                DataType::FixedString(3),
            ])))
        );
        assert_eq!(ty.name(), name);
    }

    #[test]
    fn unknown_types_fail() {
        let ctx = server();
        for name in [
            "Decimal(9, 2)",
            "Nullable(Blob)",
            "Array(Int32",
            "Int32(1)",
            "FixedString(0)",
        ] {
            assert!(
                matches!(parse_data_type(name, &ctx), Err(Error::UnknownType(_))),
                "{name}"
            );
        }
    }

    #[test]
    fn defaults() {
        assert_eq!(DataType::Int8.default_value(), Value::Int(0));
        assert_eq!(
            DataType::Nullable(Box::new(DataType::String)).default_value(),
            Value::Null
        );
        assert_eq!(
            DataType::Tuple(vec![DataType::UInt8, DataType::String]).default_value(),
            Value::Tuple(vec![Value::UInt(0), Value::String(String::new())])
        );
    }
}
