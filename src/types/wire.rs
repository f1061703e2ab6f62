use chrono::{DateTime, Days, NaiveDate};

use crate::{
    Error, Result,
    binary::{BinaryDeserializer, BinarySerializer},
    buffer::{BufferedRead, BufferedWrite},
};

use super::{DataType, MAX_PREALLOCATED, Value};

fn out_of_range(ty: &DataType, value: &Value) -> String {
    format!("{value} is out of range for {ty}")
}

fn mismatch(ty: &DataType, value: &Value) -> String {
    format!("cannot store {} in {ty}", value.kind())
}

fn days_since_epoch(date: &NaiveDate) -> i64 {
    (*date - NaiveDate::default()).num_days()
}

impl DataType {
    /// Checks that `value` can be written into a column of this type.
    ///
    /// Callers validate a whole row before writing any of it, so a rejected
    /// value never leaves a block with uneven columns.
    pub fn check(&self, value: &Value) -> std::result::Result<(), String> {
        match (self, value) {
            (DataType::Nullable(_), Value::Null) => Ok(()),
            (DataType::Nullable(nested), v) => nested.check(v),
            (_, Value::Null) => Err(format!("NULL in non-nullable {self}")),
            (DataType::Array(nested), Value::Array(items)) => {
                items.iter().try_for_each(|item| nested.check(item))
            }
            (DataType::Tuple(elements), Value::Tuple(items)) => {
                if elements.len() != items.len() {
                    return Err(format!(
                        "{self} expects {} elements, got {}",
                        elements.len(),
                        items.len()
                    ));
                }
                elements
                    .iter()
                    .zip(items)
                    .try_for_each(|(ty, item)| ty.check(item))
            }
            (DataType::Array(_) | DataType::Tuple(_), v) => Err(mismatch(self, v)),
            // scalars are checked by serializing into a scratch buffer
            (ty, v) => ty.encode_scalar(v).map(|_| ()),
        }
    }

    pub(crate) fn encode_scalar(&self, value: &Value) -> std::result::Result<Vec<u8>, String> {
        let ranged = |ok: bool| if ok { Ok(()) } else { Err(out_of_range(self, value)) };
        let bytes = match self {
            DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64 => {
                let v = value.as_i64().ok_or_else(|| mismatch(self, value))?;
                match self {
                    DataType::Int8 => i8::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    DataType::Int16 => i16::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    DataType::Int32 => i32::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    _ => Ok(v.to_le_bytes().to_vec()),
                }
                .map_err(|_| out_of_range(self, value))?
            }
            DataType::UInt8 | DataType::UInt16 | DataType::UInt32 | DataType::UInt64 => {
                let v = value.as_u64().ok_or_else(|| mismatch(self, value))?;
                match self {
                    DataType::UInt8 => u8::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    DataType::UInt16 => u16::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    DataType::UInt32 => u32::try_from(v).map(|v| v.to_le_bytes().to_vec()),
                    _ => Ok(v.to_le_bytes().to_vec()),
                }
                .map_err(|_| out_of_range(self, value))?
            }
            DataType::Float32 => {
                let v = value.as_f64().ok_or_else(|| mismatch(self, value))?;
                (v as f32).to_bits().to_le_bytes().to_vec()
            }
            DataType::Float64 => {
                let v = value.as_f64().ok_or_else(|| mismatch(self, value))?;
                v.to_bits().to_le_bytes().to_vec()
            }
            DataType::String => {
                let s = value.as_str().ok_or_else(|| mismatch(self, value))?;
                let mut out = Vec::with_capacity(s.len() + 2);
                let mut len = [0u8; crate::binary::MAX_VARINT_LEN];
                let n = crate::binary::encode_varint(s.len() as u64, &mut len);
                out.extend_from_slice(&len[..n]);
                out.extend_from_slice(s.as_bytes());
                out
            }
            DataType::FixedString(size) => {
                let s = value.as_str().ok_or_else(|| mismatch(self, value))?;
                if s.len() > *size {
                    return Err(format!("'{s}' is longer than {self}"));
                }
                let mut out = s.as_bytes().to_vec();
                out.resize(*size, 0);
                out
            }
            DataType::Date => {
                let days = match value {
                    Value::Date(d) => days_since_epoch(d),
                    v => v.as_i64().ok_or_else(|| mismatch(self, value))?,
                };
                ranged(u16::try_from(days).is_ok())?;
                (days as u16).to_le_bytes().to_vec()
            }
            DataType::DateTime { .. } => {
                let secs = match value {
                    Value::DateTime(dt) => dt.timestamp(),
                    v => v.as_i64().ok_or_else(|| mismatch(self, value))?,
                };
                ranged(u32::try_from(secs).is_ok())?;
                (secs as u32).to_le_bytes().to_vec()
            }
            DataType::Nullable(_) | DataType::Array(_) | DataType::Tuple(_) => {
                return Err(format!("{self} is not a scalar type"));
            }
        };
        Ok(bytes)
    }

    /// Writes one scalar value in its binary form.
    pub fn serialize_value<W: BufferedWrite>(
        &self,
        value: &Value,
        out: &mut BinarySerializer<W>,
    ) -> Result<()> {
        let bytes = self.encode_scalar(value).map_err(|reason| Error::RowEncoding {
            column: self.name(),
            reason,
        })?;
        out.write_bytes(&bytes)
    }

    fn deserialize_value<R: BufferedRead>(&self, de: &mut BinaryDeserializer<R>) -> Result<Value> {
        let value = match self {
            DataType::Int8 => Value::Int(de.read_i8()? as i64),
            DataType::Int16 => Value::Int(de.read_i16()? as i64),
            DataType::Int32 => Value::Int(de.read_i32()? as i64),
            DataType::Int64 => Value::Int(de.read_i64()?),
            DataType::UInt8 => Value::UInt(de.read_u8()? as u64),
            DataType::UInt16 => Value::UInt(de.read_u16()? as u64),
            DataType::UInt32 => Value::UInt(de.read_u32()? as u64),
            DataType::UInt64 => Value::UInt(de.read_u64()?),
            DataType::Float32 => Value::Float(de.read_f32()? as f64),
            DataType::Float64 => Value::Float(de.read_f64()?),
            DataType::String => {
                Value::String(String::from_utf8_lossy(&de.read_binary()?).into_owned())
            }
            DataType::FixedString(size) => {
                let bytes = de.read_bytes(*size)?;
                let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
                Value::String(String::from_utf8_lossy(&bytes[..end]).into_owned())
            }
            DataType::Date => {
                let days = de.read_u16()?;
                let date = NaiveDate::default()
                    .checked_add_days(Days::new(days as u64))
                    .ok_or_else(|| Error::violation("valid Date", days.to_string()))?;
                Value::Date(date)
            }
            DataType::DateTime { timezone, .. } => {
                let secs = de.read_u32()?;
                let dt = DateTime::from_timestamp(secs as i64, 0)
                    .ok_or_else(|| Error::violation("valid DateTime", secs.to_string()))?;
                Value::DateTime(dt.with_timezone(timezone))
            }
            DataType::Nullable(_) | DataType::Array(_) | DataType::Tuple(_) => {
                let mut values = self.deserialize_bulk(1, de)?;
                values.pop().unwrap_or(Value::Null)
            }
        };
        Ok(value)
    }

    /// Reads `rows` values laid out column-wise, recursing into composites.
    pub fn deserialize_bulk<R: BufferedRead>(
        &self,
        rows: usize,
        de: &mut BinaryDeserializer<R>,
    ) -> Result<Vec<Value>> {
        match self {
            DataType::Nullable(nested) => {
                let flags = de.read_bytes(rows)?;
                let values = nested.deserialize_bulk(rows, de)?;
                Ok(flags
                    .into_iter()
                    .zip(values)
                    .map(|(null, v)| if null != 0 { Value::Null } else { v })
                    .collect())
            }
            DataType::Array(nested) => {
                let mut offsets = Vec::with_capacity(rows.min(MAX_PREALLOCATED));
                for _ in 0..rows {
                    offsets.push(de.read_u64()?);
                }
                let total = offsets.last().copied().unwrap_or(0) as usize;
                let mut items = nested.deserialize_bulk(total, de)?.into_iter();
                let mut out = Vec::with_capacity(rows.min(MAX_PREALLOCATED));
                let mut previous = 0u64;
                for offset in offsets {
                    let len = offset.checked_sub(previous).ok_or_else(|| {
                        Error::violation("non-decreasing array offsets", offset.to_string())
                    })?;
                    out.push(Value::Array(items.by_ref().take(len as usize).collect()));
                    previous = offset;
                }
                Ok(out)
            }
            DataType::Tuple(elements) => {
                let mut columns = Vec::with_capacity(elements.len());
                for element in elements {
                    columns.push(element.deserialize_bulk(rows, de)?.into_iter());
                }
                let mut out = Vec::with_capacity(rows.min(MAX_PREALLOCATED));
                for _ in 0..rows {
                    let row = columns
                        .iter_mut()
                        .map(|c| c.next().unwrap_or(Value::Null))
                        .collect();
                    out.push(Value::Tuple(row));
                }
                Ok(out)
            }
            scalar => {
                let mut out = Vec::with_capacity(rows.min(MAX_PREALLOCATED));
                for _ in 0..rows {
                    out.push(scalar.deserialize_value(de)?);
                }
                Ok(out)
            }
        }
    }
}
