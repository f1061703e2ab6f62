use crate::{
    Error, Result,
    binary::BinarySerializer,
    buffer::{BufferedWrite, ByteArrayWriter},
    types::{DataType, Value},
};

/// Ceiling for the doubling growth of a column buffer before it is chunked.
pub const COLUMN_BUFFER_CEILING: usize = 64 * 1024;

/// Column-wise accumulator for values appended row by row.
///
/// Each variant owns the buffers for its own level of nesting so the whole
/// column can later be flushed as one contiguous unit.
#[derive(Debug, Clone)]
pub enum ColumnWriter {
    Scalar {
        data_type: DataType,
        data: ByteArrayWriter,
    },
    Nullable {
        nulls: ByteArrayWriter,
        placeholder: Value,
        nested: Box<ColumnWriter>,
    },
    Array {
        offsets: ByteArrayWriter,
        total: u64,
        nested: Box<ColumnWriter>,
    },
    Tuple {
        elements: Vec<ColumnWriter>,
    },
}

impl ColumnWriter {
    pub fn new(data_type: &DataType) -> Self {
        let buffer = || ByteArrayWriter::new(COLUMN_BUFFER_CEILING);
        match data_type {
            DataType::Nullable(nested) => ColumnWriter::Nullable {
                nulls: buffer(),
                placeholder: nested.default_value(),
                nested: Box::new(ColumnWriter::new(nested)),
            },
            DataType::Array(nested) => ColumnWriter::Array {
                offsets: buffer(),
                total: 0,
                nested: Box::new(ColumnWriter::new(nested)),
            },
            DataType::Tuple(elements) => ColumnWriter::Tuple {
                elements: elements.iter().map(ColumnWriter::new).collect(),
            },
            scalar => ColumnWriter::Scalar {
                data_type: scalar.clone(),
                data: buffer(),
            },
        }
    }

    /// Appends one value. Callers are expected to have validated it.
    pub fn write(&mut self, value: &Value) -> Result<()> {
        match self {
            ColumnWriter::Scalar { data_type, data } => {
                let bytes = data_type
                    .encode_scalar(value)
                    .map_err(|reason| Error::RowEncoding {
                        column: data_type.name(),
                        reason,
                    })?;
                data.write_bytes(&bytes)
            }
            ColumnWriter::Nullable {
                nulls,
                placeholder,
                nested,
            } => {
                // nulls still take a default slot in the nested column
                if value.is_null() {
                    nulls.write_byte(1)?;
                    nested.write(placeholder)
                } else {
                    nulls.write_byte(0)?;
                    nested.write(value)
                }
            }
            ColumnWriter::Array {
                offsets,
                total,
                nested,
            } => {
                let Value::Array(items) = value else {
                    return Err(encoding_error("array", value));
                };
                for item in items {
                    nested.write(item)?;
                }
                *total += items.len() as u64;
                offsets.write_bytes(&total.to_le_bytes())
            }
            ColumnWriter::Tuple { elements } => {
                let Value::Tuple(items) = value else {
                    return Err(encoding_error("tuple", value));
                };
                if items.len() != elements.len() {
                    return Err(Error::RowEncoding {
                        column: "tuple".into(),
                        reason: format!(
                            "expected {} elements, got {}",
                            elements.len(),
                            items.len()
                        ),
                    });
                }
                for (element, item) in elements.iter_mut().zip(items) {
                    element.write(item)?;
                }
                Ok(())
            }
        }
    }

    /// Writes the accumulated column depth-first without consuming it.
    pub fn flush_to<W: BufferedWrite>(&self, out: &mut BinarySerializer<W>) -> Result<()> {
        match self {
            ColumnWriter::Scalar { data, .. } => copy_chunks(data, out),
            ColumnWriter::Nullable { nulls, nested, .. } => {
                copy_chunks(nulls, out)?;
                nested.flush_to(out)
            }
            ColumnWriter::Array {
                offsets, nested, ..
            } => {
                copy_chunks(offsets, out)?;
                nested.flush_to(out)
            }
            ColumnWriter::Tuple { elements } => {
                elements.iter().try_for_each(|element| element.flush_to(out))
            }
        }
    }

    pub fn clear(&mut self) {
        match self {
            ColumnWriter::Scalar { data, .. } => data.clear(),
            ColumnWriter::Nullable { nulls, nested, .. } => {
                nulls.clear();
                nested.clear();
            }
            ColumnWriter::Array {
                offsets,
                total,
                nested,
            } => {
                offsets.clear();
                *total = 0;
                nested.clear();
            }
            ColumnWriter::Tuple { elements } => elements.iter_mut().for_each(ColumnWriter::clear),
        }
    }
}

fn copy_chunks<W: BufferedWrite>(
    buffer: &ByteArrayWriter,
    out: &mut BinarySerializer<W>,
) -> Result<()> {
    buffer.chunks().try_for_each(|chunk| out.write_bytes(chunk))
}

fn encoding_error(expected: &str, value: &Value) -> Error {
    Error::RowEncoding {
        column: expected.into(),
        reason: format!("expected {expected}, got {}", value.kind()),
    }
}

#[derive(Debug, Clone)]
pub enum ColumnData {
    /// Values read from the server.
    Materialized(Vec<Value>),
    /// Values appended for transmission, already in wire form.
    Buffered { writer: ColumnWriter, rows: usize },
}

/// One named, typed column of a [`Block`](super::Block).
#[derive(Debug, Clone)]
pub struct Column {
    name: String,
    data_type: DataType,
    data: ColumnData,
}

impl Column {
    pub fn materialized(name: impl Into<String>, data_type: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            data_type,
            data: ColumnData::Materialized(values),
        }
    }

    pub fn buffered(name: impl Into<String>, data_type: DataType) -> Self {
        let writer = ColumnWriter::new(&data_type);
        Self {
            name: name.into(),
            data_type,
            data: ColumnData::Buffered { writer, rows: 0 },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_type(&self) -> &DataType {
        &self.data_type
    }

    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    pub fn len(&self) -> usize {
        match &self.data {
            ColumnData::Materialized(values) => values.len(),
            ColumnData::Buffered { rows, .. } => *rows,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Value at `row`, only available for materialized columns.
    pub fn value(&self, row: usize) -> Option<&Value> {
        match &self.data {
            ColumnData::Materialized(values) => values.get(row),
            ColumnData::Buffered { .. } => None,
        }
    }

    pub(crate) fn push(&mut self, value: Value) -> Result<()> {
        let name = &self.name;
        match &mut self.data {
            ColumnData::Materialized(values) => values.push(value),
            ColumnData::Buffered { writer, rows } => {
                writer.write(&value).map_err(|e| match e {
                    Error::RowEncoding { reason, .. } => Error::RowEncoding {
                        column: name.clone(),
                        reason,
                    },
                    other => other,
                })?;
                *rows += 1;
            }
        }
        Ok(())
    }

    pub(crate) fn clear(&mut self) {
        match &mut self.data {
            ColumnData::Materialized(values) => values.clear(),
            ColumnData::Buffered { writer, rows } => {
                writer.clear();
                *rows = 0;
            }
        }
    }

    /// Writes the column payload, without name and type.
    pub fn write_data<W: BufferedWrite>(&self, out: &mut BinarySerializer<W>) -> Result<()> {
        match &self.data {
            ColumnData::Buffered { writer, .. } => writer.flush_to(out),
            ColumnData::Materialized(values) => {
                let mut writer = ColumnWriter::new(&self.data_type);
                for value in values {
                    writer.write(value)?;
                }
                writer.flush_to(out)
            }
        }
    }
}
