//! Columnar data blocks.
//!
//! A [`Block`] is a rectangular fragment of a table: named, typed columns
//! that all hold the same number of rows. Blocks arrive from the server
//! fully materialized, one [`Value`] per cell, and are built on the client
//! row by row for inserts. Insert blocks keep their columns in wire form
//! ([`ColumnWriter`]) so that sending a block is a straight copy of each
//! column buffer.
//!
//! # Key Components
//!
//! - [`Block`]: the container, its staged row and the placeholder map of a
//!   prepared insert.
//! - [`Column`]: one named column, either materialized or buffered.
//! - [`ColumnWriter`]: per-type accumulator (scalar, nullable, array, tuple).
//! - [`BlockSettings`]: the info fields that open every block on the wire.
//!
//! # Wire Format
//!
//! ```text
//! settings | varint columns | varint rows | (name, type name, column data)*
//! ```
//!
//! Column data is laid out column-wise and depth-first: an Array writes its
//! cumulative offsets and then its nested column, a Nullable writes one null
//! flag byte per row and then its nested column, a Tuple writes each element
//! column in declared order.
//!
//! # See Also
//!
//! - [`types`](crate::types): type descriptors used to encode each value.
//! - [`insert`](crate::insert): fills staged rows from a VALUES clause.
mod column;
mod settings;

use std::collections::HashMap;

use crate::{
    Error, Result,
    binary::{BinaryDeserializer, BinarySerializer},
    buffer::{BufferedRead, BufferedWrite},
    protocol::ServerContext,
    types::{DataType, MAX_PREALLOCATED, Value, parse_data_type},
};

pub use column::{COLUMN_BUFFER_CEILING, Column, ColumnData, ColumnWriter};
pub use settings::BlockSettings;

#[derive(Debug, Clone, Default)]
pub struct Block {
    settings: BlockSettings,
    columns: Vec<Column>,
    row_count: usize,
    /// Column name to 1-based position.
    positions: HashMap<String, usize>,
    staged: Vec<Option<Value>>,
    /// Values restored into `staged` after every appended row.
    defaults: Vec<Option<Value>>,
    placeholder_indexes: Vec<usize>,
    literal_count: usize,
}

impl Block {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Wraps already populated columns. Every column must hold `row_count` rows.
    pub fn from_columns(columns: Vec<Column>, row_count: usize) -> Result<Self> {
        if let Some(column) = columns.iter().find(|c| c.len() != row_count) {
            return Err(Error::ShapeMismatch(format!(
                "column '{}' has {} rows, block declares {row_count}",
                column.name(),
                column.len()
            )));
        }

        let mut positions = HashMap::with_capacity(columns.len());
        for (i, column) in columns.iter().enumerate() {
            if positions.insert(column.name().to_string(), i + 1).is_some() {
                return Err(Error::ShapeMismatch(format!(
                    "duplicate column '{}'",
                    column.name()
                )));
            }
        }

        let count = columns.len();
        Ok(Self {
            settings: BlockSettings::default(),
            columns,
            row_count,
            positions,
            staged: vec![None; count],
            defaults: vec![None; count],
            placeholder_indexes: (0..count).collect(),
            literal_count: 0,
        })
    }

    /// An empty insert block with the given column names and types.
    pub fn for_insert<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = (S, DataType)>,
        S: Into<String>,
    {
        let columns = columns
            .into_iter()
            .map(|(name, ty)| Column::buffered(name, ty))
            .collect();
        Self::from_columns(columns, 0)
    }

    /// An empty insert block shaped like the sample block the server sent.
    pub fn from_header(header: &Block) -> Result<Self> {
        Self::for_insert(
            header
                .columns
                .iter()
                .map(|c| (c.name().to_string(), c.data_type().clone())),
        )
    }

    /// Same columns, no rows.
    pub fn to_header(&self) -> Self {
        let columns: Vec<Column> = self
            .columns
            .iter()
            .map(|c| Column::materialized(c.name(), c.data_type().clone(), Vec::new()))
            .collect();
        let count = columns.len();
        Self {
            settings: self.settings,
            columns,
            row_count: 0,
            positions: self.positions.clone(),
            staged: vec![None; count],
            defaults: vec![None; count],
            placeholder_indexes: (0..count).collect(),
            literal_count: 0,
        }
    }

    /// Reads one block. Compressed regions are the caller's business.
    pub fn read<R: BufferedRead>(
        de: &mut BinaryDeserializer<R>,
        server: &ServerContext,
    ) -> Result<Self> {
        let settings = BlockSettings::read(de)?;
        let column_count = de.read_varint()? as usize;
        let row_count = de.read_varint()? as usize;

        let mut columns = Vec::with_capacity(column_count.min(MAX_PREALLOCATED));
        for _ in 0..column_count {
            let name = de.read_str()?;
            let type_name = de.read_str()?;
            let data_type = parse_data_type(&type_name, server)?;
            let values = data_type.deserialize_bulk(row_count, de)?;
            columns.push(Column::materialized(name, data_type, values));
        }

        let mut block = Self::from_columns(columns, row_count)?;
        block.settings = settings;
        Ok(block)
    }

    pub fn write<W: BufferedWrite>(&self, out: &mut BinarySerializer<W>) -> Result<()> {
        self.settings.write(out)?;
        out.write_varint(self.columns.len() as u64)?;
        out.write_varint(self.row_count as u64)?;
        for column in &self.columns {
            out.write_str(column.name())?;
            out.write_str(&column.data_type().name())?;
            column.write_data(out)?;
        }
        Ok(())
    }

    pub fn settings(&self) -> &BlockSettings {
        &self.settings
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn is_empty(&self) -> bool {
        self.row_count == 0
    }

    /// Cell of a materialized block.
    pub fn value(&self, row: usize, column: usize) -> Option<&Value> {
        self.columns.get(column)?.value(row)
    }

    /// 1-based wire position of the column called `name`.
    pub fn position_of(&self, name: &str) -> Result<usize> {
        self.positions
            .get(name)
            .copied()
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))
    }

    fn check_index(&self, index: usize) -> Result<()> {
        if index >= self.columns.len() {
            return Err(Error::ShapeMismatch(format!(
                "column index {index} out of range for {} columns",
                self.columns.len()
            )));
        }
        Ok(())
    }

    /// Stages `value` for the 0-based column `index` of the next row.
    pub fn set_value(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        self.check_index(index)?;
        self.staged[index] = Some(value.into());
        Ok(())
    }

    pub fn get_value(&self, index: usize) -> Option<&Value> {
        self.staged.get(index)?.as_ref()
    }

    /// Makes `value` the staged value of column `index` for every future row.
    pub fn set_default(&mut self, index: usize, value: Value) -> Result<()> {
        self.check_index(index)?;
        self.defaults[index] = Some(value.clone());
        self.staged[index] = Some(value);
        Ok(())
    }

    /// Appends the staged row.
    ///
    /// Every staged value is checked before any column is touched, so a
    /// rejected row leaves the block exactly as it was.
    pub fn append_row(&mut self) -> Result<()> {
        for (column, staged) in self.columns.iter().zip(&self.staged) {
            let value = staged.as_ref().ok_or_else(|| Error::RowEncoding {
                column: column.name().to_string(),
                reason: "no value staged".into(),
            })?;
            column
                .data_type()
                .check(value)
                .map_err(|reason| Error::RowEncoding {
                    column: column.name().to_string(),
                    reason,
                })?;
        }

        let staged = std::mem::replace(&mut self.staged, self.defaults.clone());
        for (column, value) in self.columns.iter_mut().zip(staged) {
            if let Some(value) = value {
                column.push(value)?;
            }
        }
        self.row_count += 1;
        Ok(())
    }

    /// Drops every appended row, keeping columns, defaults and placeholders.
    pub fn clear_rows(&mut self) {
        self.columns.iter_mut().for_each(Column::clear);
        self.row_count = 0;
        self.staged = self.defaults.clone();
    }

    /// Records a literal bound at `column`: placeholders at or after it shift right.
    pub fn inc_placeholder_indexes(&mut self, column: usize) {
        for index in self.placeholder_indexes.iter_mut().skip(column) {
            *index += 1;
        }
        self.literal_count += 1;
    }

    /// Column index for each `?`, in left-to-right order.
    pub fn placeholder_map(&self) -> &[usize] {
        let effective = self
            .placeholder_indexes
            .len()
            .saturating_sub(self.literal_count);
        &self.placeholder_indexes[..effective]
    }
}
