use log::{debug, warn};

use crate::{
    Error, Result,
    block::Block,
    insert::{ValuesParser, split_insert_query},
    types::Value,
};

use super::Session;

/// An INSERT whose VALUES row holds `?` placeholders.
///
/// The statement head is sent once when the insert is prepared; the server
/// answers with a sample block that types every column. Rows are then bound,
/// added to the current batch and sent one block per [`flush_batch`]. The
/// insert is closed by [`finish`], or on drop, with an empty Data block.
///
/// [`flush_batch`]: PreparedInsert::flush_batch
/// [`finish`]: PreparedInsert::finish
pub struct PreparedInsert<'s> {
    session: &'s mut Session,
    block: Block,
    placeholders: Vec<usize>,
    rows_sent: usize,
    closed: bool,
}

impl<'s> PreparedInsert<'s> {
    pub(crate) fn new(session: &'s mut Session, sql: &str) -> Result<Self> {
        let (head, at) = split_insert_query(sql)?;
        session.send_query(head, None)?;
        let sample = session.receive_sample_block()?;

        let mut block = Block::from_header(&sample)?;
        if let Err(e) = ValuesParser::at(sql, at).parse_parameterized_row(&mut block) {
            if let Err(end) = session.end_insert() {
                warn!("closing rejected insert: {end}");
            }
            return Err(e);
        }
        let placeholders = block.placeholder_map().to_vec();
        debug!(
            "prepared insert with {} columns and {} parameters",
            block.column_count(),
            placeholders.len()
        );

        Ok(Self {
            session,
            block,
            placeholders,
            rows_sent: 0,
            closed: false,
        })
    }

    pub fn parameter_count(&self) -> usize {
        self.placeholders.len()
    }

    /// Column index bound by each parameter, in order.
    pub fn placeholder_map(&self) -> &[usize] {
        &self.placeholders
    }

    /// The batch being built.
    pub fn block(&self) -> &Block {
        &self.block
    }

    /// Stages `value` for the 1-based parameter `index` of the current row.
    pub fn bind(&mut self, index: usize, value: impl Into<Value>) -> Result<()> {
        let column = index
            .checked_sub(1)
            .and_then(|i| self.placeholders.get(i))
            .copied()
            .ok_or_else(|| {
                Error::ShapeMismatch(format!(
                    "parameter {index} out of range 1..={}",
                    self.placeholders.len()
                ))
            })?;
        self.block.set_value(column, value)
    }

    /// Appends the bound row to the current batch.
    pub fn add_batch(&mut self) -> Result<()> {
        self.block.append_row()
    }

    pub fn pending_rows(&self) -> usize {
        self.block.row_count()
    }

    /// Sends the current batch as one Data block. Returns the rows sent.
    pub fn flush_batch(&mut self) -> Result<usize> {
        if self.closed {
            return Err(Error::violation("open insert", "finished insert"));
        }
        let rows = self.block.row_count();
        if rows == 0 {
            return Ok(0);
        }
        self.session.send_data(&self.block)?;
        self.block.clear_rows();
        self.rows_sent += rows;
        debug!("sent batch of {rows} rows");
        Ok(rows)
    }

    /// Sends what is left and closes the insert. Returns the total row count.
    pub fn finish(mut self) -> Result<usize> {
        self.flush_batch()?;
        self.closed = true;
        self.session.end_insert()?;
        Ok(self.rows_sent)
    }
}

impl Drop for PreparedInsert<'_> {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if self.block.row_count() > 0 {
            warn!(
                "dropping prepared insert with {} unsent rows",
                self.block.row_count()
            );
        }
        if let Err(e) = self.session.end_insert() {
            warn!("closing prepared insert: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        protocol::{
            Session,
            testing::{id_name_country_header, spawn_server},
        },
        types::Value,
    };

    use super::*;

    #[test]
    fn binds_placeholders_around_literals() {
        let (config, server) = spawn_server(true, |conn| {
            assert_eq!(
                conn.read_query(),
                "INSERT INTO people (id, name, country) VALUES"
            );
            conn.write_progress(0);
            conn.write_data(&id_name_country_header());

            let block = conn.read_data();
            assert_eq!(block.row_count(), 2);
            assert_eq!(block.value(0, 0), Some(&Value::Int(7)));
            assert_eq!(block.value(0, 1), Some(&Value::from("Singapore")));
            assert_eq!(block.value(0, 2), Some(&Value::from("SG")));
            assert_eq!(block.value(1, 0), Some(&Value::Int(8)));
            assert_eq!(block.value(1, 2), Some(&Value::from("MY")));

            let block = conn.read_data();
            assert_eq!(block.row_count(), 1);
            assert!(conn.read_data().is_empty());
            conn.write_end_of_stream();
        });

        let mut session = Session::connect(config).unwrap();
        let mut insert = session
            .prepare_insert("INSERT INTO people (id, name, country) VALUES (?, 'Singapore', ?)")
            .unwrap();
        assert_eq!(insert.placeholder_map(), &[0, 2]);
        assert_eq!(insert.parameter_count(), 2);

        for (id, country) in [(7, "SG"), (8, "MY")] {
            insert.bind(1, id).unwrap();
            insert.bind(2, country).unwrap();
            insert.add_batch().unwrap();
        }
        assert_eq!(insert.flush_batch().unwrap(), 2);

        insert.bind(1, 9).unwrap();
        insert.bind(2, "ID").unwrap();
        insert.add_batch().unwrap();
        assert_eq!(insert.finish().unwrap(), 3);
        server.join().unwrap();
    }

    #[test]
    fn unbound_parameter_is_rejected() {
        let (config, server) = spawn_server(false, |conn| {
            conn.read_query();
            conn.write_data(&id_name_country_header());
            assert!(conn.read_data().is_empty());
            conn.write_end_of_stream();
        });

        let mut session = Session::connect(config).unwrap();
        let mut insert = session
            .prepare_insert("INSERT INTO people VALUES (?, 'Singapore', ?)")
            .unwrap();
        insert.bind(1, 7).unwrap();
        assert!(matches!(
            insert.add_batch(),
            Err(Error::RowEncoding { column, .. }) if column == "country"
        ));
        assert!(matches!(insert.bind(3, 1), Err(Error::ShapeMismatch(_))));
        assert!(matches!(insert.bind(0, 1), Err(Error::ShapeMismatch(_))));
        drop(insert);
        server.join().unwrap();
    }

    #[test]
    fn arity_mismatch_fails_prepare() {
        let (config, server) = spawn_server(false, |conn| {
            conn.read_query();
            conn.write_data(&id_name_country_header());
            assert!(conn.read_data().is_empty());
            conn.write_end_of_stream();
        });

        let mut session = Session::connect(config).unwrap();
        assert!(matches!(
            session.prepare_insert("INSERT INTO people VALUES (?, ?)"),
            Err(Error::Syntax { .. })
        ));
        server.join().unwrap();
    }
}
