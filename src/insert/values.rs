use log::trace;

use crate::{
    Result,
    block::Block,
    types::Value,
};

use super::lexer::{Lexer, Token};

/// Parses the value list of an INSERT statement into a block.
pub struct ValuesParser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> ValuesParser<'a> {
    /// `sql` should start at (or just before) the first `(` of the clause.
    pub fn new(sql: &'a str) -> Self {
        Self {
            lexer: Lexer::new(sql),
        }
    }

    /// Starts parsing at byte offset `pos` of `sql`.
    pub fn at(sql: &'a str, pos: usize) -> Self {
        Self {
            lexer: Lexer::at(sql, pos),
        }
    }

    /// Appends every literal row of the clause to `block`, returning the row count.
    pub fn parse_literal_rows(&mut self, block: &mut Block) -> Result<usize> {
        let mut rows = 0;
        loop {
            match self.lexer.peek()? {
                Token::Eof | Token::Semicolon if rows > 0 => break,
                Token::Comma if rows > 0 => {
                    self.lexer.next_token()?;
                }
                _ => {}
            }
            self.row(block, false)?;
            block.append_row()?;
            rows += 1;
        }
        self.finish()?;
        trace!("parsed {rows} literal rows");
        Ok(rows)
    }

    /// Reads the single row of a prepared insert.
    ///
    /// Literals become column defaults for every future row; `?` positions
    /// are left for binding and show up in the block's placeholder map.
    pub fn parse_parameterized_row(&mut self, block: &mut Block) -> Result<usize> {
        let placeholders = self.row(block, true)?;
        self.finish()?;
        Ok(placeholders)
    }

    fn finish(&mut self) -> Result<()> {
        if self.lexer.peek()? == Token::Semicolon {
            self.lexer.next_token()?;
        }
        match self.lexer.peek()? {
            Token::Eof => Ok(()),
            other => Err(self
                .lexer
                .syntax_error(format!("unexpected {other} after VALUES clause"))),
        }
    }

    fn row(&mut self, block: &mut Block, parameterized: bool) -> Result<usize> {
        let columns = block.column_count();
        let mut placeholders = 0;
        self.lexer.expect(Token::LParen)?;
        for index in 0..columns {
            if index > 0 {
                self.lexer.expect(Token::Comma)?;
            }
            if parameterized && self.lexer.peek()? == Token::Placeholder {
                self.lexer.next_token()?;
                placeholders += 1;
                continue;
            }
            let value = self.literal(block, index)?;
            if parameterized {
                block.set_default(index, value)?;
            } else {
                block.set_value(index, value)?;
            }
            block.inc_placeholder_indexes(index);
        }
        self.lexer.expect(Token::RParen)?;
        Ok(placeholders)
    }

    fn literal(&mut self, block: &Block, index: usize) -> Result<Value> {
        if self.lexer.peek()? == Token::Placeholder {
            return Err(self
                .lexer
                .syntax_error("'?' is only allowed in a prepared insert"));
        }
        let Some(column) = block.column(index) else {
            return Err(self.lexer.syntax_error("more values than columns"));
        };
        column.data_type().deserialize_text(&mut self.lexer)
    }
}

#[cfg(test)]
mod tests {
    use crate::{Error, types::DataType};

    use super::*;

    fn id_name() -> Block {
        Block::for_insert([("id", DataType::Int32), ("name", DataType::String)]).unwrap()
    }

    #[test]
    fn literal_rows_are_appended() {
        let mut block = id_name();
        let rows = ValuesParser::new("(1,'a'),(2,'b')")
            .parse_literal_rows(&mut block)
            .unwrap();
        assert_eq!(rows, 2);
        assert_eq!(block.row_count(), 2);
        assert!(block.columns().iter().all(|c| c.len() == 2));
        assert!(block.placeholder_map().is_empty());
    }

    #[test]
    fn literal_rows_accept_trailing_semicolon() {
        let mut block = id_name();
        let rows = ValuesParser::new(" (1, 'a') ;")
            .parse_literal_rows(&mut block)
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn parameterized_row_builds_placeholder_map() {
        let mut block = Block::for_insert([
            ("id", DataType::Int32),
            ("name", DataType::String),
            ("country", DataType::String),
        ])
        .unwrap();
        let placeholders = ValuesParser::new("(?, 'Singapore', ?)")
            .parse_parameterized_row(&mut block)
            .unwrap();
        assert_eq!(placeholders, 2);
        assert_eq!(block.placeholder_map(), &[0, 2]);
        assert_eq!(block.get_value(1), Some(&Value::from("Singapore")));

        let map = block.placeholder_map().to_vec();
        block.set_value(map[0], 7).unwrap();
        block.set_value(map[1], "SG").unwrap();
        block.append_row().unwrap();
        assert_eq!(block.row_count(), 1);
        assert_eq!(block.get_value(1), Some(&Value::from("Singapore")));
        assert_eq!(block.get_value(0), None);
    }

    #[test]
    fn arity_mismatch_is_syntax_error() {
        for sql in ["(1)", "(1, 'a', 2)", "(1 'a')"] {
            let mut block = id_name();
            assert!(
                matches!(
                    ValuesParser::new(sql).parse_literal_rows(&mut block),
                    Err(Error::Syntax { .. })
                ),
                "{sql}"
            );
        }
    }

    #[test]
    fn placeholder_rejected_in_literal_mode() {
        let mut block = id_name();
        let err = ValuesParser::new("(?, 'a')")
            .parse_literal_rows(&mut block)
            .unwrap_err();
        assert!(err.to_string().contains("prepared insert"));
    }

    #[test]
    #[should_panic(expected = "Syntax")]
    fn trailing_garbage() {
        let mut block = id_name();
        ValuesParser::new("(1, 'a') x")
            .parse_literal_rows(&mut block)
            .unwrap();
    }
}
