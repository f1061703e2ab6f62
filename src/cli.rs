//! CLI utilities for chnative.
//!
//! The prompt loop and output formatting used by the `chnative_cli` binary.
use std::io::{self, BufRead, Write};

use crate::{Block, QueryResult, Result};

/// Possible commands from a user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    /// Exit command `.exit`
    Exit,
    /// Ping command `.ping`
    Ping,
    /// INSERT statement with a literal VALUES clause
    Insert(String),
    /// Any other SQL statement
    Query(String),
}

/// Prompt user for a command.
///
/// Returns `Ok(None)` for a blank line and `Err` for an unknown dot-command.
pub fn prompt<R, W>(mut reader: R, mut writer: W) -> io::Result<std::result::Result<Option<Command>, String>>
where
    R: BufRead,
    W: Write,
{
    let mut s = String::default();
    write!(&mut writer, "> ")?;
    writer.flush()?;

    if reader.read_line(&mut s)? == 0 {
        return Ok(Ok(Some(Command::Exit)));
    }

    let command = match s.trim() {
        "" => None,
        ".exit" => Some(Command::Exit),
        ".ping" => Some(Command::Ping),
        s if s.starts_with('.') => return Ok(Err(format!("unrecognized command '{s}'"))),
        s if is_insert(s) => Some(Command::Insert(s.to_string())),
        s => Some(Command::Query(s.to_string())),
    };
    Ok(Ok(command))
}

fn is_insert(sql: &str) -> bool {
    sql.split_whitespace()
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case("insert"))
        && sql.to_ascii_lowercase().contains("values")
}

/// Writes the rows of `block` tab-separated, one line per row.
pub fn print_block<W: Write>(mut writer: W, block: &Block) -> io::Result<()> {
    for row in 0..block.row_count() {
        let cells: Vec<String> = (0..block.column_count())
            .map(|col| block.value(row, col).map(ToString::to_string).unwrap_or_default())
            .collect();
        writeln!(writer, "{}", cells.join("\t"))?;
    }
    Ok(())
}

/// Writes the column names, every data block and the totals of `result`.
pub fn print_result<W: Write>(mut writer: W, result: &mut QueryResult<'_>) -> Result<()> {
    if result.header().column_count() > 0 {
        writeln!(writer, "{}", result.column_names().join("\t"))?;
    }
    for block in result.by_ref() {
        print_block(&mut writer, &block?)?;
    }
    if let Some(totals) = result.totals() {
        writeln!(writer, "totals:")?;
        print_block(&mut writer, totals)?;
    }
    Ok(())
}
