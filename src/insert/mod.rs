//! INSERT value-clause parsing.
//!
//! The server is sent only the head of an INSERT statement, up to and
//! including `VALUES`. The value list itself is parsed on the client and
//! shipped as a block, typed by the sample block the server answers with.
//!
//! # Key Components
//!
//! - [`split_insert_query`]: finds where the value list starts.
//! - [`ValuesParser`]: literal mode for plain inserts, parameterized mode
//!   for prepared inserts with `?` placeholders.
//! - [`lexer::Lexer`]: the cursor-based tokenizer both modes share.
pub mod lexer;
mod values;

pub use values::ValuesParser;

use crate::{Error, Result};

/// Splits `sql` at its top-level `VALUES` keyword.
///
/// Returns the statement head to send to the server (ending with
/// `VALUES`) and the byte offset where the value list starts.
pub fn split_insert_query(sql: &str) -> Result<(&str, usize)> {
    let bytes = sql.as_bytes();
    let mut quote: Option<u8> = None;
    let mut depth = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' | b'`' => quote = Some(b),
                b'(' => depth += 1,
                b')' => depth = depth.saturating_sub(1),
                _ if depth == 0 && is_values_keyword(bytes, i) => {
                    let end = i + "VALUES".len();
                    return Ok((&sql[..end], end));
                }
                _ => {}
            },
        }
        i += 1;
    }
    Err(Error::Syntax {
        position: sql.len(),
        reason: "INSERT statement has no VALUES clause".into(),
    })
}

fn is_values_keyword(bytes: &[u8], at: usize) -> bool {
    let word = b"values";
    let Some(candidate) = bytes.get(at..at + word.len()) else {
        return false;
    };
    let is_ident = |b: &u8| b.is_ascii_alphanumeric() || *b == b'_';
    candidate.eq_ignore_ascii_case(word)
        && (at == 0 || !is_ident(&bytes[at - 1]))
        && !bytes.get(at + word.len()).is_some_and(is_ident)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_at_values() {
        let sql = "INSERT INTO t (id, name) VALUES (1, 'a')";
        let (head, at) = split_insert_query(sql).unwrap();
        assert_eq!(head, "INSERT INTO t (id, name) VALUES");
        assert_eq!(&sql[at..], " (1, 'a')");
    }

    #[test]
    fn ignores_quoted_and_embedded_keywords() {
        let sql = "insert into `values` (my_values) values ('values')";
        let (head, _) = split_insert_query(sql).unwrap();
        assert_eq!(head, "insert into `values` (my_values) values");
    }

    #[test]
    fn missing_clause_is_syntax_error() {
        assert!(matches!(
            split_insert_query("INSERT INTO t SELECT 1"),
            Err(Error::Syntax { .. })
        ));
    }
}
