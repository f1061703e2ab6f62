use std::fmt;

use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq)]
pub enum Token<'a> {
    /// Numeric literal as written, sign included.
    Number(&'a str),
    /// Quoted string literal with escapes resolved.
    String(String),
    Ident(&'a str),
    Placeholder,
    LParen,
    RParen,
    LBracket,
    RBracket,
    Comma,
    Semicolon,
    Eof,
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Number(n) => write!(f, "number {n}"),
            Token::String(s) => write!(f, "string '{s}'"),
            Token::Ident(i) => write!(f, "identifier {i}"),
            Token::Placeholder => write!(f, "'?'"),
            Token::LParen => write!(f, "'('"),
            Token::RParen => write!(f, "')'"),
            Token::LBracket => write!(f, "'['"),
            Token::RBracket => write!(f, "']'"),
            Token::Comma => write!(f, "','"),
            Token::Semicolon => write!(f, "';'"),
            Token::Eof => write!(f, "end of input"),
        }
    }
}

/// Cursor-based tokenizer over a SQL fragment.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    sql: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    pub fn new(sql: &'a str) -> Self {
        Self { sql, pos: 0 }
    }

    /// Starts lexing at byte offset `pos` of `sql`.
    pub fn at(sql: &'a str, pos: usize) -> Self {
        Self {
            sql,
            pos: pos.min(sql.len()),
        }
    }

    pub fn position(&self) -> usize {
        self.pos
    }

    pub fn syntax_error(&self, reason: impl Into<String>) -> Error {
        Error::Syntax {
            position: self.pos,
            reason: reason.into(),
        }
    }

    pub fn peek(&self) -> Result<Token<'a>> {
        self.clone().next_token()
    }

    /// Consumes the next token and fails unless it equals `expected`.
    pub fn expect(&mut self, expected: Token<'static>) -> Result<()> {
        let start = self.pos;
        let token = self.next_token()?;
        if token != expected {
            return Err(Error::Syntax {
                position: start,
                reason: format!("expected {expected}, found {token}"),
            });
        }
        Ok(())
    }

    fn rest(&self) -> &'a [u8] {
        &self.sql.as_bytes()[self.pos..]
    }

    fn skip_whitespace(&mut self) {
        while let Some(b) = self.rest().first() {
            if b.is_ascii_whitespace() {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    pub fn next_token(&mut self) -> Result<Token<'a>> {
        self.skip_whitespace();
        let Some(&first) = self.rest().first() else {
            return Ok(Token::Eof);
        };

        let single = match first {
            b'?' => Some(Token::Placeholder),
            b'(' => Some(Token::LParen),
            b')' => Some(Token::RParen),
            b'[' => Some(Token::LBracket),
            b']' => Some(Token::RBracket),
            b',' => Some(Token::Comma),
            b';' => Some(Token::Semicolon),
            _ => None,
        };
        if let Some(token) = single {
            self.pos += 1;
            return Ok(token);
        }

        match first {
            b'\'' => self.string_literal(),
            b'0'..=b'9' | b'-' | b'+' | b'.' => self.number_literal(),
            b if b.is_ascii_alphabetic() || b == b'_' => {
                let start = self.pos;
                while let Some(b) = self.rest().first() {
                    if b.is_ascii_alphanumeric() || *b == b'_' {
                        self.pos += 1;
                    } else {
                        break;
                    }
                }
                Ok(Token::Ident(&self.sql[start..self.pos]))
            }
            other => Err(self.syntax_error(format!("unexpected character '{}'", other as char))),
        }
    }

    fn number_literal(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let bytes = self.sql.as_bytes();
        let mut i = self.pos;
        if matches!(bytes.get(i), Some(b'-' | b'+')) {
            i += 1;
        }
        let digits_start = i;
        while let Some(b) = bytes.get(i) {
            match b {
                b'0'..=b'9' | b'.' => i += 1,
                b'e' | b'E' if i > digits_start => {
                    i += 1;
                    if matches!(bytes.get(i), Some(b'-' | b'+')) {
                        i += 1;
                    }
                }
                _ => break,
            }
        }
        if i == digits_start {
            // a bare sign may introduce inf/nan
            if bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
                while bytes.get(i).is_some_and(|b| b.is_ascii_alphabetic()) {
                    i += 1;
                }
            } else {
                return Err(self.syntax_error("sign without digits"));
            }
        }
        self.pos = i;
        Ok(Token::Number(&self.sql[start..i]))
    }

    fn string_literal(&mut self) -> Result<Token<'a>> {
        let start = self.pos;
        let mut out = Vec::new();
        let bytes = self.sql.as_bytes();
        let mut i = self.pos + 1;
        loop {
            let Some(&b) = bytes.get(i) else {
                return Err(Error::Syntax {
                    position: start,
                    reason: "unterminated string literal".into(),
                });
            };
            match b {
                b'\\' => {
                    let Some(&escaped) = bytes.get(i + 1) else {
                        return Err(Error::Syntax {
                            position: i,
                            reason: "dangling escape".into(),
                        });
                    };
                    out.push(match escaped {
                        b'n' => b'\n',
                        b't' => b'\t',
                        b'r' => b'\r',
                        b'0' => b'\0',
                        b'b' => 0x08,
                        b'f' => 0x0c,
                        other => other,
                    });
                    i += 2;
                }
                b'\'' if bytes.get(i + 1) == Some(&b'\'') => {
                    out.push(b'\'');
                    i += 2;
                }
                b'\'' => {
                    i += 1;
                    break;
                }
                other => {
                    out.push(other);
                    i += 1;
                }
            }
        }
        self.pos = i;
        // escapes only ever replace ASCII, so the bytes stay valid UTF-8
        String::from_utf8(out)
            .map(Token::String)
            .map_err(|_| Error::Syntax {
                position: start,
                reason: "string literal is not valid UTF-8".into(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(sql: &str) -> Vec<Token<'_>> {
        let mut lexer = Lexer::new(sql);
        let mut out = Vec::new();
        loop {
            let token = lexer.next_token().unwrap();
            if token == Token::Eof {
                break;
            }
            out.push(token);
        }
        out
    }

    #[test]
    fn tokenizes_value_row() {
        assert_eq!(
            tokens("(1, 'a''b', ?, -2.5e3, NULL, [1,2])"),
            vec![
                Token::LParen,
                Token::Number("1"),
                Token::Comma,
                Token::String("a'b".into()),
                Token::Comma,
                Token::Placeholder,
                Token::Comma,
                Token::Number("-2.5e3"),
                Token::Comma,
                Token::Ident("NULL"),
                Token::Comma,
                Token::LBracket,
                Token::Number("1"),
                Token::Comma,
                Token::Number("2"),
                Token::RBracket,
                Token::RParen,
            ]
        );
    }

    #[test]
    fn string_escapes() {
        assert_eq!(
            tokens(r"'tab\there\'s'"),
            vec![Token::String("tab\there's".into())]
        );
        assert_eq!(tokens("'Zürich'"), vec![Token::String("Zürich".into())]);
    }

    #[test]
    fn peek_does_not_consume() {
        let mut lexer = Lexer::new(" ; x");
        assert_eq!(lexer.peek().unwrap(), Token::Semicolon);
        assert_eq!(lexer.next_token().unwrap(), Token::Semicolon);
        assert_eq!(lexer.next_token().unwrap(), Token::Ident("x"));
    }

    #[test]
    #[should_panic(expected = "unterminated")]
    fn unterminated_string() {
        Lexer::new("'abc").next_token().unwrap();
    }

    #[test]
    fn expect_reports_position() {
        let mut lexer = Lexer::new("  )");
        match lexer.expect(Token::LParen) {
            Err(Error::Syntax { position, .. }) => assert_eq!(position, 0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
