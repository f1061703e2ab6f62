use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone};

use crate::{
    Result,
    insert::lexer::{Lexer, Token},
};

use super::{DataType, Value};

impl DataType {
    /// Parses one SQL literal for this type from the lexer's current position.
    pub fn deserialize_text(&self, lexer: &mut Lexer<'_>) -> Result<Value> {
        let start = lexer.clone();
        let token = lexer.next_token()?;

        if let Token::Ident(ident) = &token {
            if ident.eq_ignore_ascii_case("null") {
                return match self {
                    DataType::Nullable(_) => Ok(Value::Null),
                    _ => Err(start.syntax_error(format!("NULL is not allowed for {self}"))),
                };
            }
        }

        let value = match (self, token) {
            (DataType::Nullable(nested), _) => {
                *lexer = start;
                return nested.deserialize_text(lexer);
            }
            (DataType::Array(nested), Token::LBracket) => {
                let mut items = Vec::new();
                if lexer.peek()? == Token::RBracket {
                    lexer.next_token()?;
                } else {
                    loop {
                        items.push(nested.deserialize_text(lexer)?);
                        match lexer.next_token()? {
                            Token::Comma => continue,
                            Token::RBracket => break,
                            other => {
                                return Err(
                                    lexer.syntax_error(format!("expected ',' or ']', found {other}"))
                                );
                            }
                        }
                    }
                }
                Value::Array(items)
            }
            (DataType::Tuple(elements), Token::LParen) => {
                let mut items = Vec::with_capacity(elements.len());
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        lexer.expect(Token::Comma)?;
                    }
                    items.push(element.deserialize_text(lexer)?);
                }
                lexer.expect(Token::RParen)?;
                Value::Tuple(items)
            }
            (
                DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64,
                Token::Number(text),
            ) => integer(self, text, &start)?,
            (ty, Token::Ident(ident))
                if ty.is_integer() && matches!(ident.to_ascii_lowercase().as_str(), "true" | "false") =>
            {
                Value::UInt(ident.eq_ignore_ascii_case("true") as u64)
            }
            (DataType::Float32 | DataType::Float64, Token::Number(text)) => Value::Float(
                text.parse::<f64>()
                    .map_err(|_| start.syntax_error(format!("invalid float literal {text}")))?,
            ),
            (DataType::String | DataType::FixedString(_), Token::String(s)) => Value::String(s),
            (DataType::Date, Token::String(s)) => Value::Date(
                NaiveDate::parse_from_str(&s, "%Y-%m-%d")
                    .map_err(|e| start.syntax_error(format!("invalid date '{s}': {e}")))?,
            ),
            (DataType::DateTime { timezone, .. }, Token::String(s)) => {
                let naive = NaiveDateTime::parse_from_str(&s, "%Y-%m-%d %H:%M:%S")
                    .map_err(|e| start.syntax_error(format!("invalid datetime '{s}': {e}")))?;
                let local = timezone.from_local_datetime(&naive).earliest().ok_or_else(|| {
                    start.syntax_error(format!("'{s}' does not exist in {}", timezone.name()))
                })?;
                Value::DateTime(local)
            }
            (DataType::DateTime { timezone, .. }, Token::Number(text)) => {
                let secs: i64 = text
                    .parse()
                    .map_err(|_| start.syntax_error(format!("invalid timestamp {text}")))?;
                let utc = DateTime::from_timestamp(secs, 0)
                    .ok_or_else(|| start.syntax_error(format!("timestamp {text} out of range")))?;
                Value::DateTime(utc.with_timezone(timezone))
            }
            (ty, other) => {
                return Err(start.syntax_error(format!("expected a {ty} literal, found {other}")));
            }
        };

        self.check(&value).map_err(|reason| start.syntax_error(reason))?;
        Ok(value)
    }

    fn is_integer(&self) -> bool {
        matches!(
            self,
            DataType::Int8
                | DataType::Int16
                | DataType::Int32
                | DataType::Int64
                | DataType::UInt8
                | DataType::UInt16
                | DataType::UInt32
                | DataType::UInt64
        )
    }
}

fn integer(ty: &DataType, text: &str, at: &Lexer<'_>) -> Result<Value> {
    let signed = matches!(
        ty,
        DataType::Int8 | DataType::Int16 | DataType::Int32 | DataType::Int64
    );
    let value = if signed {
        text.parse::<i64>().map(Value::Int).ok()
    } else {
        text.trim_start_matches('+').parse::<u64>().map(Value::UInt).ok()
    };
    value.ok_or_else(|| at.syntax_error(format!("invalid {ty} literal {text}")))
}

#[cfg(test)]
mod tests {
    use chrono::Timelike;

    use super::*;

    fn parse(ty: &DataType, sql: &str) -> Result<Value> {
        ty.deserialize_text(&mut Lexer::new(sql))
    }

    #[test]
    fn scalar_literals() {
        assert_eq!(parse(&DataType::Int32, "-7").unwrap(), Value::Int(-7));
        assert_eq!(parse(&DataType::UInt8, "255").unwrap(), Value::UInt(255));
        assert_eq!(parse(&DataType::UInt8, "true").unwrap(), Value::UInt(1));
        assert_eq!(parse(&DataType::Float64, "2.5e1").unwrap(), Value::Float(25.0));
        assert_eq!(parse(&DataType::String, "'a\\'b'").unwrap(), Value::from("a'b"));
        assert_eq!(
            parse(&DataType::Date, "'2020-02-29'").unwrap(),
            Value::Date(NaiveDate::from_ymd_opt(2020, 2, 29).unwrap())
        );
    }

    #[test]
    fn out_of_range_is_syntax_error() {
        assert!(matches!(
            parse(&DataType::Int8, "300"),
            Err(crate::Error::Syntax { .. })
        ));
        assert!(parse(&DataType::UInt32, "-1").is_err());
        assert!(parse(&DataType::Int32, "'1'").is_err());
    }

    #[test]
    fn null_only_for_nullable() {
        let nullable = DataType::Nullable(Box::new(DataType::Int32));
        assert_eq!(parse(&nullable, "NULL").unwrap(), Value::Null);
        assert_eq!(parse(&nullable, "5").unwrap(), Value::Int(5));
        assert!(parse(&DataType::Int32, "NULL").is_err());
    }

    #[test]
    fn composites() {
        let ty = DataType::Array(Box::new(DataType::Tuple(vec![
            DataType::UInt8,
            DataType::Nullable(Box::new(DataType::String)),
        ])));
        assert_eq!(
            parse(&ty, "[(1, 'x'), (2, NULL)]").unwrap(),
            Value::Array(vec![
                Value::Tuple(vec![Value::UInt(1), Value::from("x")]),
                Value::Tuple(vec![Value::UInt(2), Value::Null]),
            ])
        );
        assert_eq!(
            parse(&DataType::Array(Box::new(DataType::Int8)), "[]").unwrap(),
            Value::Array(vec![])
        );
        assert!(parse(&DataType::Array(Box::new(DataType::Int8)), "[1 2]").is_err());
    }

    #[test]
    fn datetime_in_column_timezone() {
        let ty = DataType::DateTime {
            timezone: chrono_tz::Asia::Singapore,
            explicit: true,
        };
        let Value::DateTime(dt) = parse(&ty, "'2021-06-01 08:30:00'").unwrap() else {
            panic!("not a datetime");
        };
        assert_eq!(dt.hour(), 8);
        assert_eq!(dt.timestamp(), 1_622_507_400);

        let Value::DateTime(dt) = parse(&ty, "0").unwrap() else {
            panic!("not a datetime");
        };
        assert_eq!(dt.hour(), 7);
    }
}
