//! Recursive-descent parser for the Protocol Buffers text format
//! (spec.md §4.1), built directly on top of `Lexer` the way
//! `protobuf-codegen-pure::Parser` is built on top of
//! `protobuf::text_format::lexer::Tokenizer`.

use crate::error::{Loc, ParseError};
use crate::text_format::lexer::{Lexer, Token};
use crate::value::{Field, Message, Scalar, Value};

pub struct TextprotoParser<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    lookahead: Option<(Token, Loc)>,
}

impl<'a> TextprotoParser<'a> {
    pub fn new(source: &'a str) -> TextprotoParser<'a> {
        TextprotoParser {
            lexer: Lexer::new(source),
            source,
            lookahead: None,
        }
    }

    fn peek(&mut self) -> Result<&Token, ParseError> {
        if self.lookahead.is_none() {
            self.lookahead = Some(self.lexer.next_token()?);
        }
        Ok(&self.lookahead.as_ref().unwrap().0)
    }

    fn peek_loc(&mut self) -> Result<Loc, ParseError> {
        self.peek()?;
        Ok(self.lookahead.as_ref().unwrap().1)
    }

    fn bump(&mut self) -> Result<(Token, Loc), ParseError> {
        if let Some(t) = self.lookahead.take() {
            return Ok(t);
        }
        self.lexer.next_token()
    }

    fn err(&self, loc: Loc, message: impl Into<String>) -> ParseError {
        ParseError::at(message, loc).with_window(self.source)
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::Symbol(s) if s == c => Ok(()),
            other => Err(self.err(loc, format!("expected '{}', found {:?}", c, other))),
        }
    }

    /// Parse a whole document: a sequence of fields until EOF.
    pub fn parse_document(&mut self) -> Result<Message, ParseError> {
        let mut message = Message::new();
        loop {
            if *self.peek()? == Token::Eof {
                break;
            }
            let field = self.parse_field()?;
            message.push(field);
            self.skip_separator()?;
        }
        Ok(message)
    }

    fn skip_separator(&mut self) -> Result<(), ParseError> {
        if matches!(self.peek()?, Token::Symbol(';') | Token::Symbol(',')) {
            self.bump()?;
        }
        Ok(())
    }

    fn parse_name(&mut self) -> Result<String, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::Ident(name) => Ok(name),
            other => Err(self.err(loc, format!("expected field name, found {:?}", other))),
        }
    }

    fn parse_field(&mut self) -> Result<Field, ParseError> {
        let name = self.parse_name()?;

        // The colon is required for scalars, optional for message values.
        let has_colon = if *self.peek()? == Token::Symbol(':') {
            self.bump()?;
            true
        } else {
            false
        };

        match self.peek()? {
            Token::Symbol('{') | Token::Symbol('<') => {
                let message = self.parse_message_value()?;
                Ok(Field::new(name, Value::Message(message)))
            }
            _ => {
                if !has_colon {
                    return Err(self.err(
                        self.lookahead.as_ref().map(|(_, l)| *l).unwrap_or_default(),
                        "expected ':' before scalar value",
                    ));
                }
                let value = self.parse_scalar_value()?;
                Ok(Field::new(name, value))
            }
        }
    }

    fn parse_message_value(&mut self) -> Result<Message, ParseError> {
        let (open, loc) = self.bump()?;
        let close = match open {
            Token::Symbol('{') => '}',
            Token::Symbol('<') => '>',
            other => return Err(self.err(loc, format!("expected '{{' or '<', found {:?}", other))),
        };
        let mut message = Message::new();
        loop {
            if *self.peek()? == Token::Symbol(close) {
                self.bump()?;
                break;
            }
            let field = self.parse_field()?;
            message.push(field);
            self.skip_separator()?;
        }
        Ok(message)
    }

    /// A scalar value: string (possibly concatenated), number, identifier
    /// (bool/enum symbol), or a bracketed list of scalars.
    fn parse_scalar_value(&mut self) -> Result<Value, ParseError> {
        if *self.peek()? == Token::Symbol('[') {
            return self.parse_scalar_list();
        }
        self.parse_single_scalar()
    }

    fn parse_scalar_list(&mut self) -> Result<Value, ParseError> {
        self.expect_symbol('[')?;
        let mut items = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol(']') {
                self.bump()?;
                break;
            }
            items.push(self.parse_single_scalar()?);
            if *self.peek()? == Token::Symbol(',') {
                self.bump()?;
            }
        }
        Ok(Value::List(items))
    }

    fn parse_single_scalar(&mut self) -> Result<Value, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::StrLit(mut s) => {
                // Adjacent string literals concatenate.
                while let Token::StrLit(_) = self.peek()? {
                    if let (Token::StrLit(more), _) = self.bump()? {
                        s.push_str(&more);
                    }
                }
                Ok(Value::Scalar(Scalar::String(s)))
            }
            Token::IntLit(i) => Ok(Value::Scalar(Scalar::Int(i))),
            Token::FloatLit(f) => Ok(Value::Scalar(Scalar::Float(f))),
            Token::Ident(ident) => Ok(Value::Scalar(parse_identifier_scalar(&ident))),
            other => Err(self.err(loc, format!("expected scalar value, found {:?}", other))),
        }
    }
}

fn parse_identifier_scalar(ident: &str) -> Scalar {
    match ident.to_ascii_lowercase().as_str() {
        "true" | "t" => Scalar::Bool(true),
        "false" | "f" => Scalar::Bool(false),
        _ => Scalar::String(ident.to_string()),
    }
}

/// Parse a full textproto document into a `Message`.
pub fn parse(source: &str) -> Result<Message, ParseError> {
    TextprotoParser::new(source).parse_document()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::MapEntry;

    #[test]
    fn parses_flat_fields() {
        let m = parse(r#"name: "Alice" age: 30 active: true"#).unwrap();
        assert_eq!(m.find_field("name").unwrap().value, Value::string("Alice"));
        assert_eq!(m.find_field("age").unwrap().value, Value::int(30));
        assert_eq!(m.find_field("active").unwrap().value, Value::bool(true));
    }

    #[test]
    fn parses_nested_message_without_colon() {
        let m = parse(r#"name: "Bob" address { city: "SF" }"#).unwrap();
        let addr = m.find_field("address").unwrap().value.as_message().unwrap();
        assert_eq!(addr.find_field("city").unwrap().value, Value::string("SF"));
    }

    #[test]
    fn parses_angle_bracket_message() {
        let m = parse("point < x: 1 y: 2 >").unwrap();
        let point = m.find_field("point").unwrap().value.as_message().unwrap();
        assert_eq!(point.find_field("x").unwrap().value, Value::int(1));
    }

    #[test]
    fn duplicate_fields_preserved_in_order() {
        let m = parse("subsets: \"latin\"\nsubsets: \"cyrillic\"").unwrap();
        let found = m.find_fields("subsets");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value, Value::string("latin"));
        assert_eq!(found[1].value, Value::string("cyrillic"));
    }

    #[test]
    fn parses_negative_numbers_in_list() {
        let m = parse("values: [-1.5, -42, 3.14]").unwrap();
        let list = m.find_field("values").unwrap().value.as_list().unwrap();
        assert_eq!(list, &[Value::float(-1.5), Value::int(-42), Value::float(3.14)]);
    }

    #[test]
    fn adjacent_strings_concatenate() {
        let m = parse(r#"text: "a" "b""#).unwrap();
        assert_eq!(m.find_field("text").unwrap().value, Value::string("ab"));
    }

    #[test]
    fn map_field_parses_as_message_with_key_value() {
        let m = parse(r#"labels { key: "a" value: "b" }"#).unwrap();
        let entry = m.find_field("labels").unwrap().value.as_message().unwrap();
        assert_eq!(entry.find_field("key").unwrap().value, Value::string("a"));
        assert_eq!(entry.find_field("value").unwrap().value, Value::string("b"));
        let _ = MapEntry {
            key: Scalar::String("a".into()),
            value: Value::string("b"),
        };
    }

    #[test]
    fn requires_colon_before_scalar() {
        assert!(parse("name \"Alice\"").is_err());
    }

    #[test]
    fn optional_trailing_separators() {
        let m = parse("a: 1; b: 2, c: 3").unwrap();
        assert_eq!(m.field_count(), 3);
    }
}
