//! Proto3 IDL grammar (spec.md §4.2): tokens → raw parse tree. Semantic
//! checks and `ProtoSchema` assembly live in `processor.rs`, mirroring the
//! Grammar → Processor split in spec.md §2.

use std::convert::TryFrom;

use wireforms::error::{Loc, ParseError};
use wireforms::text_format::lexer::{Lexer, Token};

#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub ty: String,
    pub number: u32,
    pub repeated: bool,
    pub map_key_type: Option<String>,
    pub map_value_type: Option<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone, Default)]
pub struct RawMessage {
    pub name: String,
    pub fields: Vec<RawField>,
    pub nested_messages: Vec<RawMessage>,
    pub nested_enums: Vec<RawEnum>,
}

#[derive(Debug, Clone)]
pub struct RawEnumValue {
    pub name: String,
    pub number: i32,
}

#[derive(Debug, Clone, Default)]
pub struct RawEnum {
    pub name: String,
    pub values: Vec<RawEnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct RawFile {
    pub syntax: Option<String>,
    pub package: Vec<String>,
    pub imports: Vec<String>,
    pub messages: Vec<RawMessage>,
    pub enums: Vec<RawEnum>,
}

pub struct Proto3Grammar<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    lookahead: Option<(Token, Loc)>,
}

impl<'a> Proto3Grammar<'a> {
    pub fn new(source: &'a str) -> Proto3Grammar<'a> {
        Proto3Grammar {
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

    fn bump(&mut self) -> Result<(Token, Loc), ParseError> {
        if let Some(t) = self.lookahead.take() {
            return Ok(t);
        }
        self.lexer.next_token()
    }

    fn err(&self, loc: Loc, message: impl Into<String>) -> ParseError {
        ParseError::at(message, loc).with_window(self.source)
    }

    fn expect_ident(&mut self) -> Result<(String, Loc), ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::Ident(name) => Ok((name, loc)),
            other => Err(self.err(loc, format!("expected identifier, found {:?}", other))),
        }
    }

    fn expect_symbol(&mut self, c: char) -> Result<(), ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::Symbol(s) if s == c => Ok(()),
            other => Err(self.err(loc, format!("expected '{}', found {:?}", c, other))),
        }
    }

    fn expect_str(&mut self) -> Result<String, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::StrLit(s) => Ok(s),
            other => Err(self.err(loc, format!("expected string literal, found {:?}", other))),
        }
    }

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::IntLit(i) => Ok(i),
            other => Err(self.err(loc, format!("expected integer literal, found {:?}", other))),
        }
    }

    /// A possibly-dotted type name / package path, e.g. `a.b.C`.
    fn parse_dotted_name(&mut self) -> Result<String, ParseError> {
        let (first, _) = self.expect_ident()?;
        let mut name = first;
        while *self.peek()? == Token::Symbol('.') {
            self.bump()?;
            let (next, _) = self.expect_ident()?;
            name.push('.');
            name.push_str(&next);
        }
        Ok(name)
    }

    pub fn parse_file(&mut self) -> Result<RawFile, ParseError> {
        let mut file = RawFile::default();
        loop {
            if *self.peek()? == Token::Eof {
                break;
            }
            let (tok, loc) = self.bump()?;
            match tok {
                Token::Ident(ref kw) if kw == "syntax" => {
                    self.expect_symbol('=')?;
                    let syntax = self.expect_str()?;
                    self.expect_symbol(';')?;
                    if syntax != "proto3" {
                        return Err(self.err(loc, format!("unsupported syntax: {}", syntax)));
                    }
                    file.syntax = Some(syntax);
                }
                Token::Ident(ref kw) if kw == "package" => {
                    let name = self.parse_dotted_name()?;
                    self.expect_symbol(';')?;
                    file.package = name.split('.').map(|s| s.to_string()).collect();
                }
                Token::Ident(ref kw) if kw == "import" => {
                    let path = self.expect_str()?;
                    self.expect_symbol(';')?;
                    file.imports.push(path);
                }
                Token::Ident(ref kw) if kw == "message" => {
                    file.messages.push(self.parse_message()?);
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    file.enums.push(self.parse_enum()?);
                }
                other => return Err(self.err(loc, format!("unexpected top-level token {:?}", other))),
            }
        }
        Ok(file)
    }

    fn parse_message(&mut self) -> Result<RawMessage, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('{')?;
        let mut message = RawMessage {
            name,
            ..RawMessage::default()
        };
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (tok, loc) = self.bump()?;
            match tok {
                Token::Ident(ref kw) if kw == "message" => {
                    message.nested_messages.push(self.parse_message()?);
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    message.nested_enums.push(self.parse_enum()?);
                }
                Token::Ident(ref kw) if kw == "map" => {
                    message.fields.push(self.parse_map_field(loc)?);
                }
                Token::Ident(ref kw) if kw == "repeated" => {
                    message.fields.push(self.parse_scalar_field(true, loc)?);
                }
                Token::Ident(_) => {
                    // Not a keyword: this identifier is the field's type.
                    self.lookahead = Some((tok, loc));
                    message.fields.push(self.parse_scalar_field(false, loc)?);
                }
                other => return Err(self.err(loc, format!("unexpected token in message body: {:?}", other))),
            }
        }
        Ok(message)
    }

    fn parse_scalar_field(&mut self, repeated: bool, loc: Loc) -> Result<RawField, ParseError> {
        let ty = self.parse_dotted_name()?;
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('=')?;
        let number = self.expect_int()?;
        self.skip_field_options()?;
        self.expect_symbol(';')?;
        Ok(RawField {
            name,
            ty,
            number: u32::try_from(number)
                .map_err(|_| self.err(loc, format!("field number must be positive: {}", number)))?,
            repeated,
            map_key_type: None,
            map_value_type: None,
            loc,
        })
    }

    fn parse_map_field(&mut self, loc: Loc) -> Result<RawField, ParseError> {
        self.expect_symbol('<')?;
        let key_ty = self.parse_dotted_name()?;
        self.expect_symbol(',')?;
        let value_ty = self.parse_dotted_name()?;
        self.expect_symbol('>')?;
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('=')?;
        let number = self.expect_int()?;
        self.skip_field_options()?;
        self.expect_symbol(';')?;
        Ok(RawField {
            name,
            ty: "map".to_string(),
            number: u32::try_from(number)
                .map_err(|_| self.err(loc, format!("field number must be positive: {}", number)))?,
            repeated: false,
            map_key_type: Some(key_ty),
            map_value_type: Some(value_ty),
            loc,
        })
    }

    fn skip_field_options(&mut self) -> Result<(), ParseError> {
        if *self.peek()? == Token::Symbol('[') {
            self.bump()?;
            let mut depth = 1;
            while depth > 0 {
                let (tok, loc) = self.bump()?;
                match tok {
                    Token::Symbol('[') => depth += 1,
                    Token::Symbol(']') => depth -= 1,
                    Token::Eof => return Err(self.err(loc, "unterminated field options")),
                    _ => {}
                }
            }
        }
        Ok(())
    }

    fn parse_enum(&mut self) -> Result<RawEnum, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('{')?;
        let mut e = RawEnum {
            name,
            ..RawEnum::default()
        };
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (value_name, _) = self.expect_ident()?;
            self.expect_symbol('=')?;
            let (tok, loc) = self.bump()?;
            let number = match tok {
                Token::IntLit(i) => i,
                other => return Err(self.err(loc, format!("expected enum value number, found {:?}", other))),
            };
            self.skip_field_options()?;
            self.expect_symbol(';')?;
            e.values.push(RawEnumValue {
                name: value_name,
                number: i32::try_from(number)
                    .map_err(|_| self.err(loc, format!("enum value out of range: {}", number)))?,
            });
        }
        Ok(e)
    }
}

pub fn parse(source: &str) -> Result<RawFile, ParseError> {
    Proto3Grammar::new(source).parse_file()
}
