//! FlatBuffers IDL grammar (spec.md §4.4): tokens → raw parse tree.
//! Semantic checks and `FbsSchema` assembly live in `processor.rs`.

use wireforms::error::{Loc, ParseError};
use wireforms::text_format::lexer::{Lexer, Token};

use crate::fbs::model::{FbsDefault, FbsType, Metadata};

#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub ty: FbsType,
    pub default_value: FbsDefault,
    pub metadata: Metadata,
    pub loc: Loc,
}

#[derive(Debug, Clone, Default)]
pub struct RawTable {
    pub name: String,
    pub fields: Vec<RawField>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default)]
pub struct RawStruct {
    pub name: String,
    pub fields: Vec<RawField>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone)]
pub struct RawEnumValue {
    pub name: String,
    pub value: Option<i64>,
}

#[derive(Debug, Clone)]
pub struct RawEnum {
    pub name: String,
    pub underlying: FbsType,
    pub values: Vec<RawEnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct RawUnion {
    pub name: String,
    pub variants: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawFile {
    pub namespace: Option<String>,
    pub includes: Vec<String>,
    pub tables: Vec<RawTable>,
    pub structs: Vec<RawStruct>,
    pub enums: Vec<RawEnum>,
    pub unions: Vec<RawUnion>,
    pub root_type: Option<String>,
    pub file_identifier: Option<String>,
    pub file_extension: Option<String>,
    pub attributes: Vec<String>,
}

pub struct FbsGrammar<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    lookahead: Option<(Token, Loc)>,
}

impl<'a> FbsGrammar<'a> {
    pub fn new(source: &'a str) -> FbsGrammar<'a> {
        FbsGrammar {
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

    pub fn parse_file(&mut self) -> Result<RawFile, ParseError> {
        let mut file = RawFile::default();
        loop {
            if *self.peek()? == Token::Eof {
                break;
            }
            let (tok, loc) = self.bump()?;
            match tok {
                Token::Ident(ref kw) if kw == "namespace" => {
                    let (name, _) = self.expect_ident()?;
                    self.expect_symbol(';')?;
                    file.namespace = Some(name);
                }
                Token::Ident(ref kw) if kw == "include" => {
                    let path = self.expect_str()?;
                    self.expect_symbol(';')?;
                    file.includes.push(path);
                }
                Token::Ident(ref kw) if kw == "attribute" => {
                    let name = self.expect_str()?;
                    self.expect_symbol(';')?;
                    file.attributes.push(name);
                }
                Token::Ident(ref kw) if kw == "table" => {
                    file.tables.push(self.parse_table()?);
                }
                Token::Ident(ref kw) if kw == "struct" => {
                    file.structs.push(self.parse_struct()?);
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    file.enums.push(self.parse_enum()?);
                }
                Token::Ident(ref kw) if kw == "union" => {
                    file.unions.push(self.parse_union()?);
                }
                Token::Ident(ref kw) if kw == "root_type" => {
                    let (name, _) = self.expect_ident()?;
                    self.expect_symbol(';')?;
                    file.root_type = Some(name);
                }
                Token::Ident(ref kw) if kw == "file_identifier" => {
                    let id = self.expect_str()?;
                    self.expect_symbol(';')?;
                    file.file_identifier = Some(id);
                }
                Token::Ident(ref kw) if kw == "file_extension" => {
                    let ext = self.expect_str()?;
                    self.expect_symbol(';')?;
                    file.file_extension = Some(ext);
                }
                other => return Err(self.err(loc, format!("unexpected top-level token {:?}", other))),
            }
        }
        Ok(file)
    }

    /// A scalar keyword, `[ElementType]` vector, or bare user-type name.
    fn parse_type(&mut self) -> Result<FbsType, ParseError> {
        if *self.peek()? == Token::Symbol('[') {
            self.bump()?;
            let elem = self.parse_type()?;
            self.expect_symbol(']')?;
            return Ok(FbsType::Vector(Box::new(elem)));
        }
        let (name, _) = self.expect_ident()?;
        Ok(scalar_type(&name).unwrap_or(FbsType::UserType(name)))
    }

    fn parse_default_value(&mut self) -> Result<FbsDefault, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::IntLit(i) => Ok(FbsDefault::Int(i)),
            Token::FloatLit(f) => Ok(FbsDefault::Float(f)),
            Token::StrLit(s) => Ok(FbsDefault::Text(s)),
            Token::Ident(ref kw) if kw == "true" => Ok(FbsDefault::Bool(true)),
            Token::Ident(ref kw) if kw == "false" => Ok(FbsDefault::Bool(false)),
            other => Err(self.err(loc, format!("unsupported default value token: {:?}", other))),
        }
    }

    fn parse_optional_default(&mut self) -> Result<FbsDefault, ParseError> {
        if *self.peek()? == Token::Symbol('=') {
            self.bump()?;
            self.parse_default_value()
        } else {
            Ok(FbsDefault::None)
        }
    }

    /// `(key:value, flag)` metadata trailing a field or type declaration.
    fn parse_optional_metadata(&mut self) -> Result<Metadata, ParseError> {
        if *self.peek()? != Token::Symbol('(') {
            return Ok(Vec::new());
        }
        self.bump()?;
        let mut entries = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol(')') {
                self.bump()?;
                break;
            }
            let (key, _) = self.expect_ident()?;
            let value = if *self.peek()? == Token::Symbol(':') {
                self.bump()?;
                Some(self.metadata_value()?)
            } else {
                None
            };
            entries.push((key, value));
            if *self.peek()? == Token::Symbol(',') {
                self.bump()?;
            }
        }
        Ok(entries)
    }

    fn metadata_value(&mut self) -> Result<String, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::StrLit(s) => Ok(s),
            Token::IntLit(i) => Ok(i.to_string()),
            Token::FloatLit(f) => Ok(f.to_string()),
            Token::Ident(s) => Ok(s),
            other => Err(self.err(loc, format!("unsupported metadata value: {:?}", other))),
        }
    }

    fn parse_table(&mut self) -> Result<RawTable, ParseError> {
        let (name, _) = self.expect_ident()?;
        let metadata = self.parse_optional_metadata()?;
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            fields.push(self.parse_field()?);
        }
        Ok(RawTable { name, fields, metadata })
    }

    fn parse_struct(&mut self) -> Result<RawStruct, ParseError> {
        let (name, _) = self.expect_ident()?;
        let metadata = self.parse_optional_metadata()?;
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            fields.push(self.parse_field()?);
        }
        Ok(RawStruct { name, fields, metadata })
    }

    fn parse_field(&mut self) -> Result<RawField, ParseError> {
        let (name, loc) = self.expect_ident()?;
        self.expect_symbol(':')?;
        let ty = self.parse_type()?;
        let default_value = self.parse_optional_default()?;
        let metadata = self.parse_optional_metadata()?;
        self.expect_symbol(';')?;
        Ok(RawField {
            name,
            ty,
            default_value,
            metadata,
            loc,
        })
    }

    fn parse_enum(&mut self) -> Result<RawEnum, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol(':')?;
        let underlying = self.parse_type()?;
        self.expect_symbol('{')?;
        let mut values = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (vname, _) = self.expect_ident()?;
            let value = if *self.peek()? == Token::Symbol('=') {
                self.bump()?;
                let (tok, vloc) = self.bump()?;
                match tok {
                    Token::IntLit(i) => Some(i),
                    other => return Err(self.err(vloc, format!("expected enum value, found {:?}", other))),
                }
            } else {
                None
            };
            values.push(RawEnumValue { name: vname, value });
            if *self.peek()? == Token::Symbol(',') {
                self.bump()?;
            }
        }
        Ok(RawEnum { name, underlying, values })
    }

    fn parse_union(&mut self) -> Result<RawUnion, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('{')?;
        let mut variants = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (vname, _) = self.expect_ident()?;
            variants.push(vname);
            if *self.peek()? == Token::Symbol(',') {
                self.bump()?;
            }
        }
        Ok(RawUnion { name, variants })
    }
}

fn scalar_type(name: &str) -> Option<FbsType> {
    Some(match name {
        "bool" => FbsType::Bool,
        "byte" | "int8" => FbsType::Byte,
        "ubyte" | "uint8" => FbsType::UByte,
        "short" | "int16" => FbsType::Short,
        "ushort" | "uint16" => FbsType::UShort,
        "int" | "int32" => FbsType::Int,
        "uint" | "uint32" => FbsType::UInt,
        "long" | "int64" => FbsType::Long,
        "ulong" | "uint64" => FbsType::ULong,
        "float" | "float32" => FbsType::Float,
        "double" | "float64" => FbsType::Double,
        "string" => FbsType::String,
        _ => return None,
    })
}

pub fn parse(source: &str) -> Result<RawFile, ParseError> {
    FbsGrammar::new(source).parse_file()
}
