//! Cap'n Proto IDL grammar (spec.md §4.3): tokens → raw parse tree.
//! Semantic checks and `CapnpSchema` assembly live in `processor.rs`.

use std::convert::TryFrom;

use wireforms::error::{Loc, ParseError};
use wireforms::text_format::lexer::{Lexer, Token};

use crate::capnp::model::{DefaultValue, FieldType};

#[derive(Debug, Clone)]
pub struct RawField {
    pub name: String,
    pub ordinal: u16,
    pub ty: FieldType,
    pub default_value: DefaultValue,
    pub loc: Loc,
}

#[derive(Debug, Clone, Default)]
pub struct RawUnion {
    pub name: Option<String>,
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone)]
pub struct RawGroup {
    pub name: String,
    pub ordinal: u16,
    pub fields: Vec<RawField>,
}

#[derive(Debug, Clone, Default)]
pub struct RawStruct {
    pub name: String,
    pub fields: Vec<RawField>,
    pub unions: Vec<RawUnion>,
    pub groups: Vec<RawGroup>,
    pub nested_structs: Vec<RawStruct>,
    pub nested_enums: Vec<RawEnum>,
    pub annotations: Vec<String>,
    pub loc: Loc,
}

#[derive(Debug, Clone)]
pub struct RawEnumValue {
    pub name: String,
    pub ordinal: u16,
}

#[derive(Debug, Clone, Default)]
pub struct RawEnum {
    pub name: String,
    pub values: Vec<RawEnumValue>,
}

#[derive(Debug, Clone, Default)]
pub struct RawMethod {
    pub name: String,
    pub ordinal: u16,
    pub param_type: Option<String>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct RawInterface {
    pub name: String,
    pub methods: Vec<RawMethod>,
}

#[derive(Debug, Clone)]
pub struct RawConst {
    pub name: String,
    pub ty: FieldType,
    pub value: DefaultValue,
}

#[derive(Debug, Clone)]
pub struct RawUsing {
    pub alias: String,
    pub path: String,
}

#[derive(Debug, Clone, Default)]
pub struct RawFile {
    pub file_id: String,
    pub usings: Vec<RawUsing>,
    pub structs: Vec<RawStruct>,
    pub enums: Vec<RawEnum>,
    pub interfaces: Vec<RawInterface>,
    pub constants: Vec<RawConst>,
}

pub struct CapnpGrammar<'a> {
    lexer: Lexer<'a>,
    source: &'a str,
    lookahead: Option<(Token, Loc)>,
}

impl<'a> CapnpGrammar<'a> {
    pub fn new(source: &'a str) -> CapnpGrammar<'a> {
        CapnpGrammar {
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

    fn expect_int(&mut self) -> Result<i64, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::IntLit(i) => Ok(i),
            other => Err(self.err(loc, format!("expected integer literal, found {:?}", other))),
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
        self.expect_symbol('@')?;
        let (id, loc) = self.bump()?;
        let id = match id {
            Token::IntLit(i) => format!("0x{:016x}", i as u64),
            other => return Err(self.err(loc, format!("expected file id, found {:?}", other))),
        };
        self.expect_symbol(';')?;
        file.file_id = id;

        loop {
            if *self.peek()? == Token::Eof {
                break;
            }
            let (tok, loc) = self.bump()?;
            match tok {
                Token::Ident(ref kw) if kw == "using" => {
                    file.usings.push(self.parse_using()?);
                }
                Token::Ident(ref kw) if kw == "const" => {
                    file.constants.push(self.parse_const()?);
                }
                Token::Ident(ref kw) if kw == "struct" => {
                    file.structs.push(self.parse_struct()?);
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    file.enums.push(self.parse_enum()?);
                }
                Token::Ident(ref kw) if kw == "interface" => {
                    file.interfaces.push(self.parse_interface()?);
                }
                other => return Err(self.err(loc, format!("unexpected top-level token {:?}", other))),
            }
        }
        Ok(file)
    }

    fn parse_using(&mut self) -> Result<RawUsing, ParseError> {
        let (alias, _) = self.expect_ident()?;
        self.expect_symbol('=')?;
        let (kw, loc) = self.expect_ident()?;
        if kw != "import" {
            return Err(self.err(loc, format!("expected 'import', found '{}'", kw)));
        }
        let path = self.expect_str()?;
        self.expect_symbol(';')?;
        Ok(RawUsing { alias, path })
    }

    fn parse_const(&mut self) -> Result<RawConst, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol(':')?;
        let ty = self.parse_type()?;
        self.expect_symbol('=')?;
        let value = self.parse_default_value()?;
        self.expect_symbol(';')?;
        Ok(RawConst { name, ty, value })
    }

    /// A bare identifier, primitive keyword, or `List(T)` (spec.md §4.3).
    fn parse_type(&mut self) -> Result<FieldType, ParseError> {
        let (name, loc) = self.expect_ident()?;
        Ok(match name.as_str() {
            "Void" => FieldType::Void,
            "Bool" => FieldType::Bool,
            "Int8" => FieldType::Int8,
            "Int16" => FieldType::Int16,
            "Int32" => FieldType::Int32,
            "Int64" => FieldType::Int64,
            "UInt8" => FieldType::UInt8,
            "UInt16" => FieldType::UInt16,
            "UInt32" => FieldType::UInt32,
            "UInt64" => FieldType::UInt64,
            "Float32" => FieldType::Float32,
            "Float64" => FieldType::Float64,
            "Text" => FieldType::Text,
            "Data" => FieldType::Data,
            "AnyPointer" => FieldType::AnyPointer,
            "List" => {
                self.expect_symbol('(')?;
                let elem = self.parse_type()?;
                self.expect_symbol(')')?;
                FieldType::List(Box::new(elem))
            }
            _ => {
                let _ = loc;
                FieldType::UserType(name)
            }
        })
    }

    fn parse_default_value(&mut self) -> Result<DefaultValue, ParseError> {
        let (tok, loc) = self.bump()?;
        match tok {
            Token::IntLit(i) => Ok(DefaultValue::Int(i)),
            Token::FloatLit(f) => Ok(DefaultValue::Float(f)),
            Token::StrLit(s) => Ok(DefaultValue::Text(s)),
            Token::Ident(ref kw) if kw == "true" => Ok(DefaultValue::Bool(true)),
            Token::Ident(ref kw) if kw == "false" => Ok(DefaultValue::Bool(false)),
            other => Err(self.err(loc, format!("unsupported default value token: {:?}", other))),
        }
    }

    fn parse_optional_default(&mut self) -> Result<DefaultValue, ParseError> {
        if *self.peek()? == Token::Symbol('=') {
            self.bump()?;
            self.parse_default_value()
        } else {
            Ok(DefaultValue::None)
        }
    }

    fn skip_trailing_annotation(&mut self) -> Result<(), ParseError> {
        while *self.peek()? == Token::Symbol('$') {
            self.bump()?;
            self.parse_dotted_ident()?;
            if *self.peek()? == Token::Symbol('(') {
                self.bump()?;
                let mut depth = 1;
                while depth > 0 {
                    let (tok, loc) = self.bump()?;
                    match tok {
                        Token::Symbol('(') => depth += 1,
                        Token::Symbol(')') => depth -= 1,
                        Token::Eof => return Err(self.err(loc, "unterminated annotation")),
                        _ => {}
                    }
                }
            }
        }
        Ok(())
    }

    fn parse_dotted_ident(&mut self) -> Result<String, ParseError> {
        let (name, _) = self.expect_ident()?;
        Ok(name)
    }

    fn parse_struct(&mut self) -> Result<RawStruct, ParseError> {
        let (name, loc) = self.expect_ident()?;
        self.expect_symbol('{')?;
        let mut s = RawStruct {
            name,
            loc,
            ..RawStruct::default()
        };
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (tok, floc) = self.bump()?;
            match tok {
                Token::Ident(ref kw) if kw == "struct" => {
                    s.nested_structs.push(self.parse_struct()?);
                }
                Token::Ident(ref kw) if kw == "enum" => {
                    s.nested_enums.push(self.parse_enum()?);
                }
                Token::Ident(ref kw) if kw == "union" => {
                    s.unions.push(self.parse_union(None)?);
                }
                Token::Ident(name) => {
                    // name @ordinal :Type [= default] [$annotation];
                    // or   name @ordinal :union { ... }
                    // or   name @ordinal :group { ... }
                    self.expect_symbol('@')?;
                    let n = self.expect_int()?;
                    let ordinal = u16::try_from(n)
                        .map_err(|_| self.err(floc, format!("ordinal out of range: {}", n)))?;
                    self.expect_symbol(':')?;
                    if *self.peek()? == Token::Ident("union".to_string()) {
                        self.bump()?;
                        s.unions.push(self.parse_union(Some(name))?);
                        continue;
                    }
                    if *self.peek()? == Token::Ident("group".to_string()) {
                        self.bump()?;
                        let group = self.parse_group(name, ordinal)?;
                        s.groups.push(group);
                        continue;
                    }
                    let ty = self.parse_type()?;
                    let default_value = self.parse_optional_default()?;
                    self.skip_trailing_annotation()?;
                    self.expect_symbol(';')?;
                    s.fields.push(RawField {
                        name,
                        ordinal,
                        ty,
                        default_value,
                        loc: floc,
                    });
                }
                other => return Err(self.err(floc, format!("unexpected token in struct body: {:?}", other))),
            }
        }
        Ok(s)
    }

    fn parse_union(&mut self, name: Option<String>) -> Result<RawUnion, ParseError> {
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (fname, floc) = self.expect_ident()?;
            self.expect_symbol('@')?;
            let n = self.expect_int()?;
            let ordinal =
                u16::try_from(n).map_err(|_| self.err(floc, format!("ordinal out of range: {}", n)))?;
            self.expect_symbol(':')?;
            let ty = self.parse_type()?;
            let default_value = self.parse_optional_default()?;
            self.skip_trailing_annotation()?;
            self.expect_symbol(';')?;
            fields.push(RawField {
                name: fname,
                ordinal,
                ty,
                default_value,
                loc: floc,
            });
        }
        Ok(RawUnion { name, fields })
    }

    fn parse_group(&mut self, name: String, ordinal: u16) -> Result<RawGroup, ParseError> {
        self.expect_symbol('{')?;
        let mut fields = Vec::new();
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (fname, floc) = self.expect_ident()?;
            self.expect_symbol('@')?;
            let n = self.expect_int()?;
            let ford =
                u16::try_from(n).map_err(|_| self.err(floc, format!("ordinal out of range: {}", n)))?;
            self.expect_symbol(':')?;
            let ty = self.parse_type()?;
            let default_value = self.parse_optional_default()?;
            self.skip_trailing_annotation()?;
            self.expect_symbol(';')?;
            fields.push(RawField {
                name: fname,
                ordinal: ford,
                ty,
                default_value,
                loc: floc,
            });
        }
        Ok(RawGroup { name, ordinal, fields })
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
            let (vname, vloc) = self.expect_ident()?;
            self.expect_symbol('@')?;
            let n = self.expect_int()?;
            let ordinal =
                u16::try_from(n).map_err(|_| self.err(vloc, format!("ordinal out of range: {}", n)))?;
            self.skip_trailing_annotation()?;
            self.expect_symbol(';')?;
            e.values.push(RawEnumValue { name: vname, ordinal });
        }
        Ok(e)
    }

    fn parse_interface(&mut self) -> Result<RawInterface, ParseError> {
        let (name, _) = self.expect_ident()?;
        self.expect_symbol('{')?;
        let mut iface = RawInterface {
            name,
            ..RawInterface::default()
        };
        loop {
            if *self.peek()? == Token::Symbol('}') {
                self.bump()?;
                break;
            }
            let (mname, mloc) = self.expect_ident()?;
            let ordinal = self.expect_ordinal_inline(mloc)?;
            self.expect_symbol('(')?;
            let mut depth = 1;
            while depth > 0 {
                let (tok, loc) = self.bump()?;
                match tok {
                    Token::Symbol('(') => depth += 1,
                    Token::Symbol(')') => depth -= 1,
                    Token::Eof => return Err(self.err(loc, "unterminated method params")),
                    _ => {}
                }
            }
            let mut return_type = None;
            if *self.peek()? == Token::Symbol('-') {
                // '->' arrow: lexed as two Symbol('-') '>' tokens since
                // the shared lexer has no multi-char operators.
                self.bump()?;
                self.expect_symbol('>')?;
                self.expect_symbol('(')?;
                let (rty, _) = self.expect_ident()?;
                return_type = Some(rty);
                let mut rdepth = 1;
                loop {
                    if *self.peek()? == Token::Symbol(')') && rdepth == 1 {
                        self.bump()?;
                        break;
                    }
                    let (tok, loc) = self.bump()?;
                    match tok {
                        Token::Symbol('(') => rdepth += 1,
                        Token::Symbol(')') => rdepth -= 1,
                        Token::Eof => return Err(self.err(loc, "unterminated method return")),
                        _ => {}
                    }
                }
            }
            self.expect_symbol(';')?;
            iface.methods.push(RawMethod {
                name: mname,
                ordinal,
                param_type: None,
                return_type,
            });
        }
        Ok(iface)
    }

    fn expect_ordinal_inline(&mut self, loc: Loc) -> Result<u16, ParseError> {
        self.expect_symbol('@')?;
        let n = self.expect_int()?;
        u16::try_from(n).map_err(|_| self.err(loc, format!("ordinal out of range: {}", n)))
    }
}

pub fn parse(source: &str) -> Result<RawFile, ParseError> {
    CapnpGrammar::new(source).parse_file()
}
