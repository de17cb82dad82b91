use std::fmt;
use std::num::ParseFloatError;
use std::num::ParseIntError;
use std::str::Utf8Error;

/// A location in a source document, used by parse errors that can point
/// back at the offending text (text-format and the three IDL grammars).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Default)]
pub struct Loc {
    pub line: u32,
    pub col: u32,
}

impl Loc {
    pub fn new(line: u32, col: u32) -> Loc {
        Loc { line, col }
    }

    pub fn start() -> Loc {
        Loc { line: 1, col: 1 }
    }
}

impl fmt::Display for Loc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.line, self.col)
    }
}

/// Malformed bytes or tokens: truncated buffers, varint overflow, invalid
/// pointer types, out-of-bounds offsets, grammar mismatches, missing root
/// types.
#[derive(Debug)]
pub struct ParseError {
    message: String,
    loc: Option<Loc>,
    window: Option<String>,
}

impl ParseError {
    pub fn new(message: impl Into<String>) -> ParseError {
        ParseError {
            message: message.into(),
            loc: None,
            window: None,
        }
    }

    pub fn at(message: impl Into<String>, loc: Loc) -> ParseError {
        ParseError {
            message: message.into(),
            loc: Some(loc),
            window: None,
        }
    }

    /// Attach a 5-line source window centered on `loc` for diagnostics.
    pub fn with_window(mut self, source: &str) -> ParseError {
        if let Some(loc) = self.loc {
            self.window = Some(source_window(source, loc, 5));
        }
        self
    }

    pub fn loc(&self) -> Option<Loc> {
        self.loc
    }
}

/// Render up to `lines` lines of `source` centered on `loc.line`.
fn source_window(source: &str, loc: Loc, lines: u32) -> String {
    let half = lines / 2;
    let first = loc.line.saturating_sub(half).max(1);
    let last = first + lines - 1;
    let mut out = String::new();
    for (i, line) in source.lines().enumerate() {
        let n = (i + 1) as u32;
        if n < first {
            continue;
        }
        if n > last {
            break;
        }
        let marker = if n == loc.line { ">" } else { " " };
        out.push_str(&format!("{} {:>4} | {}\n", marker, n, line));
    }
    out
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.loc {
            Some(loc) => write!(f, "parse error at {}: {}", loc, self.message)?,
            None => write!(f, "parse error: {}", self.message)?,
        }
        if let Some(window) = &self.window {
            write!(f, "\n{}", window)?;
        }
        Ok(())
    }
}

impl std::error::Error for ParseError {}

/// Unknown root type, unknown embedded message, or a value that cannot be
/// represented in the declared wire type.
#[derive(Debug)]
pub struct SerializationError {
    message: String,
}

impl SerializationError {
    pub fn new(message: impl Into<String>) -> SerializationError {
        SerializationError {
            message: message.into(),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "serialization error: {}", self.message)
    }
}

impl std::error::Error for SerializationError {}

/// A value rejected by the schema's declared type for a field.
#[derive(Debug)]
pub struct TypeValidationError {
    pub field_name: String,
    pub expected: String,
    pub message: String,
}

impl fmt::Display for TypeValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "field '{}' expected {}: {}",
            self.field_name, self.expected, self.message
        )
    }
}

impl std::error::Error for TypeValidationError {}

/// Duplicate field number/ordinal, or missing required schema metadata
/// (name, ordinal, file_id, root_type).
#[derive(Debug)]
pub struct SchemaValidationError {
    pub message: String,
}

impl fmt::Display for SchemaValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "schema validation error: {}", self.message)
    }
}

impl std::error::Error for SchemaValidationError {}

/// Umbrella over the two validation error subclasses, per spec.md §7.
#[derive(Debug)]
pub enum ValidationError {
    Type(TypeValidationError),
    Schema(SchemaValidationError),
    UnknownField { field_name: String },
    MissingRequired { field_name: String },
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidationError::Type(e) => write!(f, "{}", e),
            ValidationError::Schema(e) => write!(f, "{}", e),
            ValidationError::UnknownField { field_name } => {
                write!(f, "unknown field: {}", field_name)
            }
            ValidationError::MissingRequired { field_name } => {
                write!(f, "missing required field: {}", field_name)
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Constructing a `Value` with a nonsense raw shape (e.g. a map entry
/// missing a key or value).
#[derive(Debug)]
pub struct InvalidValueError {
    pub message: String,
}

impl fmt::Display for InvalidValueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid value: {}", self.message)
    }
}

impl std::error::Error for InvalidValueError {}

/// A narrowing conversion (e.g. non-numeric string to integer) that did
/// not succeed.
#[derive(Debug)]
pub struct TypeCoercionError {
    pub message: String,
}

impl fmt::Display for TypeCoercionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "type coercion error: {}", self.message)
    }
}

impl std::error::Error for TypeCoercionError {}

/// The single error type returned by every fallible operation in this
/// workspace. Boundary errors (`Io`, missing files) are included so the
/// thin `_file` wrappers in the public API (spec.md §6.1) can surface
/// them without a second error type.
#[derive(Debug)]
pub enum WireformsError {
    Parse(ParseError),
    Serialization(SerializationError),
    Validation(ValidationError),
    InvalidValue(InvalidValueError),
    TypeCoercion(TypeCoercionError),
    Io(std::io::Error),
    ArgumentError(String),
}

impl fmt::Display for WireformsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireformsError::Parse(e) => write!(f, "{}", e),
            WireformsError::Serialization(e) => write!(f, "{}", e),
            WireformsError::Validation(e) => write!(f, "{}", e),
            WireformsError::InvalidValue(e) => write!(f, "{}", e),
            WireformsError::TypeCoercion(e) => write!(f, "{}", e),
            WireformsError::Io(e) => write!(f, "{}", e),
            WireformsError::ArgumentError(m) => write!(f, "argument error: {}", m),
        }
    }
}

impl std::error::Error for WireformsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireformsError::Parse(e) => Some(e),
            WireformsError::Serialization(e) => Some(e),
            WireformsError::Validation(e) => Some(e),
            WireformsError::InvalidValue(e) => Some(e),
            WireformsError::TypeCoercion(e) => Some(e),
            WireformsError::Io(e) => Some(e),
            WireformsError::ArgumentError(_) => None,
        }
    }
}

impl From<ParseError> for WireformsError {
    fn from(e: ParseError) -> Self {
        WireformsError::Parse(e)
    }
}

impl From<SerializationError> for WireformsError {
    fn from(e: SerializationError) -> Self {
        WireformsError::Serialization(e)
    }
}

impl From<ValidationError> for WireformsError {
    fn from(e: ValidationError) -> Self {
        WireformsError::Validation(e)
    }
}

impl From<InvalidValueError> for WireformsError {
    fn from(e: InvalidValueError) -> Self {
        WireformsError::InvalidValue(e)
    }
}

impl From<TypeCoercionError> for WireformsError {
    fn from(e: TypeCoercionError) -> Self {
        WireformsError::TypeCoercion(e)
    }
}

impl From<std::io::Error> for WireformsError {
    fn from(e: std::io::Error) -> Self {
        WireformsError::Io(e)
    }
}

impl From<ParseIntError> for ParseError {
    fn from(e: ParseIntError) -> Self {
        ParseError::new(format!("{}", e))
    }
}

impl From<ParseFloatError> for ParseError {
    fn from(e: ParseFloatError) -> Self {
        ParseError::new(format!("{}", e))
    }
}

impl From<Utf8Error> for ParseError {
    fn from(e: Utf8Error) -> Self {
        ParseError::new(format!("invalid utf-8: {}", e))
    }
}

pub type WireformsResult<T> = Result<T, WireformsError>;
