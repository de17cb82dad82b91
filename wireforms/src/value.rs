//! The generic value tree shared by every codec in this workspace
//! (spec.md §3.1). Parsers build it; codecs and emitters walk it; nothing
//! outside a single parse/serialize call ever mutates it concurrently.

use std::fmt;
use std::iter::FromIterator;

use crate::error::InvalidValueError;

/// A scalar leaf value. `Null` stands in for "absent"/"unset" rather than
/// an explicit wire representation of its own.
#[derive(Debug, Clone, PartialEq)]
pub enum Scalar {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl Scalar {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Scalar::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Scalar::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            Scalar::Float(f) => Some(*f),
            Scalar::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::String(s) => write!(f, "{}", s),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{}", v),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Null => write!(f, "null"),
        }
    }
}

/// One map entry. Keys are always scalars (proto map keys are integral or
/// string types; Cap'n Proto and FlatBuffers have no native map type but
/// reuse this shape for schema-less JSON/YAML emission).
#[derive(Debug, Clone, PartialEq)]
pub struct MapEntry {
    pub key: Scalar,
    pub value: Value,
}

/// A tagged value: scalar, nested message, repeated list, or map.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Scalar(Scalar),
    Message(Message),
    List(Vec<Value>),
    Map(Vec<MapEntry>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Value {
        Value::Scalar(Scalar::String(s.into()))
    }

    pub fn int(i: i64) -> Value {
        Value::Scalar(Scalar::Int(i))
    }

    pub fn float(f: f64) -> Value {
        Value::Scalar(Scalar::Float(f))
    }

    pub fn bool(b: bool) -> Value {
        Value::Scalar(Scalar::Bool(b))
    }

    pub fn null() -> Value {
        Value::Scalar(Scalar::Null)
    }

    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Value::Scalar(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_message(&self) -> Option<&Message> {
        match self {
            Value::Message(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[Value]> {
        match self {
            Value::List(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&[MapEntry]> {
        match self {
            Value::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Construct a map value, rejecting an empty raw shape mismatch
    /// (spec.md §7 `InvalidValueError`: "a Map without both key and
    /// value" — here generalized to any entry missing either half).
    pub fn map_from_pairs(pairs: Vec<(Option<Scalar>, Option<Value>)>) -> Result<Value, InvalidValueError> {
        let mut entries = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            match (key, value) {
                (Some(key), Some(value)) => entries.push(MapEntry { key, value }),
                _ => {
                    return Err(InvalidValueError {
                        message: "map entry missing key or value".to_string(),
                    })
                }
            }
        }
        Ok(Value::Map(entries))
    }
}

/// Raw bytes represented as a `String` whose chars are each a single byte
/// value 0..=255 — the value model has no dedicated bytes scalar, and this
/// mapping is a bijection, so `bytes`/`Data` fields still round-trip
/// bit-exactly through it.
pub fn bytes_to_scalar_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&b| b as char).collect()
}

pub fn scalar_string_to_bytes(s: &str) -> Vec<u8> {
    s.chars().map(|c| c as u32 as u8).collect()
}

/// One entry in a `Message`'s field sequence. Repeated proto fields appear
/// as multiple `Field`s sharing a name; ordering is preserved and is part
/// of structural equality (spec.md §3.1).
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub value: Value,
    pub is_map: bool,
}

impl Field {
    pub fn new(name: impl Into<String>, value: Value) -> Field {
        Field {
            name: name.into(),
            value,
            is_map: false,
        }
    }

    pub fn new_map(name: impl Into<String>, value: Value) -> Field {
        Field {
            name: name.into(),
            value,
            is_map: true,
        }
    }
}

/// An ordered, duplicate-allowing sequence of fields. Equality is
/// structural and order-sensitive (spec.md §3.1 invariants).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Message {
    fields: Vec<Field>,
}

impl Message {
    pub fn new() -> Message {
        Message { fields: Vec::new() }
    }

    pub fn push(&mut self, field: Field) {
        self.fields.push(field);
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field_count(&self) -> usize {
        self.fields.len()
    }

    /// First field with this name, if any.
    pub fn find_field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Every field with this name, in declaration order. Used for
    /// repeated proto fields (spec.md §4.8).
    pub fn find_fields<'a>(&'a self, name: &str) -> Vec<&'a Field> {
        self.fields.iter().filter(|f| f.name == name).collect()
    }

    /// Unique field names, preserving first-seen order.
    pub fn field_names(&self) -> Vec<&str> {
        let mut seen = std::collections::HashSet::new();
        let mut names = Vec::new();
        for f in &self.fields {
            if seen.insert(f.name.as_str()) {
                names.push(f.name.as_str());
            }
        }
        names
    }

    /// A shallow `name -> Value` view. Repeated fields collapse to their
    /// first occurrence, matching the "hash of fields" intuition behind
    /// `to_h`; callers that need every repeated entry should use
    /// `find_fields` instead.
    pub fn to_h(&self) -> Vec<(&str, &Value)> {
        self.field_names()
            .into_iter()
            .map(|name| (name, &self.find_field(name).unwrap().value))
            .collect()
    }
}

impl IntoIterator for Message {
    type Item = Field;
    type IntoIter = std::vec::IntoIter<Field>;

    fn into_iter(self) -> Self::IntoIter {
        self.fields.into_iter()
    }
}

impl FromIterator<Field> for Message {
    fn from_iter<T: IntoIterator<Item = Field>>(iter: T) -> Self {
        Message {
            fields: iter.into_iter().collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_fields_preserves_order_and_duplicates() {
        let mut m = Message::new();
        m.push(Field::new("subsets", Value::string("latin")));
        m.push(Field::new("subsets", Value::string("cyrillic")));
        let found = m.find_fields("subsets");
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].value, Value::string("latin"));
        assert_eq!(found[1].value, Value::string("cyrillic"));
    }

    #[test]
    fn field_names_dedups_preserving_first_seen_order() {
        let mut m = Message::new();
        m.push(Field::new("b", Value::int(1)));
        m.push(Field::new("a", Value::int(2)));
        m.push(Field::new("b", Value::int(3)));
        assert_eq!(m.field_names(), vec!["b", "a"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let mut a = Message::new();
        a.push(Field::new("x", Value::int(1)));
        a.push(Field::new("y", Value::int(2)));

        let mut b = Message::new();
        b.push(Field::new("y", Value::int(2)));
        b.push(Field::new("x", Value::int(1)));

        assert_ne!(a, b);
    }

    #[test]
    fn map_from_pairs_rejects_missing_half() {
        let err = Value::map_from_pairs(vec![(Some(Scalar::String("k".into())), None)]);
        assert!(err.is_err());
    }
}
