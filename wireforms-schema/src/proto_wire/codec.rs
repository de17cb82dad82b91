//! Protocol Buffers binary wire codec (spec.md §4.5).

use std::collections::HashMap;

use wireforms::error::{ParseError, SerializationError, WireformsError, WireformsResult};
use wireforms::value::{bytes_to_scalar_string, scalar_string_to_bytes, Field, MapEntry, Message, Scalar, Value};

use crate::proto3::model::{EnumDef, FieldDef, MessageDef, ProtoSchema};
use crate::proto_wire::varint::{
    decode_varint, encode_varint, skip_varint, zigzag_decode32, zigzag_decode64, zigzag_encode32,
    zigzag_encode64,
};

const WIRE_VARINT: u32 = 0;
const WIRE_I64: u32 = 1;
const WIRE_LEN: u32 = 2;
const WIRE_I32: u32 = 5;

/// A flat, schema-wide lookup table keyed by unqualified name (spec.md
/// §9's "resolve by name at use" design note) — every message/enum in a
/// `ProtoSchema`, top-level or nested, indexed once per codec call.
struct SchemaIndex<'s> {
    messages: HashMap<&'s str, &'s MessageDef>,
    enums: HashMap<&'s str, &'s EnumDef>,
}

impl<'s> SchemaIndex<'s> {
    fn build(schema: &'s ProtoSchema) -> SchemaIndex<'s> {
        let mut messages = HashMap::new();
        let mut enums = HashMap::new();
        for m in &schema.messages {
            index_message(m, &mut messages, &mut enums);
        }
        for e in &schema.enums {
            enums.insert(e.name.as_str(), e);
        }
        SchemaIndex { messages, enums }
    }
}

fn index_message<'s>(
    m: &'s MessageDef,
    messages: &mut HashMap<&'s str, &'s MessageDef>,
    enums: &mut HashMap<&'s str, &'s EnumDef>,
) {
    messages.insert(m.name.as_str(), m);
    for nested in &m.nested_messages {
        index_message(nested, messages, enums);
    }
    for e in &m.nested_enums {
        enums.insert(e.name.as_str(), e);
    }
}

fn wire_type_for(ty: &str, index: &SchemaIndex) -> Option<u32> {
    match ty {
        "bool" | "int32" | "int64" | "uint32" | "uint64" | "sint32" | "sint64" => Some(WIRE_VARINT),
        "fixed64" | "sfixed64" | "double" => Some(WIRE_I64),
        "fixed32" | "sfixed32" | "float" => Some(WIRE_I32),
        "string" | "bytes" | "map" => Some(WIRE_LEN),
        other if index.enums.contains_key(other) => Some(WIRE_VARINT),
        other if index.messages.contains_key(other) => Some(WIRE_LEN),
        _ => None,
    }
}

pub struct ProtoBinaryCodec<'s> {
    schema: &'s ProtoSchema,
    index: SchemaIndex<'s>,
}

impl<'s> ProtoBinaryCodec<'s> {
    pub fn new(schema: &'s ProtoSchema) -> ProtoBinaryCodec<'s> {
        ProtoBinaryCodec {
            schema,
            index: SchemaIndex::build(schema),
        }
    }

    fn message_def(&self, message_type: &str) -> WireformsResult<&'s MessageDef> {
        self.index
            .messages
            .get(message_type)
            .copied()
            .ok_or_else(|| {
                WireformsError::Serialization(SerializationError::new(format!(
                    "unknown message type: {}",
                    message_type
                )))
            })
    }

    pub fn encode(&self, message: &Message, message_type: &str) -> WireformsResult<Vec<u8>> {
        let def = self.message_def(message_type)?;
        let mut out = Vec::new();
        self.encode_message(message, def, &mut out)?;
        Ok(out)
    }

    fn encode_message(&self, message: &Message, def: &MessageDef, out: &mut Vec<u8>) -> WireformsResult<()> {
        for field in message.fields() {
            let Some(field_def) = def.field_by_name(&field.name) else {
                // Unknown field: skip on write, matching decoder leniency
                // (spec.md §4.5 "no error, matching decoder leniency").
                continue;
            };
            self.encode_field(field_def, &field.value, out)?;
        }
        Ok(())
    }

    fn encode_field(&self, field_def: &FieldDef, value: &Value, out: &mut Vec<u8>) -> WireformsResult<()> {
        if field_def.is_map() {
            return self.encode_map_field(field_def, value, out);
        }
        match value {
            Value::List(items) if field_def.is_repeated() => {
                for item in items {
                    self.encode_scalar_field(field_def, item, out)?;
                }
                Ok(())
            }
            other => self.encode_scalar_field(field_def, other, out),
        }
    }

    fn encode_map_field(&self, field_def: &FieldDef, value: &Value, out: &mut Vec<u8>) -> WireformsResult<()> {
        let entries = match value {
            Value::Map(entries) => entries,
            _ => {
                return Err(WireformsError::Serialization(SerializationError::new(
                    "map field value is not a Map",
                )))
            }
        };
        let key_ty = field_def.key_type.as_deref().unwrap_or("string");
        let value_ty = field_def.value_type.as_deref().unwrap_or("string");
        for entry in entries {
            let key_field = FieldDef {
                name: "key".to_string(),
                ty: key_ty.to_string(),
                number: 1,
                label: None,
                key_type: None,
                value_type: None,
            };
            let value_field = FieldDef {
                name: "value".to_string(),
                ty: value_ty.to_string(),
                number: 2,
                label: None,
                key_type: None,
                value_type: None,
            };
            let mut entry_bytes = Vec::new();
            self.encode_scalar_field(&key_field, &Value::Scalar(entry.key.clone()), &mut entry_bytes)?;
            self.encode_scalar_field(&value_field, &entry.value, &mut entry_bytes)?;
            write_tag(field_def.number, WIRE_LEN, out);
            encode_varint(entry_bytes.len() as u64, out);
            out.extend_from_slice(&entry_bytes);
        }
        Ok(())
    }

    fn encode_scalar_field(&self, field_def: &FieldDef, value: &Value, out: &mut Vec<u8>) -> WireformsResult<()> {
        let wire_type = wire_type_for(&field_def.ty, &self.index).ok_or_else(|| {
            WireformsError::Serialization(SerializationError::new(format!(
                "unknown field type: {}",
                field_def.ty
            )))
        })?;
        write_tag(field_def.number, wire_type, out);
        match field_def.ty.as_str() {
            "bool" => encode_varint(bool_of(value)? as u64, out),
            "int32" | "int64" => encode_varint(int_of(value)? as u64, out),
            "uint32" | "uint64" => encode_varint(int_of(value)? as u64, out),
            "sint32" => encode_varint(zigzag_encode32(int_of(value)? as i32) as u64, out),
            "sint64" => encode_varint(zigzag_encode64(int_of(value)?) as u64, out),
            "fixed64" | "sfixed64" => out.extend_from_slice(&(int_of(value)? as u64).to_le_bytes()),
            "double" => out.extend_from_slice(&float_of(value)?.to_le_bytes()),
            "fixed32" | "sfixed32" => out.extend_from_slice(&(int_of(value)? as u32).to_le_bytes()),
            "float" => out.extend_from_slice(&(float_of(value)? as f32).to_le_bytes()),
            "string" => {
                let bytes = str_of(value)?.as_bytes().to_vec();
                encode_varint(bytes.len() as u64, out);
                out.extend_from_slice(&bytes);
            }
            "bytes" => {
                let bytes = scalar_string_to_bytes(str_of(value)?);
                encode_varint(bytes.len() as u64, out);
                out.extend_from_slice(&bytes);
            }
            other if self.index.enums.contains_key(other) => {
                encode_varint(enum_value_of(value, self.index.enums[other])? as u64, out)
            }
            other if self.index.messages.contains_key(other) => {
                let sub_def = self.index.messages[other];
                let sub_message = value.as_message().ok_or_else(|| {
                    WireformsError::Serialization(SerializationError::new(format!(
                        "field '{}' expected an embedded message",
                        field_def.name
                    )))
                })?;
                let mut sub_bytes = Vec::new();
                self.encode_message(sub_message, sub_def, &mut sub_bytes)?;
                encode_varint(sub_bytes.len() as u64, out);
                out.extend_from_slice(&sub_bytes);
            }
            other => {
                return Err(WireformsError::Serialization(SerializationError::new(format!(
                    "unknown field type: {}",
                    other
                ))))
            }
        }
        Ok(())
    }

    /// An empty buffer decodes to an empty `Message` — mirrors the
    /// encoder's "empty message -> empty byte string" invariant
    /// (spec.md §8).
    pub fn decode(&self, bytes: &[u8], message_type: &str) -> WireformsResult<Message> {
        let def = self.message_def(message_type)?;
        self.decode_message(bytes, def)
    }

    fn decode_message(&self, bytes: &[u8], def: &MessageDef) -> WireformsResult<Message> {
        let mut message = Message::new();
        let mut map_values: HashMap<u32, Vec<MapEntry>> = HashMap::new();
        let mut pos = 0usize;
        while pos < bytes.len() {
            let (tag, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
            pos = next;
            let field_number = (tag >> 3) as u32;
            let wire_type = (tag & 0x7) as u32;
            if field_number == 0 {
                return Err(WireformsError::Parse(ParseError::new("field number 0 is invalid")));
            }
            let field_def = def.field_by_number(field_number);
            match field_def {
                None => {
                    pos = skip_value(bytes, pos, wire_type)?;
                }
                Some(field_def) if field_def.is_map() => {
                    let (payload, next) = read_len_payload(bytes, pos, wire_type)?;
                    pos = next;
                    let entry = self.decode_map_entry(payload, field_def)?;
                    map_values.entry(field_number).or_default().push(entry);
                }
                Some(field_def) => {
                    let (value, next) = self.decode_scalar_value(bytes, pos, wire_type, field_def)?;
                    pos = next;
                    message.push(Field::new(&field_def.name, value));
                }
            }
        }
        for (field_number, entries) in map_values {
            let field_def = def.field_by_number(field_number).expect("map field indexed above");
            message.push(Field::new_map(&field_def.name, Value::Map(entries)));
        }
        Ok(message)
    }

    fn decode_map_entry(&self, payload: &[u8], field_def: &FieldDef) -> WireformsResult<MapEntry> {
        let key_ty = field_def.key_type.as_deref().unwrap_or("string");
        let value_ty = field_def.value_type.as_deref().unwrap_or("string");
        let key_field = FieldDef {
            name: "key".to_string(),
            ty: key_ty.to_string(),
            number: 1,
            label: None,
            key_type: None,
            value_type: None,
        };
        let value_field = FieldDef {
            name: "value".to_string(),
            ty: value_ty.to_string(),
            number: 2,
            label: None,
            key_type: None,
            value_type: None,
        };
        let entry_def = MessageDef {
            name: "MapEntry".to_string(),
            fields: vec![key_field, value_field],
            ..MessageDef::default()
        };
        let entry_message = self.decode_message(payload, &entry_def)?;
        let key = entry_message
            .find_field("key")
            .and_then(|f| f.value.as_scalar())
            .cloned()
            .unwrap_or(Scalar::Null);
        let value = entry_message
            .find_field("value")
            .map(|f| f.value.clone())
            .unwrap_or(Value::null());
        Ok(MapEntry { key, value })
    }

    fn decode_scalar_value(
        &self,
        bytes: &[u8],
        pos: usize,
        wire_type: u32,
        field_def: &FieldDef,
    ) -> WireformsResult<(Value, usize)> {
        match field_def.ty.as_str() {
            "bool" => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::bool(v != 0), next))
            }
            "int32" | "int64" => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::int(v as i64), next))
            }
            "uint32" | "uint64" => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::int(v as i64), next))
            }
            "sint32" => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::int(zigzag_decode32(v as u32) as i64), next))
            }
            "sint64" => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::int(zigzag_decode64(v)), next))
            }
            "fixed64" | "sfixed64" => {
                let arr = read_fixed::<8>(bytes, pos)?;
                Ok((Value::int(u64::from_le_bytes(arr) as i64), pos + 8))
            }
            "double" => {
                let arr = read_fixed::<8>(bytes, pos)?;
                Ok((Value::float(f64::from_le_bytes(arr)), pos + 8))
            }
            "fixed32" | "sfixed32" => {
                let arr = read_fixed::<4>(bytes, pos)?;
                Ok((Value::int(u32::from_le_bytes(arr) as i64), pos + 4))
            }
            "float" => {
                let arr = read_fixed::<4>(bytes, pos)?;
                Ok((Value::float(f32::from_le_bytes(arr) as f64), pos + 4))
            }
            "string" => {
                let (payload, next) = read_len_payload(bytes, pos, wire_type)?;
                let s = std::str::from_utf8(payload).map_err(|e| WireformsError::Parse(ParseError::from(e)))?;
                Ok((Value::string(s), next))
            }
            "bytes" => {
                let (payload, next) = read_len_payload(bytes, pos, wire_type)?;
                Ok((Value::string(bytes_to_scalar_string(payload)), next))
            }
            other if self.index.enums.contains_key(other) => {
                let (v, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
                Ok((Value::int(v as i64), next))
            }
            other if self.index.messages.contains_key(other) => {
                let (payload, next) = read_len_payload(bytes, pos, wire_type)?;
                let sub_def = self.index.messages[other];
                let sub_message = self.decode_message(payload, sub_def)?;
                Ok((Value::Message(sub_message), next))
            }
            other => Err(WireformsError::Parse(ParseError::new(format!(
                "unknown field type: {}",
                other
            )))),
        }
    }
}

fn write_tag(field_number: u32, wire_type: u32, out: &mut Vec<u8>) {
    let tag = ((field_number as u64) << 3) | wire_type as u64;
    encode_varint(tag, out);
}

fn read_fixed<const N: usize>(bytes: &[u8], pos: usize) -> WireformsResult<[u8; N]> {
    if pos + N > bytes.len() {
        return Err(WireformsError::Parse(ParseError::new("truncated fixed-width value")));
    }
    let mut arr = [0u8; N];
    arr.copy_from_slice(&bytes[pos..pos + N]);
    Ok(arr)
}

fn read_len_payload(bytes: &[u8], pos: usize, wire_type: u32) -> WireformsResult<(&[u8], usize)> {
    if wire_type != WIRE_LEN {
        return Err(WireformsError::Parse(ParseError::new("expected length-delimited wire type")));
    }
    let (len, next) = decode_varint(bytes, pos).map_err(WireformsError::Parse)?;
    let len = len as usize;
    if next + len > bytes.len() {
        return Err(WireformsError::Parse(ParseError::new("length-delimited payload overruns buffer")));
    }
    Ok((&bytes[next..next + len], next + len))
}

fn skip_value(bytes: &[u8], pos: usize, wire_type: u32) -> WireformsResult<usize> {
    match wire_type {
        WIRE_VARINT => skip_varint(bytes, pos).map_err(WireformsError::Parse),
        WIRE_I64 => {
            if pos + 8 > bytes.len() {
                return Err(WireformsError::Parse(ParseError::new("truncated 64-bit value")));
            }
            Ok(pos + 8)
        }
        WIRE_I32 => {
            if pos + 4 > bytes.len() {
                return Err(WireformsError::Parse(ParseError::new("truncated 32-bit value")));
            }
            Ok(pos + 4)
        }
        WIRE_LEN => {
            let (_, next) = read_len_payload(bytes, pos, WIRE_LEN)?;
            Ok(next)
        }
        other => Err(WireformsError::Parse(ParseError::new(format!(
            "unsupported wire type: {}",
            other
        )))),
    }
}

fn bool_of(value: &Value) -> WireformsResult<bool> {
    value
        .as_scalar()
        .and_then(Scalar::as_bool)
        .ok_or_else(|| WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
            message: "expected bool".to_string(),
        }))
}

fn int_of(value: &Value) -> WireformsResult<i64> {
    value
        .as_scalar()
        .and_then(Scalar::as_int)
        .ok_or_else(|| WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
            message: "expected integer".to_string(),
        }))
}

fn float_of(value: &Value) -> WireformsResult<f64> {
    value
        .as_scalar()
        .and_then(Scalar::as_float)
        .ok_or_else(|| WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
            message: "expected number".to_string(),
        }))
}

fn str_of(value: &Value) -> WireformsResult<&str> {
    value
        .as_scalar()
        .and_then(Scalar::as_str)
        .ok_or_else(|| WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
            message: "expected string".to_string(),
        }))
}

fn enum_value_of(value: &Value, enum_def: &EnumDef) -> WireformsResult<i32> {
    match value.as_scalar() {
        Some(Scalar::Int(i)) => Ok(*i as i32),
        Some(Scalar::String(name)) => enum_def.values.get(name).ok_or_else(|| {
            WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
                message: format!("unknown enum symbol: {}", name),
            })
        }),
        _ => Err(WireformsError::TypeCoercion(wireforms::error::TypeCoercionError {
            message: "expected enum symbol or integer".to_string(),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto3::parse_schema;

    fn person_schema() -> ProtoSchema {
        parse_schema(
            r#"
            syntax = "proto3";
            message Person {
                string name = 1;
                int32 age = 2;
                bool active = 3;
            }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn round_trips_flat_message() {
        let schema = person_schema();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut message = Message::new();
        message.push(Field::new("name", Value::string("Alice")));
        message.push(Field::new("age", Value::int(30)));
        message.push(Field::new("active", Value::bool(true)));

        let bytes = codec.encode(&message, "Person").unwrap();
        let decoded = codec.decode(&bytes, "Person").unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn field_150_varint_tag_matches_spec() {
        let schema = parse_schema("message M { int32 x = 150; }").unwrap();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut message = Message::new();
        message.push(Field::new("x", Value::int(1)));
        let bytes = codec.encode(&message, "M").unwrap();
        let mut expected_tag = Vec::new();
        encode_varint((150u64 << 3) | 0, &mut expected_tag);
        assert_eq!(&bytes[..expected_tag.len()], expected_tag.as_slice());
    }

    #[test]
    fn string_field_length_prefix_matches_spec() {
        let schema = parse_schema("message M { string s = 1; }").unwrap();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut message = Message::new();
        message.push(Field::new("s", Value::string("hello")));
        let bytes = codec.encode(&message, "M").unwrap();
        assert_eq!(bytes, vec![0x0A, 0x05, b'h', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn nested_embedded_message_round_trips() {
        let schema = parse_schema(
            r#"
            message Person { string name = 1; Address address = 2; }
            message Address { string city = 1; }
            "#,
        )
        .unwrap();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut address = Message::new();
        address.push(Field::new("city", Value::string("SF")));
        let mut person = Message::new();
        person.push(Field::new("name", Value::string("Bob")));
        person.push(Field::new("address", Value::Message(address)));

        let bytes = codec.encode(&person, "Person").unwrap();
        let decoded = codec.decode(&bytes, "Person").unwrap();
        assert_eq!(decoded, person);
    }

    #[test]
    fn unknown_field_number_is_skipped_on_decode() {
        let schema = person_schema();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut bytes = Vec::new();
        // field 99, varint wire type, value 7 - not declared in schema.
        write_tag(99, WIRE_VARINT, &mut bytes);
        encode_varint(7, &mut bytes);
        write_tag(2, WIRE_VARINT, &mut bytes);
        encode_varint(42, &mut bytes);
        let decoded = codec.decode(&bytes, "Person").unwrap();
        assert_eq!(decoded.find_field("age").unwrap().value, Value::int(42));
    }

    #[test]
    fn repeated_field_round_trips_as_list() {
        let schema = parse_schema("message M { repeated string tags = 1; }").unwrap();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut message = Message::new();
        message.push(Field::new("tags", Value::string("a")));
        message.push(Field::new("tags", Value::string("b")));
        let bytes = codec.encode(&message, "M").unwrap();
        let decoded = codec.decode(&bytes, "M").unwrap();
        assert_eq!(decoded.find_fields("tags").len(), 2);
    }

    #[test]
    fn map_field_round_trips() {
        let schema = parse_schema("message M { map<string, int32> scores = 1; }").unwrap();
        let codec = ProtoBinaryCodec::new(&schema);
        let mut message = Message::new();
        message.push(Field::new_map(
            "scores",
            Value::Map(vec![
                MapEntry {
                    key: Scalar::String("alice".to_string()),
                    value: Value::int(10),
                },
                MapEntry {
                    key: Scalar::String("bob".to_string()),
                    value: Value::int(20),
                },
            ]),
        ));
        let bytes = codec.encode(&message, "M").unwrap();
        let decoded = codec.decode(&bytes, "M").unwrap();
        let map = decoded.find_field("scores").unwrap().value.as_map().unwrap();
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn empty_message_encodes_to_empty_bytes() {
        let schema = person_schema();
        let codec = ProtoBinaryCodec::new(&schema);
        let bytes = codec.encode(&Message::new(), "Person").unwrap();
        assert!(bytes.is_empty());
    }

    #[test]
    fn truncated_varint_is_parse_error() {
        let schema = person_schema();
        let codec = ProtoBinaryCodec::new(&schema);
        let result = codec.decode(&[0x80], "Person");
        assert!(result.is_err());
    }
}
