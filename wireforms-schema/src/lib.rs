//! Schema grammars, processors, and binary codecs for Proto3, Cap'n
//! Proto, and FlatBuffers (spec.md §2's "value model → schema models →
//! grammars → processors → codecs" pipeline), plus the schema validator
//! and the top-level dispatch functions from spec.md §6.1.

pub mod capnp;
pub mod fbs;
pub mod proto3;
pub mod proto_wire;
pub mod validate;

use std::path::Path;

use wireforms::error::{WireformsError, WireformsResult};
use wireforms::value::{Message, Value};

pub use capnp::{CapnpBinaryParser, CapnpBinarySerializer, CapnpSchema};
pub use fbs::{FbsBinaryParser, FbsBinarySerializer, FbsSchema};
pub use proto3::ProtoSchema;
pub use proto_wire::ProtoBinaryCodec;

/// Parse a Protocol Buffers binary payload against a schema
/// (spec.md §6.1 `parse_binary`).
pub fn parse_binary(content: &[u8], schema: &ProtoSchema, message_type: &str) -> WireformsResult<Message> {
    log::debug!("parse_binary: {} bytes as '{}'", content.len(), message_type);
    ProtoBinaryCodec::new(schema).decode(content, message_type)
}

/// Read and parse a Protocol Buffers binary file (spec.md §6.1
/// `parse_binary_file`).
pub fn parse_binary_file(path: impl AsRef<Path>, schema: &ProtoSchema, message_type: &str) -> WireformsResult<Message> {
    let content = std::fs::read(path)?;
    parse_binary(&content, schema, message_type)
}

/// Parse a `.proto` document (spec.md §6.1 `parse_schema`, proto3).
pub fn parse_schema(source: &str) -> WireformsResult<ProtoSchema> {
    Ok(proto3::parse_schema(source)?)
}

pub fn parse_schema_file(path: impl AsRef<Path>) -> WireformsResult<ProtoSchema> {
    let content = std::fs::read_to_string(path)?;
    parse_schema(&content)
}

/// Parse a `.fbs` document (spec.md §6.1 `parse_flatbuffers_schema`).
pub fn parse_flatbuffers_schema(source: &str) -> WireformsResult<FbsSchema> {
    Ok(fbs::parse_schema(source)?)
}

pub fn parse_flatbuffers_schema_file(path: impl AsRef<Path>) -> WireformsResult<FbsSchema> {
    let content = std::fs::read_to_string(path)?;
    parse_flatbuffers_schema(&content)
}

/// Parse a FlatBuffers binary payload (spec.md §6.1 `parse_flatbuffers_binary`).
pub fn parse_flatbuffers_binary(content: &[u8], schema: &FbsSchema, root_type: &str) -> WireformsResult<Value> {
    log::debug!("parse_flatbuffers_binary: {} bytes as '{}'", content.len(), root_type);
    FbsBinaryParser::new(schema).parse(content, root_type)
}

pub fn parse_flatbuffers_binary_file(
    path: impl AsRef<Path>,
    schema: &FbsSchema,
    root_type: &str,
) -> WireformsResult<Value> {
    let content = std::fs::read(path)?;
    parse_flatbuffers_binary(&content, schema, root_type)
}

/// Parse a `.capnp` document (spec.md §6.1 `parse_capnproto_schema`).
pub fn parse_capnproto_schema(source: &str) -> WireformsResult<CapnpSchema> {
    Ok(capnp::parse_schema(source)?)
}

pub fn parse_capnproto_schema_file(path: impl AsRef<Path>) -> WireformsResult<CapnpSchema> {
    let content = std::fs::read_to_string(path)?;
    parse_capnproto_schema(&content)
}

/// The result of the extension/content-sniffing dispatcher (spec.md §6.1
/// `parse`): textproto sources decode eagerly into a `Message`; binary
/// sources require a schema and decode the same way.
#[derive(Debug, Clone, PartialEq)]
pub enum ParsedDocument {
    Text(Message),
    Binary(Message),
}

/// Dispatch by file extension (spec.md §6.1): `.txtpb`/`.textproto` parse
/// as text; `.binpb` parses as Protocol Buffers binary (schema + message
/// type required); `.proto`/`.fbs`/`.capnp` are schemas, not data, and are
/// rejected; anything else falls back to a UTF-8 content sniff.
pub fn parse(path: impl AsRef<Path>, schema: Option<(&ProtoSchema, &str)>) -> WireformsResult<ParsedDocument> {
    let path = path.as_ref();
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
    log::debug!("parse: dispatching '{}' on extension '{}'", path.display(), ext);
    match ext {
        "txtpb" | "textproto" => Ok(ParsedDocument::Text(wireforms::parse_textproto_file(path)?)),
        "binpb" => {
            let (schema, message_type) = require_schema(schema)?;
            Ok(ParsedDocument::Binary(parse_binary_file(path, schema, message_type)?))
        }
        "proto" | "fbs" | "capnp" => Err(WireformsError::ArgumentError(format!(
            "'{}' is a schema, not data",
            path.display()
        ))),
        _ => {
            let bytes = std::fs::read(path)?;
            match std::str::from_utf8(&bytes) {
                Ok(text) => Ok(ParsedDocument::Text(wireforms::parse_textproto(text)?)),
                Err(_) => {
                    let (schema, message_type) = require_schema(schema)?;
                    Ok(ParsedDocument::Binary(parse_binary(&bytes, schema, message_type)?))
                }
            }
        }
    }
}

fn require_schema<'a>(
    schema: Option<(&'a ProtoSchema, &'a str)>,
) -> WireformsResult<(&'a ProtoSchema, &'a str)> {
    schema.ok_or_else(|| WireformsError::ArgumentError("binary input requires a schema and message type".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wireforms::value::Field;

    #[test]
    fn parse_binary_round_trips_through_dispatch() {
        let schema = parse_schema(
            r#"
            syntax = "proto3";
            message Greeting { string text = 1; }
            "#,
        )
        .unwrap();
        let mut message = Message::new();
        message.push(Field::new("text", Value::string("hi")));
        let bytes = ProtoBinaryCodec::new(&schema).encode(&message, "Greeting").unwrap();
        let decoded = parse_binary(&bytes, &schema, "Greeting").unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn rejects_schema_documents_as_data() {
        let err = parse("Schema.proto", None).unwrap_err();
        assert!(matches!(err, WireformsError::ArgumentError(_)));
    }
}
