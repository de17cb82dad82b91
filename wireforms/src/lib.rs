//! Generic value tree, error taxonomy and text-format support shared by
//! the proto/Cap'n Proto/FlatBuffers schema and codec crates in
//! `wireforms-schema`.
//!
//! This crate holds no schema knowledge: it is the leaf of the
//! dependency order in spec.md §2 ("value model → schema models →
//! grammars → processors → codecs").

pub mod error;
pub mod json;
pub mod text_format;
pub mod value;
pub mod yaml;

pub use error::{WireformsError, WireformsResult};
pub use value::{Field, MapEntry, Message, Scalar, Value};

/// Parse a `.textproto`/`.txtpb` document into a `Message`
/// (spec.md §6.1 `parse_textproto`).
pub fn parse_textproto(content: &str) -> WireformsResult<Message> {
    Ok(text_format::parse_textproto(content)?)
}

/// Read and parse a `.textproto`/`.txtpb` file
/// (spec.md §6.1 `parse_textproto_file`).
pub fn parse_textproto_file(path: impl AsRef<std::path::Path>) -> WireformsResult<Message> {
    let content = std::fs::read_to_string(path)?;
    parse_textproto(&content)
}
