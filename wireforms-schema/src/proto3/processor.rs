//! Proto3 semantic processor (spec.md §4.2): raw parse tree → validated
//! `ProtoSchema`, checking the invariants from spec.md §3.2.

use std::collections::HashSet;

use wireforms::error::ParseError;

use crate::proto3::grammar::{self, RawEnum, RawField, RawFile, RawMessage};
use crate::proto3::model::{EnumDef, FieldDef, FieldLabel, MessageDef, OrderedEnumValues, ProtoSchema};

fn process_field(raw: RawField) -> Result<FieldDef, ParseError> {
    let label = if raw.repeated {
        Some(FieldLabel::Repeated)
    } else {
        None
    };
    // A non-scalar `ty` is a reference to a message/enum, resolved by
    // name at use (spec.md §9) — no lookup happens here; a dangling
    // reference surfaces later, at validation time.
    Ok(FieldDef {
        name: raw.name,
        ty: raw.ty,
        number: raw.number,
        label,
        key_type: raw.map_key_type,
        value_type: raw.map_value_type,
    })
}

fn process_message(raw: RawMessage, source: &str) -> Result<MessageDef, ParseError> {
    let mut seen_numbers = HashSet::new();
    let mut fields = Vec::with_capacity(raw.fields.len());
    for field in raw.fields {
        if field.number == 0 {
            return Err(
                ParseError::at(format!("field '{}' has non-positive number", field.name), field.loc)
                    .with_window(source),
            );
        }
        if !seen_numbers.insert(field.number) {
            return Err(ParseError::at(
                format!("duplicate field number {} in message '{}'", field.number, raw.name),
                field.loc,
            )
            .with_window(source));
        }
        fields.push(process_field(field)?);
    }
    let mut nested_messages = Vec::with_capacity(raw.nested_messages.len());
    for nested in raw.nested_messages {
        nested_messages.push(process_message(nested, source)?);
    }
    let mut nested_enums = Vec::with_capacity(raw.nested_enums.len());
    for e in raw.nested_enums {
        nested_enums.push(process_enum(e, source)?);
    }
    Ok(MessageDef {
        name: raw.name,
        fields,
        nested_messages,
        nested_enums,
    })
}

fn process_enum(raw: RawEnum, source: &str) -> Result<EnumDef, ParseError> {
    let mut seen = HashSet::new();
    let mut values = OrderedEnumValues::default();
    for v in raw.values {
        if !seen.insert(v.number) {
            return Err(ParseError::new(format!(
                "duplicate enum value number {} in enum '{}'",
                v.number, raw.name
            ))
            .with_window(source));
        }
        values.insert(v.name, v.number);
    }
    Ok(EnumDef {
        name: raw.name,
        values,
    })
}

pub fn process(raw: RawFile, source: &str) -> Result<ProtoSchema, ParseError> {
    let package = if raw.package.is_empty() {
        None
    } else {
        Some(raw.package.join("."))
    };
    let mut messages = Vec::with_capacity(raw.messages.len());
    for m in raw.messages {
        messages.push(process_message(m, source)?);
    }
    let mut enums = Vec::with_capacity(raw.enums.len());
    for e in raw.enums {
        enums.push(process_enum(e, source)?);
    }
    Ok(ProtoSchema {
        syntax: raw.syntax.unwrap_or_else(|| "proto3".to_string()),
        package,
        imports: raw.imports,
        messages,
        enums,
    })
}

/// Parse and process a `.proto` document into a `ProtoSchema`
/// (spec.md §6.1 `parse_schema`).
pub fn parse_schema(source: &str) -> Result<ProtoSchema, ParseError> {
    let raw = grammar::parse(source)?;
    process(raw, source)
}
