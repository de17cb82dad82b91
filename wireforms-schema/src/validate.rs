//! Schema validator (spec.md §4.9): check a parsed value against its
//! schema. A thin layer over the three schema models — it resolves each
//! field by name, flags unknown fields, range- and type-checks declared
//! values, and recurses into embedded messages/tables/structs.

use wireforms::error::{SchemaValidationError, TypeValidationError, ValidationError};
use wireforms::value::{Field, Message, Scalar, Value};

use crate::capnp::model::{CapnpSchema, FieldType as CapnpFieldType, StructDef as CapnpStructDef};
use crate::fbs::model::{FbsSchema, FbsType, TableDef as FbsTableDef};
use crate::proto3::model::{FieldDef as Proto3FieldDef, MessageDef as Proto3MessageDef, ProtoSchema};

fn type_error(field_name: &str, expected: &str, message: impl Into<String>) -> ValidationError {
    ValidationError::Type(TypeValidationError {
        field_name: field_name.to_string(),
        expected: expected.to_string(),
        message: message.into(),
    })
}

fn unknown_message(field_name: &str, message_type: &str) -> ValidationError {
    ValidationError::Schema(SchemaValidationError {
        message: format!("unknown message type '{}' for field '{}'", message_type, field_name),
    })
}

// ---------------------------------------------------------------------
// Proto3
// ---------------------------------------------------------------------

/// Validate a `Message` against a named Proto3 message definition.
pub fn validate_proto3(message: &Message, message_type: &str, schema: &ProtoSchema) -> Vec<ValidationError> {
    match schema.message_by_name(message_type) {
        Some(def) => validate_proto3_message(message, def, schema),
        None => vec![ValidationError::Schema(SchemaValidationError {
            message: format!("unknown message type '{}'", message_type),
        })],
    }
}

fn validate_proto3_message(message: &Message, def: &Proto3MessageDef, schema: &ProtoSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for field in message.fields() {
        match def.field_by_name(&field.name) {
            None => errors.push(ValidationError::UnknownField {
                field_name: field.name.clone(),
            }),
            Some(field_def) if field_def.is_map() => {
                // Map value/key shapes are established by construction
                // (Value::Map); nothing further to check at this summary level.
                if field.value.as_map().is_none() {
                    errors.push(type_error(&field.name, "map", "expected a map value"));
                }
            }
            Some(field_def) => match &field.value {
                Value::List(items) => {
                    for item in items {
                        check_proto3_scalar_or_message(&field.name, field_def, item, schema, &mut errors);
                    }
                }
                other => check_proto3_scalar_or_message(&field.name, field_def, other, schema, &mut errors),
            },
        }
    }
    errors
}

fn check_proto3_scalar_or_message(
    field_name: &str,
    field_def: &Proto3FieldDef,
    value: &Value,
    schema: &ProtoSchema,
    errors: &mut Vec<ValidationError>,
) {
    match field_def.ty.as_str() {
        "string" | "bytes" => require(field_name, value, errors, "string", |s| matches!(s, Scalar::String(_))),
        "bool" => require(field_name, value, errors, "bool", |s| matches!(s, Scalar::Bool(_))),
        "int32" | "sint32" | "sfixed32" => require_int_range(field_name, value, errors, i32::MIN as i64, i32::MAX as i64),
        "uint32" | "fixed32" => require_int_range(field_name, value, errors, 0, u32::MAX as i64),
        "int64" | "sint64" | "sfixed64" | "uint64" | "fixed64" => {
            require(field_name, value, errors, "integer", |s| matches!(s, Scalar::Int(_)))
        }
        "double" | "float" => require(field_name, value, errors, "number", |s| {
            matches!(s, Scalar::Float(_) | Scalar::Int(_))
        }),
        other => {
            if let Some(msg_def) = schema.message_by_name(other) {
                match value.as_message() {
                    Some(nested) => errors.extend(validate_proto3_message(nested, msg_def, schema)),
                    None => errors.push(type_error(field_name, other, "expected an embedded message")),
                }
            } else if schema.enum_by_name(other).is_some() {
                require(field_name, value, errors, "enum", |s| {
                    matches!(s, Scalar::Int(_) | Scalar::String(_))
                });
            } else {
                errors.push(unknown_message(field_name, other));
            }
        }
    }
}

fn require(
    field_name: &str,
    value: &Value,
    errors: &mut Vec<ValidationError>,
    expected: &str,
    check: impl Fn(&Scalar) -> bool,
) {
    match value.as_scalar() {
        Some(s) if check(s) => {}
        Some(_) => errors.push(type_error(field_name, expected, format!("value is not a {}", expected))),
        None => errors.push(type_error(field_name, expected, "value is not a scalar")),
    }
}

fn require_int_range(field_name: &str, value: &Value, errors: &mut Vec<ValidationError>, min: i64, max: i64) {
    match value.as_scalar().and_then(Scalar::as_int) {
        Some(i) if i >= min && i <= max => {}
        Some(i) => errors.push(type_error(
            field_name,
            "integer",
            format!("{} is out of range [{}, {}]", i, min, max),
        )),
        None => errors.push(type_error(field_name, "integer", "value is not an integer")),
    }
}

// ---------------------------------------------------------------------
// Cap'n Proto
// ---------------------------------------------------------------------

pub fn validate_capnp(value: &Value, type_name: &str, schema: &CapnpSchema) -> Vec<ValidationError> {
    match schema.struct_by_name(type_name) {
        Some(def) => match value.as_message() {
            Some(message) => validate_capnp_struct(message, def, schema),
            None => vec![type_error(type_name, "struct", "expected a message value")],
        },
        None => vec![ValidationError::Schema(SchemaValidationError {
            message: format!("unknown struct type '{}'", type_name),
        })],
    }
}

fn validate_capnp_struct(message: &Message, def: &CapnpStructDef, schema: &CapnpSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for field in message.fields() {
        match def.field_by_name(&field.name) {
            None => errors.push(ValidationError::UnknownField {
                field_name: field.name.clone(),
            }),
            Some(field_def) => check_capnp_field(field, &field_def.ty, schema, &mut errors),
        }
    }
    errors
}

fn check_capnp_field(field: &Field, ty: &CapnpFieldType, schema: &CapnpSchema, errors: &mut Vec<ValidationError>) {
    match ty {
        CapnpFieldType::Void => {}
        CapnpFieldType::Bool => require(&field.name, &field.value, errors, "bool", |s| matches!(s, Scalar::Bool(_))),
        CapnpFieldType::Int8 => require_int_range(&field.name, &field.value, errors, i8::MIN as i64, i8::MAX as i64),
        CapnpFieldType::UInt8 => require_int_range(&field.name, &field.value, errors, 0, u8::MAX as i64),
        CapnpFieldType::Int16 => require_int_range(&field.name, &field.value, errors, i16::MIN as i64, i16::MAX as i64),
        CapnpFieldType::UInt16 => require_int_range(&field.name, &field.value, errors, 0, u16::MAX as i64),
        CapnpFieldType::Int32 => require_int_range(&field.name, &field.value, errors, i32::MIN as i64, i32::MAX as i64),
        CapnpFieldType::UInt32 => require_int_range(&field.name, &field.value, errors, 0, u32::MAX as i64),
        CapnpFieldType::Int64 | CapnpFieldType::UInt64 => {
            require(&field.name, &field.value, errors, "integer", |s| matches!(s, Scalar::Int(_)))
        }
        CapnpFieldType::Float32 | CapnpFieldType::Float64 => {
            require(&field.name, &field.value, errors, "number", |s| {
                matches!(s, Scalar::Float(_) | Scalar::Int(_))
            })
        }
        CapnpFieldType::Text | CapnpFieldType::Data => {
            require(&field.name, &field.value, errors, "string", |s| matches!(s, Scalar::String(_)))
        }
        CapnpFieldType::List(elem) => match field.value.as_list() {
            Some(items) => {
                for item in items {
                    check_capnp_field(&Field::new(&field.name, item.clone()), elem, schema, errors);
                }
            }
            None => errors.push(type_error(&field.name, "list", "expected a list value")),
        },
        CapnpFieldType::UserType(name) => {
            if let Some(struct_def) = schema.struct_by_name(name) {
                match field.value.as_message() {
                    Some(nested) => errors.extend(validate_capnp_struct(nested, struct_def, schema)),
                    None => errors.push(type_error(&field.name, name, "expected a struct value")),
                }
            } else if schema.enum_by_name(name).is_some() {
                require(&field.name, &field.value, errors, "enum", |s| {
                    matches!(s, Scalar::Int(_) | Scalar::String(_))
                });
            } else {
                errors.push(unknown_message(&field.name, name));
            }
        }
        CapnpFieldType::AnyPointer => {}
    }
}

// ---------------------------------------------------------------------
// FlatBuffers
// ---------------------------------------------------------------------

pub fn validate_flatbuffers(value: &Value, type_name: &str, schema: &FbsSchema) -> Vec<ValidationError> {
    match schema.table_by_name(type_name) {
        Some(def) => match value.as_message() {
            Some(message) => validate_fbs_table(message, def, schema),
            None => vec![type_error(type_name, "table", "expected a message value")],
        },
        None => vec![ValidationError::Schema(SchemaValidationError {
            message: format!("unknown table type '{}'", type_name),
        })],
    }
}

fn validate_fbs_table(message: &Message, def: &FbsTableDef, schema: &FbsSchema) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    for field in message.fields() {
        match def.field_by_name(&field.name) {
            None => errors.push(ValidationError::UnknownField {
                field_name: field.name.clone(),
            }),
            Some(field_def) => check_fbs_field(field, &field_def.ty, schema, &mut errors),
        }
    }
    errors
}

fn check_fbs_field(field: &Field, ty: &FbsType, schema: &FbsSchema, errors: &mut Vec<ValidationError>) {
    match ty {
        FbsType::Bool => require(&field.name, &field.value, errors, "bool", |s| matches!(s, Scalar::Bool(_))),
        FbsType::Byte => require_int_range(&field.name, &field.value, errors, i8::MIN as i64, i8::MAX as i64),
        FbsType::UByte => require_int_range(&field.name, &field.value, errors, 0, u8::MAX as i64),
        FbsType::Short => require_int_range(&field.name, &field.value, errors, i16::MIN as i64, i16::MAX as i64),
        FbsType::UShort => require_int_range(&field.name, &field.value, errors, 0, u16::MAX as i64),
        FbsType::Int => require_int_range(&field.name, &field.value, errors, i32::MIN as i64, i32::MAX as i64),
        FbsType::UInt => require_int_range(&field.name, &field.value, errors, 0, u32::MAX as i64),
        FbsType::Long | FbsType::ULong => {
            require(&field.name, &field.value, errors, "integer", |s| matches!(s, Scalar::Int(_)))
        }
        FbsType::Float | FbsType::Double => require(&field.name, &field.value, errors, "number", |s| {
            matches!(s, Scalar::Float(_) | Scalar::Int(_))
        }),
        FbsType::String => require(&field.name, &field.value, errors, "string", |s| matches!(s, Scalar::String(_))),
        FbsType::Vector(elem) => match field.value.as_list() {
            Some(items) => {
                for item in items {
                    check_fbs_field(&Field::new(&field.name, item.clone()), elem, schema, errors);
                }
            }
            None => errors.push(type_error(&field.name, "vector", "expected a list value")),
        },
        FbsType::UserType(name) => {
            if let Some(table_def) = schema.table_by_name(name) {
                match field.value.as_message() {
                    Some(nested) => errors.extend(validate_fbs_table(nested, table_def, schema)),
                    None => errors.push(type_error(&field.name, name, "expected a table value")),
                }
            } else if let Some(struct_def) = schema.struct_by_name(name) {
                match field.value.as_message() {
                    Some(nested) => {
                        for f in nested.fields() {
                            match struct_def.field_by_name(&f.name) {
                                Some(sf) => check_fbs_field(f, &sf.ty, schema, errors),
                                None => errors.push(ValidationError::UnknownField { field_name: f.name.clone() }),
                            }
                        }
                    }
                    None => errors.push(type_error(&field.name, name, "expected a struct value")),
                }
            } else if schema.enum_by_name(name).is_some() {
                require(&field.name, &field.value, errors, "enum", |s| {
                    matches!(s, Scalar::Int(_) | Scalar::String(_))
                });
            } else {
                errors.push(unknown_message(&field.name, name));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::proto3::parse_schema as parse_proto3_schema;

    #[test]
    fn flags_unknown_and_out_of_range_fields() {
        let schema = parse_proto3_schema(
            r#"
            syntax = "proto3";
            message Person {
                string name = 1;
                int32 age = 2;
            }
            "#,
        )
        .unwrap();
        let mut message = Message::new();
        message.push(Field::new("age", Value::int(9_999_999_999)));
        message.push(Field::new("nickname", Value::string("nope")));

        let errors = validate_proto3(&message, "Person", &schema);
        assert_eq!(errors.len(), 2);
        assert!(matches!(errors[0], ValidationError::Type(_)));
        assert!(matches!(errors[1], ValidationError::UnknownField { .. }));
    }

    #[test]
    fn accepts_well_formed_message() {
        let schema = parse_proto3_schema(
            r#"
            syntax = "proto3";
            message Person {
                string name = 1;
                int32 age = 2;
            }
            "#,
        )
        .unwrap();
        let mut message = Message::new();
        message.push(Field::new("name", Value::string("Ada")));
        message.push(Field::new("age", Value::int(30)));
        assert!(validate_proto3(&message, "Person", &schema).is_empty());
    }
}
