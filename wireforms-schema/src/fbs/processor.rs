//! FlatBuffers semantic processor (spec.md §4.4): raw parse tree →
//! validated `FbsSchema`.

use std::collections::HashSet;

use wireforms::error::ParseError;

use crate::fbs::grammar::{self, RawEnum, RawFile, RawField, RawStruct, RawTable, RawUnion};
use crate::fbs::model::{EnumDef, FbsSchema, FbsType, FieldDef, OrderedEnumValues, StructDef, TableDef, UnionDef};

fn process_field(raw: RawField) -> FieldDef {
    FieldDef {
        name: raw.name,
        ty: raw.ty,
        default_value: raw.default_value,
        metadata: raw.metadata,
    }
}

fn process_table(raw: RawTable) -> TableDef {
    TableDef {
        name: raw.name,
        fields: raw.fields.into_iter().map(process_field).collect(),
        metadata: raw.metadata,
    }
}

/// Struct fields must all be fixed-size: scalars or other structs
/// (spec.md §3.4 invariant — no vectors or tables).
fn check_struct_fields(raw: &RawStruct, struct_names: &HashSet<&str>) -> Result<(), ParseError> {
    for field in &raw.fields {
        let ok = match &field.ty {
            FbsType::UserType(name) => struct_names.contains(name.as_str()),
            other => other.is_scalar(),
        };
        if !ok {
            return Err(ParseError::new(format!(
                "struct '{}' field '{}' must be a scalar or nested struct",
                raw.name, field.name
            )));
        }
    }
    Ok(())
}

fn process_struct(raw: RawStruct) -> StructDef {
    StructDef {
        name: raw.name,
        fields: raw.fields.into_iter().map(process_field).collect(),
        metadata: raw.metadata,
    }
}

/// Values lacking an explicit number receive `previous + 1` starting at 0
/// (spec.md §4.4).
fn process_enum(raw: RawEnum) -> Result<EnumDef, ParseError> {
    let mut values = OrderedEnumValues::default();
    let mut next = 0i64;
    let mut seen = HashSet::new();
    for v in raw.values {
        let value = v.value.unwrap_or(next);
        if !seen.insert(value) {
            return Err(ParseError::new(format!(
                "duplicate enum value {} in enum '{}'",
                value, raw.name
            )));
        }
        values.insert(v.name, value);
        next = value + 1;
    }
    Ok(EnumDef {
        name: raw.name,
        underlying: raw.underlying,
        values,
    })
}

fn process_union(raw: RawUnion) -> UnionDef {
    UnionDef {
        name: raw.name,
        variants: raw.variants,
    }
}

pub fn process(raw: RawFile) -> Result<FbsSchema, ParseError> {
    let struct_names: HashSet<&str> = raw.structs.iter().map(|s| s.name.as_str()).collect();
    for s in &raw.structs {
        check_struct_fields(s, &struct_names)?;
    }

    let tables: Vec<TableDef> = raw.tables.into_iter().map(process_table).collect();
    let structs: Vec<StructDef> = raw.structs.into_iter().map(process_struct).collect();
    let mut enums = Vec::with_capacity(raw.enums.len());
    for e in raw.enums {
        enums.push(process_enum(e)?);
    }
    let unions: Vec<UnionDef> = raw.unions.into_iter().map(process_union).collect();

    if let Some(root) = &raw.root_type {
        if !tables.iter().any(|t| &t.name == root) {
            return Err(ParseError::new(format!("root_type '{}' does not name a known table", root)));
        }
    }

    Ok(FbsSchema {
        namespace: raw.namespace,
        includes: raw.includes,
        tables,
        structs,
        enums,
        unions,
        root_type: raw.root_type,
        file_identifier: raw.file_identifier,
        file_extension: raw.file_extension,
        attributes: raw.attributes,
    })
}

/// Parse and process a `.fbs` document into an `FbsSchema` (spec.md §6.1
/// `parse_flatbuffers_schema`).
pub fn parse_schema(source: &str) -> Result<FbsSchema, ParseError> {
    let raw = grammar::parse(source)?;
    process(raw)
}
