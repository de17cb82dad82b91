//! Cap'n Proto semantic processor (spec.md §4.3): raw parse tree →
//! validated `CapnpSchema`, checking the invariants from spec.md §3.3.

use std::collections::HashSet;

use wireforms::error::ParseError;

use crate::capnp::grammar::{self, RawEnum, RawFile, RawInterface, RawStruct, RawUnion};
use crate::capnp::model::{
    CapnpSchema, EnumDef, FieldDef, GroupDef, InterfaceDef, MethodDef, OrderedEnumValues, StructDef, UnionDef,
    UsingDef,
};

fn process_field(raw: crate::capnp::grammar::RawField) -> FieldDef {
    FieldDef {
        name: raw.name,
        ordinal: raw.ordinal,
        ty: raw.ty,
        default_value: raw.default_value,
    }
}

fn process_union(raw: RawUnion, struct_name: &str) -> Result<UnionDef, ParseError> {
    if raw.fields.len() < 2 {
        return Err(ParseError::new(format!(
            "union in struct '{}' must have at least 2 fields",
            struct_name
        )));
    }
    check_unique_ordinals(raw.fields.iter().map(|f| f.ordinal), &format!("union in struct '{}'", struct_name))?;
    Ok(UnionDef {
        name: raw.name,
        fields: raw.fields.into_iter().map(process_field).collect(),
    })
}

fn check_unique_ordinals(ordinals: impl Iterator<Item = u16>, context: &str) -> Result<(), ParseError> {
    let mut seen = HashSet::new();
    for ord in ordinals {
        if !seen.insert(ord) {
            return Err(ParseError::new(format!("duplicate ordinal {} in {}", ord, context)));
        }
    }
    Ok(())
}

fn process_struct(raw: RawStruct) -> Result<StructDef, ParseError> {
    let all_ordinals = raw
        .fields
        .iter()
        .map(|f| f.ordinal)
        .chain(raw.groups.iter().map(|g| g.ordinal));
    check_unique_ordinals(all_ordinals, &format!("struct '{}'", raw.name))?;

    let mut unions = Vec::with_capacity(raw.unions.len());
    for u in raw.unions {
        unions.push(process_union(u, &raw.name)?);
    }
    let mut groups = Vec::with_capacity(raw.groups.len());
    for g in raw.groups {
        check_unique_ordinals(g.fields.iter().map(|f| f.ordinal), &format!("group '{}'", g.name))?;
        groups.push(GroupDef {
            name: g.name,
            ordinal: g.ordinal,
            fields: g.fields.into_iter().map(process_field).collect(),
        });
    }
    let mut nested_structs = Vec::with_capacity(raw.nested_structs.len());
    for s in raw.nested_structs {
        nested_structs.push(process_struct(s)?);
    }
    let mut nested_enums = Vec::with_capacity(raw.nested_enums.len());
    for e in raw.nested_enums {
        nested_enums.push(process_enum(e)?);
    }
    Ok(StructDef {
        name: raw.name,
        fields: raw.fields.into_iter().map(process_field).collect(),
        unions,
        groups,
        nested_structs,
        nested_enums,
        annotations: Vec::new(),
    })
}

fn process_enum(raw: RawEnum) -> Result<EnumDef, ParseError> {
    let mut seen = HashSet::new();
    let mut values = OrderedEnumValues::default();
    for v in raw.values {
        if !seen.insert(v.ordinal) {
            return Err(ParseError::new(format!(
                "duplicate enum value {} in enum '{}'",
                v.ordinal, raw.name
            )));
        }
        values.insert(v.name, v.ordinal);
    }
    Ok(EnumDef {
        name: raw.name,
        values,
    })
}

fn process_interface(raw: RawInterface) -> Result<InterfaceDef, ParseError> {
    check_unique_ordinals(
        raw.methods.iter().map(|m| m.ordinal),
        &format!("interface '{}'", raw.name),
    )?;
    Ok(InterfaceDef {
        name: raw.name,
        methods: raw
            .methods
            .into_iter()
            .map(|m| MethodDef {
                name: m.name,
                ordinal: m.ordinal,
                param_type: m.param_type,
                return_type: m.return_type,
            })
            .collect(),
    })
}

pub fn process(raw: RawFile) -> Result<CapnpSchema, ParseError> {
    if raw.file_id.is_empty() {
        return Err(ParseError::new("missing required @0xHEX file id"));
    }
    let mut structs = Vec::with_capacity(raw.structs.len());
    for s in raw.structs {
        structs.push(process_struct(s)?);
    }
    let mut enums = Vec::with_capacity(raw.enums.len());
    for e in raw.enums {
        enums.push(process_enum(e)?);
    }
    let mut interfaces = Vec::with_capacity(raw.interfaces.len());
    for i in raw.interfaces {
        interfaces.push(process_interface(i)?);
    }
    Ok(CapnpSchema {
        file_id: raw.file_id,
        usings: raw.usings.into_iter().map(|u| UsingDef { alias: u.alias, path: u.path }).collect(),
        structs,
        enums,
        interfaces,
        constants: raw
            .constants
            .into_iter()
            .map(|c| crate::capnp::model::ConstDef {
                name: c.name,
                ty: c.ty,
                value: c.value,
            })
            .collect(),
    })
}

/// Parse and process a `.capnp` document into a `CapnpSchema`
/// (spec.md §6.1 `parse_capnproto_schema`).
pub fn parse_schema(source: &str) -> Result<CapnpSchema, ParseError> {
    let raw = grammar::parse(source)?;
    process(raw)
}
