//! Validated Cap'n Proto schema model (spec.md §3.3).

use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Default)]
pub enum FieldType {
    #[default]
    Void,
    Bool,
    Int8,
    Int16,
    Int32,
    Int64,
    UInt8,
    UInt16,
    UInt32,
    UInt64,
    Float32,
    Float64,
    Text,
    Data,
    AnyPointer,
    UserType(String),
    List(Box<FieldType>),
}

impl FieldType {
    /// Whether this type is *always* data-section regardless of schema
    /// context (spec.md §4.6). `UserType` is ambiguous on its own — it
    /// names either a struct (pointer section) or an enum (data
    /// section, as `UInt16`) — so callers resolve it against a
    /// `CapnpSchema` via `binary::is_primitive_type`.
    pub fn is_always_primitive(&self) -> bool {
        !matches!(
            self,
            FieldType::Text | FieldType::Data | FieldType::AnyPointer | FieldType::UserType(_) | FieldType::List(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum DefaultValue {
    #[default]
    None,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ordinal: u16,
    pub ty: FieldType,
    pub default_value: DefaultValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UnionDef {
    pub name: Option<String>,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct GroupDef {
    pub name: String,
    pub ordinal: u16,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StructDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub unions: Vec<UnionDef>,
    pub groups: Vec<GroupDef>,
    pub nested_structs: Vec<StructDef>,
    pub nested_enums: Vec<EnumDef>,
    pub annotations: Vec<String>,
}

impl StructDef {
    /// Every plain field plus every field nested in a union, in ordinal
    /// order — the view the binary codec lays out (spec.md §4.6).
    pub fn all_fields(&self) -> Vec<&FieldDef> {
        let mut fields: Vec<&FieldDef> = self.fields.iter().collect();
        for u in &self.unions {
            fields.extend(u.fields.iter());
        }
        fields.sort_by_key(|f| f.ordinal);
        fields
    }

    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.all_fields().into_iter().find(|f| f.name == name)
    }

    pub fn field_by_ordinal(&self, ordinal: u16) -> Option<FieldDef> {
        self.all_fields().into_iter().find(|f| f.ordinal == ordinal).cloned()
    }
}

/// An enum's values, in declaration order, keyed by name — same shape as
/// `proto3::model::OrderedEnumValues` but over `u16` (spec.md §3.3).
#[derive(Debug, Clone, Default)]
pub struct OrderedEnumValues {
    order: Vec<String>,
    values: BTreeMap<String, u16>,
}

impl OrderedEnumValues {
    pub fn insert(&mut self, name: String, value: u16) {
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, value);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, u16)> {
        self.order.iter().map(move |n| (n.as_str(), self.values[n]))
    }

    pub fn get(&self, name: &str) -> Option<u16> {
        self.values.get(name).copied()
    }

    pub fn name_of(&self, value: u16) -> Option<&str> {
        self.order.iter().find(|n| self.values[n.as_str()] == value).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl PartialEq for OrderedEnumValues {
    fn eq(&self, other: &Self) -> bool {
        self.order == other.order && self.values == other.values
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDef {
    pub name: String,
    pub values: OrderedEnumValues,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct MethodDef {
    pub name: String,
    pub ordinal: u16,
    pub param_type: Option<String>,
    pub return_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct InterfaceDef {
    pub name: String,
    pub methods: Vec<MethodDef>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ConstDef {
    pub name: String,
    pub ty: FieldType,
    pub value: DefaultValue,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct UsingDef {
    pub alias: String,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct CapnpSchema {
    pub file_id: String,
    pub usings: Vec<UsingDef>,
    pub structs: Vec<StructDef>,
    pub enums: Vec<EnumDef>,
    pub interfaces: Vec<InterfaceDef>,
    pub constants: Vec<ConstDef>,
}

impl CapnpSchema {
    pub fn struct_by_name(&self, name: &str) -> Option<&StructDef> {
        self.structs.iter().find(|s| s.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }
}
