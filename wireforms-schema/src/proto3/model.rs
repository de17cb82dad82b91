//! Validated Proto3 schema model (spec.md §3.2).

use std::collections::BTreeMap;

pub const SCALAR_TYPES: &[&str] = &[
    "double", "float", "int32", "int64", "uint32", "uint64", "sint32", "sint64", "fixed32",
    "fixed64", "sfixed32", "sfixed64", "bool", "string", "bytes",
];

pub fn is_scalar_type(name: &str) -> bool {
    SCALAR_TYPES.contains(&name)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldLabel {
    Repeated,
    Optional,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldDef {
    pub name: String,
    pub ty: String,
    pub number: u32,
    pub label: Option<FieldLabel>,
    pub key_type: Option<String>,
    pub value_type: Option<String>,
}

impl FieldDef {
    pub fn is_map(&self) -> bool {
        self.ty == "map"
    }

    pub fn is_repeated(&self) -> bool {
        matches!(self.label, Some(FieldLabel::Repeated))
    }

    pub fn is_optional(&self) -> bool {
        matches!(self.label, Some(FieldLabel::Optional))
    }
}

/// An enum's values, in declaration order, keyed by name (spec.md §3.2:
/// "OrderedMap<String, i32>").
#[derive(Debug, Clone, Default)]
pub struct OrderedEnumValues {
    order: Vec<String>,
    values: BTreeMap<String, i32>,
}

impl OrderedEnumValues {
    pub fn insert(&mut self, name: String, number: i32) {
        if !self.values.contains_key(&name) {
            self.order.push(name.clone());
        }
        self.values.insert(name, number);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, i32)> {
        self.order.iter().map(move |n| (n.as_str(), self.values[n]))
    }

    pub fn get(&self, name: &str) -> Option<i32> {
        self.values.get(name).copied()
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
pub struct MessageDef {
    pub name: String,
    pub fields: Vec<FieldDef>,
    pub nested_messages: Vec<MessageDef>,
    pub nested_enums: Vec<EnumDef>,
}

impl MessageDef {
    pub fn field_by_name(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_by_number(&self, number: u32) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.number == number)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProtoSchema {
    pub syntax: String,
    pub package: Option<String>,
    pub imports: Vec<String>,
    pub messages: Vec<MessageDef>,
    pub enums: Vec<EnumDef>,
}

impl ProtoSchema {
    /// Resolve a top-level message by (unqualified) name.
    pub fn message_by_name(&self, name: &str) -> Option<&MessageDef> {
        self.messages.iter().find(|m| m.name == name)
    }

    pub fn enum_by_name(&self, name: &str) -> Option<&EnumDef> {
        self.enums.iter().find(|e| e.name == name)
    }
}
