//! Cap'n Proto binary codec (spec.md §4.6): segment framing, struct/list
//! layout, and the `CapnpBinaryParser`/`CapnpBinarySerializer` entry
//! points from spec.md §6.1.

use wireforms::error::{ParseError, SerializationError, WireformsError, WireformsResult};
use wireforms::value::{bytes_to_scalar_string, scalar_string_to_bytes, Field, Message, Scalar, Value};

use crate::capnp::model::{CapnpSchema, DefaultValue, EnumDef, FieldDef, FieldType, StructDef};
use crate::capnp::pointer::{self, Pointer};

/// Cap'n Proto applies declared defaults to absent (never-written,
/// all-zero) data-section words; this is a bounded approximation of the
/// real XOR-with-default encoding (writer emits raw values, not
/// XORed with the default, so round-trips written by this crate are
/// unaffected) that only matters when reading a buffer with a field's
/// word never allocated (fewer `data_words` than the struct declares).
fn default_int(default: &DefaultValue) -> i64 {
    match default {
        DefaultValue::Int(i) => *i,
        DefaultValue::Bool(b) => *b as i64,
        _ => 0,
    }
}

fn default_bool(default: &DefaultValue) -> bool {
    match default {
        DefaultValue::Bool(b) => *b,
        DefaultValue::Int(i) => *i != 0,
        _ => false,
    }
}

fn default_float(default: &DefaultValue) -> f64 {
    match default {
        DefaultValue::Float(f) => *f,
        DefaultValue::Int(i) => *i as f64,
        _ => 0.0,
    }
}

fn parse_err(message: impl Into<String>) -> WireformsError {
    WireformsError::Parse(ParseError::new(message))
}

fn serialization_err(message: impl Into<String>) -> WireformsError {
    WireformsError::Serialization(SerializationError::new(message))
}

/// Whether `ty` occupies the data section. A bare `UserType` is
/// ambiguous on its own (struct vs. enum), so this needs schema context
/// (spec.md §4.6: "Enums stored in the data section are UInt16").
fn is_primitive_type(ty: &FieldType, schema: &CapnpSchema) -> bool {
    match ty {
        FieldType::UserType(name) => schema.enum_by_name(name).is_some(),
        other => other.is_always_primitive(),
    }
}

fn struct_data_words(def: &StructDef, schema: &CapnpSchema) -> u16 {
    let mut max_word = 0u32;
    for f in def.all_fields() {
        if !is_primitive_type(&f.ty, schema) {
            continue;
        }
        let ord = f.ordinal as u32;
        let word = match &f.ty {
            FieldType::Void => continue,
            FieldType::Bool => ord / 64,
            FieldType::Int8 | FieldType::UInt8 => ord / 8,
            FieldType::Int16 | FieldType::UInt16 => ord / 4,
            FieldType::Int32 | FieldType::UInt32 | FieldType::Float32 => ord / 2,
            FieldType::Int64 | FieldType::UInt64 | FieldType::Float64 => ord,
            FieldType::UserType(_) => ord / 4, // enum, placed as UInt16
            _ => continue,
        };
        max_word = max_word.max(word + 1);
    }
    max_word as u16
}

fn struct_pointer_words(def: &StructDef, schema: &CapnpSchema) -> u16 {
    def.all_fields().into_iter().filter(|f| !is_primitive_type(&f.ty, schema)).count() as u16
}

fn pointer_index_of(def: &StructDef, schema: &CapnpSchema, name: &str) -> Option<usize> {
    def.all_fields()
        .into_iter()
        .filter(|f| !is_primitive_type(&f.ty, schema))
        .position(|f| f.name == name)
}

// ---------------------------------------------------------------------
// Segment framing
// ---------------------------------------------------------------------

fn read_segments(bytes: &[u8]) -> WireformsResult<Vec<Vec<u64>>> {
    if bytes.len() < 4 {
        return Err(parse_err("truncated segment header"));
    }
    let n = u32::from_le_bytes(bytes[0..4].try_into().unwrap()) as usize + 1;
    let mut pos = 4;
    let mut sizes = Vec::with_capacity(n);
    for _ in 0..n {
        if pos + 4 > bytes.len() {
            return Err(parse_err("truncated segment size table"));
        }
        sizes.push(u32::from_le_bytes(bytes[pos..pos + 4].try_into().unwrap()) as usize);
        pos += 4;
    }
    if n % 2 == 0 {
        pos += 4;
    }
    let mut segments = Vec::with_capacity(n);
    for size in sizes {
        let byte_len = size * 8;
        if pos + byte_len > bytes.len() {
            return Err(parse_err("truncated segment payload"));
        }
        let mut words = Vec::with_capacity(size);
        for i in 0..size {
            let start = pos + i * 8;
            words.push(u64::from_le_bytes(bytes[start..start + 8].try_into().unwrap()));
        }
        segments.push(words);
        pos += byte_len;
    }
    Ok(segments)
}

/// Always a single segment (spec.md §4.6: "Keep a single in-progress
/// segment of 64-bit words" — the writer never splits across segments,
/// so it never needs to emit far pointers either).
fn write_segments(words: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + words.len() * 8);
    out.extend_from_slice(&0u32.to_le_bytes());
    out.extend_from_slice(&(words.len() as u32).to_le_bytes());
    for w in words {
        out.extend_from_slice(&w.to_le_bytes());
    }
    out
}

fn read_word(segments: &[Vec<u64>], segment: usize, word: usize) -> WireformsResult<u64> {
    segments
        .get(segment)
        .and_then(|s| s.get(word))
        .copied()
        .ok_or_else(|| parse_err("pointer offset out of bounds"))
}

#[derive(Debug, Clone, Copy)]
struct Target {
    segment: usize,
    word: usize,
}

enum Resolved {
    Null,
    Struct { target: Target, data_words: u16, pointer_words: u16 },
    List { target: Target, element_size: u8, element_count: u32 },
}

fn follow_pointer(segments: &[Vec<u64>], segment: usize, word: usize) -> WireformsResult<Resolved> {
    let raw = read_word(segments, segment, word)?;
    match pointer::decode(raw) {
        Pointer::Null => Ok(Resolved::Null),
        Pointer::Struct { offset, data_words, pointer_words } => {
            let target_word = (word as i64 + 1 + offset as i64) as usize;
            Ok(Resolved::Struct {
                target: Target { segment, word: target_word },
                data_words,
                pointer_words,
            })
        }
        Pointer::List { offset, element_size, element_count } => {
            let target_word = (word as i64 + 1 + offset as i64) as usize;
            Ok(Resolved::List {
                target: Target { segment, word: target_word },
                element_size,
                element_count,
            })
        }
        Pointer::Far { landing_pad: false, offset, segment_id } => {
            let target_seg = segment_id as usize;
            let target_word = offset as usize;
            let raw2 = read_word(segments, target_seg, target_word)?;
            match pointer::decode(raw2) {
                Pointer::Struct { offset: o2, data_words, pointer_words } => {
                    let tw = (target_word as i64 + 1 + o2 as i64) as usize;
                    Ok(Resolved::Struct {
                        target: Target { segment: target_seg, word: tw },
                        data_words,
                        pointer_words,
                    })
                }
                Pointer::List { offset: o2, element_size, element_count } => {
                    let tw = (target_word as i64 + 1 + o2 as i64) as usize;
                    Ok(Resolved::List {
                        target: Target { segment: target_seg, word: tw },
                        element_size,
                        element_count,
                    })
                }
                _ => Err(parse_err("far pointer target must be struct or list")),
            }
        }
        Pointer::Far { landing_pad: true, offset, segment_id } => {
            let raw_far = read_word(segments, segment_id as usize, offset as usize)?;
            let (content_seg, content_word) = match pointer::decode(raw_far) {
                Pointer::Far { landing_pad: false, offset: o2, segment_id: s2 } => (s2 as usize, o2 as usize),
                _ => return Err(parse_err("landing pad must start with a non-landing far pointer")),
            };
            let tag_word = read_word(segments, segment_id as usize, offset as usize + 1)?;
            match pointer::decode(tag_word) {
                Pointer::Struct { data_words, pointer_words, .. } => Ok(Resolved::Struct {
                    target: Target { segment: content_seg, word: content_word },
                    data_words,
                    pointer_words,
                }),
                Pointer::List { element_size, element_count, .. } => Ok(Resolved::List {
                    target: Target { segment: content_seg, word: content_word },
                    element_size,
                    element_count,
                }),
                _ => Err(parse_err("landing pad tag must be struct or list")),
            }
        }
        Pointer::Capability { .. } => Err(parse_err("capability pointers are not supported")),
    }
}

fn sign_extend(raw: u64, width: u32) -> i64 {
    let shift = 64 - width;
    ((raw << shift) as i64) >> shift
}

fn scalar_width_signed(ty: &FieldType) -> WireformsResult<(u32, bool)> {
    Ok(match ty {
        FieldType::Int8 => (8, true),
        FieldType::UInt8 => (8, false),
        FieldType::Int16 => (16, true),
        FieldType::UInt16 => (16, false),
        FieldType::Int32 => (32, true),
        FieldType::UInt32 => (32, false),
        FieldType::Float32 => (32, false),
        FieldType::Int64 => (64, true),
        FieldType::UInt64 => (64, false),
        FieldType::Float64 => (64, false),
        _ => return Err(serialization_err("unsupported scalar list element type")),
    })
}

fn read_byte_list(segments: &[Vec<u64>], target: &Target, element_size: u8, element_count: u32) -> WireformsResult<Vec<u8>> {
    if element_size != pointer::ELEM_BYTE {
        return Err(parse_err("expected a byte-sized list"));
    }
    let mut out = Vec::with_capacity(element_count as usize);
    for i in 0..element_count as usize {
        let w = read_word(segments, target.segment, target.word + i / 8)?;
        out.push(((w >> ((i % 8) * 8)) & 0xFF) as u8);
    }
    Ok(out)
}

// ---------------------------------------------------------------------
// Parser
// ---------------------------------------------------------------------

pub struct CapnpBinaryParser<'s> {
    schema: &'s CapnpSchema,
}

impl<'s> CapnpBinaryParser<'s> {
    pub fn new(schema: &'s CapnpSchema) -> CapnpBinaryParser<'s> {
        CapnpBinaryParser { schema }
    }

    pub fn parse(&self, bytes: &[u8], root_type: &str) -> WireformsResult<Value> {
        let segments = read_segments(bytes)?;
        let def = self
            .schema
            .struct_by_name(root_type)
            .ok_or_else(|| parse_err(format!("unknown root type: {}", root_type)))?;
        match follow_pointer(&segments, 0, 0)? {
            Resolved::Null => Ok(Value::Message(Message::new())),
            Resolved::Struct { target, data_words, pointer_words } => {
                self.read_struct(&segments, &target, data_words, pointer_words, def)
            }
            Resolved::List { .. } => Err(parse_err("root pointer must be struct-typed")),
        }
    }

    fn read_struct(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        data_words: u16,
        pointer_words: u16,
        def: &StructDef,
    ) -> WireformsResult<Value> {
        let mut message = Message::new();
        for field in def.all_fields() {
            if let Some(value) = self.read_field(segments, target, data_words, pointer_words, def, field)? {
                message.push(Field::new(&field.name, value));
            }
        }
        Ok(Value::Message(message))
    }

    fn read_field(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        data_words: u16,
        pointer_words: u16,
        def: &StructDef,
        field: &FieldDef,
    ) -> WireformsResult<Option<Value>> {
        match &field.ty {
            FieldType::Void => Ok(Some(Value::null())),
            FieldType::Bool => {
                let ord = field.ordinal as usize;
                if ord / 64 >= data_words as usize {
                    return Ok(Some(Value::bool(default_bool(&field.default_value))));
                }
                let w = read_word(segments, target.segment, target.word + ord / 64)?;
                Ok(Some(Value::bool((w >> (ord % 64)) & 1 != 0)))
            }
            FieldType::Int8 | FieldType::UInt8 | FieldType::Int16 | FieldType::UInt16 | FieldType::Int32
            | FieldType::UInt32 | FieldType::Int64 | FieldType::UInt64 => {
                let (width, signed) = scalar_width_signed(&field.ty)?;
                self.read_int_word(segments, target, data_words, field.ordinal, width, signed, &field.default_value)
            }
            FieldType::Float32 => {
                self.read_float_word(segments, target, data_words, field.ordinal, 32, &field.default_value)
            }
            FieldType::Float64 => {
                self.read_float_word(segments, target, data_words, field.ordinal, 64, &field.default_value)
            }
            FieldType::Text => {
                let ptr_word = match self.pointer_slot(def, target, data_words, pointer_words, &field.name) {
                    Some(w) => w,
                    None => return Ok(None),
                };
                match follow_pointer(segments, target.segment, ptr_word)? {
                    Resolved::Null => Ok(None),
                    Resolved::List { target: lt, element_size, element_count } => {
                        let bytes = read_byte_list(segments, &lt, element_size, element_count)?;
                        let text_len = (element_count as usize).saturating_sub(1).min(bytes.len());
                        let s = std::str::from_utf8(&bytes[..text_len])
                            .map_err(|e| WireformsError::Parse(ParseError::from(e)))?;
                        Ok(Some(Value::string(s)))
                    }
                    Resolved::Struct { .. } => Err(parse_err("expected list pointer for Text field")),
                }
            }
            FieldType::Data => {
                let ptr_word = match self.pointer_slot(def, target, data_words, pointer_words, &field.name) {
                    Some(w) => w,
                    None => return Ok(None),
                };
                match follow_pointer(segments, target.segment, ptr_word)? {
                    Resolved::Null => Ok(None),
                    Resolved::List { target: lt, element_size, element_count } => {
                        let bytes = read_byte_list(segments, &lt, element_size, element_count)?;
                        Ok(Some(Value::string(bytes_to_scalar_string(&bytes))))
                    }
                    Resolved::Struct { .. } => Err(parse_err("expected list pointer for Data field")),
                }
            }
            FieldType::UserType(name) => {
                if let Some(enum_def) = self.schema.enum_by_name(name) {
                    let value = self.read_int_word(segments, target, data_words, field.ordinal, 16, false, &field.default_value)?;
                    return Ok(value.map(|v| match v {
                        Value::Scalar(Scalar::Int(i)) => match enum_def.values.name_of(i as u16) {
                            Some(n) => Value::string(n),
                            None => Value::int(i),
                        },
                        other => other,
                    }));
                }
                let sub_def = self
                    .schema
                    .struct_by_name(name)
                    .ok_or_else(|| parse_err(format!("unknown type: {}", name)))?;
                let ptr_word = match self.pointer_slot(def, target, data_words, pointer_words, &field.name) {
                    Some(w) => w,
                    None => return Ok(None),
                };
                match follow_pointer(segments, target.segment, ptr_word)? {
                    Resolved::Null => Ok(None),
                    Resolved::Struct { target: st, data_words: dw, pointer_words: pw } => {
                        Ok(Some(self.read_struct(segments, &st, dw, pw, sub_def)?))
                    }
                    Resolved::List { .. } => Err(parse_err("expected struct pointer")),
                }
            }
            FieldType::List(elem) => {
                let ptr_word = match self.pointer_slot(def, target, data_words, pointer_words, &field.name) {
                    Some(w) => w,
                    None => return Ok(Some(Value::List(Vec::new()))),
                };
                match follow_pointer(segments, target.segment, ptr_word)? {
                    Resolved::Null => Ok(Some(Value::List(Vec::new()))),
                    Resolved::List { target: lt, element_size, element_count } => {
                        let items = self.read_list_elements(segments, &lt, element_size, element_count, elem)?;
                        Ok(Some(Value::List(items)))
                    }
                    Resolved::Struct { .. } => Err(parse_err("expected list pointer")),
                }
            }
            FieldType::AnyPointer => Err(parse_err("AnyPointer fields are not supported")),
        }
    }

    fn pointer_slot(
        &self,
        def: &StructDef,
        target: &Target,
        data_words: u16,
        pointer_words: u16,
        name: &str,
    ) -> Option<usize> {
        let idx = pointer_index_of(def, self.schema, name)?;
        if idx >= pointer_words as usize {
            return None;
        }
        Some(target.word + data_words as usize + idx)
    }

    /// Reads a fixed-width word from the data section. Returns `None` when
    /// the slot's word was never allocated (absent, per Cap'n Proto's
    /// default-is-zero wire convention) so callers can apply the schema's
    /// declared default themselves rather than assuming raw zero.
    fn read_raw_word(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        data_words: u16,
        ordinal: u16,
        width: u32,
    ) -> WireformsResult<Option<u64>> {
        let ord = ordinal as usize;
        let per_word = 64 / width as usize;
        let word_idx = ord / per_word;
        if word_idx >= data_words as usize {
            return Ok(None);
        }
        let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
        let bit_offset = (ord % per_word) * width as usize;
        let w = read_word(segments, target.segment, target.word + word_idx)?;
        Ok(Some((w >> bit_offset) & mask))
    }

    fn read_int_word(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        data_words: u16,
        ordinal: u16,
        width: u32,
        signed: bool,
        default: &DefaultValue,
    ) -> WireformsResult<Option<Value>> {
        match self.read_raw_word(segments, target, data_words, ordinal, width)? {
            Some(raw) => {
                let value = if signed { sign_extend(raw, width) } else { raw as i64 };
                Ok(Some(Value::int(value)))
            }
            None => Ok(Some(Value::int(default_int(default)))),
        }
    }

    fn read_float_word(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        data_words: u16,
        ordinal: u16,
        width: u32,
        default: &DefaultValue,
    ) -> WireformsResult<Option<Value>> {
        match self.read_raw_word(segments, target, data_words, ordinal, width)? {
            Some(raw) => {
                let f = if width == 32 { f32::from_bits(raw as u32) as f64 } else { f64::from_bits(raw) };
                Ok(Some(Value::float(f)))
            }
            None => Ok(Some(Value::float(default_float(default)))),
        }
    }

    fn read_list_elements(
        &self,
        segments: &[Vec<u64>],
        target: &Target,
        element_size: u8,
        element_count: u32,
        elem: &FieldType,
    ) -> WireformsResult<Vec<Value>> {
        match element_size {
            pointer::ELEM_VOID => Ok((0..element_count).map(|_| Value::null()).collect()),
            pointer::ELEM_BIT => {
                let mut out = Vec::with_capacity(element_count as usize);
                for i in 0..element_count as usize {
                    let w = read_word(segments, target.segment, target.word + i / 64)?;
                    out.push(Value::bool((w >> (i % 64)) & 1 != 0));
                }
                Ok(out)
            }
            pointer::ELEM_BYTE | pointer::ELEM_2BYTE | pointer::ELEM_4BYTE | pointer::ELEM_8BYTE => {
                let (width, signed) = scalar_width_signed(elem)?;
                let per_word = 64 / width as usize;
                let mut out = Vec::with_capacity(element_count as usize);
                for i in 0..element_count as usize {
                    let w = read_word(segments, target.segment, target.word + i / per_word)?;
                    let mask = if width >= 64 { u64::MAX } else { (1u64 << width) - 1 };
                    let raw = (w >> ((i % per_word) * width as usize)) & mask;
                    out.push(match elem {
                        FieldType::Float32 => Value::float(f32::from_bits(raw as u32) as f64),
                        FieldType::Float64 => Value::float(f64::from_bits(raw)),
                        _ => Value::int(if signed { sign_extend(raw, width) } else { raw as i64 }),
                    });
                }
                Ok(out)
            }
            pointer::ELEM_POINTER => {
                let mut out = Vec::with_capacity(element_count as usize);
                for i in 0..element_count as usize {
                    match (elem, follow_pointer(segments, target.segment, target.word + i)?) {
                        (FieldType::Text, Resolved::List { target: lt, element_size: es, element_count: ec }) => {
                            let bytes = read_byte_list(segments, &lt, es, ec)?;
                            let text_len = (ec as usize).saturating_sub(1).min(bytes.len());
                            let s = std::str::from_utf8(&bytes[..text_len])
                                .map_err(|e| WireformsError::Parse(ParseError::from(e)))?;
                            out.push(Value::string(s));
                        }
                        (FieldType::Data, Resolved::List { target: lt, element_size: es, element_count: ec }) => {
                            let bytes = read_byte_list(segments, &lt, es, ec)?;
                            out.push(Value::string(bytes_to_scalar_string(&bytes)));
                        }
                        (_, Resolved::Null) => out.push(Value::null()),
                        _ => return Err(parse_err("unsupported pointer-element list")),
                    }
                }
                Ok(out)
            }
            pointer::ELEM_INLINE_COMPOSITE => {
                let tag_word = read_word(segments, target.segment, target.word)?;
                let (data_words, pointer_words, count) = match pointer::decode(tag_word) {
                    Pointer::Struct { offset, data_words, pointer_words } => (data_words, pointer_words, offset as u32),
                    _ => return Err(parse_err("inline-composite list missing struct tag")),
                };
                let sub_def = match elem {
                    FieldType::UserType(name) => self
                        .schema
                        .struct_by_name(name)
                        .ok_or_else(|| parse_err(format!("unknown struct type: {}", name)))?,
                    _ => return Err(parse_err("inline-composite list requires a struct element type")),
                };
                let elem_words = data_words as usize + pointer_words as usize;
                let first = target.word + 1;
                let mut out = Vec::with_capacity(count as usize);
                for i in 0..count as usize {
                    let elem_target = Target { segment: target.segment, word: first + i * elem_words };
                    out.push(self.read_struct(segments, &elem_target, data_words, pointer_words, sub_def)?);
                }
                Ok(out)
            }
            other => Err(parse_err(format!("unsupported list element size: {}", other))),
        }
    }
}

// ---------------------------------------------------------------------
// Serializer
// ---------------------------------------------------------------------

fn allocate(words: &mut Vec<u64>, n: usize) -> usize {
    let start = words.len();
    words.resize(start + n, 0);
    start
}

fn write_bits(words: &mut [u64], word_idx: usize, bit_offset: u32, bit_width: u32, value: u64) {
    let mask: u64 = if bit_width >= 64 { u64::MAX } else { (1u64 << bit_width) - 1 };
    let shifted_mask = mask << bit_offset;
    words[word_idx] = (words[word_idx] & !shifted_mask) | ((value & mask) << bit_offset);
}

fn write_int(words: &mut [u64], start: usize, ordinal: u16, width: u32, value: i64) {
    let ord = ordinal as usize;
    let per_word = 64 / width as usize;
    let word_idx = start + ord / per_word;
    let bit_offset = ((ord % per_word) * width as usize) as u32;
    write_bits(words, word_idx, bit_offset, width, value as u64);
}

fn bool_of(value: &Value) -> WireformsResult<bool> {
    value.as_scalar().and_then(Scalar::as_bool).ok_or_else(|| serialization_err("expected bool"))
}

fn int_of(value: &Value) -> WireformsResult<i64> {
    value.as_scalar().and_then(Scalar::as_int).ok_or_else(|| serialization_err("expected integer"))
}

fn float_of(value: &Value) -> WireformsResult<f64> {
    value.as_scalar().and_then(Scalar::as_float).ok_or_else(|| serialization_err("expected number"))
}

fn str_of(value: &Value) -> WireformsResult<&str> {
    value.as_scalar().and_then(Scalar::as_str).ok_or_else(|| serialization_err("expected string"))
}

fn enum_value_of(value: &Value, enum_def: &EnumDef) -> WireformsResult<u16> {
    match value.as_scalar() {
        Some(Scalar::Int(i)) => Ok(*i as u16),
        Some(Scalar::String(name)) => enum_def
            .values
            .get(name)
            .ok_or_else(|| serialization_err(format!("unknown enum symbol: {}", name))),
        _ => Err(serialization_err("expected enum symbol or integer")),
    }
}

pub struct CapnpBinarySerializer<'s> {
    schema: &'s CapnpSchema,
}

impl<'s> CapnpBinarySerializer<'s> {
    pub fn new(schema: &'s CapnpSchema) -> CapnpBinarySerializer<'s> {
        CapnpBinarySerializer { schema }
    }

    pub fn serialize(&self, data: &Value, root_type: &str) -> WireformsResult<Vec<u8>> {
        let def = self
            .schema
            .struct_by_name(root_type)
            .ok_or_else(|| serialization_err(format!("unknown root type: {}", root_type)))?;
        let message = data.as_message().ok_or_else(|| serialization_err("root value must be a message"))?;
        let mut words: Vec<u64> = vec![0];
        let struct_word = self.write_struct(&mut words, message, def)?;
        let data_words = struct_data_words(def, self.schema);
        let pointer_words = struct_pointer_words(def, self.schema);
        let offset = struct_word as i64 - 1;
        words[0] = pointer::encode(Pointer::Struct {
            offset: offset as i32,
            data_words,
            pointer_words,
        });
        Ok(write_segments(&words))
    }

    fn write_struct(&self, words: &mut Vec<u64>, message: &Message, def: &StructDef) -> WireformsResult<usize> {
        let data_words = struct_data_words(def, self.schema) as usize;
        let pointer_words = struct_pointer_words(def, self.schema) as usize;
        let start = allocate(words, data_words + pointer_words);
        for field in def.all_fields() {
            if let Some(f) = message.find_field(&field.name) {
                self.write_field(words, start, data_words, def, field, &f.value)?;
            }
        }
        Ok(start)
    }

    fn write_field(
        &self,
        words: &mut Vec<u64>,
        start: usize,
        data_words: usize,
        def: &StructDef,
        field: &FieldDef,
        value: &Value,
    ) -> WireformsResult<()> {
        match &field.ty {
            FieldType::Void => {}
            FieldType::Bool => {
                let ord = field.ordinal as usize;
                write_bits(words, start + ord / 64, (ord % 64) as u32, 1, bool_of(value)? as u64);
            }
            FieldType::Int8 | FieldType::UInt8 => write_int(words, start, field.ordinal, 8, int_of(value)?),
            FieldType::Int16 | FieldType::UInt16 => write_int(words, start, field.ordinal, 16, int_of(value)?),
            FieldType::Int32 | FieldType::UInt32 => write_int(words, start, field.ordinal, 32, int_of(value)?),
            FieldType::Float32 => {
                write_int(words, start, field.ordinal, 32, (float_of(value)? as f32).to_bits() as i64)
            }
            FieldType::Int64 | FieldType::UInt64 => write_int(words, start, field.ordinal, 64, int_of(value)?),
            FieldType::Float64 => write_int(words, start, field.ordinal, 64, float_of(value)?.to_bits() as i64),
            FieldType::Text => {
                let idx = pointer_index_of(def, self.schema, &field.name)
                    .ok_or_else(|| serialization_err(format!("field '{}' has no pointer slot", field.name)))?;
                let bytes = str_of(value)?.as_bytes().to_vec();
                let target = self.write_byte_list(words, &bytes)?;
                self.patch_list_pointer(words, start + data_words + idx, target, pointer::ELEM_BYTE, bytes.len() as u32 + 1);
            }
            FieldType::Data => {
                let idx = pointer_index_of(def, self.schema, &field.name)
                    .ok_or_else(|| serialization_err(format!("field '{}' has no pointer slot", field.name)))?;
                let bytes = scalar_string_to_bytes(str_of(value)?);
                let target = self.write_byte_list(words, &bytes)?;
                self.patch_list_pointer(words, start + data_words + idx, target, pointer::ELEM_BYTE, bytes.len() as u32);
            }
            FieldType::UserType(name) => {
                if let Some(enum_def) = self.schema.enum_by_name(name) {
                    write_int(words, start, field.ordinal, 16, enum_value_of(value, enum_def)? as i64);
                } else if let Some(sub_def) = self.schema.struct_by_name(name) {
                    let idx = pointer_index_of(def, self.schema, &field.name)
                        .ok_or_else(|| serialization_err(format!("field '{}' has no pointer slot", field.name)))?;
                    let sub_message = value
                        .as_message()
                        .ok_or_else(|| serialization_err(format!("field '{}' expected a struct value", field.name)))?;
                    let target = self.write_struct(words, sub_message, sub_def)?;
                    let dw = struct_data_words(sub_def, self.schema);
                    let pw = struct_pointer_words(sub_def, self.schema);
                    let ptr_word = start + data_words + idx;
                    let offset = target as i64 - ptr_word as i64 - 1;
                    words[ptr_word] = pointer::encode(Pointer::Struct {
                        offset: offset as i32,
                        data_words: dw,
                        pointer_words: pw,
                    });
                } else {
                    return Err(serialization_err(format!("unknown type: {}", name)));
                }
            }
            FieldType::List(elem) => {
                let idx = pointer_index_of(def, self.schema, &field.name)
                    .ok_or_else(|| serialization_err(format!("field '{}' has no pointer slot", field.name)))?;
                let items = value
                    .as_list()
                    .ok_or_else(|| serialization_err(format!("field '{}' expected a list value", field.name)))?;
                self.write_list_field(words, start + data_words + idx, elem, items)?;
            }
            FieldType::AnyPointer => return Err(serialization_err("AnyPointer fields are not supported")),
        }
        Ok(())
    }

    fn write_byte_list(&self, words: &mut Vec<u64>, bytes: &[u8]) -> WireformsResult<usize> {
        let words_needed = (bytes.len() + 8) / 8; // + null terminator headroom
        let target = allocate(words, words_needed.max(1));
        for (i, b) in bytes.iter().enumerate() {
            write_bits(words, target + i / 8, ((i % 8) * 8) as u32, 8, *b as u64);
        }
        Ok(target)
    }

    fn patch_list_pointer(&self, words: &mut [u64], ptr_word: usize, target: usize, element_size: u8, element_count: u32) {
        let offset = target as i64 - ptr_word as i64 - 1;
        words[ptr_word] = pointer::encode(Pointer::List {
            offset: offset as i32,
            element_size,
            element_count,
        });
    }

    fn write_list_field(&self, words: &mut Vec<u64>, ptr_word: usize, elem: &FieldType, items: &[Value]) -> WireformsResult<()> {
        if items.is_empty() {
            // Leave the pointer slot at its allocated zero value (null
            // pointer) rather than allocating a zero-length list body, per
            // spec.md §8: "writing list of length 0 produces a null
            // pointer on re-read".
            return Ok(());
        }
        match elem {
            FieldType::Void => {
                let target = words.len();
                self.patch_list_pointer(words, ptr_word, target, pointer::ELEM_VOID, items.len() as u32);
            }
            FieldType::Bool => {
                let target = allocate(words, ((items.len() + 63) / 64).max(1));
                for (i, item) in items.iter().enumerate() {
                    write_bits(words, target + i / 64, (i % 64) as u32, 1, bool_of(item)? as u64);
                }
                self.patch_list_pointer(words, ptr_word, target, pointer::ELEM_BIT, items.len() as u32);
            }
            FieldType::Text => {
                let target = allocate(words, items.len());
                for (i, item) in items.iter().enumerate() {
                    let bytes = str_of(item)?.as_bytes().to_vec();
                    let text_target = self.write_byte_list(words, &bytes)?;
                    self.patch_list_pointer(words, target + i, text_target, pointer::ELEM_BYTE, bytes.len() as u32 + 1);
                }
                self.patch_list_pointer(words, ptr_word, target, pointer::ELEM_POINTER, items.len() as u32);
            }
            other => {
                let (width, _signed) = scalar_width_signed(other)?;
                let per_word = 64 / width as usize;
                let target = allocate(words, ((items.len() + per_word - 1) / per_word).max(1));
                let element_size = match width {
                    8 => pointer::ELEM_BYTE,
                    16 => pointer::ELEM_2BYTE,
                    32 => pointer::ELEM_4BYTE,
                    64 => pointer::ELEM_8BYTE,
                    _ => unreachable!(),
                };
                for (i, item) in items.iter().enumerate() {
                    let raw = match other {
                        FieldType::Float32 => (float_of(item)? as f32).to_bits() as u64,
                        FieldType::Float64 => float_of(item)?.to_bits(),
                        _ => int_of(item)? as u64,
                    };
                    let word_idx = target + i / per_word;
                    let bit_offset = ((i % per_word) * width as usize) as u32;
                    write_bits(words, word_idx, bit_offset, width, raw);
                }
                self.patch_list_pointer(words, ptr_word, target, element_size, items.len() as u32);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capnp::processor::parse_schema;
    use wireforms::value::Field;

    fn person_schema() -> CapnpSchema {
        parse_schema(
            r#"
            @0xdbb69c4bd88cd1aa;
            struct Person {
                name @0 :Text;
                age @1 :Int32;
                active @2 :Bool;
            }
            "#,
        )
        .unwrap()
    }

    #[test]
    fn round_trips_flat_struct() {
        let schema = person_schema();
        let serializer = CapnpBinarySerializer::new(&schema);
        let mut message = Message::new();
        message.push(Field::new("name", Value::string("Alice")));
        message.push(Field::new("age", Value::int(30)));
        message.push(Field::new("active", Value::bool(true)));

        let bytes = serializer.serialize(&Value::Message(message.clone()), "Person").unwrap();
        let parser = CapnpBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Person").unwrap();
        assert_eq!(decoded, Value::Message(message));
    }

    #[test]
    fn round_trips_nested_struct() {
        let schema = parse_schema(
            r#"
            @0xdbb69c4bd88cd1aa;
            struct Address { city @0 :Text; }
            struct Person { name @0 :Text; address @1 :Address; }
            "#,
        )
        .unwrap();
        let mut address = Message::new();
        address.push(Field::new("city", Value::string("SF")));
        let mut person = Message::new();
        person.push(Field::new("name", Value::string("Bob")));
        person.push(Field::new("address", Value::Message(address)));

        let serializer = CapnpBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(person.clone()), "Person").unwrap();
        let parser = CapnpBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Person").unwrap();
        assert_eq!(decoded, Value::Message(person));
    }

    #[test]
    fn round_trips_int_list() {
        let schema = parse_schema(
            r#"
            @0xdbb69c4bd88cd1aa;
            struct Scores { values @0 :List(Int32); }
            "#,
        )
        .unwrap();
        let mut message = Message::new();
        message.push(Field::new(
            "values",
            Value::List(vec![Value::int(1), Value::int(2), Value::int(3)]),
        ));
        let serializer = CapnpBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(message.clone()), "Scores").unwrap();
        let parser = CapnpBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Scores").unwrap();
        assert_eq!(decoded, Value::Message(message));
    }

    #[test]
    fn missing_segment_is_parse_error() {
        let schema = person_schema();
        let parser = CapnpBinaryParser::new(&schema);
        assert!(parser.parse(&[], "Person").is_err());
    }
}
