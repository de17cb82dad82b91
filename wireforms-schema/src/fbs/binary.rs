//! FlatBuffers binary codec (spec.md §4.7): canonical vtable/uoffset
//! layout (SPEC_FULL.md §5(a) — adopted over the non-standard
//! string-section-after-vtable layout, since there is no external reader
//! this crate must stay bug-compatible with).

use wireforms::error::{ParseError, SerializationError, WireformsError, WireformsResult};
use wireforms::value::{Field, Message, Scalar, Value};

use crate::fbs::model::{FbsSchema, FbsType, StructDef, TableDef};

fn parse_err(message: impl Into<String>) -> WireformsError {
    WireformsError::Parse(ParseError::new(message))
}

fn serialization_err(message: impl Into<String>) -> WireformsError {
    WireformsError::Serialization(SerializationError::new(message))
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

fn struct_size(def: &StructDef, schema: &FbsSchema) -> WireformsResult<u32> {
    let mut size = 0u32;
    for field in &def.fields {
        size += match &field.ty {
            FbsType::UserType(name) => match schema.struct_by_name(name) {
                Some(nested) => struct_size(nested, schema)?,
                None => return Err(parse_err(format!("struct field '{}' must reference another struct", name))),
            },
            other if other.is_scalar() => other.inline_size(),
            other => return Err(parse_err(format!("unsupported struct field type: {:?}", other))),
        };
    }
    Ok(size)
}

// ---------------------------------------------------------------------
// Writer: a "chunk list" builder mirroring the canonical back-growing
// FlatBuffers builder. Chunks are pushed in construction order (children
// before the parents that reference them); `finish` lays them out in
// REVERSE order so that every forward (uoffset) reference ends up
// positive, exactly as a real canonical builder produces.
// ---------------------------------------------------------------------

struct Patch {
    slot_chunk: usize,
    slot_offset: usize,
    target_chunk: usize,
    negate: bool,
}

struct Builder<'s> {
    schema: &'s FbsSchema,
    chunks: Vec<Vec<u8>>,
    patches: Vec<Patch>,
}

impl<'s> Builder<'s> {
    fn new(schema: &'s FbsSchema) -> Builder<'s> {
        Builder {
            schema,
            chunks: Vec::new(),
            patches: Vec::new(),
        }
    }

    fn push_chunk(&mut self, bytes: Vec<u8>) -> usize {
        self.chunks.push(bytes);
        self.chunks.len() - 1
    }

    fn patch(&mut self, slot_chunk: usize, slot_offset: usize, target_chunk: usize, negate: bool) {
        self.patches.push(Patch {
            slot_chunk,
            slot_offset,
            target_chunk,
            negate,
        });
    }

    fn finish(self) -> Vec<u8> {
        let Builder { chunks, patches, .. } = self;
        let mut abs = vec![0usize; chunks.len()];
        let mut running = 0usize;
        for i in (0..chunks.len()).rev() {
            abs[i] = running;
            running += chunks[i].len();
        }
        let mut out = Vec::with_capacity(running);
        for c in chunks.iter().rev() {
            out.extend_from_slice(c);
        }
        for p in patches {
            let slot_abs = abs[p.slot_chunk] + p.slot_offset;
            let target_abs = abs[p.target_chunk];
            let value = if p.negate {
                slot_abs as i64 - target_abs as i64
            } else {
                target_abs as i64 - slot_abs as i64
            } as i32;
            out[slot_abs..slot_abs + 4].copy_from_slice(&value.to_le_bytes());
        }
        out
    }

    fn write_scalar_inline(&self, buf: &mut Vec<u8>, ty: &FbsType, value: &Value) -> WireformsResult<()> {
        match ty {
            FbsType::Bool => buf.push(bool_of(value)? as u8),
            FbsType::Byte => buf.push(int_of(value)? as i8 as u8),
            FbsType::UByte => buf.push(int_of(value)? as u8),
            FbsType::Short => buf.extend_from_slice(&(int_of(value)? as i16).to_le_bytes()),
            FbsType::UShort => buf.extend_from_slice(&(int_of(value)? as u16).to_le_bytes()),
            FbsType::Int => buf.extend_from_slice(&(int_of(value)? as i32).to_le_bytes()),
            FbsType::UInt => buf.extend_from_slice(&(int_of(value)? as u32).to_le_bytes()),
            FbsType::Long => buf.extend_from_slice(&int_of(value)?.to_le_bytes()),
            FbsType::ULong => buf.extend_from_slice(&(int_of(value)? as u64).to_le_bytes()),
            FbsType::Float => buf.extend_from_slice(&(float_of(value)? as f32).to_le_bytes()),
            FbsType::Double => buf.extend_from_slice(&float_of(value)?.to_le_bytes()),
            other => return Err(serialization_err(format!("not a scalar type: {:?}", other))),
        }
        Ok(())
    }

    fn write_struct_inline(&mut self, buf: &mut Vec<u8>, message: &Message, def: &StructDef) -> WireformsResult<()> {
        for field in &def.fields {
            let value = message
                .find_field(&field.name)
                .map(|f| &f.value)
                .ok_or_else(|| serialization_err(format!("struct field '{}' is required", field.name)))?;
            match &field.ty {
                FbsType::UserType(name) => {
                    let nested = self
                        .schema
                        .struct_by_name(name)
                        .ok_or_else(|| serialization_err(format!("unknown struct type: {}", name)))?;
                    let nested_message = value
                        .as_message()
                        .ok_or_else(|| serialization_err(format!("field '{}' expected a struct value", field.name)))?;
                    self.write_struct_inline(buf, nested_message, nested)?;
                }
                other => self.write_scalar_inline(buf, other, value)?,
            }
        }
        Ok(())
    }

    fn write_string_chunk(&mut self, bytes: &[u8]) -> usize {
        let mut buf = Vec::with_capacity(4 + bytes.len() + 1);
        buf.extend_from_slice(&(bytes.len() as u32).to_le_bytes());
        buf.extend_from_slice(bytes);
        buf.push(0);
        self.push_chunk(buf)
    }

    fn write_vector_chunk(&mut self, items: &[Value], elem: &FbsType) -> WireformsResult<usize> {
        match elem {
            FbsType::String => {
                let mut targets = Vec::with_capacity(items.len());
                for item in items {
                    targets.push(self.write_string_chunk(str_of(item)?.as_bytes()));
                }
                let mut buf = Vec::with_capacity(4 + items.len() * 4);
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                let base = buf.len();
                buf.resize(base + items.len() * 4, 0);
                let chunk = self.push_chunk(buf);
                for (i, target) in targets.into_iter().enumerate() {
                    self.patch(chunk, base + i * 4, target, false);
                }
                Ok(chunk)
            }
            FbsType::UserType(name) if self.schema.table_by_name(name).is_some() => {
                let table_def = self.schema.table_by_name(name).unwrap().clone();
                let mut targets = Vec::with_capacity(items.len());
                for item in items {
                    let message = item
                        .as_message()
                        .ok_or_else(|| serialization_err("vector of tables expects message elements"))?;
                    targets.push(self.write_table(message, &table_def)?);
                }
                let mut buf = Vec::with_capacity(4 + items.len() * 4);
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                let base = buf.len();
                buf.resize(base + items.len() * 4, 0);
                let chunk = self.push_chunk(buf);
                for (i, target) in targets.into_iter().enumerate() {
                    self.patch(chunk, base + i * 4, target, false);
                }
                Ok(chunk)
            }
            FbsType::UserType(name) if self.schema.struct_by_name(name).is_some() => {
                let struct_def = self.schema.struct_by_name(name).unwrap().clone();
                let mut buf = Vec::new();
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    let message = item
                        .as_message()
                        .ok_or_else(|| serialization_err("vector of structs expects message elements"))?;
                    self.write_struct_inline(&mut buf, message, &struct_def)?;
                }
                Ok(self.push_chunk(buf))
            }
            FbsType::Vector(_) => Err(serialization_err("vectors of vectors are not supported")),
            scalar if scalar.is_scalar() => {
                let mut buf = Vec::new();
                buf.extend_from_slice(&(items.len() as u32).to_le_bytes());
                for item in items {
                    self.write_scalar_inline(&mut buf, scalar, item)?;
                }
                Ok(self.push_chunk(buf))
            }
            other => Err(serialization_err(format!("unsupported vector element type: {:?}", other))),
        }
    }

    fn write_table(&mut self, message: &Message, def: &TableDef) -> WireformsResult<usize> {
        let mut body = vec![0u8; 4]; // soffset placeholder
        let mut field_positions: Vec<Option<usize>> = Vec::with_capacity(def.fields.len());
        let mut ref_patches: Vec<(usize, usize)> = Vec::new();

        for field in &def.fields {
            let value = match message.find_field(&field.name) {
                Some(f) => &f.value,
                None => {
                    field_positions.push(None);
                    continue;
                }
            };
            match &field.ty {
                FbsType::String => {
                    let target = self.write_string_chunk(str_of(value)?.as_bytes());
                    let pos = body.len();
                    body.extend_from_slice(&[0u8; 4]);
                    field_positions.push(Some(pos));
                    ref_patches.push((pos, target));
                }
                FbsType::Vector(elem) => {
                    let items = value
                        .as_list()
                        .ok_or_else(|| serialization_err(format!("field '{}' expected a list value", field.name)))?;
                    let target = self.write_vector_chunk(items, elem)?;
                    let pos = body.len();
                    body.extend_from_slice(&[0u8; 4]);
                    field_positions.push(Some(pos));
                    ref_patches.push((pos, target));
                }
                FbsType::UserType(name) => {
                    if let Some(table_def) = self.schema.table_by_name(name).cloned() {
                        let nested_message = value
                            .as_message()
                            .ok_or_else(|| serialization_err(format!("field '{}' expected a table value", field.name)))?;
                        let target = self.write_table(nested_message, &table_def)?;
                        let pos = body.len();
                        body.extend_from_slice(&[0u8; 4]);
                        field_positions.push(Some(pos));
                        ref_patches.push((pos, target));
                    } else if let Some(struct_def) = self.schema.struct_by_name(name).cloned() {
                        let nested_message = value
                            .as_message()
                            .ok_or_else(|| serialization_err(format!("field '{}' expected a struct value", field.name)))?;
                        let pos = body.len();
                        self.write_struct_inline(&mut body, nested_message, &struct_def)?;
                        field_positions.push(Some(pos));
                    } else if let Some(enum_def) = self.schema.enum_by_name(name) {
                        let numeric = match value.as_scalar() {
                            Some(Scalar::Int(i)) => *i,
                            Some(Scalar::String(n)) => enum_def
                                .values
                                .get(n)
                                .ok_or_else(|| serialization_err(format!("unknown enum symbol: {}", n)))?,
                            _ => return Err(serialization_err("expected enum symbol or integer")),
                        };
                        let pos = body.len();
                        let underlying = enum_def.underlying.clone();
                        self.write_scalar_inline(&mut body, &underlying, &Value::int(numeric))?;
                        field_positions.push(Some(pos));
                    } else {
                        return Err(serialization_err(format!("unknown type: {}", name)));
                    }
                }
                scalar => {
                    let pos = body.len();
                    self.write_scalar_inline(&mut body, scalar, value)?;
                    field_positions.push(Some(pos));
                }
            }
        }

        let table_chunk = self.push_chunk(body);
        for (pos, target) in ref_patches {
            self.patch(table_chunk, pos, target, false);
        }

        let object_size = self.chunks[table_chunk].len() as u16;
        let vtable_size = (4 + field_positions.len() * 2) as u16;
        let mut vt_bytes = Vec::with_capacity(vtable_size as usize);
        vt_bytes.extend_from_slice(&vtable_size.to_le_bytes());
        vt_bytes.extend_from_slice(&object_size.to_le_bytes());
        for pos in &field_positions {
            vt_bytes.extend_from_slice(&(pos.unwrap_or(0) as u16).to_le_bytes());
        }
        let vtable_chunk = self.push_chunk(vt_bytes);
        self.patch(table_chunk, 0, vtable_chunk, true);
        Ok(table_chunk)
    }
}

pub struct FbsBinarySerializer<'s> {
    schema: &'s FbsSchema,
}

impl<'s> FbsBinarySerializer<'s> {
    pub fn new(schema: &'s FbsSchema) -> FbsBinarySerializer<'s> {
        FbsBinarySerializer { schema }
    }

    pub fn serialize(&self, data: &Value, root_type: &str) -> WireformsResult<Vec<u8>> {
        let def = self
            .schema
            .table_by_name(root_type)
            .ok_or_else(|| serialization_err(format!("unknown root type: {}", root_type)))?;
        let message = data.as_message().ok_or_else(|| serialization_err("root value must be a message"))?;
        let mut builder = Builder::new(self.schema);
        let root_chunk = builder.write_table(message, def)?;
        let root_ptr_chunk = builder.push_chunk(vec![0u8; 4]);
        builder.patch(root_ptr_chunk, 0, root_chunk, false);
        Ok(builder.finish())
    }
}

// ---------------------------------------------------------------------
// Reader
// ---------------------------------------------------------------------

fn check_bounds(buf: &[u8], pos: usize, len: usize) -> WireformsResult<()> {
    if pos + len > buf.len() {
        return Err(parse_err("read past end of buffer"));
    }
    Ok(())
}

fn read_u16(buf: &[u8], pos: usize) -> WireformsResult<u16> {
    check_bounds(buf, pos, 2)?;
    Ok(u16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap()))
}

fn read_i16(buf: &[u8], pos: usize) -> WireformsResult<i16> {
    check_bounds(buf, pos, 2)?;
    Ok(i16::from_le_bytes(buf[pos..pos + 2].try_into().unwrap()))
}

fn read_u32(buf: &[u8], pos: usize) -> WireformsResult<u32> {
    check_bounds(buf, pos, 4)?;
    Ok(u32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()))
}

fn read_i32(buf: &[u8], pos: usize) -> WireformsResult<i32> {
    check_bounds(buf, pos, 4)?;
    Ok(i32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()))
}

fn read_u64(buf: &[u8], pos: usize) -> WireformsResult<u64> {
    check_bounds(buf, pos, 8)?;
    Ok(u64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()))
}

fn read_i64(buf: &[u8], pos: usize) -> WireformsResult<i64> {
    check_bounds(buf, pos, 8)?;
    Ok(i64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()))
}

fn read_f32(buf: &[u8], pos: usize) -> WireformsResult<f32> {
    check_bounds(buf, pos, 4)?;
    Ok(f32::from_le_bytes(buf[pos..pos + 4].try_into().unwrap()))
}

fn read_f64(buf: &[u8], pos: usize) -> WireformsResult<f64> {
    check_bounds(buf, pos, 8)?;
    Ok(f64::from_le_bytes(buf[pos..pos + 8].try_into().unwrap()))
}

fn read_string(buf: &[u8], pos: usize) -> WireformsResult<Value> {
    let len = read_u32(buf, pos)? as usize;
    check_bounds(buf, pos + 4, len)?;
    let bytes = &buf[pos + 4..pos + 4 + len];
    let s = std::str::from_utf8(bytes).map_err(|e| WireformsError::Parse(ParseError::from(e)))?;
    Ok(Value::string(s))
}

pub struct FbsBinaryParser<'s> {
    schema: &'s FbsSchema,
}

impl<'s> FbsBinaryParser<'s> {
    pub fn new(schema: &'s FbsSchema) -> FbsBinaryParser<'s> {
        FbsBinaryParser { schema }
    }

    pub fn parse(&self, bytes: &[u8], root_type: &str) -> WireformsResult<Value> {
        let def = self
            .schema
            .table_by_name(root_type)
            .ok_or_else(|| parse_err(format!("unknown root type: {}", root_type)))?;
        let root_uoffset = read_u32(bytes, 0)?;
        let root_pos = (0i64 + root_uoffset as i64) as usize;
        self.read_table(bytes, root_pos, def)
    }

    fn read_table(&self, buf: &[u8], pos: usize, def: &TableDef) -> WireformsResult<Value> {
        let soffset = read_i32(buf, pos)?;
        let vtable_pos = (pos as i64 - soffset as i64) as usize;
        let vtable_size = read_u16(buf, vtable_pos)? as usize;
        if vtable_size < 4 {
            return Err(parse_err("vtable too short"));
        }
        let num_entries = (vtable_size - 4) / 2;
        let mut message = Message::new();
        for (i, field) in def.fields.iter().enumerate() {
            let entry = if i < num_entries { read_u16(buf, vtable_pos + 4 + i * 2)? as usize } else { 0 };
            if entry == 0 {
                continue;
            }
            let field_pos = pos + entry;
            let value = self.read_field_value(buf, field_pos, &field.ty)?;
            message.push(Field::new(&field.name, value));
        }
        Ok(Value::Message(message))
    }

    fn read_field_value(&self, buf: &[u8], pos: usize, ty: &FbsType) -> WireformsResult<Value> {
        match ty {
            FbsType::Bool => {
                check_bounds(buf, pos, 1)?;
                Ok(Value::bool(buf[pos] != 0))
            }
            FbsType::Byte => {
                check_bounds(buf, pos, 1)?;
                Ok(Value::int(buf[pos] as i8 as i64))
            }
            FbsType::UByte => {
                check_bounds(buf, pos, 1)?;
                Ok(Value::int(buf[pos] as i64))
            }
            FbsType::Short => Ok(Value::int(read_i16(buf, pos)? as i64)),
            FbsType::UShort => Ok(Value::int(read_u16(buf, pos)? as i64)),
            FbsType::Int => Ok(Value::int(read_i32(buf, pos)? as i64)),
            FbsType::UInt => Ok(Value::int(read_u32(buf, pos)? as i64)),
            FbsType::Long => Ok(Value::int(read_i64(buf, pos)?)),
            FbsType::ULong => Ok(Value::int(read_u64(buf, pos)? as i64)),
            FbsType::Float => Ok(Value::float(read_f32(buf, pos)? as f64)),
            FbsType::Double => Ok(Value::float(read_f64(buf, pos)?)),
            FbsType::String => {
                let uoff = read_u32(buf, pos)?;
                let target = (pos as i64 + uoff as i64) as usize;
                read_string(buf, target)
            }
            FbsType::Vector(elem) => {
                let uoff = read_u32(buf, pos)?;
                let target = (pos as i64 + uoff as i64) as usize;
                self.read_vector(buf, target, elem)
            }
            FbsType::UserType(name) => {
                if let Some(table_def) = self.schema.table_by_name(name) {
                    let uoff = read_u32(buf, pos)?;
                    let target = (pos as i64 + uoff as i64) as usize;
                    self.read_table(buf, target, table_def)
                } else if let Some(struct_def) = self.schema.struct_by_name(name) {
                    self.read_struct_inline(buf, pos, struct_def)
                } else if let Some(enum_def) = self.schema.enum_by_name(name) {
                    let numeric = self.read_field_value(buf, pos, &enum_def.underlying)?;
                    Ok(match numeric {
                        Value::Scalar(Scalar::Int(i)) => match enum_def.values.name_of(i) {
                            Some(n) => Value::string(n),
                            None => Value::int(i),
                        },
                        other => other,
                    })
                } else {
                    Err(parse_err(format!("unknown type: {}", name)))
                }
            }
        }
    }

    fn read_vector(&self, buf: &[u8], pos: usize, elem: &FbsType) -> WireformsResult<Value> {
        let len = read_u32(buf, pos)? as usize;
        let data_start = pos + 4;
        let mut items = Vec::with_capacity(len);
        match elem {
            FbsType::String => {
                for i in 0..len {
                    let slot = data_start + i * 4;
                    let uoff = read_u32(buf, slot)?;
                    let target = (slot as i64 + uoff as i64) as usize;
                    items.push(read_string(buf, target)?);
                }
            }
            FbsType::UserType(name) if self.schema.table_by_name(name).is_some() => {
                let table_def = self.schema.table_by_name(name).unwrap();
                for i in 0..len {
                    let slot = data_start + i * 4;
                    let uoff = read_u32(buf, slot)?;
                    let target = (slot as i64 + uoff as i64) as usize;
                    items.push(self.read_table(buf, target, table_def)?);
                }
            }
            FbsType::UserType(name) if self.schema.struct_by_name(name).is_some() => {
                let struct_def = self.schema.struct_by_name(name).unwrap();
                let stride = struct_size(struct_def, self.schema)? as usize;
                for i in 0..len {
                    items.push(self.read_struct_inline(buf, data_start + i * stride, struct_def)?);
                }
            }
            FbsType::Vector(_) => return Err(parse_err("vectors of vectors are not supported")),
            scalar if scalar.is_scalar() => {
                let stride = scalar.inline_size() as usize;
                for i in 0..len {
                    items.push(self.read_field_value(buf, data_start + i * stride, scalar)?);
                }
            }
            other => return Err(parse_err(format!("unsupported vector element type: {:?}", other))),
        }
        Ok(Value::List(items))
    }

    fn read_struct_inline(&self, buf: &[u8], pos: usize, def: &StructDef) -> WireformsResult<Value> {
        let mut message = Message::new();
        let mut offset = pos;
        for field in &def.fields {
            match &field.ty {
                FbsType::UserType(name) => {
                    let nested = self
                        .schema
                        .struct_by_name(name)
                        .ok_or_else(|| parse_err(format!("unknown struct type: {}", name)))?;
                    message.push(Field::new(&field.name, self.read_struct_inline(buf, offset, nested)?));
                    offset += struct_size(nested, self.schema)? as usize;
                }
                other => {
                    message.push(Field::new(&field.name, self.read_field_value(buf, offset, other)?));
                    offset += other.inline_size() as usize;
                }
            }
        }
        Ok(Value::Message(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbs::processor::parse_schema;

    fn monster_schema() -> FbsSchema {
        parse_schema(
            r#"
            table Monster { hp:int; name:string; }
            root_type Monster;
            "#,
        )
        .unwrap()
    }

    #[test]
    fn round_trips_flat_table() {
        let schema = monster_schema();
        let mut message = Message::new();
        message.push(Field::new("hp", Value::int(150)));
        message.push(Field::new("name", Value::string("Dragon")));

        let serializer = FbsBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(message.clone()), "Monster").unwrap();
        let parser = FbsBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Monster").unwrap();
        assert_eq!(decoded, Value::Message(message));
    }

    #[test]
    fn omitted_optional_scalar_is_absent_on_read() {
        let schema = monster_schema();
        let mut message = Message::new();
        message.push(Field::new("name", Value::string("Orc")));

        let serializer = FbsBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(message), "Monster").unwrap();
        let parser = FbsBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Monster").unwrap();
        let decoded = decoded.as_message().unwrap();
        assert!(decoded.find_field("hp").is_none());
        assert_eq!(decoded.find_field("name").unwrap().value, Value::string("Orc"));
    }

    #[test]
    fn round_trips_nested_table() {
        let schema = parse_schema(
            r#"
            table Weapon { name:string; damage:int; }
            table Monster { hp:int; weapon:Weapon; }
            root_type Monster;
            "#,
        )
        .unwrap();
        let mut weapon = Message::new();
        weapon.push(Field::new("name", Value::string("Axe")));
        weapon.push(Field::new("damage", Value::int(5)));
        let mut monster = Message::new();
        monster.push(Field::new("hp", Value::int(80)));
        monster.push(Field::new("weapon", Value::Message(weapon)));

        let serializer = FbsBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(monster.clone()), "Monster").unwrap();
        let parser = FbsBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Monster").unwrap();
        assert_eq!(decoded, Value::Message(monster));
    }

    #[test]
    fn round_trips_string_vector() {
        let schema = parse_schema(
            r#"
            table Tags { values:[string]; }
            root_type Tags;
            "#,
        )
        .unwrap();
        let mut message = Message::new();
        message.push(Field::new(
            "values",
            Value::List(vec![Value::string("a"), Value::string("b")]),
        ));

        let serializer = FbsBinarySerializer::new(&schema);
        let bytes = serializer.serialize(&Value::Message(message.clone()), "Tags").unwrap();
        let parser = FbsBinaryParser::new(&schema);
        let decoded = parser.parse(&bytes, "Tags").unwrap();
        assert_eq!(decoded, Value::Message(message));
    }
}
