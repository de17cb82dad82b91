//! Textproto emitter (spec.md §4.1 "Textproto emitter").

use crate::value::{MapEntry, Message, Scalar, Value};

const INDENT: &str = "  ";

pub fn to_textproto(message: &Message) -> String {
    let mut out = String::new();
    emit_fields(message, 0, &mut out);
    out
}

fn emit_fields(message: &Message, depth: usize, out: &mut String) {
    for field in message.fields() {
        emit_field(&field.name, &field.value, field.is_map, depth, out);
    }
}

fn emit_field(name: &str, value: &Value, is_map: bool, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    match value {
        Value::Scalar(s) => {
            out.push_str(&indent);
            out.push_str(name);
            out.push_str(": ");
            out.push_str(&emit_scalar(s));
            out.push('\n');
        }
        Value::Message(m) => {
            out.push_str(&indent);
            out.push_str(name);
            out.push_str(" {\n");
            emit_fields(m, depth + 1, out);
            out.push_str(&indent);
            out.push_str("}\n");
        }
        Value::List(items) => {
            if is_all_scalar(items) {
                out.push_str(&indent);
                out.push_str(name);
                out.push_str(": ");
                out.push_str(&emit_scalar_list(items));
                out.push('\n');
            } else {
                for item in items {
                    emit_field(name, item, false, depth, out);
                }
            }
        }
        Value::Map(entries) => {
            for entry in entries {
                emit_map_entry(name, entry, depth, out);
            }
        }
    }
}

fn emit_map_entry(name: &str, entry: &MapEntry, depth: usize, out: &mut String) {
    let indent = INDENT.repeat(depth);
    out.push_str(&indent);
    out.push_str(name);
    out.push_str(" {\n");
    let inner = INDENT.repeat(depth + 1);
    out.push_str(&inner);
    out.push_str("key: ");
    out.push_str(&emit_scalar(&entry.key));
    out.push('\n');
    match &entry.value {
        Value::Scalar(s) => {
            out.push_str(&inner);
            out.push_str("value: ");
            out.push_str(&emit_scalar(s));
            out.push('\n');
        }
        other => emit_field("value", other, false, depth + 1, out),
    }
    out.push_str(&indent);
    out.push_str("}\n");
}

fn is_all_scalar(items: &[Value]) -> bool {
    items.iter().all(|v| matches!(v, Value::Scalar(_)))
}

fn emit_scalar_list(items: &[Value]) -> String {
    let rendered: Vec<String> = items
        .iter()
        .map(|v| match v {
            Value::Scalar(s) => emit_scalar(s),
            _ => unreachable!("is_all_scalar guards this"),
        })
        .collect();
    if rendered.is_empty() {
        return "[]".to_string();
    }
    if rendered.len() < 5 {
        format!("[{}]", rendered.join(", "))
    } else {
        let mut out = String::from("[\n");
        for r in &rendered {
            out.push_str(INDENT);
            out.push_str(r);
            out.push_str(",\n");
        }
        out.push(']');
        out
    }
}

fn emit_scalar(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => format!("\"{}\"", escape_string(s)),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => {
            if f.fract() == 0.0 && f.is_finite() {
                format!("{:.1}", f)
            } else {
                f.to_string()
            }
        }
        Scalar::Bool(b) => b.to_string(),
        Scalar::Null => "\"\"".to_string(),
    }
}

fn escape_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '"' => out.push_str("\\\""),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text_format::parser::parse;
    use crate::value::Field;

    #[test]
    fn emits_scalars_and_nested_message() {
        let mut m = Message::new();
        m.push(Field::new("name", Value::string("Bob")));
        let mut addr = Message::new();
        addr.push(Field::new("city", Value::string("SF")));
        m.push(Field::new("address", Value::Message(addr)));

        assert_eq!(to_textproto(&m), "name: \"Bob\"\naddress {\n  city: \"SF\"\n}\n");
    }

    #[test]
    fn round_trips_through_parser() {
        let original = "name: \"Alice\"\nage: 30\nactive: true\n";
        let m = parse(original).unwrap();
        let re_parsed = parse(&to_textproto(&m)).unwrap();
        assert_eq!(m, re_parsed);
    }

    #[test]
    fn repeated_field_emits_multiple_lines() {
        let mut m = Message::new();
        m.push(Field::new("subsets", Value::string("latin")));
        m.push(Field::new("subsets", Value::string("cyrillic")));
        assert_eq!(to_textproto(&m), "subsets: \"latin\"\nsubsets: \"cyrillic\"\n");
    }

    #[test]
    fn short_scalar_list_renders_inline() {
        let mut m = Message::new();
        m.push(Field::new(
            "values",
            Value::List(vec![Value::int(1), Value::int(2)]),
        ));
        assert_eq!(to_textproto(&m), "values: [1, 2]\n");
    }

    #[test]
    fn empty_scalar_list_renders_brackets() {
        let mut m = Message::new();
        m.push(Field::new("values", Value::List(vec![])));
        assert_eq!(to_textproto(&m), "values: []\n");
    }
}
