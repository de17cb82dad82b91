//! A dependency-free YAML emitter over the generic value tree
//! (spec.md §4.8 `to_yaml`), following the same repeated-field-collapses-
//! to-sequence convention as `json::to_json`.

use crate::value::{MapEntry, Message, Scalar, Value};

pub fn to_yaml(message: &Message) -> String {
    let mut out = String::new();
    write_message(message, 0, &mut out);
    out
}

fn indent(depth: usize, out: &mut String) {
    for _ in 0..depth {
        out.push_str("  ");
    }
}

fn write_message(message: &Message, depth: usize, out: &mut String) {
    if message.field_count() == 0 {
        out.push_str("{}\n");
        return;
    }
    for name in message.field_names() {
        let occurrences = message.find_fields(name);
        if occurrences.len() > 1 {
            indent(depth, out);
            out.push_str(name);
            out.push_str(":\n");
            for f in &occurrences {
                write_sequence_item(&f.value, depth, out);
            }
        } else {
            write_entry(name, &occurrences[0].value, depth, out);
        }
    }
}

fn write_entry(name: &str, value: &Value, depth: usize, out: &mut String) {
    indent(depth, out);
    out.push_str(name);
    out.push(':');
    match value {
        Value::Scalar(s) => {
            out.push(' ');
            out.push_str(&scalar_text(s));
            out.push('\n');
        }
        Value::Message(m) => {
            out.push('\n');
            write_message(m, depth + 1, out);
        }
        Value::List(items) => {
            if items.is_empty() {
                out.push_str(" []\n");
            } else {
                out.push('\n');
                for item in items {
                    write_sequence_item(item, depth, out);
                }
            }
        }
        Value::Map(entries) => {
            out.push('\n');
            write_map(entries, depth + 1, out);
        }
    }
}

fn write_sequence_item(value: &Value, depth: usize, out: &mut String) {
    indent(depth, out);
    out.push_str("- ");
    match value {
        Value::Scalar(s) => {
            out.push_str(&scalar_text(s));
            out.push('\n');
        }
        Value::Message(m) => {
            out.push('\n');
            write_message(m, depth + 2, out);
        }
        Value::List(items) => {
            out.push('\n');
            for item in items {
                write_sequence_item(item, depth + 1, out);
            }
        }
        Value::Map(entries) => {
            out.push('\n');
            write_map(entries, depth + 2, out);
        }
    }
}

fn write_map(entries: &[MapEntry], depth: usize, out: &mut String) {
    if entries.is_empty() {
        indent(depth, out);
        out.push_str("{}\n");
        return;
    }
    for entry in entries {
        write_entry(&entry.key.to_string(), &entry.value, depth, out);
    }
}

fn scalar_text(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => quote_if_needed(s),
        Scalar::Int(i) => i.to_string(),
        Scalar::Float(f) => f.to_string(),
        Scalar::Bool(b) => b.to_string(),
        Scalar::Null => "null".to_string(),
    }
}

fn quote_if_needed(s: &str) -> String {
    let needs_quoting = s.is_empty()
        || s.parse::<f64>().is_ok()
        || matches!(s, "true" | "false" | "null" | "~")
        || s.contains(':')
        || s.contains('#')
        || s.starts_with(['-', '[', '{', '&', '*', '!', '|', '>', '\'', '"', '%', '@', '`']);
    if needs_quoting {
        format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Field;

    #[test]
    fn emits_flat_mapping() {
        let mut m = Message::new();
        m.push(Field::new("name", Value::string("Alice")));
        m.push(Field::new("age", Value::int(30)));
        assert_eq!(to_yaml(&m), "name: Alice\nage: 30\n");
    }

    #[test]
    fn repeated_field_emits_sequence() {
        let mut m = Message::new();
        m.push(Field::new("subsets", Value::string("latin")));
        m.push(Field::new("subsets", Value::string("cyrillic")));
        assert_eq!(to_yaml(&m), "subsets:\n- latin\n- cyrillic\n");
    }
}
