//! Text-format integration scenarios from spec.md §8.

use wireforms::value::{Field, Message, Value};

#[test]
fn parse_then_emit_round_trips_a_flat_message() {
    let original = "name: \"Alice\"\nage: 30\nactive: true\n";
    let message = wireforms::parse_textproto(original).unwrap();
    let re_emitted = wireforms::text_format::to_textproto(&message);
    let re_parsed = wireforms::parse_textproto(&re_emitted).unwrap();
    assert_eq!(message, re_parsed);
}

#[test]
fn json_and_yaml_emitters_cover_nested_messages() {
    let mut address = Message::new();
    address.push(Field::new("city", Value::string("SF")));
    let mut person = Message::new();
    person.push(Field::new("name", Value::string("Bob")));
    person.push(Field::new("address", Value::Message(address)));

    let json = wireforms::json::to_json(&person);
    assert!(json.contains("\"name\""));
    assert!(json.contains("\"Bob\""));
    assert!(json.contains("\"city\""));

    let yaml = wireforms::yaml::to_yaml(&person);
    assert!(yaml.contains("name: Bob") || yaml.contains("name: \"Bob\""));
}

#[test]
fn duplicate_field_names_preserve_order_and_count() {
    let message = wireforms::parse_textproto("subsets: \"latin\"\nsubsets: \"cyrillic\"\nsubsets: \"greek\"\n").unwrap();
    let subsets = message.find_fields("subsets");
    assert_eq!(subsets.len(), 3);
    assert_eq!(subsets[0].value, Value::string("latin"));
    assert_eq!(subsets[2].value, Value::string("greek"));
    assert_eq!(message.field_names(), vec!["subsets"]);
}

#[test]
fn malformed_textproto_is_a_parse_error() {
    let result = wireforms::parse_textproto("name: \"unterminated");
    assert!(result.is_err());
}
