pub mod grammar;
pub mod model;
pub mod processor;

pub use model::{EnumDef, FieldDef, FieldLabel, MessageDef, ProtoSchema};
pub use processor::parse_schema;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_person_message() {
        let schema = parse_schema(
            r#"
            syntax = "proto3";
            package example;

            message Person {
                string name = 1;
                int32 age = 2;
                bool active = 3;
                repeated string tags = 4;
                map<string, int32> scores = 5;
                Address address = 6;
            }

            message Address {
                string city = 1;
            }
            "#,
        )
        .unwrap();

        assert_eq!(schema.package.as_deref(), Some("example"));
        let person = schema.message_by_name("Person").unwrap();
        assert_eq!(person.fields.len(), 6);
        let scores = person.field_by_name("scores").unwrap();
        assert!(scores.is_map());
        assert_eq!(scores.key_type.as_deref(), Some("string"));
        assert_eq!(scores.value_type.as_deref(), Some("int32"));
        let tags = person.field_by_name("tags").unwrap();
        assert!(tags.is_repeated());
    }

    #[test]
    fn rejects_duplicate_field_numbers() {
        let result = parse_schema(
            r#"
            syntax = "proto3";
            message M {
                string a = 1;
                string b = 1;
            }
            "#,
        );
        assert!(result.is_err());
    }

    #[test]
    fn parses_nested_enum() {
        let schema = parse_schema(
            r#"
            message M {
                enum Kind {
                    UNKNOWN = 0;
                    FIRST = 1;
                }
                Kind kind = 1;
            }
            "#,
        )
        .unwrap();
        let m = schema.message_by_name("M").unwrap();
        let kind = &m.nested_enums[0];
        assert_eq!(kind.values.get("FIRST"), Some(1));
    }

    #[test]
    fn rejects_non_proto3_syntax() {
        let result = parse_schema(r#"syntax = "proto2"; message M {}"#);
        assert!(result.is_err());
    }
}
