//! Registered schema to processing schema.

use crate::schema::{BasicType, Field, FieldType, Schema};

/// Change-data-capture operation column, always first.
pub const OP_COLUMN_NAME: &str = "Op";
/// Ingestion timestamp column, always second.
pub const TIMESTAMP_COLUMN_NAME: &str = "_timestamp";
/// Checkpoint column, always last.
pub const CHECKPOINT_COLUMN_NAME: &str = "checkpoint_col";
/// Operation code marking a row as an insert.
pub const INSERT_OP_CODE: &str = "I";

fn synthetic(name: &str) -> Field {
    Field::new(name, FieldType::nullable(FieldType::Basic(BasicType::String)))
}

fn make_nullable(mut field: Field) -> Field {
    if field.field_type.is_nullable_union() {
        return field;
    }
    let inner = std::mem::replace(&mut field.field_type, FieldType::Null);
    field.field_type = FieldType::nullable(inner);
    // A default is only valid for the first union branch, which is now null.
    if field.default.as_ref().is_some_and(|d| !d.is_null()) {
        field.default = None;
    }
    field
}

/// Derive the processing schema from a registered schema.
///
/// The result has the fields `[Op, _timestamp, <original fields...>, checkpoint_col]`,
/// every one typed as a union containing `null`. Fields that are already such a
/// union are copied unchanged; any other type `T` becomes `["null", T]`. Names,
/// docs and properties at both schema and field level are kept.
#[must_use]
pub fn to_processing_schema(schema: &Schema) -> Schema {
    let mut fields = Vec::with_capacity(schema.fields.len() + 3);
    fields.push(synthetic(OP_COLUMN_NAME));
    fields.push(synthetic(TIMESTAMP_COLUMN_NAME));
    fields.extend(schema.fields.iter().cloned().map(make_nullable));
    fields.push(synthetic(CHECKPOINT_COLUMN_NAME));

    Schema {
        name: schema.name.clone(),
        namespace: schema.namespace.clone(),
        doc: schema.doc.clone(),
        fields,
        props: schema.props.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn registered() -> Schema {
        Schema::parse_str(
            r#"{
                "type": "record",
                "name": "orders",
                "doc": "Order items",
                "validationType": "strict",
                "fields": [
                    {"name": "id", "type": "int", "sensitive": false, "default": 0},
                    {"name": "code", "type": ["null", "string"], "default": null},
                    {"name": "price", "type": ["double", "null"], "default": 1.5}
                ]
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_field_layout() {
        let out = to_processing_schema(&registered());
        assert_eq!(
            out.field_names().collect::<Vec<_>>(),
            vec!["Op", "_timestamp", "id", "code", "price", "checkpoint_col"]
        );
        let string = FieldType::nullable(FieldType::Basic(BasicType::String));
        assert_eq!(out.fields[0].field_type, string);
        assert_eq!(out.fields[1].field_type, string);
        assert_eq!(out.fields[5].field_type, string);
    }

    #[test]
    fn test_wraps_plain_types_and_keeps_unions() {
        let out = to_processing_schema(&registered());
        assert_eq!(
            out.fields[2].field_type,
            FieldType::nullable(FieldType::Basic(BasicType::Int))
        );
        // non-null default dropped once null becomes the first branch
        assert_eq!(out.fields[2].default, None);
        assert_eq!(out.fields[3], registered().fields[1]);
        assert_eq!(out.fields[4], registered().fields[2]);
    }

    #[test]
    fn test_properties_survive() {
        let out = to_processing_schema(&registered());
        assert_eq!(out.name, "orders");
        assert_eq!(out.doc.as_deref(), Some("Order items"));
        assert_eq!(out.props.get("validationType"), Some(&json!("strict")));
        assert_eq!(out.fields[2].props.get("sensitive"), Some(&json!(false)));
    }

    #[test]
    fn test_output_is_valid_avro() {
        let out = to_processing_schema(&registered());
        let reparsed = Schema::parse_str(&out.to_avro_json().to_string()).unwrap();
        assert_eq!(reparsed, out);
    }
}
