use landing_zone_processing::conversion::{
    CHECKPOINT_COLUMN_NAME, OP_COLUMN_NAME, TIMESTAMP_COLUMN_NAME,
};
use landing_zone_processing::testing::all_types_schema_json;
use landing_zone_processing::{BasicType, Field, FieldType, Schema, to_processing_schema};
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn nullable_fields_are_left_unchanged() -> anyhow::Result<()> {
    let registered = Schema::parse_str(&all_types_schema_json())?;
    let processing = to_processing_schema(&registered);

    // name and price were already ["null", T]
    assert_eq!(processing.field("name"), registered.field("name"));
    assert_eq!(processing.field("price"), registered.field("price"));
    Ok(())
}

#[test]
fn every_field_becomes_a_nullable_union() -> anyhow::Result<()> {
    let registered = Schema::parse_str(&all_types_schema_json())?;
    let processing = to_processing_schema(&registered);

    assert_eq!(processing.fields.len(), registered.fields.len() + 3);
    for field in &processing.fields {
        assert!(
            field.field_type.non_null_branch().is_some(),
            "{} is {}",
            field.name,
            field.field_type
        );
    }
    assert_eq!(
        processing.field("created").map(|f| f.field_type.clone()),
        Some(FieldType::nullable(FieldType::Basic(BasicType::TimestampMillis)))
    );
    Ok(())
}

#[test]
fn synthetic_columns_frame_the_original_fields() -> anyhow::Result<()> {
    let registered = Schema::parse_str(&all_types_schema_json())?;
    let processing = to_processing_schema(&registered);
    let names: Vec<&str> = processing.field_names().collect();

    assert_eq!(names.first(), Some(&OP_COLUMN_NAME));
    assert_eq!(names.get(1), Some(&TIMESTAMP_COLUMN_NAME));
    assert_eq!(names.last(), Some(&CHECKPOINT_COLUMN_NAME));
    assert_eq!(
        &names[2..names.len() - 1],
        registered.field_names().collect::<Vec<_>>().as_slice()
    );
    Ok(())
}

#[test]
fn transformation_is_idempotent_on_data_fields() {
    let registered = Schema::new(
        "t",
        vec![
            Field::new("a", FieldType::Basic(BasicType::Int)),
            Field::new("b", FieldType::nullable(FieldType::Basic(BasicType::String))),
        ],
    );
    let once = to_processing_schema(&registered);
    let mut stripped = once.clone();
    stripped.fields.retain(|f| {
        ![OP_COLUMN_NAME, TIMESTAMP_COLUMN_NAME, CHECKPOINT_COLUMN_NAME].contains(&f.name.as_str())
    });
    let twice = to_processing_schema(&stripped);
    assert_eq!(twice, once);
}

#[test]
fn properties_are_preserved() -> anyhow::Result<()> {
    let registered = Schema::parse_str(&all_types_schema_json())?;
    let processing = to_processing_schema(&registered);

    assert_eq!(processing.name, "everything");
    assert_eq!(processing.doc.as_deref(), Some("One column per supported type"));
    assert_eq!(processing.props.get("primaryKey"), Some(&json!("id")));
    assert_eq!(
        processing.field("id").and_then(|f| f.props.get("nullable")),
        Some(&json!(false))
    );

    let rendered = processing.to_avro_json();
    assert_eq!(rendered["primaryKey"], json!("id"));
    assert_eq!(rendered["fields"][2]["type"], json!(["null", "long"]));
    Ok(())
}
