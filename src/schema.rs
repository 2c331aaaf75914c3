//! Registered schema model.
//!
//! Schemas are registered as Avro record schemas (`.avsc` JSON). They are parsed
//! and validated with `apache-avro`, then lowered into the small model the
//! converter needs: an ordered list of [`Field`]s whose types are either a
//! [`BasicType`], `null`, a union of those, or some other Avro type the
//! converter does not handle ([`FieldType::Unsupported`], kept verbatim).
//!
//! Schema-level and field-level properties (any attribute Avro does not define)
//! are carried in [`Props`] and written back out by [`Schema::to_avro_json`].

use crate::error::{Error, Result};
use apache_avro::Schema as AvroSchema;
use serde_json::{Map, Value, json};
use std::collections::BTreeMap;
use std::fmt;

/// Arbitrary key/value properties attached to a schema or field.
pub type Props = BTreeMap<String, Value>;

/// The primitive types a text cell can be converted into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BasicType {
    String,
    Int,
    Long,
    Float,
    Double,
    Boolean,
    /// `int` annotated with `logicalType: date`.
    Date,
    /// `int` annotated with `logicalType: time-millis`.
    TimeMillis,
    /// `long` annotated with `logicalType: time-micros`.
    TimeMicros,
    /// `long` annotated with `logicalType: timestamp-millis`.
    TimestampMillis,
    /// `long` annotated with `logicalType: timestamp-micros`.
    TimestampMicros,
    /// `long` annotated with `logicalType: timestamp-nanos`.
    TimestampNanos,
    LocalTimestampMillis,
    LocalTimestampMicros,
    LocalTimestampNanos,
    /// `string` annotated with `logicalType: uuid`.
    Uuid,
}

impl BasicType {
    /// The Avro primitive a cell of this type is stored as.
    #[must_use]
    pub const fn primitive(self) -> Self {
        match self {
            Self::Date | Self::TimeMillis => Self::Int,
            Self::TimeMicros
            | Self::TimestampMillis
            | Self::TimestampMicros
            | Self::TimestampNanos
            | Self::LocalTimestampMillis
            | Self::LocalTimestampMicros
            | Self::LocalTimestampNanos => Self::Long,
            Self::Uuid => Self::String,
            other => other,
        }
    }

    /// True for primitives annotated with a logical type.
    #[must_use]
    pub const fn is_logical(self) -> bool {
        !matches!(
            self,
            Self::String | Self::Int | Self::Long | Self::Float | Self::Double | Self::Boolean
        )
    }

    fn to_avro_json(self) -> Value {
        if self.is_logical() {
            json!({"type": self.primitive().to_string(), "logicalType": self.to_string()})
        } else {
            json!(self.to_string())
        }
    }
}

impl fmt::Display for BasicType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::String => "string",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
            Self::Boolean => "boolean",
            Self::Date => "date",
            Self::TimeMillis => "time-millis",
            Self::TimeMicros => "time-micros",
            Self::TimestampMillis => "timestamp-millis",
            Self::TimestampMicros => "timestamp-micros",
            Self::TimestampNanos => "timestamp-nanos",
            Self::LocalTimestampMillis => "local-timestamp-millis",
            Self::LocalTimestampMicros => "local-timestamp-micros",
            Self::LocalTimestampNanos => "local-timestamp-nanos",
            Self::Uuid => "uuid",
        };
        f.write_str(name)
    }
}

/// The declared type of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldType {
    Null,
    Basic(BasicType),
    Union(Vec<FieldType>),
    /// Any other Avro type, as its Avro JSON.
    Unsupported(Value),
}

impl FieldType {
    /// Wrap `inner` as the two-branch union `["null", inner]`.
    #[must_use]
    pub fn nullable(inner: Self) -> Self {
        Self::Union(vec![Self::Null, inner])
    }

    /// True for a union that has a `null` branch.
    #[must_use]
    pub fn is_nullable_union(&self) -> bool {
        matches!(self, Self::Union(branches) if branches.contains(&Self::Null))
    }

    /// The non-null branch of a two-branch nullable union, or `None` if this
    /// type is not exactly `["null", T]` (in either order).
    #[must_use]
    pub fn non_null_branch(&self) -> Option<&Self> {
        let Self::Union(branches) = self else {
            return None;
        };
        match branches.as_slice() {
            [Self::Null, other] | [other, Self::Null] if *other != Self::Null => Some(other),
            _ => None,
        }
    }

    fn from_avro(schema: &AvroSchema) -> Self {
        match schema {
            AvroSchema::Null => Self::Null,
            AvroSchema::String => Self::Basic(BasicType::String),
            AvroSchema::Int => Self::Basic(BasicType::Int),
            AvroSchema::Long => Self::Basic(BasicType::Long),
            AvroSchema::Float => Self::Basic(BasicType::Float),
            AvroSchema::Double => Self::Basic(BasicType::Double),
            AvroSchema::Boolean => Self::Basic(BasicType::Boolean),
            AvroSchema::Date => Self::Basic(BasicType::Date),
            AvroSchema::TimeMillis => Self::Basic(BasicType::TimeMillis),
            AvroSchema::TimeMicros => Self::Basic(BasicType::TimeMicros),
            AvroSchema::TimestampMillis => Self::Basic(BasicType::TimestampMillis),
            AvroSchema::TimestampMicros => Self::Basic(BasicType::TimestampMicros),
            AvroSchema::TimestampNanos => Self::Basic(BasicType::TimestampNanos),
            AvroSchema::LocalTimestampMillis => Self::Basic(BasicType::LocalTimestampMillis),
            AvroSchema::LocalTimestampMicros => Self::Basic(BasicType::LocalTimestampMicros),
            AvroSchema::LocalTimestampNanos => Self::Basic(BasicType::LocalTimestampNanos),
            AvroSchema::Uuid => Self::Basic(BasicType::Uuid),
            AvroSchema::Union(union) => {
                Self::Union(union.variants().iter().map(Self::from_avro).collect())
            }
            other => Self::Unsupported(
                serde_json::to_value(other).unwrap_or_else(|_| json!(format!("{other:?}"))),
            ),
        }
    }

    /// Render this type as Avro schema JSON.
    #[must_use]
    pub fn to_avro_json(&self) -> Value {
        match self {
            Self::Null => json!("null"),
            Self::Basic(basic) => basic.to_avro_json(),
            Self::Union(branches) => Value::Array(branches.iter().map(Self::to_avro_json).collect()),
            Self::Unsupported(raw) => raw.clone(),
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => f.write_str("null"),
            Self::Basic(basic) => basic.fmt(f),
            Self::Union(branches) => {
                f.write_str("[")?;
                for (i, b) in branches.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    b.fmt(f)?;
                }
                f.write_str("]")
            }
            Self::Unsupported(raw) => match raw {
                Value::String(name) => f.write_str(name),
                Value::Object(obj) => {
                    let name = obj
                        .get("logicalType")
                        .or_else(|| obj.get("type"))
                        .and_then(Value::as_str)
                        .unwrap_or("complex");
                    f.write_str(name)
                }
                other => write!(f, "{other}"),
            },
        }
    }
}

/// A named column of a record schema.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub doc: Option<String>,
    pub default: Option<Value>,
    pub field_type: FieldType,
    pub props: Props,
}

impl Field {
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            doc: None,
            default: None,
            field_type,
            props: Props::new(),
        }
    }

    fn to_avro_json(&self) -> Value {
        let mut obj: Map<String, Value> = self.props.clone().into_iter().collect();
        obj.insert("name".into(), json!(self.name));
        obj.insert("type".into(), self.field_type.to_avro_json());
        if let Some(doc) = &self.doc {
            obj.insert("doc".into(), json!(doc));
        }
        if let Some(default) = &self.default {
            obj.insert("default".into(), default.clone());
        }
        Value::Object(obj)
    }
}

/// An Avro record schema: ordered fields plus record-level metadata.
#[derive(Debug, Clone, PartialEq)]
pub struct Schema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub fields: Vec<Field>,
    pub props: Props,
}

impl Schema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            fields,
            props: Props::new(),
        }
    }

    /// Parse an `.avsc` document.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Avro`] if the text is not a valid Avro schema and
    /// [`Error::Schema`] if it is valid but not a record.
    pub fn parse_str(avsc: &str) -> Result<Self> {
        let parsed = AvroSchema::parse_str(avsc)?;
        Self::from_avro(&parsed)
    }

    /// Lower a parsed Avro schema into this model.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Schema`] if `schema` is not a record schema.
    pub fn from_avro(schema: &AvroSchema) -> Result<Self> {
        let AvroSchema::Record(record) = schema else {
            return Err(Error::Schema(format!(
                "registered schema must be a record, found {}",
                FieldType::from_avro(schema)
            )));
        };
        let fields = record
            .fields
            .iter()
            .map(|f| Field {
                name: f.name.clone(),
                doc: f.doc.clone(),
                default: f.default.clone(),
                field_type: FieldType::from_avro(&f.schema),
                props: f.custom_attributes.clone().into_iter().collect(),
            })
            .collect();
        Ok(Self {
            name: record.name.name.clone(),
            namespace: record.name.namespace.clone(),
            doc: record.doc.clone(),
            fields,
            props: record.attributes.clone().into_iter().collect(),
        })
    }

    #[must_use]
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|f| f.name.as_str())
    }

    /// Render this schema as Avro schema JSON.
    #[must_use]
    pub fn to_avro_json(&self) -> Value {
        let mut obj: Map<String, Value> = self.props.clone().into_iter().collect();
        obj.insert("type".into(), json!("record"));
        obj.insert("name".into(), json!(self.name));
        if let Some(ns) = &self.namespace {
            obj.insert("namespace".into(), json!(ns));
        }
        if let Some(doc) = &self.doc {
            obj.insert("doc".into(), json!(doc));
        }
        obj.insert(
            "fields".into(),
            Value::Array(self.fields.iter().map(Field::to_avro_json).collect()),
        );
        Value::Object(obj)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PRISONS: &str = r#"{
        "type": "record",
        "name": "prisons",
        "namespace": "prisonestate",
        "doc": "Prison estate",
        "primaryKey": "prison_id",
        "fields": [
            {"name": "prison_id", "type": "int", "nullable": false},
            {"name": "prison_code", "type": ["null", "string"]},
            {"name": "opened", "type": {"type": "long", "logicalType": "timestamp-millis"}},
            {"name": "tags", "type": {"type": "array", "items": "string"}}
        ]
    }"#;

    #[test]
    fn test_parse_record() {
        let schema = Schema::parse_str(PRISONS).unwrap();
        assert_eq!(schema.name, "prisons");
        assert_eq!(schema.namespace.as_deref(), Some("prisonestate"));
        assert_eq!(schema.doc.as_deref(), Some("Prison estate"));
        assert_eq!(schema.props.get("primaryKey"), Some(&json!("prison_id")));
        assert_eq!(
            schema.field_names().collect::<Vec<_>>(),
            vec!["prison_id", "prison_code", "opened", "tags"]
        );
        assert_eq!(
            schema.fields[0].field_type,
            FieldType::Basic(BasicType::Int)
        );
        assert_eq!(schema.fields[0].props.get("nullable"), Some(&json!(false)));
        assert_eq!(
            schema.fields[1].field_type,
            FieldType::nullable(FieldType::Basic(BasicType::String))
        );
        assert_eq!(
            schema.fields[2].field_type,
            FieldType::Basic(BasicType::TimestampMillis)
        );
        assert!(matches!(schema.fields[3].field_type, FieldType::Unsupported(_)));
        assert_eq!(schema.fields[3].field_type.to_string(), "array");
    }

    #[test]
    fn test_non_record_is_rejected() {
        assert!(matches!(Schema::parse_str(r#""string""#), Err(Error::Schema(_))));
        assert!(matches!(Schema::parse_str("{not json"), Err(Error::Avro(_))));
    }

    #[test]
    fn test_avro_json_roundtrip() {
        let schema = Schema::parse_str(PRISONS).unwrap();
        let rendered = schema.to_avro_json().to_string();
        let reparsed = Schema::parse_str(&rendered).unwrap();
        assert_eq!(reparsed, schema);
    }

    #[test]
    fn test_logical_types_keep_their_annotation() {
        let schema = Schema::parse_str(
            r#"{
                "type": "record",
                "name": "t",
                "fields": [
                    {"name": "d", "type": {"type": "int", "logicalType": "date"}},
                    {"name": "u", "type": {"type": "string", "logicalType": "uuid"}},
                    {"name": "l", "type": {"type": "long", "logicalType": "local-timestamp-micros"}}
                ]
            }"#,
        )
        .unwrap();
        assert_eq!(schema.fields[0].field_type, FieldType::Basic(BasicType::Date));
        assert_eq!(schema.fields[1].field_type, FieldType::Basic(BasicType::Uuid));
        assert_eq!(
            schema.fields[2].field_type,
            FieldType::Basic(BasicType::LocalTimestampMicros)
        );
        assert_eq!(BasicType::Date.primitive(), BasicType::Int);
        assert_eq!(
            schema.fields[2].field_type.to_avro_json(),
            json!({"type": "long", "logicalType": "local-timestamp-micros"})
        );

        let reparsed = Schema::parse_str(&schema.to_avro_json().to_string()).unwrap();
        assert_eq!(reparsed, schema);
    }

    #[test]
    fn test_non_null_branch() {
        let s = FieldType::Basic(BasicType::String);
        assert_eq!(FieldType::nullable(s.clone()).non_null_branch(), Some(&s));
        assert_eq!(
            FieldType::Union(vec![s.clone(), FieldType::Null]).non_null_branch(),
            Some(&s)
        );
        assert_eq!(s.non_null_branch(), None);
        assert_eq!(
            FieldType::Union(vec![FieldType::Null, s.clone(), FieldType::Basic(BasicType::Int)])
                .non_null_branch(),
            None
        );
        assert_eq!(
            FieldType::Union(vec![s.clone(), FieldType::Basic(BasicType::Int)]).non_null_branch(),
            None
        );
    }
}
