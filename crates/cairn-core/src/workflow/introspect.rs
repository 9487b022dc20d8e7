//! Record introspection backed by `schemars::JsonSchema`.
//!
//! The registry and builders only consume `RecordType` descriptors. This
//! module produces them for Rust types by walking the generated JSON schema:
//! property order gives field order, `type` / `$ref` give the field type,
//! and `default`, `x-alias` and `x-lookup` keywords give the parameter
//! directives.
//!
//! ```ignore
//! #[derive(Deserialize, JsonSchema)]
//! struct CopyInput {
//!     #[schemars(extend("x-alias" = "source"))]
//!     src: String,
//!     #[serde(default = "default_region")]
//!     region: String,
//! }
//! ```

use cairn_types::error::ShapeError;
use cairn_types::parameter::{ANY_TYPE, Parameter, ParameterValue};
use cairn_types::record::{FieldSpec, RecordType, TypeRef};
use schemars::JsonSchema;
use serde_json::Value;

/// Schema keyword carrying a field's alias directive.
pub const ALIAS_KEYWORD: &str = "x-alias";
/// Schema keyword carrying a field's deferred lookup key.
pub const LOOKUP_KEYWORD: &str = "x-lookup";

/// Build `RecordType` descriptors from Rust types.
pub trait RecordTypeExt: Sized {
    /// Describe `T`, failing with `NotStruct` unless it is a record.
    ///
    /// The record is named by [`rust_type_name`].
    fn of<T: JsonSchema>() -> Result<Self, ShapeError>;

    /// Describe `T` under an explicit dotted `name`.
    fn of_named<T: JsonSchema>(name: &str) -> Result<Self, ShapeError>;
}

impl RecordTypeExt for RecordType {
    fn of<T: JsonSchema>() -> Result<Self, ShapeError> {
        Self::of_named::<T>(&rust_type_name::<T>())
    }

    fn of_named<T: JsonSchema>(name: &str) -> Result<Self, ShapeError> {
        let schema = schemars::schema_for!(T);
        record_type_from_schema(name, schema.as_value())
    }
}

/// Dotted form of a Rust type path, e.g. `storage.BucketState`.
///
/// Built from `std::any::type_name`, whose output is not guaranteed to be
/// stable across compiler versions. Generic types keep their `<...>`
/// arguments and fail strict type name checks; name those with
/// [`RecordTypeExt::of_named`].
pub fn rust_type_name<T: ?Sized>() -> String {
    std::any::type_name::<T>().replace("::", ".")
}

/// A `TypeRef` for `T`: a record when `T` has object shape, named otherwise.
pub fn type_ref_of<T: JsonSchema>() -> TypeRef {
    match RecordType::of::<T>() {
        Ok(record) => TypeRef::Record(record),
        Err(_) => TypeRef::named(T::schema_name()),
    }
}

/// Read an object schema into a record descriptor.
pub fn record_type_from_schema(name: &str, schema: &Value) -> Result<RecordType, ShapeError> {
    let is_object = schema.get("type").and_then(Value::as_str) == Some("object");
    // Maps are objects too, but carry no fixed field list.
    let is_map = schema.get("properties").is_none()
        && schema
            .get("additionalProperties")
            .is_some_and(|extra| extra != &Value::Bool(false));
    if !is_object || is_map {
        return Err(ShapeError::not_struct(name, "record introspection"));
    }

    let fields = schema
        .get("properties")
        .and_then(Value::as_object)
        .map(|properties| {
            properties
                .iter()
                .map(|(field_name, property)| field_from_schema(field_name, property))
                .collect()
        })
        .unwrap_or_default();
    Ok(RecordType {
        name: name.to_string(),
        fields,
    })
}

fn field_from_schema(name: &str, property: &Value) -> FieldSpec {
    let mut field = FieldSpec::new(name, property_type(property));
    if let Some(alias) = property.get(ALIAS_KEYWORD).and_then(Value::as_str) {
        field = field.with_alias(alias);
    }
    if let Some(key) = property.get(LOOKUP_KEYWORD).and_then(Value::as_str) {
        field = field.with_lookup(key);
    } else if let Some(default) = property.get("default") {
        field = field.with_default(default.clone());
    }
    field
}

/// The first non-null JSON type of a property schema.
fn property_type(property: &Value) -> String {
    if let Some(reference) = property.get("$ref").and_then(Value::as_str) {
        return reference.rsplit('/').next().unwrap_or(reference).to_string();
    }
    match property.get("type") {
        Some(Value::String(ty)) => return ty.clone(),
        Some(Value::Array(types)) => {
            if let Some(ty) = types.iter().filter_map(Value::as_str).find(|t| *t != "null") {
                return ty.to_string();
            }
        }
        _ => {}
    }
    for keyword in ["anyOf", "oneOf", "allOf"] {
        if let Some(variants) = property.get(keyword).and_then(Value::as_array) {
            let found = variants
                .iter()
                .map(property_type)
                .find(|ty| ty != "null" && ty != ANY_TYPE);
            if let Some(ty) = found {
                return ty;
            }
        }
    }
    ANY_TYPE.to_string()
}

/// Ordered parameter list derived from a record's fields.
pub fn derive_parameters(record: &RecordType) -> Vec<Parameter> {
    record
        .fields
        .iter()
        .map(|field| {
            let mut parameter = Parameter::new(&field.name, &field.type_name);
            if let Some(alias) = &field.alias {
                parameter = parameter.with_alias(alias);
            }
            parameter.value = field.value.clone();
            parameter
        })
        .collect()
}

/// The single field of a placeholder record.
pub fn single_field(record: &RecordType) -> Result<&FieldSpec, ShapeError> {
    match record.fields.as_slice() {
        [field] => Ok(field),
        fields => Err(ShapeError::NotOneField {
            type_name: record.name.clone(),
            count: fields.len(),
        }),
    }
}

/// Whether a parameter carries a deferred lookup rather than a literal.
pub fn is_deferred(parameter: &Parameter) -> bool {
    matches!(parameter.value, Some(ParameterValue::Lookup(_)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, JsonSchema)]
    struct BucketInput {
        name: String,
        #[schemars(extend("x-alias" = "bucket_count"))]
        count: u32,
        #[schemars(extend("x-lookup" = "secrets/token"))]
        token: Option<String>,
        tags: Vec<String>,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct Wrapper<T> {
        inner: T,
    }

    // -----------------------------------------------------------------------
    // Schema walking
    // -----------------------------------------------------------------------

    #[test]
    fn test_generic_record_needs_explicit_name() {
        let derived = RecordType::of::<Wrapper<u32>>().unwrap();
        assert!(derived.name.contains('<'), "got: {}", derived.name);
        assert!(!crate::workflow::registry::is_legal_type_name(&derived.name));

        let named = RecordType::of_named::<Wrapper<u32>>("storage.U32Wrapper").unwrap();
        assert_eq!(named.name, "storage.U32Wrapper");
        assert_eq!(named.fields, derived.fields);
        assert!(crate::workflow::registry::is_legal_type_name(&named.name));
    }

    #[test]
    fn test_record_type_from_schema_reads_directives() {
        let schema = json!({
            "type": "object",
            "properties": {
                "region": { "type": "string", "default": "us-east-1" },
                "size": { "type": ["integer", "null"], "x-alias": "bytes" },
                "owner": { "$ref": "#/$defs/Owner" },
                "token": { "type": "string", "x-lookup": "vault/token" },
                "extra": {}
            }
        });
        let record = record_type_from_schema("storage.BucketState", &schema).unwrap();
        let types: Vec<_> = record.fields.iter().map(|f| f.type_name.as_str()).collect();
        assert_eq!(types, vec!["string", "integer", "Owner", "string", "any"]);
        assert_eq!(
            record.fields[0].value,
            Some(ParameterValue::Default(json!("us-east-1")))
        );
        assert_eq!(record.fields[1].alias.as_deref(), Some("bytes"));
        assert_eq!(
            record.fields[3].value,
            Some(ParameterValue::Lookup("vault/token".to_string()))
        );
    }

    #[test]
    fn test_non_object_schema_is_not_struct() {
        let err = record_type_from_schema("u32", &json!({"type": "integer"})).unwrap_err();
        assert!(matches!(err, ShapeError::NotStruct { .. }), "got: {err:?}");
    }

    #[test]
    fn test_map_schema_is_not_struct() {
        let schema = json!({"type": "object", "additionalProperties": {"type": "string"}});
        assert!(record_type_from_schema("Labels", &schema).is_err());

        let empty = record_type_from_schema("Empty", &json!({"type": "object"})).unwrap();
        assert!(empty.fields.is_empty());
    }

    #[test]
    fn test_any_of_picks_first_non_null() {
        let property = json!({"anyOf": [{"$ref": "#/$defs/Inner"}, {"type": "null"}]});
        assert_eq!(property_type(&property), "Inner");
    }

    // -----------------------------------------------------------------------
    // Rust types
    // -----------------------------------------------------------------------

    #[test]
    fn test_record_type_of_struct() {
        let record = RecordType::of::<BucketInput>().unwrap();
        assert!(record.name.ends_with("tests.BucketInput"), "got: {}", record.name);
        let names: Vec<_> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["name", "count", "token", "tags"]);
        assert_eq!(record.fields[1].type_name, "integer");
        assert_eq!(record.fields[1].alias.as_deref(), Some("bucket_count"));
        assert_eq!(record.fields[2].type_name, "string");
        assert_eq!(record.fields[3].type_name, "array");
    }

    #[test]
    fn test_type_ref_of_scalar_is_named() {
        let reference = type_ref_of::<String>();
        assert!(reference.as_record().is_none());
        assert_eq!(reference.name(), "string");
    }

    #[test]
    fn test_derive_parameters_keeps_order_and_alias() {
        let record = RecordType::of::<BucketInput>().unwrap();
        let parameters = derive_parameters(&record);
        assert_eq!(parameters.len(), 4);
        assert_eq!(parameters[1].binding_name(), "bucket_count");
        assert!(is_deferred(&parameters[2]));
        assert!(!is_deferred(&parameters[0]));
    }

    #[test]
    fn test_single_field() {
        let one = RecordType::new("Over").field(FieldSpec::new("buckets", "array"));
        assert_eq!(single_field(&one).unwrap().name, "buckets");

        let two = RecordType::new("Over")
            .field(FieldSpec::new("a", "string"))
            .field(FieldSpec::new("b", "string"));
        let err = single_field(&two).unwrap_err();
        assert_eq!(
            err,
            ShapeError::NotOneField {
                type_name: "Over".to_string(),
                count: 2
            }
        );
    }
}
