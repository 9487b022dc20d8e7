//! Structural descriptors supplied by the host type system.
//!
//! The core never inspects Rust types directly. Instead the host describes
//! record types (ordered field lists with defaults and alias directives) and
//! callables (argument and result type lists) with the plain data below, and
//! the core derives parameter contracts and callable shapes from them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::parameter::ParameterValue;

// ---------------------------------------------------------------------------
// Record types
// ---------------------------------------------------------------------------

/// A structured record type: a name and its ordered fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordType {
    /// Dotted type name, e.g. `storage.BucketState`.
    pub name: String,
    pub fields: Vec<FieldSpec>,
}

/// One field of a record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// Alias directive: the binding name used inside a step body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    /// Declared default or deferred lookup.
    #[serde(flatten)]
    pub value: Option<ParameterValue>,
}

impl RecordType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, field: FieldSpec) -> Self {
        self.fields.push(field);
        self
    }

    /// The last dotted segment of the type name.
    pub fn short_name(&self) -> &str {
        self.name.rsplit('.').next().unwrap_or(&self.name)
    }

    /// Everything before the last dotted segment, empty when unqualified.
    pub fn namespace(&self) -> &str {
        match self.name.rfind('.') {
            Some(index) => &self.name[..index],
            None => "",
        }
    }
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            alias: None,
            value: None,
        }
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_default(mut self, value: serde_json::Value) -> Self {
        self.value = Some(ParameterValue::Default(value));
        self
    }

    pub fn with_lookup(mut self, key: impl Into<String>) -> Self {
        self.value = Some(ParameterValue::Lookup(key.into()));
        self
    }
}

// ---------------------------------------------------------------------------
// Callables
// ---------------------------------------------------------------------------

/// A type appearing in a callable signature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TypeRef {
    /// A structured record with a known field shape.
    Record(RecordType),
    /// The host's error type.
    Error,
    /// Any other named type (scalar, collection, opaque handle).
    Named { name: String },
}

impl TypeRef {
    pub fn named(name: impl Into<String>) -> Self {
        Self::Named { name: name.into() }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Record(record) => &record.name,
            Self::Error => "error",
            Self::Named { name } => name,
        }
    }

    pub fn as_record(&self) -> Option<&RecordType> {
        match self {
            Self::Record(record) => Some(record),
            _ => None,
        }
    }
}

/// Signature of an opaque callable as reported by the host type system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CallableDescriptor {
    pub arguments: Vec<TypeRef>,
    pub results: Vec<TypeRef>,
}

impl CallableDescriptor {
    pub fn new(arguments: Vec<TypeRef>, results: Vec<TypeRef>) -> Self {
        Self { arguments, results }
    }

    /// Rendered signature, e.g. `fn(Input) -> (Output, error)`.
    pub fn type_name(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for CallableDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let arguments: Vec<&str> = self.arguments.iter().map(TypeRef::name).collect();
        write!(f, "fn({})", arguments.join(", "))?;
        match self.results.as_slice() {
            [] => Ok(()),
            [single] => write!(f, " -> {}", single.name()),
            many => {
                let results: Vec<&str> = many.iter().map(TypeRef::name).collect();
                write!(f, " -> ({})", results.join(", "))
            }
        }
    }
}

/// Interface implemented by a state handler for one desired-state type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerInterface {
    /// Name of the interface type, e.g. `storage.BucketHandler`.
    pub type_name: String,
    /// Desired-state record the handler acts on.
    pub state: RecordType,
    pub operations: Vec<crate::step::HandlerOperation>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(name: &str) -> TypeRef {
        TypeRef::Record(RecordType::new(name))
    }

    #[test]
    fn test_callable_type_name_rendering() {
        let single = CallableDescriptor::new(vec![record("In")], vec![record("Out")]);
        assert_eq!(single.type_name(), "fn(In) -> Out");

        let pair = CallableDescriptor::new(vec![record("In")], vec![record("Out"), TypeRef::Error]);
        assert_eq!(pair.type_name(), "fn(In) -> (Out, error)");

        let nothing = CallableDescriptor::new(vec![], vec![]);
        assert_eq!(nothing.type_name(), "fn()");
    }

    #[test]
    fn test_record_namespace_and_short_name() {
        let record = RecordType::new("storage.s3.BucketState");
        assert_eq!(record.namespace(), "storage.s3");
        assert_eq!(record.short_name(), "BucketState");

        let bare = RecordType::new("Plain");
        assert_eq!(bare.namespace(), "");
        assert_eq!(bare.short_name(), "Plain");
    }
}
