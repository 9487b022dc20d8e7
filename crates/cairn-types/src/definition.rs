//! Projected definition records handed to the transport.
//!
//! A `StepDefinition` is the flattened, style-tagged form of a built step.
//! Its JSON form is an ordered property record:
//!
//! ```json
//! {
//!   "parameters": [...],
//!   "returns": [...],
//!   "when": "ready and !paused",
//!   "style": "iterator",
//!   "iterationStyle": "each",
//!   "over": { "parameter": { "name": "buckets", "type": "array" } },
//!   "into": "copies",
//!   "producer": { "style": "action", "interface": "fn(CopyInput) -> CopyOutput" }
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::parameter::Parameter;
use crate::record::RecordType;
use crate::step::{IterationStyle, StepStyle};

// ---------------------------------------------------------------------------
// Step definitions
// ---------------------------------------------------------------------------

/// Flattened projection of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDefinition {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parameters: Vec<Parameter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub returns: Vec<Parameter>,
    /// Canonical condition text; absent when the step always runs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub when: Option<String>,
    #[serde(flatten)]
    pub kind: DefinitionKind,
}

/// Variant-specific keys, tagged by `style`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "style", rename_all = "snake_case")]
pub enum DefinitionKind {
    Workflow {
        steps: Vec<StepDefinition>,
    },
    Resource {
        #[serde(rename = "resourceType")]
        resource_type: String,
        #[serde(
            rename = "externalId",
            default,
            skip_serializing_if = "Option::is_none"
        )]
        external_id: Option<String>,
    },
    StateHandler {
        interface: String,
    },
    Action {
        interface: String,
    },
    Iterator {
        #[serde(rename = "iterationStyle")]
        iteration_style: IterationStyle,
        over: OverDefinition,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        variables: Vec<Parameter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        into: Option<String>,
        producer: Box<StepDefinition>,
    },
    Call {
        reference: String,
    },
    Reference {
        reference: String,
    },
}

/// What an iterator iterates over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverDefinition {
    /// A literal count or collection.
    Value(Value),
    /// A named input bound at run time.
    Parameter(Parameter),
}

impl DefinitionKind {
    pub fn style(&self) -> StepStyle {
        match self {
            Self::Workflow { .. } => StepStyle::Workflow,
            Self::Resource { .. } => StepStyle::Resource,
            Self::StateHandler { .. } => StepStyle::StateHandler,
            Self::Action { .. } => StepStyle::Action,
            Self::Iterator { .. } => StepStyle::Iterator,
            Self::Call { .. } => StepStyle::Call,
            Self::Reference { .. } => StepStyle::Reference,
        }
    }
}

impl StepDefinition {
    pub fn style(&self) -> StepStyle {
        self.kind.style()
    }

    /// The ordered JSON property record for this definition.
    pub fn to_record(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(self)
    }
}

/// External key of a registered definition.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DefinitionKey {
    pub service: String,
    pub name: String,
}

// ---------------------------------------------------------------------------
// Type catalog
// ---------------------------------------------------------------------------

/// Field shape of one registered record type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeDefinition {
    /// Fully qualified type name.
    pub name: String,
    pub fields: Vec<Parameter>,
}

/// Aggregate catalog of every record type referenced by the registered set.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TypeCatalog {
    /// Longest dotted prefix shared by every registered type name.
    pub namespace: String,
    /// Definitions keyed by name relative to `namespace`.
    pub types: BTreeMap<String, TypeDefinition>,
}

impl TypeCatalog {
    pub fn get(&self, relative_name: &str) -> Option<&TypeDefinition> {
        self.types.get(relative_name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}

impl From<&RecordType> for TypeDefinition {
    fn from(record: &RecordType) -> Self {
        Self {
            name: record.name.clone(),
            fields: record
                .fields
                .iter()
                .map(|field| Parameter {
                    name: field.name.clone(),
                    alias: field.alias.clone(),
                    type_name: field.type_name.clone(),
                    value: field.value.clone(),
                })
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Manifest
// ---------------------------------------------------------------------------

/// Everything a service publishes: its step definitions and type catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceManifest {
    pub service: String,
    /// Definitions keyed by qualified step name, in registration order.
    pub definitions: Vec<(String, StepDefinition)>,
    pub types: TypeCatalog,
}

impl ServiceManifest {
    pub fn definition(&self, name: &str) -> Option<&StepDefinition> {
        self.definitions
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, definition)| definition)
    }

    /// Keyed property records ready for serialization onto the wire.
    pub fn records(&self) -> Result<Vec<(DefinitionKey, Value)>, serde_json::Error> {
        self.definitions
            .iter()
            .map(|(name, definition)| {
                let key = DefinitionKey {
                    service: self.service.clone(),
                    name: name.clone(),
                };
                definition.to_record().map(|record| (key, record))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn action(interface: &str) -> StepDefinition {
        StepDefinition {
            parameters: vec![Parameter::new("src", "string")],
            returns: vec![],
            when: None,
            kind: DefinitionKind::Action {
                interface: interface.to_string(),
            },
        }
    }

    #[test]
    fn test_record_key_order_and_omissions() {
        let def = action("fn(CopyInput)");
        let record = def.to_record().unwrap();
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["parameters", "style", "interface"]);
        assert_eq!(record["style"], json!("action"));
    }

    #[test]
    fn test_resource_uses_camel_case_keys() {
        let def = StepDefinition {
            parameters: vec![],
            returns: vec![Parameter::new("arn", "string")],
            when: Some("enabled".to_string()),
            kind: DefinitionKind::Resource {
                resource_type: "storage.BucketState".to_string(),
                external_id: Some("bucket-1".to_string()),
            },
        };
        let record = def.to_record().unwrap();
        let keys: Vec<&String> = record.as_object().unwrap().keys().collect();
        assert_eq!(
            keys,
            vec!["returns", "when", "style", "resourceType", "externalId"]
        );
    }

    #[test]
    fn test_iterator_definition_deserializes() {
        let record = json!({
            "style": "iterator",
            "iterationStyle": "times",
            "over": { "value": 3 },
            "into": "copies",
            "producer": { "style": "call", "reference": "copy" }
        });
        let def: StepDefinition = serde_json::from_value(record).unwrap();
        match def.kind {
            DefinitionKind::Iterator {
                iteration_style,
                over,
                producer,
                ..
            } => {
                assert_eq!(iteration_style, IterationStyle::Times);
                assert_eq!(over, OverDefinition::Value(json!(3)));
                assert_eq!(producer.style(), StepStyle::Call);
            }
            other => panic!("expected iterator, got {other:?}"),
        }
    }

    #[test]
    fn test_manifest_records_are_keyed_by_service() {
        let manifest = ServiceManifest {
            service: "storage".to_string(),
            definitions: vec![("copy".to_string(), action("fn(CopyInput)"))],
            types: TypeCatalog::default(),
        };
        let records = manifest.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].0.service, "storage");
        assert_eq!(records[0].0.name, "copy");
        assert!(manifest.definition("copy").is_some());
        assert!(manifest.definition("missing").is_none());
    }
}
