//! Parameter contracts shared by every step variant.
//!
//! A `Parameter` is an immutable input or output slot: a name, an optional
//! alias used as the binding name inside the step body, a type descriptor,
//! and an optional default or deferred-lookup value.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Type descriptor used when a parameter's type is not known.
pub const ANY_TYPE: &str = "any";

/// A typed, named input or output slot on a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    /// Binding name inside the step body, when it differs from `name`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alias: Option<String>,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(flatten)]
    pub value: Option<ParameterValue>,
}

/// Default or deferred value attached to a parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ParameterValue {
    /// Literal value used when no binding is supplied.
    Default(Value),
    /// Key resolved by the orchestrator at run time.
    Lookup(String),
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: None,
            type_name: type_name.into(),
            value: None,
        }
    }

    /// Parameter of unknown type.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(name, ANY_TYPE)
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        let alias = alias.into();
        self.alias = if alias.is_empty() || alias == self.name {
            None
        } else {
            Some(alias)
        };
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.value = Some(ParameterValue::Default(value));
        self
    }

    pub fn with_lookup(mut self, key: impl Into<String>) -> Self {
        self.value = Some(ParameterValue::Lookup(key.into()));
        self
    }

    /// Name the step body sees: the alias when set, otherwise the name.
    pub fn binding_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.name)
    }

    pub fn default_value(&self) -> Option<&Value> {
        match &self.value {
            Some(ParameterValue::Default(value)) => Some(value),
            _ => None,
        }
    }
}

/// Replace entries of `base` whose name matches one in `overrides`, then
/// append the remaining overrides in order.
pub fn merge_parameters(base: Vec<Parameter>, overrides: Vec<Parameter>) -> Vec<Parameter> {
    let mut merged = base;
    for parameter in overrides {
        match merged.iter_mut().find(|p| p.name == parameter.name) {
            Some(existing) => *existing = parameter,
            None => merged.push(parameter),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_alias_equal_to_name_is_dropped() {
        let p = Parameter::new("region", "string").with_alias("region");
        assert!(p.alias.is_none());
        assert_eq!(p.binding_name(), "region");

        let p = Parameter::new("region", "string").with_alias("aws_region");
        assert_eq!(p.binding_name(), "aws_region");
    }

    #[test]
    fn test_serializes_default_inline() {
        let p = Parameter::new("count", "integer").with_default(json!(3));
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(value, json!({"name": "count", "type": "integer", "default": 3}));
    }

    #[test]
    fn test_serializes_lookup_inline() {
        let p = Parameter::new("token", "string")
            .with_alias("api_token")
            .with_lookup("secrets/token");
        let value = serde_json::to_value(&p).unwrap();
        assert_eq!(
            value,
            json!({
                "name": "token",
                "alias": "api_token",
                "type": "string",
                "lookup": "secrets/token"
            })
        );
    }

    #[test]
    fn test_merge_parameters_overrides_by_name() {
        let base = vec![Parameter::any("a"), Parameter::any("b")];
        let merged = merge_parameters(
            base,
            vec![Parameter::new("b", "string"), Parameter::any("c")],
        );
        let names: Vec<_> = merged.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b", "c"]);
        assert_eq!(merged[1].type_name, "string");
    }
}
