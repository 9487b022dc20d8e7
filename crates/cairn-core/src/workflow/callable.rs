//! Opaque callables bound to action and resource steps.
//!
//! A `Callable` pairs the signature the registry publishes with an optional
//! JSON-boundary invoker. Host code that already knows its signature builds
//! one from a `CallableDescriptor`; Rust closures use `Callable::from_fn`.

use std::fmt;
use std::sync::Arc;

use cairn_types::error::InvokeError;
use cairn_types::record::{CallableDescriptor, TypeRef};
use schemars::JsonSchema;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use super::introspect::type_ref_of;

type Invoker = Arc<dyn Fn(Value) -> Result<Value, InvokeError> + Send + Sync>;

/// A callable registered with a step.
#[derive(Clone)]
pub struct Callable {
    descriptor: CallableDescriptor,
    invoker: Option<Invoker>,
}

impl Callable {
    /// A callable known only by its signature.
    pub fn new(descriptor: CallableDescriptor) -> Self {
        Self {
            descriptor,
            invoker: None,
        }
    }

    pub fn with_invoker<F>(mut self, invoker: F) -> Self
    where
        F: Fn(Value) -> Result<Value, InvokeError> + Send + Sync + 'static,
    {
        self.invoker = Some(Arc::new(invoker));
        self
    }

    /// Wrap `f` as `fn(I) -> (O, error)`, decoding and encoding through JSON.
    pub fn from_fn<I, O, E, F>(f: F) -> Self
    where
        I: DeserializeOwned + JsonSchema,
        O: Serialize + JsonSchema,
        E: fmt::Display,
        F: Fn(I) -> Result<O, E> + Send + Sync + 'static,
    {
        let descriptor = CallableDescriptor::new(
            vec![type_ref_of::<I>()],
            vec![type_ref_of::<O>(), TypeRef::Error],
        );
        let name = descriptor.type_name();
        Self::new(descriptor).with_invoker(move |input| {
            let input: I = serde_json::from_value(input).map_err(|source| InvokeError::Decode {
                name: name.clone(),
                source,
            })?;
            let output = f(input).map_err(|e| InvokeError::Failed {
                name: name.clone(),
                message: e.to_string(),
            })?;
            serde_json::to_value(output).map_err(|source| InvokeError::Encode {
                name: name.clone(),
                source,
            })
        })
    }

    pub fn descriptor(&self) -> &CallableDescriptor {
        &self.descriptor
    }

    /// Rendered signature, e.g. `fn(CopyInput) -> (CopyOutput, error)`.
    pub fn type_name(&self) -> String {
        self.descriptor.type_name()
    }

    pub fn is_invocable(&self) -> bool {
        self.invoker.is_some()
    }

    pub fn invoke(&self, input: Value) -> Result<Value, InvokeError> {
        match &self.invoker {
            Some(invoker) => invoker(input),
            None => Err(InvokeError::NotInvocable(self.type_name())),
        }
    }
}

impl fmt::Debug for Callable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Callable")
            .field("descriptor", &self.descriptor.to_string())
            .field("invocable", &self.is_invocable())
            .finish()
    }
}

impl PartialEq for Callable {
    fn eq(&self, other: &Self) -> bool {
        self.descriptor == other.descriptor
    }
}

impl From<CallableDescriptor> for Callable {
    fn from(descriptor: CallableDescriptor) -> Self {
        Self::new(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, JsonSchema)]
    struct CopyInput {
        src: String,
        dst: String,
    }

    #[derive(Debug, Serialize, JsonSchema)]
    struct CopyOutput {
        bytes: u64,
    }

    fn copy() -> Callable {
        Callable::from_fn(|input: CopyInput| {
            if input.src == input.dst {
                return Err(format!("cannot copy {} onto itself", input.src));
            }
            Ok(CopyOutput { bytes: 42 })
        })
    }

    #[test]
    fn test_from_fn_descriptor_shape() {
        let callable = copy();
        let descriptor = callable.descriptor();
        assert_eq!(descriptor.arguments.len(), 1);
        assert!(descriptor.arguments[0].as_record().is_some());
        assert_eq!(descriptor.results.len(), 2);
        assert_eq!(descriptor.results[1], TypeRef::Error);
        assert!(callable.type_name().ends_with(", error)"), "got: {}", callable.type_name());
    }

    #[test]
    fn test_invoke_round_trips_json() {
        let out = copy().invoke(json!({"src": "a", "dst": "b"})).unwrap();
        assert_eq!(out, json!({"bytes": 42}));
    }

    #[test]
    fn test_invoke_reports_handler_failure() {
        let err = copy().invoke(json!({"src": "a", "dst": "a"})).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("cannot copy a onto itself"), "got: {msg}");
    }

    #[test]
    fn test_invoke_reports_decode_failure() {
        let err = copy().invoke(json!({"src": 1})).unwrap_err();
        assert!(matches!(err, InvokeError::Decode { .. }), "got: {err:?}");
    }

    #[test]
    fn test_descriptor_only_is_not_invocable() {
        let callable = Callable::new(CallableDescriptor::new(vec![], vec![TypeRef::Error]));
        assert!(!callable.is_invocable());
        let err = callable.invoke(json!({})).unwrap_err();
        assert!(matches!(err, InvokeError::NotInvocable(_)), "got: {err:?}");
    }
}
