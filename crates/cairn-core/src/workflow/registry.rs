//! Registry of built steps, callables and record types.
//!
//! All three tables sit behind a single `RwLock`. Lookups take the shared
//! lock; registration takes the exclusive lock and validates everything it
//! is about to insert before touching any table, so a failed registration
//! leaves the registry unchanged.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use cairn_types::config::SdkConfig;
use cairn_types::definition::{ServiceManifest, StepDefinition, TypeCatalog, TypeDefinition};
use cairn_types::error::{InvokeError, RegistrationError};
use cairn_types::record::RecordType;
use serde_json::Value;

use super::callable::Callable;
use super::projector::project;
use super::step::{StateProducer, Step};

/// Namespace every registration table lives under.
pub const ACTIVITY_NAMESPACE: &str = "activity";
pub const DEFINITION_TABLE: &str = "definition";
pub const CALLABLE_TABLE: &str = "callable";
pub const TYPE_TABLE: &str = "type";

#[derive(Debug, Default)]
struct Tables {
    /// Root steps in registration order.
    steps: Vec<Step>,
    step_index: HashMap<String, usize>,
    /// Qualified names of every registered step, nested ones included.
    qualified: HashSet<String>,
    callables: BTreeMap<String, Callable>,
    types: BTreeMap<String, RecordType>,
}

/// Everything a service has declared, ready to be published.
#[derive(Debug, Default)]
pub struct Registry {
    config: SdkConfig,
    tables: RwLock<Tables>,
}

impl Registry {
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            tables: RwLock::new(Tables::default()),
        }
    }

    pub fn config(&self) -> &SdkConfig {
        &self.config
    }

    pub fn service(&self) -> &str {
        &self.config.service
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(|poisoned| {
            tracing::warn!("registry lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(|poisoned| {
            tracing::warn!("registry lock was poisoned, recovering");
            PoisonError::into_inner(poisoned)
        })
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    /// Register a root step along with the callables and record types it uses.
    ///
    /// Callables are keyed by the qualified name of the step that binds them.
    pub fn register_step(&self, step: Step) -> Result<(), RegistrationError> {
        let mut callables = Vec::new();
        let mut records = Vec::new();
        collect_bindings(&step, &mut callables, &mut records);

        let names = step.qualified_names();

        let mut tables = self.write();
        if let Some(taken) = names.iter().find(|name| tables.qualified.contains(**name)) {
            return Err(RegistrationError::already_registered(
                ACTIVITY_NAMESPACE,
                DEFINITION_TABLE,
                *taken,
            ));
        }
        for (name, _) in &callables {
            if tables.callables.contains_key(name) {
                return Err(RegistrationError::already_registered(
                    ACTIVITY_NAMESPACE,
                    CALLABLE_TABLE,
                    name.as_str(),
                ));
            }
        }
        for (index, record) in records.iter().enumerate() {
            self.check_type(&tables, record)?;
            if records[..index]
                .iter()
                .any(|earlier| earlier.name == record.name && earlier != record)
            {
                return Err(RegistrationError::already_registered(
                    ACTIVITY_NAMESPACE,
                    TYPE_TABLE,
                    record.name.as_str(),
                ));
            }
        }

        for (name, callable) in callables {
            tables.callables.insert(name, callable);
        }
        for record in records {
            tables.types.insert(record.name.clone(), record);
        }
        tables
            .qualified
            .extend(names.into_iter().map(str::to_string));
        tracing::debug!(step = %step.name(), style = %step.style(), "registered step");
        let index = tables.steps.len();
        tables.step_index.insert(step.name().to_string(), index);
        tables.steps.push(step);
        Ok(())
    }

    /// Register a standalone callable under `name`.
    pub fn register_callable(
        &self,
        name: impl Into<String>,
        callable: Callable,
    ) -> Result<(), RegistrationError> {
        let name = name.into();
        let mut records = Vec::new();
        collect_descriptor_records(&callable, &mut records);

        let mut tables = self.write();
        if tables.callables.contains_key(&name) {
            return Err(RegistrationError::already_registered(
                ACTIVITY_NAMESPACE,
                CALLABLE_TABLE,
                name,
            ));
        }
        for record in &records {
            self.check_type(&tables, record)?;
        }
        for record in records {
            tables.types.insert(record.name.clone(), record);
        }
        tracing::debug!(callable = %name, signature = %callable.type_name(), "registered callable");
        tables.callables.insert(name, callable);
        Ok(())
    }

    /// Register a record type. Re-registering an identical shape is a no-op.
    pub fn register_type(&self, record: RecordType) -> Result<(), RegistrationError> {
        let mut tables = self.write();
        self.check_type(&tables, &record)?;
        tracing::debug!(record_type = %record.name, "registered type");
        tables.types.insert(record.name.clone(), record);
        Ok(())
    }

    fn check_type(&self, tables: &Tables, record: &RecordType) -> Result<(), RegistrationError> {
        if self.config.strict_type_names && !is_legal_type_name(&record.name) {
            return Err(RegistrationError::IllegalTypeName {
                name: record.name.clone(),
            });
        }
        match tables.types.get(&record.name) {
            Some(existing) if existing != record => Err(RegistrationError::already_registered(
                ACTIVITY_NAMESPACE,
                TYPE_TABLE,
                record.name.as_str(),
            )),
            _ => Ok(()),
        }
    }

    // -----------------------------------------------------------------------
    // Lookups
    // -----------------------------------------------------------------------

    pub fn step(&self, name: &str) -> Option<Step> {
        let tables = self.read();
        tables
            .step_index
            .get(name)
            .map(|&index| tables.steps[index].clone())
    }

    /// Search root steps and their descendants for a qualified name.
    pub fn find_step(&self, name: &str) -> Option<Step> {
        self.read()
            .steps
            .iter()
            .find_map(|step| step.find(name))
            .cloned()
    }

    pub fn definition(&self, name: &str) -> Option<StepDefinition> {
        let tables = self.read();
        tables
            .step_index
            .get(name)
            .map(|&index| project(&tables.steps[index]))
    }

    pub fn callable(&self, name: &str) -> Option<Callable> {
        self.read().callables.get(name).cloned()
    }

    pub fn record_type(&self, name: &str) -> Option<RecordType> {
        self.read().types.get(name).cloned()
    }

    /// Root step names in registration order.
    pub fn step_names(&self) -> Vec<String> {
        self.read()
            .steps
            .iter()
            .map(|step| step.name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read().steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().steps.is_empty()
    }

    /// Invoke the callable registered under `name`.
    pub fn invoke(&self, name: &str, input: Value) -> Result<Value, InvokeError> {
        let callable = self
            .callable(name)
            .ok_or_else(|| InvokeError::NotInvocable(name.to_string()))?;
        callable.invoke(input)
    }

    // -----------------------------------------------------------------------
    // Publication
    // -----------------------------------------------------------------------

    /// Aggregate every registered record type under their shared namespace.
    pub fn type_catalog(&self) -> Result<TypeCatalog, RegistrationError> {
        let tables = self.read();
        let namespace = common_namespace(tables.types.values().map(RecordType::namespace));

        if namespace.is_empty()
            && self.config.require_common_namespace
            && tables.types.values().any(|record| !record.namespace().is_empty())
        {
            return Err(RegistrationError::NoCommonNamespace {
                names: tables.types.keys().cloned().collect(),
            });
        }

        let types = tables
            .types
            .values()
            .map(|record| {
                let relative = relative_name(&namespace, &record.name).to_string();
                (relative, TypeDefinition::from(record))
            })
            .collect();
        Ok(TypeCatalog { namespace, types })
    }

    /// Project every registered step and the type catalog.
    pub fn manifest(&self) -> Result<ServiceManifest, RegistrationError> {
        let types = self.type_catalog()?;
        let definitions = self
            .read()
            .steps
            .iter()
            .map(|step| (step.name().to_string(), project(step)))
            .collect();
        Ok(ServiceManifest {
            service: self.config.service.clone(),
            definitions,
            types,
        })
    }

    /// Consume the registry and produce its manifest.
    pub fn publish(self) -> Result<ServiceManifest, RegistrationError> {
        let manifest = self.manifest()?;
        tracing::info!(
            service = %manifest.service,
            definitions = manifest.definitions.len(),
            types = manifest.types.len(),
            "published service manifest"
        );
        Ok(manifest)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn collect_bindings(
    step: &Step,
    callables: &mut Vec<(String, Callable)>,
    records: &mut Vec<RecordType>,
) {
    match step {
        Step::Resource(resource) => {
            records.push(resource.state_type.clone());
            if let StateProducer::Callable(callable) = &resource.state {
                collect_descriptor_records(callable, records);
                callables.push((step.name().to_string(), callable.clone()));
            }
        }
        Step::StateHandler(handler) => records.push(handler.interface.state.clone()),
        Step::Action(action) => {
            collect_descriptor_records(&action.function, records);
            callables.push((step.name().to_string(), action.function.clone()));
        }
        _ => {}
    }
    for child in step.children() {
        collect_bindings(child, callables, records);
    }
}

fn collect_descriptor_records(callable: &Callable, records: &mut Vec<RecordType>) {
    let descriptor = callable.descriptor();
    records.extend(
        descriptor
            .arguments
            .iter()
            .chain(&descriptor.results)
            .filter_map(|reference| reference.as_record().cloned()),
    );
}

/// Whether `name` is a dotted sequence of identifiers.
pub fn is_legal_type_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            let mut chars = segment.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

/// Longest dotted prefix shared by every namespace.
fn common_namespace<'a>(mut namespaces: impl Iterator<Item = &'a str>) -> String {
    let Some(first) = namespaces.next() else {
        return String::new();
    };
    let mut common: Vec<&str> = if first.is_empty() {
        Vec::new()
    } else {
        first.split('.').collect()
    };
    for namespace in namespaces {
        let shared = common
            .iter()
            .zip(namespace.split('.'))
            .take_while(|(a, b)| **a == *b)
            .count();
        common.truncate(shared);
    }
    common.join(".")
}

fn relative_name<'a>(namespace: &str, name: &'a str) -> &'a str {
    if namespace.is_empty() {
        return name;
    }
    name.strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflow::builder::{
        ActionBuilder, CallBuilder, CompositeBuilder, StepBuilder, WorkflowBuilder, build_step,
    };
    use cairn_types::record::{CallableDescriptor, FieldSpec, TypeRef};
    use serde_json::json;
    use std::sync::Arc;
    use std::thread;

    fn record(name: &str) -> RecordType {
        RecordType::new(name).field(FieldSpec::new("value", "string"))
    }

    fn call(name: &str) -> Step {
        build_step::<CallBuilder>(|c| {
            c.name(name).call_to("target");
        })
        .unwrap()
    }

    fn action(name: &str, input: &str) -> Step {
        let descriptor =
            CallableDescriptor::new(vec![TypeRef::Record(record(input))], vec![TypeRef::Error]);
        build_step::<ActionBuilder>(|a| {
            a.name(name).doer(Callable::new(descriptor).with_invoker(|v| Ok(v)));
        })
        .unwrap()
    }

    // -----------------------------------------------------------------------
    // Registration
    // -----------------------------------------------------------------------

    #[test]
    fn test_duplicate_step_is_rejected_without_overwrite() {
        let registry = Registry::default();
        registry.register_step(call("a")).unwrap();
        let err = registry.register_step(call("a")).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::already_registered("activity", "definition", "a")
        );
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_root_cannot_shadow_nested_step() {
        let registry = Registry::default();
        let deploy = build_step::<WorkflowBuilder>(|w| {
            w.name("deploy");
            w.call(|c| {
                c.name("x").call_to("t");
            });
        })
        .unwrap();
        registry.register_step(deploy).unwrap();

        let mut shadow = call("x");
        if let Step::Call(step) = &mut shadow {
            step.common.name = "deploy::x".to_string();
        }
        let err = registry.register_step(shadow).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::already_registered("activity", "definition", "deploy::x")
        );
        assert_eq!(registry.step_names(), vec!["deploy"]);
        assert_eq!(registry.find_step("deploy::x").unwrap().style().as_str(), "call");
    }

    #[test]
    fn test_nested_name_cannot_reuse_registered_root() {
        let registry = Registry::default();
        registry.register_step(call("x")).unwrap();

        let mut nested = build_step::<WorkflowBuilder>(|w| {
            w.name("w");
            w.call(|c| {
                c.name("y").call_to("t");
            });
        })
        .unwrap();
        if let Step::Workflow(workflow) = &mut nested {
            if let Step::Call(step) = &mut workflow.children[0] {
                step.common.name = "x".to_string();
            }
        }
        let err = registry.register_step(nested).unwrap_err();
        assert_eq!(err, RegistrationError::already_registered("activity", "definition", "x"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn test_action_registers_callable_and_types() {
        let registry = Registry::default();
        registry.register_step(action("copy", "storage.CopyInput")).unwrap();
        assert!(registry.callable("copy").is_some());
        assert!(registry.record_type("storage.CopyInput").is_some());
        let out = registry.invoke("copy", json!({"value": "x"})).unwrap();
        assert_eq!(out, json!({"value": "x"}));
        assert!(matches!(
            registry.invoke("missing", json!({})),
            Err(InvokeError::NotInvocable(_))
        ));
    }

    #[test]
    fn test_failed_registration_leaves_tables_unchanged() {
        let registry = Registry::default();
        registry.register_type(record("storage.CopyInput")).unwrap();
        let conflicting =
            RecordType::new("storage.CopyInput").field(FieldSpec::new("other", "integer"));
        registry.register_type(conflicting.clone()).unwrap_err();

        let descriptor = CallableDescriptor::new(vec![TypeRef::Record(conflicting)], vec![]);
        let step = build_step::<ActionBuilder>(|a| {
            a.name("copy").doer(descriptor);
        })
        .unwrap();
        let err = registry.register_step(step).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::already_registered("activity", "type", "storage.CopyInput")
        );
        assert!(registry.is_empty());
        assert!(registry.callable("copy").is_none());
    }

    #[test]
    fn test_identical_type_registration_is_idempotent() {
        let registry = Registry::default();
        registry.register_type(record("storage.A")).unwrap();
        registry.register_type(record("storage.A")).unwrap();
        assert_eq!(registry.type_catalog().unwrap().len(), 1);
    }

    #[test]
    fn test_illegal_type_name() {
        let registry = Registry::default();
        let err = registry.register_type(record("storage.Wrapper<T>")).unwrap_err();
        assert!(matches!(err, RegistrationError::IllegalTypeName { .. }), "got: {err:?}");

        let lenient = Registry::new(SdkConfig {
            strict_type_names: false,
            ..SdkConfig::default()
        });
        lenient.register_type(record("storage.Wrapper<T>")).unwrap();
    }

    #[test]
    fn test_duplicate_callable() {
        let registry = Registry::default();
        let callable = Callable::new(CallableDescriptor::new(vec![], vec![]));
        registry.register_callable("noop", callable.clone()).unwrap();
        let err = registry.register_callable("noop", callable).unwrap_err();
        assert_eq!(
            err,
            RegistrationError::already_registered("activity", "callable", "noop")
        );
    }

    // -----------------------------------------------------------------------
    // Type catalog
    // -----------------------------------------------------------------------

    #[test]
    fn test_catalog_uses_common_namespace() {
        let registry = Registry::default();
        registry.register_type(record("acme.storage.Bucket")).unwrap();
        registry.register_type(record("acme.compute.Instance")).unwrap();
        let catalog = registry.type_catalog().unwrap();
        assert_eq!(catalog.namespace, "acme");
        assert!(catalog.get("storage.Bucket").is_some());
        assert_eq!(
            catalog.get("compute.Instance").unwrap().name,
            "acme.compute.Instance"
        );
    }

    #[test]
    fn test_catalog_without_common_namespace() {
        let registry = Registry::default();
        registry.register_type(record("acme.Bucket")).unwrap();
        registry.register_type(record("other.Instance")).unwrap();
        let err = registry.type_catalog().unwrap_err();
        assert_eq!(
            err,
            RegistrationError::NoCommonNamespace {
                names: vec!["acme.Bucket".to_string(), "other.Instance".to_string()],
            }
        );

        let lenient = Registry::new(SdkConfig {
            require_common_namespace: false,
            ..SdkConfig::default()
        });
        lenient.register_type(record("acme.Bucket")).unwrap();
        lenient.register_type(record("other.Instance")).unwrap();
        let catalog = lenient.type_catalog().unwrap();
        assert_eq!(catalog.namespace, "");
        assert!(catalog.get("other.Instance").is_some());
    }

    #[test]
    fn test_common_namespace_helper() {
        assert_eq!(common_namespace(["a.b", "a.b.c"].into_iter()), "a.b");
        assert_eq!(common_namespace(["a.b", "a.c"].into_iter()), "a");
        assert_eq!(common_namespace(["ab.c", "a.c"].into_iter()), "");
        assert_eq!(common_namespace(std::iter::empty()), "");
    }

    // -----------------------------------------------------------------------
    // Publication and concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn test_publish_keys_definitions_by_service() {
        let registry = Registry::new(SdkConfig::for_service("storage"));
        registry.register_step(call("b")).unwrap();
        registry.register_step(call("a")).unwrap();
        let manifest = registry.publish().unwrap();
        assert_eq!(manifest.service, "storage");
        let names: Vec<_> = manifest.definitions.iter().map(|(n, _)| n.as_str()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_concurrent_readers_and_writers() {
        let registry = Arc::new(Registry::default());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let registry = Arc::clone(&registry);
                thread::spawn(move || {
                    registry.register_step(call(&format!("step{i}"))).unwrap();
                    registry.step_names().len()
                })
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() >= 1);
        }
        assert_eq!(registry.len(), 8);
        assert!(registry.definition("step3").is_some());
    }

    #[test]
    fn test_poisoned_lock_is_recovered() {
        let registry = Arc::new(Registry::default());
        registry.register_step(call("kept")).unwrap();
        let poisoner = Arc::clone(&registry);
        let _ = thread::spawn(move || {
            let _guard = poisoner.write();
            panic!("poison the registry lock");
        })
        .join();
        assert!(registry.tables.is_poisoned());
        assert_eq!(registry.step_names(), vec!["kept"]);
        registry.register_step(call("after")).unwrap();
        assert_eq!(registry.len(), 2);
    }

    #[test]
    fn test_find_step_searches_descendants() {
        let registry = Registry::default();
        let step = build_step::<WorkflowBuilder>(|w| {
            w.name("deploy");
            w.call(|c| {
                c.name("inner").call_to("x");
            });
        })
        .unwrap();
        registry.register_step(step).unwrap();
        assert!(registry.step("deploy::inner").is_none());
        assert_eq!(registry.find_step("deploy::inner").unwrap().name(), "deploy::inner");
    }
}
