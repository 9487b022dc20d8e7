//! Top-level entry point a service uses to declare its steps.
//!
//! `ServiceBuilder` owns a `Registry`. Each root step is built and registered
//! as soon as its closure returns; the first failure is kept and reported by
//! `finish()` or `publish()`, and later declarations are skipped.

use cairn_types::config::SdkConfig;
use cairn_types::definition::ServiceManifest;
use cairn_types::error::BuildError;
use cairn_types::record::RecordType;
use cairn_types::step::Origin;
use schemars::JsonSchema;

use super::builder::{
    ActionBuilder, CallBuilder, IteratorBuilder, ReferenceBuilder, ResourceBuilder,
    StateHandlerBuilder, StepBuilder, WorkflowBuilder,
};
use super::callable::Callable;
use super::introspect::RecordTypeExt;
use super::registry::Registry;

#[derive(Debug)]
pub struct ServiceBuilder {
    registry: Registry,
    pending: Option<BuildError>,
}

impl ServiceBuilder {
    /// A builder for `service` with default settings.
    pub fn new(service: impl Into<String>) -> Self {
        Self::with_config(SdkConfig::for_service(service))
    }

    pub fn with_config(config: SdkConfig) -> Self {
        Self::from_registry(Registry::new(config))
    }

    /// Continue declaring into an existing registry.
    pub fn from_registry(registry: Registry) -> Self {
        Self {
            registry,
            pending: None,
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn record(&mut self, result: Result<(), BuildError>) -> &mut Self {
        if let Err(err) = result {
            tracing::debug!(error = %err, "service declaration failed");
            self.pending = Some(err);
        }
        self
    }

    /// Build a root step with `B` and register it.
    pub fn add_step<B, F>(&mut self, origin: Origin, configure: F) -> &mut Self
    where
        B: StepBuilder,
        F: FnOnce(&mut B),
    {
        if self.pending.is_some() {
            return self;
        }
        let mut builder = B::open(origin);
        configure(&mut builder);
        let result = builder
            .build()
            .and_then(|step| self.registry.register_step(step).map_err(BuildError::from));
        self.record(result)
    }

    #[track_caller]
    pub fn workflow(&mut self, configure: impl FnOnce(&mut WorkflowBuilder)) -> &mut Self {
        self.add_step::<WorkflowBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn resource(&mut self, configure: impl FnOnce(&mut ResourceBuilder)) -> &mut Self {
        self.add_step::<ResourceBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn handler(&mut self, configure: impl FnOnce(&mut StateHandlerBuilder)) -> &mut Self {
        self.add_step::<StateHandlerBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn action(&mut self, configure: impl FnOnce(&mut ActionBuilder)) -> &mut Self {
        self.add_step::<ActionBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn iterator(&mut self, configure: impl FnOnce(&mut IteratorBuilder)) -> &mut Self {
        self.add_step::<IteratorBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn call(&mut self, configure: impl FnOnce(&mut CallBuilder)) -> &mut Self {
        self.add_step::<CallBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    pub fn reference(&mut self, configure: impl FnOnce(&mut ReferenceBuilder)) -> &mut Self {
        self.add_step::<ReferenceBuilder, _>(Origin::caller(), configure)
    }

    /// Register a callable that no step binds directly.
    pub fn callable(&mut self, name: impl Into<String>, callable: Callable) -> &mut Self {
        if self.pending.is_some() {
            return self;
        }
        let result = self.registry.register_callable(name, callable);
        self.record(result.map_err(BuildError::from))
    }

    pub fn record_type(&mut self, record: RecordType) -> &mut Self {
        if self.pending.is_some() {
            return self;
        }
        let result = self.registry.register_type(record);
        self.record(result.map_err(BuildError::from))
    }

    /// Register the record shape of `T`.
    pub fn record_type_of<T: JsonSchema>(&mut self) -> &mut Self {
        match RecordType::of::<T>() {
            Ok(record) => self.record_type(record),
            Err(err) => self.record(Err(err.into())),
        }
    }

    /// Register the record shape of `T` under an explicit dotted name.
    pub fn record_type_named<T: JsonSchema>(&mut self, name: &str) -> &mut Self {
        match RecordType::of_named::<T>(name) {
            Ok(record) => self.record_type(record),
            Err(err) => self.record(Err(err.into())),
        }
    }

    /// The populated registry, or the first declaration error.
    pub fn finish(self) -> Result<Registry, BuildError> {
        match self.pending {
            Some(err) => Err(err),
            None => Ok(self.registry),
        }
    }

    /// Finish and publish the manifest in one step.
    pub fn publish(self) -> Result<ServiceManifest, BuildError> {
        Ok(self.finish()?.publish()?)
    }
}
