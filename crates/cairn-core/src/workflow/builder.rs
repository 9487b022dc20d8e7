//! Nesting builders that assemble and freeze step trees.
//!
//! Composite builders (`WorkflowBuilder`, `IteratorBuilder`) expose one method
//! per child variant. Each method opens a child builder, runs the closure,
//! builds the child on the spot and appends it. The first error raised by a
//! child is recorded on the parent, later child calls are skipped, and the
//! parent's `build()` returns it.
//!
//! ```ignore
//! let step = build_step::<WorkflowBuilder>(|w| {
//!     w.name("deploy");
//!     w.resource(|r| {
//!         r.name("bucket").state_struct(&BucketState::default());
//!     });
//!     w.action(|a| {
//!         a.name("copy").when("ready and !paused").doer(Callable::from_fn(copy));
//!     });
//! })?;
//! ```
//!
//! Names are relative while a subtree is being built. When a parent builds,
//! every descendant is prefixed with the parent's name, so the outermost
//! `build()` leaves each step with its fully qualified name.

use std::collections::HashSet;

use cairn_types::error::{BuildError, RegistrationError, ShapeError};
use cairn_types::parameter::{Parameter, merge_parameters};
use cairn_types::record::{HandlerInterface, RecordType};
use cairn_types::step::{IterationStyle, NAME_SEPARATOR, Origin, leaf_name};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value;

use super::callable::Callable;
use super::condition::Condition;
use super::introspect::{RecordTypeExt, derive_parameters, single_field};
use super::registry::{ACTIVITY_NAMESPACE, DEFINITION_TABLE};
use super::shape::resolve_callable_shape;
use super::step::{
    ActionStep, CallStep, IteratorStep, Over, ReferenceStep, ResourceStep, StateHandlerStep,
    StateProducer, Step, StepCommon, WorkflowStep,
};

// ---------------------------------------------------------------------------
// Shared builder state
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum WhenClause {
    Text(String),
    Condition(Condition),
}

/// State every builder carries before it is frozen.
#[derive(Debug)]
pub struct StepFields {
    name: String,
    origin: Origin,
    when: WhenClause,
    parameters: Vec<Parameter>,
    returns: Vec<Parameter>,
    /// First error raised while the builder was open.
    pending: Option<BuildError>,
}

impl StepFields {
    fn new(origin: Origin) -> Self {
        Self {
            name: String::new(),
            origin,
            when: WhenClause::Text(String::new()),
            parameters: Vec::new(),
            returns: Vec::new(),
            pending: None,
        }
    }

    /// Record `err` unless an earlier error is already pending.
    fn fail(&mut self, err: impl Into<BuildError>) {
        if self.pending.is_none() {
            self.pending = Some(err.into());
        }
    }

    /// Name used in error messages: the local name, or the declaration site.
    fn label(&self) -> String {
        if self.name.is_empty() {
            self.origin.to_string()
        } else {
            self.name.clone()
        }
    }

    fn check_pending(&mut self) -> Result<(), BuildError> {
        match self.pending.take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn resolve(self) -> Result<StepCommon, BuildError> {
        if self.name.trim().is_empty() {
            return Err(BuildError::StepNoName {
                origin: self.origin,
            });
        }
        if self.name.contains(NAME_SEPARATOR) {
            return Err(BuildError::IllegalStepName { name: self.name });
        }
        let when = match self.when {
            WhenClause::Condition(condition) => {
                condition
                    .validate()
                    .map_err(|source| BuildError::Condition {
                        step: self.name.clone(),
                        source,
                    })?;
                condition
            }
            WhenClause::Text(text) => {
                Condition::parse(&text).map_err(|source| BuildError::Condition {
                    step: self.name.clone(),
                    source,
                })?
            }
        };
        Ok(StepCommon {
            name: self.name,
            origin: self.origin,
            when,
            parameters: self.parameters,
            returns: self.returns,
        })
    }
}

// ---------------------------------------------------------------------------
// Builder traits
// ---------------------------------------------------------------------------

/// Setters shared by every step builder.
pub trait StepBuilder: Sized {
    /// Open a builder for a step declared at `origin`.
    fn open(origin: Origin) -> Self;

    fn fields(&mut self) -> &mut StepFields;

    /// Validate and freeze the step.
    fn build(self) -> Result<Step, BuildError>;

    fn name(&mut self, name: impl Into<String>) -> &mut Self {
        self.fields().name = name.into();
        self
    }

    /// Guard condition text; empty means the step always runs.
    fn when(&mut self, condition: impl Into<String>) -> &mut Self {
        self.fields().when = WhenClause::Text(condition.into());
        self
    }

    /// Guard condition assembled with the `Condition` combinators. Its names
    /// are checked when the step is built.
    fn when_condition(&mut self, condition: Condition) -> &mut Self {
        self.fields().when = WhenClause::Condition(condition);
        self
    }

    fn parameters(&mut self, parameters: impl IntoIterator<Item = Parameter>) -> &mut Self {
        self.fields().parameters.extend(parameters);
        self
    }

    fn returns(&mut self, returns: impl IntoIterator<Item = Parameter>) -> &mut Self {
        self.fields().returns.extend(returns);
        self
    }
}

/// Child constructors for builders that own nested steps.
pub trait CompositeBuilder: StepBuilder {
    fn children(&mut self) -> &mut Vec<Step>;

    /// Open, configure and build a child, appending it on success.
    fn add_child<B, F>(&mut self, origin: Origin, configure: F) -> &mut Self
    where
        B: StepBuilder,
        F: FnOnce(&mut B),
    {
        if self.fields().pending.is_some() {
            return self;
        }
        let mut builder = B::open(origin);
        configure(&mut builder);
        match builder.build() {
            Ok(step) => self.children().push(step),
            Err(err) => self.fields().fail(err),
        }
        self
    }

    #[track_caller]
    fn workflow(&mut self, configure: impl FnOnce(&mut WorkflowBuilder)) -> &mut Self {
        self.add_child::<WorkflowBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn resource(&mut self, configure: impl FnOnce(&mut ResourceBuilder)) -> &mut Self {
        self.add_child::<ResourceBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn handler(&mut self, configure: impl FnOnce(&mut StateHandlerBuilder)) -> &mut Self {
        self.add_child::<StateHandlerBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn action(&mut self, configure: impl FnOnce(&mut ActionBuilder)) -> &mut Self {
        self.add_child::<ActionBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn iterator(&mut self, configure: impl FnOnce(&mut IteratorBuilder)) -> &mut Self {
        self.add_child::<IteratorBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn call(&mut self, configure: impl FnOnce(&mut CallBuilder)) -> &mut Self {
        self.add_child::<CallBuilder, _>(Origin::caller(), configure)
    }

    #[track_caller]
    fn reference(&mut self, configure: impl FnOnce(&mut ReferenceBuilder)) -> &mut Self {
        self.add_child::<ReferenceBuilder, _>(Origin::caller(), configure)
    }
}

/// Open a root builder at the caller's location, configure it and build it.
#[track_caller]
pub fn build_step<B: StepBuilder>(configure: impl FnOnce(&mut B)) -> Result<Step, BuildError> {
    let mut builder = B::open(Origin::caller());
    configure(&mut builder);
    builder.build()
}

fn finish(step: Step) -> Result<Step, BuildError> {
    tracing::debug!(
        step = %step.name(),
        style = %step.style(),
        origin = %step.origin(),
        "built step"
    );
    Ok(step)
}

/// Prefix each child with `parent` and reject duplicate sibling names.
fn attach_children(parent: &str, children: &mut [Step]) -> Result<(), BuildError> {
    let mut seen = HashSet::new();
    for child in children.iter_mut() {
        child.attach_to(parent);
        if !seen.insert(child.name().to_string()) {
            return Err(RegistrationError::already_registered(
                ACTIVITY_NAMESPACE,
                DEFINITION_TABLE,
                child.name(),
            )
            .into());
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Workflow
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct WorkflowBuilder {
    fields: StepFields,
    children: Vec<Step>,
}

impl StepBuilder for WorkflowBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            children: Vec::new(),
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let common = self.fields.resolve()?;
        let mut children = self.children;
        attach_children(&common.name, &mut children)?;
        finish(Step::Workflow(WorkflowStep { common, children }))
    }
}

impl CompositeBuilder for WorkflowBuilder {
    fn children(&mut self) -> &mut Vec<Step> {
        &mut self.children
    }
}

// ---------------------------------------------------------------------------
// Resource
// ---------------------------------------------------------------------------

const STATE_FIELDS: [&str; 2] = ["state", "state_struct"];

#[derive(Debug)]
pub struct ResourceBuilder {
    fields: StepFields,
    external_id: Option<String>,
    state: Option<Callable>,
    state_struct: Option<(RecordType, Value)>,
}

impl ResourceBuilder {
    pub fn external_id(&mut self, id: impl Into<String>) -> &mut Self {
        self.external_id = Some(id.into());
        self
    }

    /// Produce the desired state with `(input) -> (state, error)`.
    pub fn state(&mut self, producer: impl Into<Callable>) -> &mut Self {
        self.state = Some(producer.into());
        self
    }

    /// Use a constant desired-state value.
    pub fn state_struct<T>(&mut self, value: &T) -> &mut Self
    where
        T: Serialize + JsonSchema,
    {
        let described = RecordType::of::<T>().and_then(|record| {
            serde_json::to_value(value)
                .map(|json| (record, json))
                .map_err(|e| ShapeError::not_struct(std::any::type_name::<T>(), e.to_string()))
        });
        match described {
            Ok(state) => self.state_struct = Some(state),
            Err(err) => self.fields.fail(err),
        }
        self
    }

    /// Use a constant desired-state value described by the host.
    pub fn state_record(&mut self, record: RecordType, value: Value) -> &mut Self {
        self.state_struct = Some((record, value));
        self
    }
}

impl StepBuilder for ResourceBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            external_id: None,
            state: None,
            state_struct: None,
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let label = self.fields.label();
        let fields = || STATE_FIELDS.map(String::from).to_vec();

        let (state, state_type, derived_inputs) = match (self.state, self.state_struct) {
            (Some(_), Some(_)) => {
                return Err(ShapeError::MutuallyExclusiveFields {
                    step: label,
                    fields: fields(),
                }
                .into());
            }
            (None, None) => {
                return Err(ShapeError::RequireOneOfFields {
                    step: label,
                    fields: fields(),
                }
                .into());
            }
            (Some(callable), None) => {
                let shape = resolve_callable_shape(&label, callable.descriptor())?;
                let Some(output) = shape.output else {
                    return Err(ShapeError::BadFunction {
                        step: label,
                        type_name: callable.type_name(),
                    }
                    .into());
                };
                let inputs = shape.input.as_ref().map(derive_parameters).unwrap_or_default();
                (StateProducer::Callable(callable), output, inputs)
            }
            (None, Some((record, value))) => (StateProducer::Literal(value), record, Vec::new()),
        };

        let mut common = self.fields.resolve()?;
        common.parameters = merge_parameters(derived_inputs, common.parameters);
        common.returns = merge_parameters(derive_parameters(&state_type), common.returns);
        finish(Step::Resource(ResourceStep {
            common,
            external_id: self.external_id,
            state,
            state_type,
        }))
    }
}

// ---------------------------------------------------------------------------
// State handler
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct StateHandlerBuilder {
    fields: StepFields,
    api: Option<HandlerInterface>,
}

impl StateHandlerBuilder {
    pub fn api(&mut self, interface: HandlerInterface) -> &mut Self {
        self.api = Some(interface);
        self
    }
}

impl StepBuilder for StateHandlerBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            api: None,
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let Some(interface) = self.api else {
            return Err(ShapeError::missing_field(self.fields.label(), "api").into());
        };
        let mut common = self.fields.resolve()?;
        common.parameters =
            merge_parameters(derive_parameters(&interface.state), common.parameters);
        finish(Step::StateHandler(StateHandlerStep { common, interface }))
    }
}

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct ActionBuilder {
    fields: StepFields,
    doer: Option<Callable>,
}

impl ActionBuilder {
    pub fn doer(&mut self, function: impl Into<Callable>) -> &mut Self {
        self.doer = Some(function.into());
        self
    }
}

impl StepBuilder for ActionBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            doer: None,
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let label = self.fields.label();
        let Some(function) = self.doer else {
            return Err(ShapeError::missing_field(label, "doer").into());
        };
        let shape = resolve_callable_shape(&label, function.descriptor())?;

        let mut common = self.fields.resolve()?;
        let inputs = shape.input.as_ref().map(derive_parameters).unwrap_or_default();
        let outputs = shape.output.as_ref().map(derive_parameters).unwrap_or_default();
        common.parameters = merge_parameters(inputs, common.parameters);
        common.returns = merge_parameters(outputs, common.returns);
        finish(Step::Action(ActionStep {
            common,
            function,
            shape,
        }))
    }
}

// ---------------------------------------------------------------------------
// Iterator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum OverSpec {
    Literal(Value),
    Input(RecordType),
}

#[derive(Debug)]
pub struct IteratorBuilder {
    fields: StepFields,
    style: IterationStyle,
    over: Option<OverSpec>,
    variables: Vec<Parameter>,
    into: Option<String>,
    children: Vec<Step>,
}

impl IteratorBuilder {
    pub fn style(&mut self, style: IterationStyle) -> &mut Self {
        self.style = style;
        self
    }

    /// Iterate over a literal count (`Times`) or array (`Each`).
    pub fn over(&mut self, value: impl Into<Value>) -> &mut Self {
        self.over = Some(OverSpec::Literal(value.into()));
        self
    }

    /// Iterate over a step input, named by the single field of `record`.
    pub fn over_input(&mut self, record: RecordType) -> &mut Self {
        self.over = Some(OverSpec::Input(record));
        self
    }

    /// `over_input` for a single-field Rust record.
    pub fn over_input_of<T: JsonSchema>(&mut self) -> &mut Self {
        match RecordType::of::<T>() {
            Ok(record) => self.over_input(record),
            Err(err) => {
                self.fields.fail(err);
                self
            }
        }
    }

    /// Append per-iteration loop variables.
    pub fn variables(&mut self, variables: impl IntoIterator<Item = Parameter>) -> &mut Self {
        self.variables.extend(variables);
        self
    }

    /// Name of the produced result sequence.
    pub fn into(&mut self, name: impl Into<String>) -> &mut Self {
        self.into = Some(name.into());
        self
    }

    fn resolve_over(&self, step: &str) -> Result<Over, ShapeError> {
        match &self.over {
            None => Err(ShapeError::missing_field(step, "over")),
            Some(OverSpec::Input(record)) => {
                single_field(record)?;
                let mut parameters = derive_parameters(record);
                Ok(Over::Parameter(parameters.remove(0)))
            }
            Some(OverSpec::Literal(value)) => {
                let valid = match self.style {
                    IterationStyle::Times => value.as_u64().is_some(),
                    IterationStyle::Each => value.is_array(),
                };
                if valid {
                    Ok(Over::Value(value.clone()))
                } else {
                    Err(ShapeError::InvalidIterationValue {
                        step: step.to_string(),
                        style: self.style.to_string(),
                        value: value.to_string(),
                    })
                }
            }
        }
    }
}

impl StepBuilder for IteratorBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            style: IterationStyle::default(),
            over: None,
            variables: Vec::new(),
            into: None,
            children: Vec::new(),
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        if self.children.len() != 1 {
            return Err(BuildError::IteratorNotOneStep {
                name: self.fields.label(),
                count: self.children.len(),
            });
        }
        let mut producer = self.children.remove(0);

        // An unnamed iterator takes its producer's name.
        if self.fields.name.is_empty() {
            self.fields.name = producer.name().to_string();
        } else {
            producer.attach_to(&self.fields.name);
        }

        let over = self.resolve_over(&self.fields.name)?;
        let into = self
            .into
            .take()
            .unwrap_or_else(|| leaf_name(&self.fields.name).to_string());
        let style = self.style;
        let variables = std::mem::take(&mut self.variables);

        let mut common = self.fields.resolve()?;
        if let Over::Parameter(input) = &over {
            common.parameters = merge_parameters(vec![input.clone()], common.parameters);
        }
        common.returns = merge_parameters(vec![Parameter::new(&into, "array")], common.returns);

        finish(Step::Iterator(IteratorStep {
            common,
            style,
            over,
            variables,
            into,
            producer: Box::new(producer),
        }))
    }
}

impl CompositeBuilder for IteratorBuilder {
    fn children(&mut self) -> &mut Vec<Step> {
        &mut self.children
    }
}

// ---------------------------------------------------------------------------
// Call and reference
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub struct CallBuilder {
    fields: StepFields,
    target: Option<String>,
}

impl CallBuilder {
    pub fn call_to(&mut self, target: impl Into<String>) -> &mut Self {
        self.target = Some(target.into());
        self
    }
}

impl StepBuilder for CallBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            target: None,
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let target = required_target(&self.fields, self.target)?;
        let common = self.fields.resolve()?;
        finish(Step::Call(CallStep { common, target }))
    }
}

#[derive(Debug)]
pub struct ReferenceBuilder {
    fields: StepFields,
    target: Option<String>,
}

impl ReferenceBuilder {
    pub fn call_to(&mut self, target: impl Into<String>) -> &mut Self {
        self.target = Some(target.into());
        self
    }
}

impl StepBuilder for ReferenceBuilder {
    fn open(origin: Origin) -> Self {
        Self {
            fields: StepFields::new(origin),
            target: None,
        }
    }

    fn fields(&mut self) -> &mut StepFields {
        &mut self.fields
    }

    fn build(mut self) -> Result<Step, BuildError> {
        self.fields.check_pending()?;
        let target = required_target(&self.fields, self.target)?;
        let common = self.fields.resolve()?;
        finish(Step::Reference(ReferenceStep { common, target }))
    }
}

fn required_target(fields: &StepFields, target: Option<String>) -> Result<String, ShapeError> {
    target
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ShapeError::missing_field(fields.label(), "call_to"))
}
