//! Built, immutable step trees.
//!
//! Every variant embeds a `StepCommon` carrying the fields all steps share.
//! Steps are produced only by the builders in `super::builder` and are never
//! mutated once the outermost `build()` returns.

use std::collections::BTreeSet;

use cairn_types::parameter::Parameter;
use cairn_types::record::{HandlerInterface, RecordType};
use cairn_types::step::{IterationStyle, Origin, StepStyle, leaf_name, qualify};
use serde_json::Value;

use super::callable::Callable;
use super::condition::Condition;
use super::shape::CallableShape;

// ---------------------------------------------------------------------------
// Common fields
// ---------------------------------------------------------------------------

/// Fields shared by every step variant.
#[derive(Debug, Clone, PartialEq)]
pub struct StepCommon {
    /// Qualified name, ancestors joined with `::`.
    pub name: String,
    pub origin: Origin,
    pub when: Condition,
    pub parameters: Vec<Parameter>,
    pub returns: Vec<Parameter>,
}

// ---------------------------------------------------------------------------
// Variants
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Workflow(WorkflowStep),
    Resource(ResourceStep),
    StateHandler(StateHandlerStep),
    Action(ActionStep),
    Iterator(IteratorStep),
    Call(CallStep),
    Reference(ReferenceStep),
}

/// Ordered composite of child steps.
#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowStep {
    pub common: StepCommon,
    pub children: Vec<Step>,
}

/// A managed resource and the producer of its desired state.
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceStep {
    pub common: StepCommon,
    pub external_id: Option<String>,
    pub state: StateProducer,
    /// Desired-state record type, source of `returns`.
    pub state_type: RecordType,
}

/// How a resource's desired state is obtained.
#[derive(Debug, Clone, PartialEq)]
pub enum StateProducer {
    /// `(input) -> (desired state, error)`.
    Callable(Callable),
    /// A constant desired-state record.
    Literal(Value),
}

#[derive(Debug, Clone, PartialEq)]
pub struct StateHandlerStep {
    pub common: StepCommon,
    pub interface: HandlerInterface,
}

/// A stateless callable.
#[derive(Debug, Clone, PartialEq)]
pub struct ActionStep {
    pub common: StepCommon,
    pub function: Callable,
    pub shape: CallableShape,
}

/// Repeats its single producer step.
#[derive(Debug, Clone, PartialEq)]
pub struct IteratorStep {
    pub common: StepCommon,
    pub style: IterationStyle,
    pub over: Over,
    /// Per-iteration loop variables.
    pub variables: Vec<Parameter>,
    /// Name of the produced result sequence.
    pub into: String,
    pub producer: Box<Step>,
}

/// The collection or count an iterator runs over.
#[derive(Debug, Clone, PartialEq)]
pub enum Over {
    Value(Value),
    /// Bound from a step input at run time.
    Parameter(Parameter),
}

/// Invokes another step, optionally renaming its contract.
#[derive(Debug, Clone, PartialEq)]
pub struct CallStep {
    pub common: StepCommon,
    pub target: String,
}

/// Lightweight pointer to another step.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceStep {
    pub common: StepCommon,
    pub target: String,
}

// ---------------------------------------------------------------------------
// Accessors
// ---------------------------------------------------------------------------

impl Step {
    pub fn common(&self) -> &StepCommon {
        match self {
            Self::Workflow(step) => &step.common,
            Self::Resource(step) => &step.common,
            Self::StateHandler(step) => &step.common,
            Self::Action(step) => &step.common,
            Self::Iterator(step) => &step.common,
            Self::Call(step) => &step.common,
            Self::Reference(step) => &step.common,
        }
    }

    fn common_mut(&mut self) -> &mut StepCommon {
        match self {
            Self::Workflow(step) => &mut step.common,
            Self::Resource(step) => &mut step.common,
            Self::StateHandler(step) => &mut step.common,
            Self::Action(step) => &mut step.common,
            Self::Iterator(step) => &mut step.common,
            Self::Call(step) => &mut step.common,
            Self::Reference(step) => &mut step.common,
        }
    }

    pub fn style(&self) -> StepStyle {
        match self {
            Self::Workflow(_) => StepStyle::Workflow,
            Self::Resource(_) => StepStyle::Resource,
            Self::StateHandler(_) => StepStyle::StateHandler,
            Self::Action(_) => StepStyle::Action,
            Self::Iterator(_) => StepStyle::Iterator,
            Self::Call(_) => StepStyle::Call,
            Self::Reference(_) => StepStyle::Reference,
        }
    }

    pub fn name(&self) -> &str {
        &self.common().name
    }

    /// Last segment of the qualified name.
    pub fn local_name(&self) -> &str {
        leaf_name(self.name())
    }

    pub fn origin(&self) -> &Origin {
        &self.common().origin
    }

    pub fn when(&self) -> &Condition {
        &self.common().when
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.common().parameters
    }

    pub fn returns(&self) -> &[Parameter] {
        &self.common().returns
    }

    /// Input names the step needs bound: its parameters plus every name its
    /// condition reads.
    pub fn required_inputs(&self) -> Vec<String> {
        let mut names: BTreeSet<String> = self
            .parameters()
            .iter()
            .map(|p| p.name.clone())
            .collect();
        names.extend(self.when().names());
        names.into_iter().collect()
    }

    /// Direct children: workflow members or an iterator's producer.
    pub fn children(&self) -> &[Step] {
        match self {
            Self::Workflow(step) => &step.children,
            Self::Iterator(step) => std::slice::from_ref(step.producer.as_ref()),
            _ => &[],
        }
    }

    /// Depth-first, pre-order search by qualified name.
    ///
    /// Returns the outermost match, which for an anonymous iterator is the
    /// iterator rather than its producer.
    pub fn find(&self, name: &str) -> Option<&Step> {
        if self.name() == name {
            return Some(self);
        }
        self.children().iter().find_map(|child| child.find(name))
    }

    /// Qualified names of this step and all descendants, pre-order.
    pub fn qualified_names(&self) -> Vec<&str> {
        let mut names = vec![self.name()];
        for child in self.children() {
            names.extend(child.qualified_names());
        }
        names
    }

    /// Prefix this step and every descendant with `parent`.
    pub(crate) fn attach_to(&mut self, parent: &str) {
        let common = self.common_mut();
        common.name = qualify(Some(parent), &common.name);
        match self {
            Self::Workflow(step) => {
                for child in &mut step.children {
                    child.attach_to(parent);
                }
            }
            Self::Iterator(step) => step.producer.attach_to(parent),
            _ => {}
        }
    }
}

impl ResourceStep {
    pub fn resource_type(&self) -> &str {
        &self.state_type.name
    }
}

impl ActionStep {
    /// Interface type string of the bound callable.
    pub fn interface(&self) -> String {
        self.function.type_name()
    }
}

impl IteratorStep {
    /// Whether the iterator took its name from its producer.
    ///
    /// An anonymous iterator and its producer share one qualified name, so a
    /// lookup by that name yields the iterator; the producer is reached
    /// through [`Step::children`].
    pub fn is_anonymous(&self) -> bool {
        self.common.name == self.producer.name()
    }
}
