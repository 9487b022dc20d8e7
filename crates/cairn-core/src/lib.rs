//! Definition core for Cairn services.
//!
//! Parses guard conditions, assembles step trees through nesting builders,
//! projects them into definition records and aggregates everything a service
//! declares into a publishable manifest. Depends only on `cairn-types`; it
//! never executes steps or performs network I/O.

pub mod config;
pub mod workflow;

/// Names needed to declare a service.
pub mod prelude {
    pub use crate::workflow::builder::{
        ActionBuilder, CallBuilder, CompositeBuilder, IteratorBuilder, ReferenceBuilder,
        ResourceBuilder, StateHandlerBuilder, StepBuilder, WorkflowBuilder, build_step,
    };
    pub use crate::workflow::callable::Callable;
    pub use crate::workflow::condition::Condition;
    pub use crate::workflow::introspect::RecordTypeExt;
    pub use crate::workflow::projector::project;
    pub use crate::workflow::registry::Registry;
    pub use crate::workflow::service::ServiceBuilder;
    pub use crate::workflow::step::Step;
    pub use cairn_types::parameter::Parameter;
    pub use cairn_types::record::{CallableDescriptor, HandlerInterface, RecordType, TypeRef};
    pub use cairn_types::step::{HandlerOperation, IterationStyle};
}
