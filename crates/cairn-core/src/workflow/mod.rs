//! Step definitions: guard conditions, builders, projection and registration.
//!
//! - `condition` -- guard expression parser, evaluator and printer
//! - `introspect` -- record descriptors derived from `schemars::JsonSchema`
//! - `shape` -- callable argument/result shape resolution
//! - `callable` -- opaque callables bound to actions and resources
//! - `step` -- immutable step trees
//! - `builder` -- nesting builders that validate and freeze steps
//! - `projector` -- step trees to transport definition records
//! - `registry` -- lock-guarded tables of steps, callables and types
//! - `service` -- top-level declaration entry point

pub mod builder;
pub mod callable;
pub mod condition;
pub mod introspect;
pub mod projector;
pub mod registry;
pub mod service;
pub mod shape;
pub mod step;
