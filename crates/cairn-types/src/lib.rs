//! Shared domain types for Cairn.
//!
//! This crate contains the plain data exchanged between the definition core
//! and its collaborators: parameter contracts, record and callable
//! descriptors supplied by the host type system, projected step definitions
//! handed to the transport, configuration, and the error types.
//!
//! Zero infrastructure dependencies -- only serde, serde_json, thiserror.

pub mod config;
pub mod definition;
pub mod error;
pub mod parameter;
pub mod record;
pub mod step;
