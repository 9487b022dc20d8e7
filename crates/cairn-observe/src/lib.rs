//! Logging and trace export for cairn binaries.

pub mod tracing_setup;

pub use tracing_setup::{LogFormat, TracingError, TracingOptions, init_tracing, shutdown_tracing};
