//! Step-level enums and the source location attached to every declared step.

use std::fmt;
use std::panic::Location;

use serde::{Deserialize, Serialize};

/// Separator joining ancestor names into a qualified step name.
pub const NAME_SEPARATOR: &str = "::";

/// Source location where a step was declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Origin {
    pub file: String,
    pub line: u32,
    pub column: u32,
}

impl Origin {
    /// Location of the caller of the enclosing `#[track_caller]` function.
    #[track_caller]
    pub fn caller() -> Self {
        Self::from(Location::caller())
    }
}

impl From<&Location<'_>> for Origin {
    fn from(location: &Location<'_>) -> Self {
        Self {
            file: location.file().to_string(),
            line: location.line(),
            column: location.column(),
        }
    }
}

impl fmt::Display for Origin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

/// The kind of step, used as the `style` tag of a projected definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStyle {
    Workflow,
    Resource,
    StateHandler,
    Action,
    Iterator,
    Call,
    Reference,
}

impl StepStyle {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Workflow => "workflow",
            Self::Resource => "resource",
            Self::StateHandler => "state_handler",
            Self::Action => "action",
            Self::Iterator => "iterator",
            Self::Call => "call",
            Self::Reference => "reference",
        }
    }
}

impl fmt::Display for StepStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How an iterator repeats its producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IterationStyle {
    /// Run the producer a fixed number of times.
    #[default]
    Times,
    /// Run the producer once per element of a collection.
    Each,
}

impl fmt::Display for IterationStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Times => f.write_str("times"),
            Self::Each => f.write_str("each"),
        }
    }
}

/// Operations a state handler can perform on a resource's desired state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerOperation {
    Create,
    Read,
    Update,
    Delete,
}

/// Join a parent's qualified name and a local name.
pub fn qualify(parent: Option<&str>, local: &str) -> String {
    match parent {
        Some(parent) if !parent.is_empty() => format!("{parent}{NAME_SEPARATOR}{local}"),
        _ => local.to_string(),
    }
}

/// The last segment of a qualified name.
pub fn leaf_name(qualified: &str) -> &str {
    qualified
        .rsplit(NAME_SEPARATOR)
        .next()
        .unwrap_or(qualified)
}
