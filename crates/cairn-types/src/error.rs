use thiserror::Error;

use crate::step::Origin;

/// Errors raised while parsing a guard condition.
///
/// Positions are byte offsets into `text`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConditionError {
    #[error("syntax error in condition '{text}' at position {pos}")]
    SyntaxError { text: String, pos: usize },

    #[error("missing ')' in condition '{text}' at position {pos}")]
    MissingCloseParen { text: String, pos: usize },

    #[error("invalid name '{name}' in condition '{text}' at position {pos}")]
    InvalidName {
        name: String,
        text: String,
        pos: usize,
    },

    #[error("unexpected end of condition '{text}' at position {pos}")]
    UnexpectedEnd { text: String, pos: usize },
}

impl ConditionError {
    /// The offending condition text.
    pub fn text(&self) -> &str {
        match self {
            Self::SyntaxError { text, .. }
            | Self::MissingCloseParen { text, .. }
            | Self::InvalidName { text, .. }
            | Self::UnexpectedEnd { text, .. } => text,
        }
    }

    /// Byte offset at which the parser stopped.
    pub fn pos(&self) -> usize {
        match self {
            Self::SyntaxError { pos, .. }
            | Self::MissingCloseParen { pos, .. }
            | Self::InvalidName { pos, .. }
            | Self::UnexpectedEnd { pos, .. } => *pos,
        }
    }
}

/// A declared step does not match the structural contract of its variant.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ShapeError {
    #[error("step '{step}' has an unsupported function shape: {type_name}")]
    BadFunction { step: String, type_name: String },

    #[error("{context}: type '{type_name}' is not a record")]
    NotStruct { type_name: String, context: String },

    #[error("record '{type_name}' must have exactly one field, found {count}")]
    NotOneField { type_name: String, count: usize },

    #[error("step '{step}' is missing required field '{field}'")]
    MissingRequiredField { step: String, field: String },

    #[error("step '{step}' sets mutually exclusive fields: {}", .fields.join(", "))]
    MutuallyExclusiveFields { step: String, fields: Vec<String> },

    #[error("step '{step}' requires one of: {}", .fields.join(", "))]
    RequireOneOfFields { step: String, fields: Vec<String> },

    #[error("step '{step}' cannot iterate {style} over {value}")]
    InvalidIterationValue {
        step: String,
        style: String,
        value: String,
    },
}

impl ShapeError {
    pub fn missing_field(step: impl Into<String>, field: impl Into<String>) -> Self {
        Self::MissingRequiredField {
            step: step.into(),
            field: field.into(),
        }
    }

    pub fn not_struct(type_name: impl Into<String>, context: impl Into<String>) -> Self {
        Self::NotStruct {
            type_name: type_name.into(),
            context: context.into(),
        }
    }
}

/// Naming or aggregation conflicts found while assembling the registered set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    #[error("{namespace}/{table} '{name}' is already registered")]
    AlreadyRegistered {
        namespace: String,
        table: String,
        name: String,
    },

    #[error("illegal type name '{name}'")]
    IllegalTypeName { name: String },

    #[error("registered types share no common namespace: {}", .names.join(", "))]
    NoCommonNamespace { names: Vec<String> },
}

impl RegistrationError {
    pub fn already_registered(
        namespace: impl Into<String>,
        table: impl Into<String>,
        name: impl Into<String>,
    ) -> Self {
        Self::AlreadyRegistered {
            namespace: namespace.into(),
            table: table.into(),
            name: name.into(),
        }
    }
}

/// The single error type returned by every step builder's `build()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("step declared at {origin} has no name")]
    StepNoName { origin: Origin },

    #[error("step name '{name}' must not contain '::'")]
    IllegalStepName { name: String },

    #[error("iterator '{name}' must contain exactly one step, found {count}")]
    IteratorNotOneStep { name: String, count: usize },

    #[error("step '{step}' has an invalid condition: {source}")]
    Condition {
        step: String,
        #[source]
        source: ConditionError,
    },

    #[error(transparent)]
    Shape(#[from] ShapeError),

    #[error(transparent)]
    Registration(#[from] RegistrationError),
}

/// Failures while invoking a registered callable through its JSON boundary.
#[derive(Debug, Error)]
pub enum InvokeError {
    #[error("callable '{0}' has no invoker")]
    NotInvocable(String),

    #[error("failed to decode input for '{name}': {source}")]
    Decode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to encode output of '{name}': {source}")]
    Encode {
        name: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("'{name}' failed: {message}")]
    Failed { name: String, message: String },
}
