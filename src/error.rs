//! Compiler error types.
//!
//! Parse, analyzer and lint findings are [`crate::diagnostics::Diagnostic`]
//! values and are never raised. The enums here cover the conditions that do
//! stop a stage: I/O, fatal YAML errors, generator inconsistencies, and the
//! typed failures of the expression sub-language and cost resolution.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that stop a compilation.
#[derive(Debug, Error)]
pub enum CompileError {
    /// Source file could not be read.
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed YAML; reported as the single diagnostic of the compilation.
    #[error("fatal parse error: {0}")]
    FatalParse(String),

    /// The generator met a document shape it cannot lower.
    #[error(transparent)]
    Generation(#[from] GenerationError),

    /// Generated source could not be written.
    #[error("failed to write {}: {source}", path.display())]
    OutputWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl CompileError {
    /// Failures caused by the document rather than the environment.
    pub fn is_document_error(&self) -> bool {
        matches!(
            self,
            CompileError::FatalParse(_) | CompileError::Generation(_)
        )
    }
}

/// Generator met a model the analyzer should have rejected.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GenerationError {
    #[error("generation failed: document has no exchange id")]
    MissingExchangeId,

    #[error("generation failed: {context} expression '{source_text}' was not parsed")]
    UnparsedExpression {
        context: String,
        source_text: String,
    },

    #[error("generation failed: endpoint '{endpoint}' uses unknown fragment '{fragment}'")]
    UnresolvedFragment { endpoint: String, fragment: String },

    #[error("generation failed: method '{method}' targets unknown endpoint '{endpoint}'")]
    UnknownEndpoint { method: String, endpoint: String },

    #[error("generation failed: cost of '{endpoint}' did not resolve: {reason}")]
    UnresolvedCost { endpoint: String, reason: String },

    #[error("generation failed: '{name}' {reason}")]
    InvalidIdentifier { name: String, reason: String },
}

/// Safe expression parse failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExprError {
    #[error("empty expression")]
    Empty,

    #[error("syntax error at offset {offset}: {message}")]
    Syntax { offset: usize, message: String },

    #[error("access to '{0}' is not allowed")]
    Forbidden(String),

    #[error("undefined function '{0}'")]
    UnknownFunction(String),

    #[error("function '{function}' expects {expected} argument(s), got {found}")]
    Arity {
        function: String,
        expected: String,
        found: usize,
    },

    #[error("expression exceeds maximum nesting depth of {0}")]
    DepthExceeded(usize),
}

/// Safe expression evaluation failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EvalError {
    #[error("undefined variable '{0}'")]
    UndefinedVariable(String),

    #[error("cannot access property '{property}' of {target}")]
    PropertyAccess { property: String, target: String },

    #[error("cannot access index of {target}")]
    IndexAccess { target: String },

    #[error("access to '{0}' is not allowed")]
    Forbidden(String),

    #[error("{function}: expected {expected}, got {found}")]
    TypeMismatch {
        function: String,
        expected: String,
        found: String,
    },

    #[error("{operation} requires an array, got {found}")]
    ExpectedArray { operation: String, found: String },

    #[error("slice step cannot be zero")]
    ZeroStep,

    #[error("reduce of empty array with no initial value")]
    EmptyReduce,

    #[error("lambda expects {expected} parameter(s), got {found}")]
    LambdaArity { expected: usize, found: usize },

    #[error("evaluation exceeds maximum nesting depth of {0}")]
    DepthExceeded(usize),
}

/// Rate-limit cost resolution failures.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CostResolutionError {
    #[error("endpoint '{endpoint}' references unknown rate-limit group '{group}'")]
    UnknownGroup { endpoint: String, group: String },

    #[error("endpoint '{endpoint}' cost unit '{unit}' is incompatible with global unit '{expected}'")]
    IncompatibleUnit {
        endpoint: String,
        unit: String,
        expected: String,
    },

    #[error("endpoint '{endpoint}' cost {cost} must be positive and finite")]
    NonPositive { endpoint: String, cost: f64 },

    #[error("endpoint '{endpoint}' cost {cost} exceeds global capacity {capacity}")]
    ExceedsCapacity {
        endpoint: String,
        cost: f64,
        capacity: f64,
    },
}
