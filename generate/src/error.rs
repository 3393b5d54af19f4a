//! Error taxonomy of the generation engine.
//!
//! Errors fall in two groups:
//! - Fatal errors (`GenerateError`): configuration errors detected before any
//!   work starts, cancellation, and synchronizer invariant violations. These
//!   abort the invocation and are surfaced to the caller.
//! - Per-binding errors (`EvaluationError`): an expression, a source fetch or
//!   an extraction function failed for one input binding. These are recovered
//!   locally by dropping that binding and are only logged.

use std::fmt;

use crate::pipeline::batch::ProducerId;
use crate::types::Variable;

/// A malformed pipeline, reported before execution starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigurationError {
    /// A variable is bound twice in one run.
    Rebinding { variable: Variable },
    /// An iterator stage names a function that is not registered.
    UnknownFunction(String),
    /// An iterator function rejected its argument count.
    FunctionArity { function: String, message: String },
    /// An iterator stage binds no variables.
    NoIteratorVariables { function: String },
    /// A nested call names a pipeline that is not registered.
    UnknownPipeline(String),
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Rebinding { variable } => {
                write!(f, "variable {variable} is bound more than once")
            }
            Self::UnknownFunction(name) => write!(f, "unknown iterator function <{name}>"),
            Self::FunctionArity { function, message } => {
                write!(f, "invalid arguments for <{function}>: {message}")
            }
            Self::NoIteratorVariables { function } => {
                write!(f, "iterator <{function}> binds no variables")
            }
            Self::UnknownPipeline(name) => write!(f, "unknown pipeline <{name}>"),
        }
    }
}

impl std::error::Error for ConfigurationError {}

/// An internal invariant of the batch synchronizer was violated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SynchronizerError {
    /// A producer contributed after it had terminated.
    ContributionAfterTermination { producer: ProducerId },
    /// A producer terminated twice.
    TerminatedTwice { producer: ProducerId },
    /// A message came from a producer that was never registered.
    UnknownProducer { producer: ProducerId },
}

impl fmt::Display for SynchronizerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ContributionAfterTermination { producer } => {
                write!(f, "{producer} contributed after terminating")
            }
            Self::TerminatedTwice { producer } => write!(f, "{producer} terminated twice"),
            Self::UnknownProducer { producer } => write!(f, "{producer} is not registered"),
        }
    }
}

impl std::error::Error for SynchronizerError {}

/// A fatal error that aborts an invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerateError {
    Configuration(ConfigurationError),
    /// The invocation was stopped through its cancellation token.
    Cancelled,
    Synchronizer(SynchronizerError),
    /// A shared lock was poisoned by a panicking task.
    LockPoisoned,
    /// A spawned task panicked or was aborted by the runtime.
    TaskFailed(String),
}

impl GenerateError {
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for GenerateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Configuration(e) => write!(f, "configuration error: {e}"),
            Self::Cancelled => write!(f, "transformation cancelled"),
            Self::Synchronizer(e) => write!(f, "batch synchronizer invariant violated: {e}"),
            Self::LockPoisoned => write!(f, "lock poisoned"),
            Self::TaskFailed(message) => write!(f, "task failed: {message}"),
        }
    }
}

impl std::error::Error for GenerateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Configuration(e) => Some(e),
            Self::Synchronizer(e) => Some(e),
            Self::Cancelled | Self::LockPoisoned | Self::TaskFailed(_) => None,
        }
    }
}

impl From<ConfigurationError> for GenerateError {
    fn from(e: ConfigurationError) -> Self {
        Self::Configuration(e)
    }
}

impl From<SynchronizerError> for GenerateError {
    fn from(e: SynchronizerError) -> Self {
        Self::Synchronizer(e)
    }
}

impl From<tokio::task::JoinError> for GenerateError {
    fn from(e: tokio::task::JoinError) -> Self {
        Self::TaskFailed(e.to_string())
    }
}

/// A failure scoped to one input binding. Never aborts the pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationError {
    UnboundVariable(Variable),
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
    /// Integer arithmetic overflowed.
    Overflow,
    InvalidArgument(String),
    /// A source could not be read.
    Source { locator: String, message: String },
    /// An extraction function failed while producing tuples.
    Function { function: String, message: String },
}

impl fmt::Display for EvaluationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnboundVariable(variable) => write!(f, "variable {variable} is not bound"),
            Self::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            Self::Overflow => write!(f, "integer overflow"),
            Self::InvalidArgument(message) => write!(f, "invalid argument: {message}"),
            Self::Source { locator, message } => write!(f, "cannot read <{locator}>: {message}"),
            Self::Function { function, message } => write!(f, "<{function}> failed: {message}"),
        }
    }
}

impl std::error::Error for EvaluationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_error_display() {
        let error = GenerateError::from(ConfigurationError::Rebinding {
            variable: Variable::new("x"),
        });
        assert_eq!(
            error.to_string(),
            "configuration error: variable ?x is bound more than once"
        );
    }

    #[test]
    fn test_synchronizer_error_display() {
        let error = GenerateError::from(SynchronizerError::ContributionAfterTermination {
            producer: ProducerId(3),
        });
        assert_eq!(
            error.to_string(),
            "batch synchronizer invariant violated: producer#3 contributed after terminating"
        );
        assert!(!error.is_cancelled());
    }
}
