//! Extraction functions used by iterator stages.
//!
//! An iterator function turns a list of argument values into an asynchronous
//! stream of tuple batches. Each batch is one contribution to the batch
//! synchronizer; the end of the stream means the execution terminated.
//! Functions may be finite (`range`, `split`) or unbounded (`periodic`).
//!
//! Functions are looked up by identifier in a `FunctionRegistry` that is
//! passed explicitly through the execution context.

use std::collections::HashMap;
use std::sync::Arc;

use futures::stream::BoxStream;

use crate::error::EvaluationError;
use crate::types::Value;

mod periodic;
mod range;
mod split;

pub use periodic::Periodic;
pub use range::Range;
pub use split::Split;

/// Namespace of the standard iterator functions.
pub const ITER_NAMESPACE: &str = "http://w3id.org/sparql-generate/iter/";
/// Identifier of `range(start, end[, step])`.
pub const RANGE: &str = "http://w3id.org/sparql-generate/iter/range";
/// Identifier of `split(text, separator)`.
pub const SPLIT: &str = "http://w3id.org/sparql-generate/iter/split";
/// Identifier of `periodic(interval_ms[, count])`.
pub const PERIODIC: &str = "http://w3id.org/sparql-generate/iter/periodic";

/// One output row of an iterator function. `None` leaves a variable unbound.
pub type Tuple = Vec<Option<Value>>;

/// The tuples of one contribution.
pub type TupleBatch = Vec<Tuple>;

/// The batches produced by one execution of an iterator function.
pub type TupleStream = BoxStream<'static, Result<TupleBatch, EvaluationError>>;

/// A function from bound argument values to a stream of tuple batches.
pub trait IteratorFunction: Send + Sync {
    /// Check the number of arguments. Called once, before execution starts.
    fn check_arity(&self, argument_count: usize) -> Result<(), String>;

    /// Start one execution with evaluated arguments.
    ///
    /// Must not block: any waiting happens inside the returned stream.
    fn call(&self, arguments: Vec<Value>) -> Result<TupleStream, EvaluationError>;
}

/// Registry of iterator functions, keyed by identifier.
#[derive(Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, Arc<dyn IteratorFunction>>,
}

impl FunctionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding `range`, `split` and `periodic`.
    #[must_use]
    pub fn standard() -> Self {
        let mut registry = Self::new();
        registry.register(RANGE, Range);
        registry.register(SPLIT, Split);
        registry.register(PERIODIC, Periodic);
        registry
    }

    /// Register a function, replacing any previous one with this identifier.
    pub fn register(&mut self, identifier: impl Into<String>, function: impl IteratorFunction + 'static) {
        self.functions.insert(identifier.into(), Arc::new(function));
    }

    /// Look up a function by identifier.
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<Arc<dyn IteratorFunction>> {
        self.functions.get(identifier).cloned()
    }

    #[must_use]
    pub fn contains(&self, identifier: &str) -> bool {
        self.functions.contains_key(identifier)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.functions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }
}

impl std::fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

/// Read an integer argument, naming the function in the error.
pub(crate) fn integer_argument(
    function: &str,
    arguments: &[Value],
    index: usize,
) -> Result<i64, EvaluationError> {
    let value = arguments.get(index).ok_or_else(|| EvaluationError::Function {
        function: function.to_owned(),
        message: format!("missing argument {index}"),
    })?;
    value.as_integer().ok_or_else(|| EvaluationError::TypeMismatch {
        expected: "integer",
        found: value.to_string(),
    })
}

/// Check an argument count against an inclusive range.
pub(crate) fn check_count(count: usize, min: usize, max: usize) -> Result<(), String> {
    if (min..=max).contains(&count) {
        Ok(())
    } else if min == max {
        Err(format!("expected {min} arguments, got {count}"))
    } else {
        Err(format!("expected {min} to {max} arguments, got {count}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_standard_registry() {
        let registry = FunctionRegistry::standard();
        assert_eq!(registry.len(), 3);
        assert!(registry.lookup(RANGE).is_some());
        assert!(registry.lookup(SPLIT).is_some());
        assert!(registry.lookup(PERIODIC).is_some());
        assert!(registry.lookup("http://ex.org/nothing").is_none());
        assert!(RANGE.starts_with(ITER_NAMESPACE));
    }

    #[test]
    fn test_check_count_messages() {
        assert!(check_count(2, 2, 3).is_ok());
        assert_eq!(check_count(1, 2, 2), Err("expected 2 arguments, got 1".to_owned()));
        assert_eq!(
            check_count(4, 2, 3),
            Err("expected 2 to 3 arguments, got 4".to_owned())
        );
    }
}
