//! Common helpers for end-to-end tests.

use std::sync::{Arc, Mutex};

use futures::StreamExt;
use futures::stream;
use tokio::runtime::Handle;

use crate::config::EngineConfig;
use crate::error::{EvaluationError, GenerateError};
use crate::expression::Expression;
use crate::functions::{IteratorFunction, RANGE, TupleStream};
use crate::output::CollectingSink;
use crate::pipeline::{ExecutionContext, Pipeline, RunSummary, run};
use crate::query::{PatternEvaluator, RowStream, SelectQuery};
use crate::stage::IteratorStage;
use crate::types::{Triple, Value, Variable};
use crate::{Binding, BlankNodeScope};

pub const EX: &str = "http://example.org/";

/// Identifier of the `Scripted` test function.
pub const SCRIPTED: &str = "http://example.org/fn/scripted";

pub fn ex(local: &str) -> String {
    format!("{EX}{local}")
}

pub fn context() -> ExecutionContext {
    ExecutionContext::new(Handle::current(), EngineConfig::default())
}

pub fn context_with(config: EngineConfig) -> ExecutionContext {
    ExecutionContext::new(Handle::current(), config)
}

pub fn binding(pairs: &[(&str, Value)]) -> Binding {
    Binding::from_pairs(
        pairs
            .iter()
            .map(|(name, value)| (Variable::new(name), value.clone())),
    )
    .expect("distinct variables")
}

/// `?variable` in `start..end`.
pub fn range(variable: &str, start: i64, end: i64) -> IteratorStage {
    IteratorStage::new(
        vec![Variable::new(variable)],
        RANGE,
        vec![
            Expression::constant(Value::integer(start)),
            Expression::constant(Value::integer(end)),
        ],
    )
}

/// Run a pipeline to completion with a fresh scope and a collecting sink.
pub async fn run_collect(
    pipeline: Pipeline,
    initial: Vec<Binding>,
    context: ExecutionContext,
) -> (Arc<CollectingSink>, Result<RunSummary, GenerateError>) {
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(pipeline),
        initial,
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context,
    )
    .expect("valid pipeline");
    let result = handle.wait().await;
    (sink, result)
}

/// Sorted integer objects of every fact with the given predicate.
pub fn integer_objects(facts: &[Triple], predicate: &str) -> Vec<i64> {
    let mut values: Vec<i64> = facts
        .iter()
        .filter(|fact| fact.predicate().as_iri() == Some(predicate))
        .filter_map(|fact| fact.object().as_integer())
        .collect();
    values.sort_unstable();
    values
}

/// `scripted(batches, width)`: `batches` contributions of `width` tuples
/// each. Every tuple of the k-th contribution is `[k]`.
pub struct Scripted;

impl IteratorFunction for Scripted {
    fn check_arity(&self, argument_count: usize) -> Result<(), String> {
        if argument_count == 2 {
            Ok(())
        } else {
            Err(format!("expected 2 arguments, got {argument_count}"))
        }
    }

    fn call(&self, arguments: Vec<Value>) -> Result<TupleStream, EvaluationError> {
        let number = |i: usize| {
            arguments
                .get(i)
                .and_then(Value::as_integer)
                .and_then(|n| usize::try_from(n).ok())
                .ok_or_else(|| EvaluationError::InvalidArgument(format!("argument {i}")))
        };
        let batches = number(0)?;
        let width = number(1)?;
        Ok(stream::iter(0..batches)
            .then(move |k| async move {
                tokio::task::yield_now().await;
                let k = i64::try_from(k).expect("small");
                Ok::<_, EvaluationError>(vec![vec![Some(Value::integer(k))]; width])
            })
            .boxed())
    }
}

/// Passes bindings through and records the size of every call.
#[derive(Clone, Default)]
pub struct RecordingEvaluator {
    calls: Arc<Mutex<Vec<usize>>>,
}

impl RecordingEvaluator {
    pub fn calls(&self) -> Vec<usize> {
        self.calls.lock().expect("not poisoned").clone()
    }
}

impl PatternEvaluator for RecordingEvaluator {
    fn evaluate(&self, bindings: Vec<Binding>, _query: Option<Arc<SelectQuery>>) -> RowStream {
        self.calls.lock().expect("not poisoned").push(bindings.len());
        stream::iter(bindings.into_iter().map(Ok)).boxed()
    }
}
