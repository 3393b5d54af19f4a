//! Round grouping of iterator stages, observed at the end of the pipeline.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::StreamExt;
use futures::stream;

use crate::config::EngineConfig;
use crate::e2e_tests::helpers::*;
use crate::error::{EvaluationError, GenerateError};
use crate::expression::Expression;
use crate::functions::{FunctionRegistry, IteratorFunction, TupleStream};
use crate::output::{CollectingSink, GenerateTemplate, TemplateTerm};
use crate::pipeline::{Pipeline, run};
use crate::query::{PatternEvaluator, RowStream, SelectQuery};
use crate::stage::IteratorStage;
use crate::types::{Value, Variable};
use crate::{Binding, BlankNodeScope};

/// Two producers: one with three contributions, one with a single one.
fn uneven_producers() -> (Pipeline, Vec<crate::Binding>) {
    let pipeline = Pipeline::new("uneven")
        .stage(IteratorStage::new(
            vec![Variable::new("k")],
            SCRIPTED,
            vec![
                Expression::var("batches"),
                Expression::constant(Value::integer(1)),
            ],
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("r"),
            TemplateTerm::iri(ex("round")),
            TemplateTerm::var("k"),
        ));
    let initial = vec![
        binding(&[("batches", Value::integer(3))]),
        binding(&[("batches", Value::integer(1))]),
    ];
    (pipeline, initial)
}

fn scripted_functions() -> FunctionRegistry {
    let mut functions = FunctionRegistry::standard();
    functions.register(SCRIPTED, Scripted);
    functions
}

#[tokio::test]
async fn test_rounds_group_kth_contributions() {
    let evaluator = RecordingEvaluator::default();
    let context = context()
        .with_functions(scripted_functions())
        .with_evaluator(evaluator.clone());
    let (pipeline, initial) = uneven_producers();

    let (sink, result) = run_collect(pipeline, initial, context).await;
    let summary = result.expect("run succeeds");

    // Round 0 holds both first contributions, rounds 1 and 2 only the first
    // producer's.
    assert_eq!(evaluator.calls(), vec![2, 1, 1]);
    assert_eq!(summary.rounds, 3);
    assert_eq!(integer_objects(&sink.facts(), &ex("round")), vec![0, 0, 1, 2]);
}

#[tokio::test]
async fn test_unordered_rounds_deliver_the_same_rows() {
    let evaluator = RecordingEvaluator::default();
    let config = EngineConfig {
        ordered_rounds: false,
        ..EngineConfig::default()
    };
    let context = context_with(config)
        .with_functions(scripted_functions())
        .with_evaluator(evaluator.clone());
    let (pipeline, initial) = uneven_producers();

    let (sink, result) = run_collect(pipeline, initial, context).await;
    result.expect("run succeeds");

    let mut calls = evaluator.calls();
    calls.sort_unstable();
    assert_eq!(calls, vec![1, 1, 2]);
    assert_eq!(sink.len(), 4);
    assert_eq!(sink.facts_after_finish(), 0);
}

#[tokio::test]
async fn test_zero_producers_close_one_empty_round() {
    // The empty range contributes one empty batch, so the second iterator
    // starts with no input binding at all.
    let pipeline = Pipeline::new("empty")
        .stage(range("x", 4, 4))
        .stage(range("y", 0, 10))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("r"),
            TemplateTerm::iri(ex("y")),
            TemplateTerm::var("y"),
        ));

    let (sink, result) = run_collect(pipeline, Vec::new(), context()).await;
    let summary = result.expect("run terminates");
    assert!(sink.is_empty());
    assert_eq!(summary.rounds, 2);
    assert_eq!(sink.finish_count(), 1);
}

#[tokio::test]
async fn test_chained_iterators_multiply_rows() {
    let pipeline = Pipeline::new("grid")
        .stage(range("x", 0, 3))
        .stage(range("y", 0, 2))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::keyed_blank("cell", &["x", "y"]),
            TemplateTerm::iri(ex("x")),
            TemplateTerm::var("x"),
        ));

    let (sink, result) = run_collect(pipeline, Vec::new(), context()).await;
    let summary = result.expect("run succeeds");
    assert_eq!(integer_objects(&sink.facts(), &ex("x")), vec![0, 0, 1, 1, 2, 2]);
    // One round for the first iterator, one for the three producers of the
    // second.
    assert_eq!(summary.rounds, 2);
}

const COUNTED: &str = "http://example.org/fn/counted";

/// One single-tuple contribution per millisecond, forever. Counts what it
/// has handed out.
struct Counted(Arc<AtomicUsize>);

impl IteratorFunction for Counted {
    fn check_arity(&self, argument_count: usize) -> Result<(), String> {
        if argument_count == 0 {
            Ok(())
        } else {
            Err(format!("expected no arguments, got {argument_count}"))
        }
    }

    fn call(&self, _arguments: Vec<Value>) -> Result<TupleStream, EvaluationError> {
        let produced = Arc::clone(&self.0);
        Ok(stream::unfold(0_i64, move |k| {
            let produced = Arc::clone(&produced);
            async move {
                tokio::time::sleep(Duration::from_millis(1)).await;
                produced.fetch_add(1, Ordering::SeqCst);
                Some((Ok::<_, EvaluationError>(vec![vec![Some(Value::integer(k))]]), k + 1))
            }
        })
        .boxed())
    }
}

/// Takes a second per call before passing the bindings through.
struct SlowEvaluator;

impl PatternEvaluator for SlowEvaluator {
    fn evaluate(&self, bindings: Vec<Binding>, _query: Option<Arc<SelectQuery>>) -> RowStream {
        stream::once(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            bindings
        })
        .flat_map(|bindings| stream::iter(bindings.into_iter().map(Ok::<_, EvaluationError>)))
        .boxed()
    }
}

#[tokio::test(start_paused = true)]
async fn test_slow_continuation_holds_back_producer() {
    let produced = Arc::new(AtomicUsize::new(0));
    let mut functions = FunctionRegistry::standard();
    functions.register(COUNTED, Counted(Arc::clone(&produced)));
    let config = EngineConfig {
        contribution_buffer: 2,
        ..EngineConfig::default()
    };
    let context = context_with(config)
        .with_functions(functions)
        .with_evaluator(SlowEvaluator);
    let pipeline = Pipeline::new("flood")
        .stage(IteratorStage::new(vec![Variable::new("k")], COUNTED, Vec::new()))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("r"),
            TemplateTerm::iri(ex("seen")),
            TemplateTerm::var("k"),
        ));
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(pipeline),
        Vec::new(),
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context,
    )
    .expect("valid pipeline");

    tokio::time::sleep(Duration::from_secs(3)).await;
    handle.cancel();
    assert_eq!(handle.wait().await, Err(GenerateError::Cancelled));

    // Three seconds at one tick per millisecond, but only a few rounds were
    // consumed. The rest of the producer's output never left it.
    let produced = produced.load(Ordering::SeqCst);
    assert!(produced < 20, "producer ran ahead by {produced} contributions");
    assert!(sink.len() >= 2);
}
