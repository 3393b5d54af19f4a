//! Cancelling a run that would never end on its own.

use std::sync::Arc;
use std::time::Duration;

use crate::e2e_tests::helpers::*;
use crate::error::GenerateError;
use crate::expression::Expression;
use crate::functions::PERIODIC;
use crate::output::{CollectingSink, GenerateTemplate, TemplateTerm};
use crate::pipeline::{Pipeline, run};
use crate::source::{Document, InMemorySourceFetcher};
use crate::stage::{IteratorStage, SourceStage};
use crate::types::{Value, Variable};
use crate::BlankNodeScope;

fn ticking() -> Pipeline {
    Pipeline::new("ticks")
        .stage(IteratorStage::new(
            vec![Variable::new("tick")],
            PERIODIC,
            vec![Expression::constant(Value::integer(10))],
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("t"),
            TemplateTerm::iri(ex("tick")),
            TemplateTerm::var("tick"),
        ))
}

#[tokio::test(start_paused = true)]
async fn test_cancel_stops_unbounded_iterator() {
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(ticking()),
        Vec::new(),
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context(),
    )
    .expect("valid pipeline");

    tokio::time::sleep(Duration::from_millis(55)).await;
    assert!(!handle.is_finished());
    handle.cancel();

    assert_eq!(handle.wait().await, Err(GenerateError::Cancelled));
    assert!(!sink.is_empty());
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(sink.facts_after_finish(), 0);

    // Nothing arrives once the run is over.
    let emitted = sink.len();
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(sink.len(), emitted);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_before_first_tick() {
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(ticking()),
        Vec::new(),
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context(),
    )
    .expect("valid pipeline");
    let token = handle.cancellation_token();
    token.cancel();

    assert_eq!(handle.wait().await, Err(GenerateError::Cancelled));
    assert!(sink.is_empty());
    assert_eq!(sink.start_count(), 1);
    assert_eq!(sink.finish_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_bounded_periodic_finishes_without_cancel() {
    let pipeline = Pipeline::new("three ticks")
        .stage(IteratorStage::new(
            vec![Variable::new("tick")],
            PERIODIC,
            vec![
                Expression::constant(Value::integer(10)),
                Expression::constant(Value::integer(3)),
            ],
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("t"),
            TemplateTerm::iri(ex("tick")),
            TemplateTerm::var("tick"),
        ));

    let (sink, result) = run_collect(pipeline, Vec::new(), context()).await;
    let summary = result.expect("run succeeds");
    assert_eq!(integer_objects(&sink.facts(), &ex("tick")), vec![0, 1, 2]);
    assert_eq!(summary.rounds, 3);
}

#[tokio::test(start_paused = true)]
async fn test_in_flight_branch_completes_after_cancel() {
    let sources = InMemorySourceFetcher::new()
        .with_document(ex("a"), Document::new("alpha", None))
        .with_document(ex("b"), Document::new("beta", None))
        .with_delay(Duration::from_millis(100));
    let pipeline = Pipeline::new("slow fetch")
        .stage(SourceStage::new(Variable::new("doc"), Expression::var("page")))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::var("page"),
            TemplateTerm::iri(ex("content")),
            TemplateTerm::var("doc"),
        ));
    let initial = vec![
        binding(&[("page", Value::iri(ex("a")))]),
        binding(&[("page", Value::iri(ex("b")))]),
    ];
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(pipeline),
        initial,
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context().with_sources(sources),
    )
    .expect("valid pipeline");

    // Both fetches are underway.
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(sink.is_empty());
    handle.cancel();

    assert_eq!(handle.wait().await, Err(GenerateError::Cancelled));
    let mut contents: Vec<String> = sink
        .facts()
        .iter()
        .filter_map(|fact| fact.object().lexical_form().map(str::to_owned))
        .collect();
    contents.sort();
    assert_eq!(contents, vec!["alpha", "beta"]);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(sink.facts_after_finish(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_rounds_force_closed_by_cancel_are_discarded() {
    // The slow producer keeps every round of the fast one open.
    let pipeline = Pipeline::new("uneven ticks")
        .stage(IteratorStage::new(
            vec![Variable::new("tick")],
            PERIODIC,
            vec![Expression::var("period")],
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("t"),
            TemplateTerm::iri(ex("tick")),
            TemplateTerm::var("tick"),
        ));
    let initial = vec![
        binding(&[("period", Value::integer(10))]),
        binding(&[("period", Value::integer(1_000_000))]),
    ];
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(pipeline),
        initial,
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context(),
    )
    .expect("valid pipeline");

    tokio::time::sleep(Duration::from_millis(35)).await;
    handle.cancel();

    assert_eq!(handle.wait().await, Err(GenerateError::Cancelled));
    assert!(sink.is_empty());
    assert_eq!(sink.finish_count(), 1);
}
