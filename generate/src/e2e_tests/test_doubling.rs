//! `?x` in 1..4, `?y = ?x * 2`, one keyed blank node per row.

use std::collections::HashSet;

use crate::e2e_tests::helpers::*;
use crate::expression::Expression;
use crate::output::{GenerateTemplate, TemplateTerm};
use crate::pipeline::Pipeline;
use crate::stage::BindStage;
use crate::types::{Value, Variable};

fn doubling() -> Pipeline {
    Pipeline::new("double")
        .stage(range("x", 1, 4))
        .stage(BindStage::new(
            Variable::new("y"),
            Expression::multiply(Expression::var("x"), Expression::constant(Value::integer(2))),
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::keyed_blank("n", &["x"]),
            TemplateTerm::iri(ex("double")),
            TemplateTerm::var("y"),
        ))
}

#[tokio::test]
async fn test_doubling_emits_one_fact_per_row() {
    let (sink, result) = run_collect(doubling(), Vec::new(), context()).await;
    let summary = result.expect("run succeeds");

    let facts = sink.facts();
    assert_eq!(facts.len(), 3);
    assert_eq!(integer_objects(&facts, &ex("double")), vec![2, 4, 6]);

    let subjects: HashSet<_> = facts.iter().map(|f| f.subject().clone()).collect();
    assert_eq!(subjects.len(), 3);
    assert!(subjects.iter().all(Value::is_blank));

    assert_eq!(summary.facts_emitted, 3);
    assert_eq!(summary.bindings_materialized, 3);
    assert_eq!(summary.rounds, 1);
}

#[tokio::test]
async fn test_sink_lifecycle() {
    let (sink, result) = run_collect(doubling(), Vec::new(), context()).await;
    result.expect("run succeeds");
    assert_eq!(sink.start_count(), 1);
    assert_eq!(sink.finish_count(), 1);
    assert_eq!(sink.facts_after_finish(), 0);
}

#[tokio::test]
async fn test_independent_runs_do_not_share_blank_nodes() {
    let (first, _) = run_collect(doubling(), Vec::new(), context()).await;
    let (second, _) = run_collect(doubling(), Vec::new(), context()).await;
    let first: HashSet<_> = first.facts().iter().map(|f| f.subject().clone()).collect();
    let second: HashSet<_> = second.facts().iter().map(|f| f.subject().clone()).collect();
    assert!(first.is_disjoint(&second));
}
