//! A pipeline whose rows come from a pattern over an in-memory graph.

use std::sync::Arc;

use crate::e2e_tests::helpers::*;
use crate::output::{GenerateTemplate, TemplateTerm};
use crate::pipeline::Pipeline;
use crate::query::{Filter, Graph, GraphEvaluator, Pattern, PatternTerm, SelectQuery};
use crate::types::{Triple, Value, Variable};

fn graph() -> Graph {
    let knows = |s: &str, o: &str| {
        Triple::new(Value::iri(ex(s)), Value::iri(ex("knows")), Value::iri(ex(o))).expect("valid triple")
    };
    let age = |s: &str, n: i64| {
        Triple::new(Value::iri(ex(s)), Value::iri(ex("age")), Value::integer(n)).expect("valid triple")
    };
    [
        knows("alice", "bob"),
        knows("alice", "carol"),
        knows("bob", "carol"),
        age("bob", 30),
        age("carol", 17),
    ]
    .into_iter()
    .collect()
}

fn friends_of(person: &str) -> Vec<crate::Binding> {
    vec![binding(&[("person", Value::iri(ex(person)))])]
}

#[tokio::test]
async fn test_pattern_extends_bindings() {
    let pipeline = Pipeline::new("friends")
        .select(SelectQuery::new().where_pattern(Pattern::new(
            PatternTerm::var("person"),
            PatternTerm::iri(ex("knows")),
            PatternTerm::var("friend"),
        )))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::var("friend"),
            TemplateTerm::iri(ex("knownBy")),
            TemplateTerm::var("person"),
        ));
    let context = context().with_evaluator(GraphEvaluator::new(Arc::new(graph())));

    let (sink, result) = run_collect(pipeline, friends_of("alice"), context).await;
    result.expect("run succeeds");

    let mut friends: Vec<String> = sink
        .facts()
        .iter()
        .filter_map(|fact| fact.subject().as_iri().map(str::to_owned))
        .collect();
    friends.sort();
    assert_eq!(friends, vec![ex("bob"), ex("carol")]);
}

#[tokio::test]
async fn test_pattern_filters_and_projects() {
    let pipeline = Pipeline::new("adult friends")
        .select(
            SelectQuery::new()
                .where_pattern(Pattern::new(
                    PatternTerm::var("person"),
                    PatternTerm::iri(ex("knows")),
                    PatternTerm::var("friend"),
                ))
                .where_pattern(Pattern::new(
                    PatternTerm::var("friend"),
                    PatternTerm::iri(ex("age")),
                    PatternTerm::var("age"),
                ))
                .filter(Filter::new(Variable::new("age"), |age| {
                    age.and_then(Value::as_integer).is_some_and(|n| n >= 18)
                }))
                .find("friend"),
        )
        .template(
            GenerateTemplate::new()
                .triple(
                    TemplateTerm::var("friend"),
                    TemplateTerm::iri(ex("isAdult")),
                    TemplateTerm::Constant(Value::boolean(true)),
                )
                .triple(
                    TemplateTerm::var("friend"),
                    TemplateTerm::iri(ex("adultFriendOf")),
                    TemplateTerm::var("person"),
                ),
        );
    let context = context().with_evaluator(GraphEvaluator::new(Arc::new(graph())));

    let (sink, result) = run_collect(pipeline, friends_of("alice"), context).await;
    let summary = result.expect("run succeeds");

    // Carol is filtered out. `?person` is projected away, so the second
    // triple cannot complete.
    let facts = sink.facts();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].subject(), &Value::iri(ex("bob")));
    assert_eq!(summary.bindings_materialized, 1);
    assert_eq!(summary.triples_skipped, 1);
}
