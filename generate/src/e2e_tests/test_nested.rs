//! Templates calling other pipelines.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::e2e_tests::helpers::*;
use crate::output::{GenerateTemplate, NestedInvocation, TemplateTerm};
use crate::pipeline::{Pipeline, PipelineRegistry};
use crate::types::{Triple, Value};

fn child() -> Pipeline {
    Pipeline::new("child").template(GenerateTemplate::new().triple(
        TemplateTerm::keyed_blank("n", &["x"]),
        TemplateTerm::iri(ex("child")),
        TemplateTerm::var("x"),
    ))
}

fn parent(call: NestedInvocation) -> Pipeline {
    Pipeline::new("parent")
        .stage(range("x", 0, 2))
        .stage(range("unused", 0, 2))
        .template(
            GenerateTemplate::new()
                .triple(
                    TemplateTerm::keyed_blank("n", &["x"]),
                    TemplateTerm::iri(ex("parent")),
                    TemplateTerm::var("x"),
                )
                .nested(call),
        )
}

/// `?x` to subject, for the facts of one predicate.
fn subjects_by_x(facts: &[Triple], predicate: &str) -> HashMap<i64, Value> {
    facts
        .iter()
        .filter(|fact| fact.predicate().as_iri() == Some(predicate))
        .filter_map(|fact| Some((fact.object().as_integer()?, fact.subject().clone())))
        .collect()
}

fn registry() -> Arc<PipelineRegistry> {
    let registry = Arc::new(PipelineRegistry::new());
    registry.register(child()).expect("healthy registry");
    registry
}

#[tokio::test]
async fn test_nested_call_gets_a_fresh_scope() {
    let context = context().with_pipelines(registry());
    let (sink, result) = run_collect(
        parent(NestedInvocation::new("child", &["x"])),
        Vec::new(),
        context,
    )
    .await;
    result.expect("run succeeds");

    let facts = sink.facts();
    let parents = subjects_by_x(&facts, &ex("parent"));
    let children = subjects_by_x(&facts, &ex("child"));
    assert_eq!(parents.len(), 2);
    assert_eq!(children.len(), 2);
    for (x, subject) in &children {
        assert_ne!(parents.get(x), Some(subject));
    }
    // Rows are projected on `?x` and deduplicated before the call.
    assert_eq!(integer_objects(&facts, &ex("child")), vec![0, 1]);
}

#[tokio::test]
async fn test_nested_call_can_share_the_caller_scope() {
    let context = context().with_pipelines(registry());
    let (sink, result) = run_collect(
        parent(NestedInvocation::new("child", &["x"]).sharing_scope()),
        Vec::new(),
        context,
    )
    .await;
    result.expect("run succeeds");

    let facts = sink.facts();
    let parents = subjects_by_x(&facts, &ex("parent"));
    let children = subjects_by_x(&facts, &ex("child"));
    assert_eq!(parents, children);
}

#[tokio::test]
async fn test_recursion_stops_at_nesting_limit() {
    let registry = Arc::new(PipelineRegistry::new());
    let recursive = registry
        .register(Pipeline::new("again").template(
            GenerateTemplate::new()
                .triple(
                    TemplateTerm::row_blank("visit"),
                    TemplateTerm::iri(ex("visit")),
                    TemplateTerm::var("x"),
                )
                .nested(NestedInvocation::new("again", &["x"])),
        ))
        .expect("healthy registry");
    let config = EngineConfig {
        max_nesting_depth: 2,
        ..EngineConfig::default()
    };
    let context = context_with(config).with_pipelines(registry);

    let sink = Arc::new(crate::output::CollectingSink::new());
    let handle = crate::pipeline::run(
        recursive,
        vec![binding(&[("x", Value::integer(7))])],
        crate::BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context,
    )
    .expect("recursion is allowed");
    let summary = handle.wait().await.expect("run succeeds");

    // Depths 0, 1 and 2.
    assert_eq!(integer_objects(&sink.facts(), &ex("visit")), vec![7, 7, 7]);
    assert_eq!(summary.facts_emitted, 3);
    assert_eq!(sink.finish_count(), 1);
}
