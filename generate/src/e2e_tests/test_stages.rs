//! Bind and source stages: at most one output per input binding.

use std::time::Duration;

use crate::e2e_tests::helpers::*;
use crate::expression::Expression;
use crate::output::{GenerateTemplate, TemplateTerm};
use crate::pipeline::Pipeline;
use crate::source::{Document, InMemorySourceFetcher};
use crate::stage::{BindStage, SourceStage};
use crate::types::{Value, Variable};

fn fetcher() -> InMemorySourceFetcher {
    InMemorySourceFetcher::new()
        .with_document(ex("a"), Document::new("alpha", Some("text/plain")))
        .with_document(ex("b"), Document::new("beta", None))
        .with_delay(Duration::from_millis(5))
}

#[tokio::test]
async fn test_source_and_bind_never_add_rows() {
    let pipeline = Pipeline::new("fetch")
        .stage(SourceStage::new(Variable::new("doc"), Expression::var("page")))
        .stage(BindStage::new(
            Variable::new("label"),
            Expression::concat(vec![
                Expression::str(Expression::var("doc")),
                Expression::constant(Value::string("!")),
            ]),
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::var("page"),
            TemplateTerm::iri(ex("label")),
            TemplateTerm::var("label"),
        ));
    let initial = vec![
        binding(&[("page", Value::iri(ex("a")))]),
        binding(&[("page", Value::iri(ex("b")))]),
        binding(&[("page", Value::iri(ex("missing")))]),
        // Not an IRI: dropped by the source stage.
        binding(&[("page", Value::string("a"))]),
    ];

    let (sink, result) = run_collect(pipeline, initial, context().with_sources(fetcher())).await;
    let summary = result.expect("run succeeds");

    let mut labels: Vec<String> = sink
        .facts()
        .iter()
        .filter_map(|fact| fact.object().lexical_form().map(str::to_owned))
        .collect();
    labels.sort();
    assert_eq!(labels, vec!["alpha!", "beta!"]);
    assert_eq!(summary.bindings_materialized, 2);
}

#[tokio::test]
async fn test_source_binds_media_type_datatype() {
    let pipeline = Pipeline::new("typed")
        .stage(SourceStage::new(Variable::new("doc"), Expression::var("page")))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::var("page"),
            TemplateTerm::iri(ex("content")),
            TemplateTerm::var("doc"),
        ));
    let initial = vec![binding(&[("page", Value::iri(ex("a")))])];

    let (sink, result) = run_collect(pipeline, initial, context().with_sources(fetcher())).await;
    result.expect("run succeeds");
    let facts = sink.facts();
    let literal = facts[0].object().as_literal().expect("literal");
    assert_eq!(literal.lexical(), "alpha");
    assert_eq!(
        literal.datatype(),
        "http://www.iana.org/assignments/media-types/text/plain"
    );
}

#[tokio::test]
async fn test_failed_bind_drops_only_its_binding() {
    let pipeline = Pipeline::new("times ten")
        .stage(BindStage::new(
            Variable::new("z"),
            Expression::multiply(Expression::var("x"), Expression::constant(Value::integer(10))),
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::row_blank("r"),
            TemplateTerm::iri(ex("z")),
            TemplateTerm::var("z"),
        ));
    let initial = vec![
        binding(&[("x", Value::integer(1))]),
        binding(&[("x", Value::integer(2))]),
        binding(&[("w", Value::integer(3))]),
        binding(&[("x", Value::string("three"))]),
    ];

    let (sink, result) = run_collect(pipeline, initial, context()).await;
    result.expect("per-binding failures are not fatal");
    assert_eq!(integer_objects(&sink.facts(), &ex("z")), vec![10, 20]);
}

#[tokio::test]
async fn test_file_sources_are_read_from_the_source_directory() {
    let dir = tempfile::tempdir().expect("temp dir");
    std::fs::write(dir.path().join("people.csv"), "name\nada\n").expect("write");
    let config = crate::config::EngineConfig {
        source_directory: dir.path().to_path_buf(),
        ..crate::config::EngineConfig::default()
    };
    let pipeline = Pipeline::new("file")
        .stage(SourceStage::new(
            Variable::new("doc"),
            Expression::constant(Value::iri("file:///people.csv")),
        ))
        .template(GenerateTemplate::new().triple(
            TemplateTerm::iri(ex("people")),
            TemplateTerm::iri(ex("content")),
            TemplateTerm::var("doc"),
        ));

    let (sink, result) = run_collect(pipeline, Vec::new(), context_with(config)).await;
    result.expect("run succeeds");
    let facts = sink.facts();
    assert_eq!(facts.len(), 1);
    assert_eq!(facts[0].object().lexical_form(), Some("name\nada\n"));
}
