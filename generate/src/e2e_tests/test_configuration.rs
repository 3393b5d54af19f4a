//! Malformed pipelines are rejected by `run` before anything starts.

use std::sync::Arc;

use crate::e2e_tests::helpers::*;
use crate::error::{ConfigurationError, GenerateError};
use crate::expression::Expression;
use crate::output::{CollectingSink, GenerateTemplate, NestedInvocation};
use crate::pipeline::{Pipeline, RunHandle, run};
use crate::stage::{BindStage, IteratorStage};
use crate::types::{Value, Variable};
use crate::{Binding, BlankNodeScope};

fn start(pipeline: Pipeline, initial: Vec<Binding>) -> (Arc<CollectingSink>, Result<RunHandle, GenerateError>) {
    let sink = Arc::new(CollectingSink::new());
    let handle = run(
        Arc::new(pipeline),
        initial,
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context(),
    );
    (sink, handle)
}

#[tokio::test]
async fn test_unknown_function() {
    let pipeline = Pipeline::new("bad").stage(IteratorStage::new(
        vec![Variable::new("x")],
        ex("fn/nope"),
        Vec::new(),
    ));
    let (sink, result) = start(pipeline, Vec::new());
    assert!(matches!(
        result,
        Err(GenerateError::Configuration(ConfigurationError::UnknownFunction(name))) if name == ex("fn/nope")
    ));
    assert_eq!(sink.start_count(), 0);
}

#[tokio::test]
async fn test_wrong_arity() {
    let pipeline = Pipeline::new("bad").stage(IteratorStage::new(
        vec![Variable::new("x")],
        crate::functions::RANGE,
        vec![Expression::constant(Value::integer(1))],
    ));
    let (_, result) = start(pipeline, Vec::new());
    assert!(matches!(
        result,
        Err(GenerateError::Configuration(ConfigurationError::FunctionArity { .. }))
    ));
}

#[tokio::test]
async fn test_rebinding_an_initial_variable() {
    let pipeline = Pipeline::new("bad").stage(BindStage::new(
        Variable::new("x"),
        Expression::constant(Value::integer(2)),
    ));
    let (sink, result) = start(pipeline, vec![binding(&[("x", Value::integer(1))])]);
    assert!(matches!(
        result,
        Err(GenerateError::Configuration(ConfigurationError::Rebinding { variable })) if variable == Variable::new("x")
    ));
    assert_eq!(sink.finish_count(), 0);
}

#[tokio::test]
async fn test_unknown_nested_pipeline() {
    let pipeline = Pipeline::new("caller")
        .stage(range("x", 0, 1))
        .template(GenerateTemplate::new().nested(NestedInvocation::new("ghost", &["x"])));
    let (_, result) = start(pipeline, Vec::new());
    assert!(matches!(
        result,
        Err(GenerateError::Configuration(ConfigurationError::UnknownPipeline(name))) if name == "ghost"
    ));
}

#[tokio::test]
async fn test_second_call_signature_checked() {
    let context = context();
    context
        .pipelines()
        .register(Pipeline::new("child").stage(BindStage::new(
            Variable::new("y"),
            Expression::constant(Value::integer(0)),
        )))
        .expect("healthy");
    // The first call leaves `?y` free for the child, the second does not.
    let pipeline = Pipeline::new("caller")
        .stage(range("x", 0, 2))
        .stage(range("y", 0, 2))
        .template(
            GenerateTemplate::new()
                .nested(NestedInvocation::new("child", &["x"]))
                .nested(NestedInvocation::new("child", &["x", "y"])),
        );
    let sink = Arc::new(CollectingSink::new());
    let result = run(
        Arc::new(pipeline),
        Vec::new(),
        BlankNodeScope::new(),
        Arc::clone(&sink) as Arc<_>,
        context,
    );
    assert!(matches!(
        result,
        Err(GenerateError::Configuration(ConfigurationError::Rebinding { variable })) if variable == Variable::new("y")
    ));
    assert_eq!(sink.start_count(), 0);
    assert!(sink.is_empty());
}
