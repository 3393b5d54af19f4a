//! Static checks run before anything is spawned.
//!
//! A pipeline is rejected when:
//! - a stage binds a variable that is already bound by the initial bindings
//!   or an earlier stage
//! - an iterator stage names an unregistered function, passes it a wrong
//!   number of arguments, or binds no variables
//! - a template calls an unregistered pipeline
//!
//! Called pipelines are checked with their parameters as the bound set.
//! Each distinct (pipeline, parameter set) call signature is checked once, so
//! recursive pipelines terminate and every signature is covered.

use std::collections::HashSet;

use super::context::ExecutionContext;
use super::definition::Pipeline;
use crate::binding::Binding;
use crate::error::{ConfigurationError, GenerateError};
use crate::stage::Stage;
use crate::types::Variable;

/// Check a pipeline and everything it calls.
pub fn validate(
    pipeline: &Pipeline,
    initial: &[Binding],
    context: &ExecutionContext,
) -> Result<(), GenerateError> {
    let bound: HashSet<Variable> = initial
        .iter()
        .flat_map(|binding| binding.variables().cloned())
        .collect();
    let mut visited = HashSet::from([signature(pipeline.name(), bound.iter())]);
    validate_pipeline(pipeline, bound, context, &mut visited)
}

/// A pipeline name with its sorted bound variables.
type Signature = (String, Vec<Variable>);

fn signature<'a>(name: &str, bound: impl Iterator<Item = &'a Variable>) -> Signature {
    let mut variables: Vec<Variable> = bound.cloned().collect();
    variables.sort();
    variables.dedup();
    (name.to_owned(), variables)
}

fn validate_pipeline(
    pipeline: &Pipeline,
    mut bound: HashSet<Variable>,
    context: &ExecutionContext,
    visited: &mut HashSet<Signature>,
) -> Result<(), GenerateError> {
    for stage in pipeline.stages() {
        if let Stage::Iterator(iterator) = stage {
            if iterator.variables.is_empty() {
                return Err(ConfigurationError::NoIteratorVariables {
                    function: iterator.function.clone(),
                }
                .into());
            }
            let function = context
                .functions
                .lookup(&iterator.function)
                .ok_or_else(|| ConfigurationError::UnknownFunction(iterator.function.clone()))?;
            function
                .check_arity(iterator.arguments.len())
                .map_err(|message| ConfigurationError::FunctionArity {
                    function: iterator.function.clone(),
                    message,
                })?;
        }
        for variable in stage.bound_variables() {
            if !bound.insert(variable.clone()) {
                return Err(ConfigurationError::Rebinding {
                    variable: variable.clone(),
                }
                .into());
            }
        }
    }

    for nested in pipeline.generate_template().nested_invocations() {
        let child = context
            .pipelines
            .get(&nested.name)?
            .ok_or_else(|| ConfigurationError::UnknownPipeline(nested.name.clone()))?;
        if visited.insert(signature(&nested.name, nested.parameters.iter())) {
            let parameters = nested.parameters.iter().cloned().collect();
            validate_pipeline(&child, parameters, context, visited)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::expression::Expression;
    use crate::functions::RANGE;
    use crate::output::{GenerateTemplate, NestedInvocation};
    use crate::stage::{BindStage, IteratorStage};
    use crate::types::Value;
    use tokio::runtime::Handle;

    fn context() -> ExecutionContext {
        ExecutionContext::new(Handle::current(), EngineConfig::default())
    }

    fn range_stage(variable: &str) -> IteratorStage {
        IteratorStage::new(
            vec![Variable::new(variable)],
            RANGE,
            vec![
                Expression::constant(Value::integer(0)),
                Expression::constant(Value::integer(3)),
            ],
        )
    }

    #[tokio::test]
    async fn test_valid_pipeline() {
        let pipeline = Pipeline::new("ok").stage(range_stage("x")).stage(BindStage::new(
            Variable::new("y"),
            Expression::var("x"),
        ));
        assert!(validate(&pipeline, &[], &context()).is_ok());
    }

    #[tokio::test]
    async fn test_rebinding_detected() {
        let pipeline = Pipeline::new("bad").stage(range_stage("x")).stage(BindStage::new(
            Variable::new("x"),
            Expression::constant(Value::integer(1)),
        ));
        assert_eq!(
            validate(&pipeline, &[], &context()),
            Err(GenerateError::Configuration(ConfigurationError::Rebinding {
                variable: Variable::new("x"),
            }))
        );
    }

    #[tokio::test]
    async fn test_rebinding_initial_variable_detected() {
        let pipeline = Pipeline::new("bad").stage(range_stage("x"));
        let initial = Binding::new()
            .extend(Variable::new("x"), Value::integer(1))
            .expect("free");
        assert!(validate(&pipeline, &[initial], &context()).is_err());
    }

    #[tokio::test]
    async fn test_unknown_function_and_arity() {
        let unknown = Pipeline::new("bad").stage(IteratorStage::new(
            vec![Variable::new("x")],
            "http://ex.org/none",
            Vec::new(),
        ));
        assert!(matches!(
            validate(&unknown, &[], &context()),
            Err(GenerateError::Configuration(ConfigurationError::UnknownFunction(_)))
        ));

        let arity = Pipeline::new("bad").stage(IteratorStage::new(
            vec![Variable::new("x")],
            RANGE,
            vec![Expression::constant(Value::integer(1))],
        ));
        assert!(matches!(
            validate(&arity, &[], &context()),
            Err(GenerateError::Configuration(ConfigurationError::FunctionArity { .. }))
        ));
    }

    #[tokio::test]
    async fn test_iterator_without_variables() {
        let pipeline = Pipeline::new("bad").stage(IteratorStage::new(Vec::new(), RANGE, Vec::new()));
        assert!(matches!(
            validate(&pipeline, &[], &context()),
            Err(GenerateError::Configuration(ConfigurationError::NoIteratorVariables { .. }))
        ));
    }

    #[tokio::test]
    async fn test_nested_pipelines_checked() {
        let context = context();
        let caller = Pipeline::new("caller")
            .stage(range_stage("x"))
            .template(GenerateTemplate::new().nested(NestedInvocation::new("child", &["x"])));
        assert_eq!(
            validate(&caller, &[], &context),
            Err(GenerateError::Configuration(ConfigurationError::UnknownPipeline(
                "child".to_owned()
            )))
        );

        // The child rebinds its own parameter.
        context
            .pipelines()
            .register(Pipeline::new("child").stage(range_stage("x")))
            .expect("healthy");
        assert!(matches!(
            validate(&caller, &[], &context),
            Err(GenerateError::Configuration(ConfigurationError::Rebinding { .. }))
        ));
    }

    #[tokio::test]
    async fn test_every_call_signature_checked() {
        let context = context();
        context
            .pipelines()
            .register(Pipeline::new("child").stage(range_stage("y")))
            .expect("healthy");
        // Only the second call passes `?y`, which the child binds again.
        let caller = Pipeline::new("caller")
            .stage(range_stage("x"))
            .stage(range_stage("y"))
            .template(
                GenerateTemplate::new()
                    .nested(NestedInvocation::new("child", &["x"]))
                    .nested(NestedInvocation::new("child", &["x", "y"])),
            );
        assert_eq!(
            validate(&caller, &[], &context),
            Err(GenerateError::Configuration(ConfigurationError::Rebinding {
                variable: Variable::new("y"),
            }))
        );
    }

    #[tokio::test]
    async fn test_recursive_pipeline_terminates() {
        let context = context();
        context
            .pipelines()
            .register(
                Pipeline::new("self")
                    .template(GenerateTemplate::new().nested(NestedInvocation::new("self", &[]))),
            )
            .expect("healthy");
        let top = context
            .pipelines()
            .get("self")
            .expect("healthy")
            .expect("registered");
        assert!(validate(&top, &[], &context).is_ok());
    }
}
