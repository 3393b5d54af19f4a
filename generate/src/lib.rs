// Life of a run:
// 1. Caller builds a pipeline (stages, optional pattern, fact template)
// 2. `pipeline::run` validates it and everything it calls
// 3. Executor threads bindings through the stages:
//     - Bind / source: one task per pending binding
//     - Iterator: one producer per pending binding, regrouped into rounds
//       by a batch synchronizer
// 4. After the last stage:
//     - Evaluator resolves the pattern against the accumulated bindings
//     - Materializer emits facts through the blank node scope
//     - Nested pipelines run on the projected rows
// 5. Sink gets `finish` once every branch is done
//
// System components:
//  - Binding / blank node scope
//  - Stages and their collaborators (functions, sources, evaluator)
//  - Batch synchronizer actor
//  - Recursive executor and output materializer

// Tests unwrap freely; production code propagates.
#![cfg_attr(test, allow(clippy::expect_used, clippy::unwrap_used))]

pub mod binding;
pub mod bnode;
pub mod config;
pub mod error;
pub mod expression;
pub mod functions;
pub mod output;
pub mod pipeline;
pub mod query;
pub mod source;
pub mod stage;
pub mod types;

mod e2e_tests;
#[cfg(test)]
mod simulation;

pub use binding::Binding;
pub use bnode::BlankNodeScope;
pub use config::EngineConfig;
pub use error::{ConfigurationError, EvaluationError, GenerateError, SynchronizerError};
pub use expression::Expression;
pub use pipeline::{ExecutionContext, Pipeline, PipelineRegistry, RunHandle, RunSummary, run};
pub use stage::{BindStage, IteratorStage, SourceStage, Stage};
pub use types::{Triple, Value, Variable};
