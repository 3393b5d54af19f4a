//! Pipeline execution.
//!
//! `run` is the entry point: it validates the pipeline, spawns the executor
//! on the context's runtime and returns a `RunHandle`.
//!
//! # Invariants
//!
//! - Configuration errors are returned by `run` before anything is spawned.
//! - The sink receives `start` before any fact and `finish` after every
//!   branch of the run, nested invocations included, has completed. No fact
//!   follows `finish`.
//! - Independent runs share no mutable state except the pipeline registry.

pub mod batch;
mod context;
mod definition;
mod executor;
mod handle;
mod plan;
pub mod task;

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub use batch::{BatchSynchronizer, ProducerHandle, ProducerId, Round, RoundBook, SyncReport};
pub use context::ExecutionContext;
pub use definition::{Pipeline, PipelineRegistry};
pub use handle::{RunHandle, RunSummary};
pub use plan::validate;

use crate::binding::Binding;
use crate::bnode::BlankNodeScope;
use crate::error::GenerateError;
use crate::output::OutputSink;
use executor::{Invocation, PipelineExecutor};
use task::Pending;

/// Start a top-level invocation of `pipeline`.
///
/// An empty `initial` set runs the pipeline once from the empty binding.
///
/// # Errors
///
/// Returns `GenerateError::Configuration` if the pipeline, or a pipeline it
/// calls, is malformed.
pub fn run(
    pipeline: Arc<Pipeline>,
    initial: Vec<Binding>,
    scope: BlankNodeScope,
    sink: Arc<dyn OutputSink>,
    context: ExecutionContext,
) -> Result<RunHandle, GenerateError> {
    validate(&pipeline, &initial, &context)?;

    let cancel = CancellationToken::new();
    let runtime = context.runtime.clone();
    let executor = Arc::new(PipelineExecutor::new(context, Arc::clone(&sink), cancel.clone()));
    let initial = if initial.is_empty() {
        vec![Binding::new()]
    } else {
        initial
    };

    let token = cancel.clone();
    let task = runtime.spawn(async move {
        let cancel = token;
        let name = pipeline.name().to_owned();
        info!(pipeline = %name, bindings = initial.len(), scope = scope.id(), "run started");
        sink.start();

        let invocation = Arc::new(Invocation::top_level(pipeline, scope));
        let pending = initial.into_iter().map(Pending::Ready).collect();
        let mut result = Arc::clone(&executor).execute(invocation, 0, pending).await;
        // A producer stopped by cancellation ends its branch quietly.
        if result.is_ok() && cancel.is_cancelled() {
            result = Err(GenerateError::Cancelled);
        }

        sink.finish();
        let summary = executor.summary();
        match result {
            Ok(()) => {
                info!(
                    pipeline = %name,
                    rows = summary.bindings_materialized,
                    facts = summary.facts_emitted,
                    rounds = summary.rounds,
                    "run finished"
                );
                Ok(summary)
            }
            Err(e) if e.is_cancelled() => {
                info!(
                    pipeline = %name,
                    facts = summary.facts_emitted,
                    discarded = summary.bindings_discarded,
                    "run cancelled"
                );
                Err(e)
            }
            Err(e) => {
                warn!(pipeline = %name, error = %e, "run failed");
                Err(e)
            }
        }
    });

    Ok(RunHandle::new(cancel, task))
}
