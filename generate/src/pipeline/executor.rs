//! Recursive driver of one run.
//!
//! `execute(invocation, i, pending)` advances pending bindings through stage
//! `i` and everything after it:
//! - bind and source stages spawn one task per pending binding and continue
//!   with the pending results right away
//! - an iterator stage starts a batch synchronizer with one producer per
//!   pending binding and continues with every round it closes
//! - past the last stage, every pending binding is awaited, the evaluator
//!   resolves the pattern and the rows are materialized
//!
//! The returned future resolves only after every branch below it resolved.
//! Cancellation is checked at every entry.
//!
//! A round force-closed because the run was cancelled would start a new
//! branch, so it is discarded instead. Its bindings are counted in
//! `RunSummary::bindings_discarded` and logged at `warn`.

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use futures::FutureExt;
use futures::StreamExt;
use futures::future::BoxFuture;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::batch::{BatchSynchronizer, ProducerHandle, ProducerId};
use super::context::ExecutionContext;
use super::definition::Pipeline;
use super::handle::RunSummary;
use super::task::{Failures, Pending, join_all, map_pending, resolve_all};
use crate::binding::Binding;
use crate::bnode::BlankNodeScope;
use crate::error::{ConfigurationError, GenerateError};
use crate::functions::IteratorFunction;
use crate::output::{OutputMaterializer, OutputSink};
use crate::stage::{IteratorStage, Stage};

/// One (possibly nested) invocation of a pipeline.
#[derive(Debug)]
pub struct Invocation {
    pub pipeline: Arc<Pipeline>,
    pub scope: BlankNodeScope,
    /// 0 for the top-level invocation.
    pub depth: usize,
}

impl Invocation {
    #[must_use]
    pub const fn top_level(pipeline: Arc<Pipeline>, scope: BlankNodeScope) -> Self {
        Self {
            pipeline,
            scope,
            depth: 0,
        }
    }
}

#[derive(Debug, Default)]
struct Stats {
    bindings_materialized: AtomicUsize,
    facts_emitted: AtomicUsize,
    triples_skipped: AtomicUsize,
    bindings_discarded: AtomicUsize,
    rounds: AtomicU64,
}

pub struct PipelineExecutor {
    context: ExecutionContext,
    sink: Arc<dyn OutputSink>,
    cancel: CancellationToken,
    stats: Stats,
}

impl PipelineExecutor {
    #[must_use]
    pub fn new(context: ExecutionContext, sink: Arc<dyn OutputSink>, cancel: CancellationToken) -> Self {
        Self {
            context,
            sink,
            cancel,
            stats: Stats::default(),
        }
    }

    #[must_use]
    pub fn summary(&self) -> RunSummary {
        RunSummary {
            bindings_materialized: self.stats.bindings_materialized.load(Ordering::Relaxed),
            facts_emitted: self.stats.facts_emitted.load(Ordering::Relaxed),
            triples_skipped: self.stats.triples_skipped.load(Ordering::Relaxed),
            bindings_discarded: self.stats.bindings_discarded.load(Ordering::Relaxed),
            rounds: self.stats.rounds.load(Ordering::Relaxed),
        }
    }

    /// Advance `pending` through stage `index` and the stages after it.
    pub fn execute(
        self: Arc<Self>,
        invocation: Arc<Invocation>,
        index: usize,
        pending: Vec<Pending>,
    ) -> BoxFuture<'static, Result<(), GenerateError>> {
        async move {
            if self.cancel.is_cancelled() {
                debug!(pipeline = %invocation.pipeline.name(), stage = index, "cancelled before stage");
                return Err(GenerateError::Cancelled);
            }
            let Some(stage) = invocation.pipeline.stages().get(index) else {
                return self.complete(invocation, pending).await;
            };
            debug!(
                pipeline = %invocation.pipeline.name(),
                stage = index,
                kind = stage.kind(),
                pending = pending.len(),
                "entering stage"
            );

            match stage {
                Stage::Bind(stage) => {
                    let stage = Arc::new(stage.clone());
                    let next = map_pending(&self.context.runtime, pending, &self.cancel, move |binding| {
                        let stage = Arc::clone(&stage);
                        async move { stage.apply(&binding) }
                    })?;
                    self.execute(invocation, index + 1, next).await
                }
                Stage::Source(stage) => {
                    let stage = Arc::new(stage.clone());
                    let sources = Arc::clone(&self.context.sources);
                    let next = map_pending(&self.context.runtime, pending, &self.cancel, move |binding| {
                        let stage = Arc::clone(&stage);
                        let sources = Arc::clone(&sources);
                        async move { stage.apply(&binding, sources.as_ref()).await }
                    })?;
                    self.execute(invocation, index + 1, next).await
                }
                Stage::Iterator(stage) => {
                    let stage = Arc::new(stage.clone());
                    self.iterate(invocation, index, stage, pending).await
                }
            }
        }
        .boxed()
    }

    /// Run one producer per pending binding and continue with every round.
    async fn iterate(
        self: Arc<Self>,
        invocation: Arc<Invocation>,
        index: usize,
        stage: Arc<IteratorStage>,
        pending: Vec<Pending>,
    ) -> Result<(), GenerateError> {
        let function = self
            .context
            .functions
            .lookup(&stage.function)
            .ok_or_else(|| ConfigurationError::UnknownFunction(stage.function.clone()))?;
        let runtime = self.context.runtime.clone();
        let (synchronizer, mut rounds) = BatchSynchronizer::spawn(
            &runtime,
            pending.len(),
            self.context.config.contribution_buffer,
            self.cancel.clone(),
        );

        let producers: Vec<_> = pending
            .into_iter()
            .enumerate()
            .map(|(i, item)| {
                let producer = synchronizer.producer(ProducerId(i));
                let work = produce(
                    item,
                    Arc::clone(&stage),
                    Arc::clone(&function),
                    producer.clone(),
                    self.cancel.clone(),
                );
                let inner = runtime.clone();
                // The producer terminates even if its work panics.
                runtime.spawn(async move {
                    let result = inner.spawn(work).await.map_err(GenerateError::from).and_then(|r| r);
                    producer.terminate().await;
                    result
                })
            })
            .collect();

        let mut failures = Failures::new();
        let mut continuations = Vec::new();
        while let Some(round) = rounds.recv().await {
            if round.forced && self.cancel.is_cancelled() {
                self.stats
                    .bindings_discarded
                    .fetch_add(round.bindings.len(), Ordering::Relaxed);
                warn!(
                    pipeline = %invocation.pipeline.name(),
                    stage = index,
                    round = round.sequence,
                    bindings = round.bindings.len(),
                    "discarding round force-closed by cancellation"
                );
                continue;
            }
            debug!(
                pipeline = %invocation.pipeline.name(),
                stage = index,
                round = round.sequence,
                bindings = round.bindings.len(),
                "continuing with round"
            );
            let next = round.bindings.into_iter().map(Pending::Ready).collect();
            let continuation = Arc::clone(&self).execute(Arc::clone(&invocation), index + 1, next);
            if self.context.config.ordered_rounds {
                failures.absorb(continuation.await);
            } else {
                continuations.push(runtime.spawn(continuation));
            }
        }

        failures.absorb(join_all(producers).await);
        if let Some(report) = failures.absorb(synchronizer.finish().await) {
            self.stats.rounds.fetch_add(report.rounds, Ordering::Relaxed);
            debug!(
                function = %stage.function,
                producers = report.producers,
                rounds = report.rounds,
                forced = report.forced_rounds,
                dropped = report.dropped_contributions,
                "iterator stage done"
            );
        }
        failures.absorb(join_all(continuations).await);
        failures.into_result(())
    }

    /// Past the last stage: evaluate, materialize, then call nested pipelines.
    async fn complete(
        self: Arc<Self>,
        invocation: Arc<Invocation>,
        pending: Vec<Pending>,
    ) -> Result<(), GenerateError> {
        let bindings = resolve_all(pending).await?;
        if bindings.is_empty() {
            return Ok(());
        }

        let mut rows = Vec::with_capacity(bindings.len());
        let mut results = self
            .context
            .evaluator
            .evaluate(bindings, invocation.pipeline.selection());
        while let Some(row) = results.next().await {
            match row {
                Ok(row) => rows.push(row),
                Err(e) => debug!(error = %e, "evaluator dropped row"),
            }
        }

        let report = OutputMaterializer::new(invocation.pipeline.generate_template(), &invocation.scope)
            .materialize(&rows, self.sink.as_ref())?;
        self.stats
            .bindings_materialized
            .fetch_add(rows.len(), Ordering::Relaxed);
        self.stats
            .facts_emitted
            .fetch_add(report.facts_emitted, Ordering::Relaxed);
        self.stats
            .triples_skipped
            .fetch_add(report.triples_skipped, Ordering::Relaxed);
        debug!(
            pipeline = %invocation.pipeline.name(),
            rows = rows.len(),
            facts = report.facts_emitted,
            skipped = report.triples_skipped,
            "materialized"
        );

        self.invoke_nested(&invocation, &rows).await
    }

    async fn invoke_nested(
        self: Arc<Self>,
        invocation: &Arc<Invocation>,
        rows: &[Binding],
    ) -> Result<(), GenerateError> {
        let mut failures = Failures::new();
        for nested in invocation.pipeline.generate_template().nested_invocations() {
            let depth = invocation.depth + 1;
            if depth > self.context.config.max_nesting_depth {
                warn!(pipeline = %nested.name, depth, "nesting limit reached, skipping call");
                continue;
            }
            let child = match self.context.pipelines.get(&nested.name) {
                Ok(Some(child)) => child,
                Ok(None) => {
                    failures.record(ConfigurationError::UnknownPipeline(nested.name.clone()).into());
                    continue;
                }
                Err(e) => {
                    failures.record(e);
                    continue;
                }
            };

            let mut seen = HashSet::with_capacity(rows.len());
            let initial: Vec<Binding> = rows
                .iter()
                .map(|row| row.project(&nested.parameters))
                .filter(|projected| seen.insert(projected.clone()))
                .collect();
            let scope = if nested.share_scope {
                invocation.scope.clone()
            } else {
                BlankNodeScope::new()
            };
            debug!(
                caller = %invocation.pipeline.name(),
                pipeline = %nested.name,
                depth,
                bindings = initial.len(),
                shared_scope = nested.share_scope,
                "calling nested pipeline"
            );
            let child = Arc::new(Invocation {
                pipeline: child,
                scope,
                depth,
            });
            let initial = initial.into_iter().map(Pending::Ready).collect();
            failures.absorb(Arc::clone(&self).execute(child, 0, initial).await);
        }
        failures.into_result(())
    }
}

/// The work of one producer: resolve its binding, run the function and
/// forward every batch until the stream ends or the run is cancelled.
async fn produce(
    item: Pending,
    stage: Arc<IteratorStage>,
    function: Arc<dyn IteratorFunction>,
    producer: ProducerHandle,
    cancel: CancellationToken,
) -> Result<(), GenerateError> {
    let Some(binding) = item.resolve().await? else {
        return Ok(());
    };
    let mut batches = match stage.start(&binding, function.as_ref()) {
        Ok(batches) => batches,
        Err(e) => {
            debug!(function = %stage.function, binding = %binding, error = %e, "iterator dropped binding");
            return Ok(());
        }
    };

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                debug!(producer = %producer.id(), "producer stopped by cancellation");
                return Ok(());
            }
            next = batches.next() => next,
        };
        match next {
            None => return Ok(()),
            Some(Ok(batch)) => {
                let extended = stage.extend_all(&binding, batch)?;
                if !producer.contribute(extended).await {
                    return Ok(());
                }
            }
            Some(Err(e)) => {
                warn!(function = %stage.function, binding = %binding, error = %e, "extraction failed");
                return Ok(());
            }
        }
    }
}
