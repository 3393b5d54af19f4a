//! The caller's side of a running transformation.

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::error::GenerateError;

/// Counters of a completed run, nested invocations included.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Rows handed to the materializer.
    pub bindings_materialized: usize,
    pub facts_emitted: usize,
    /// Triple templates that did not resolve to a fact.
    pub triples_skipped: usize,
    /// Bindings of rounds that were force-closed by cancellation and never
    /// continued.
    pub bindings_discarded: usize,
    /// Rounds closed by every batch synchronizer of the run.
    pub rounds: u64,
}

/// A cancellable handle resolving when every branch of the run is done.
///
/// A run with an unbounded iterator never resolves on its own.
#[derive(Debug)]
pub struct RunHandle {
    cancel: CancellationToken,
    task: JoinHandle<Result<RunSummary, GenerateError>>,
}

impl RunHandle {
    pub(crate) const fn new(
        cancel: CancellationToken,
        task: JoinHandle<Result<RunSummary, GenerateError>>,
    ) -> Self {
        Self { cancel, task }
    }

    /// Ask the run to stop. Branches already running complete; no new
    /// branch starts. `wait` then returns `GenerateError::Cancelled`.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// A token that cancels this run, for use from other tasks.
    #[must_use]
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Wait for the run. The sink has received `finish` when this returns.
    pub async fn wait(self) -> Result<RunSummary, GenerateError> {
        self.task.await?
    }
}
