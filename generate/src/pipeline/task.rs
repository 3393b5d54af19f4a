//! Task-graph primitives shared by every stage kind.
//!
//! - `map_pending`: spawn one task per pending binding, each producing at
//!   most one extension.
//! - `join_all`: wait for every task of a fan-out, tolerating partial
//!   failure. Siblings of a failed task always run to completion.
//! - `resolve_all`: the same for pending bindings.
//!
//! When several branches fail, the reported error is the first one that is
//! not a cancellation, so a real fault is never hidden behind the
//! cancellation it may have caused.

use std::future::Future;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::binding::Binding;
use crate::error::GenerateError;

/// A binding that is known, or still being computed by a spawned task.
#[derive(Debug)]
pub enum Pending {
    Ready(Binding),
    /// `Ok(None)` means the binding was dropped by an earlier stage.
    Spawned(JoinHandle<Result<Option<Binding>, GenerateError>>),
}

impl Pending {
    /// Wait for the binding.
    pub async fn resolve(self) -> Result<Option<Binding>, GenerateError> {
        match self {
            Self::Ready(binding) => Ok(Some(binding)),
            Self::Spawned(handle) => handle.await?,
        }
    }
}

impl From<Binding> for Pending {
    fn from(binding: Binding) -> Self {
        Self::Ready(binding)
    }
}

/// Keeps the most significant failure of a join.
#[derive(Debug, Default)]
pub struct Failures {
    worst: Option<GenerateError>,
    count: usize,
}

impl Failures {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, error: GenerateError) {
        self.count += 1;
        let replace = self
            .worst
            .as_ref()
            .is_none_or(|worst| worst.is_cancelled() && !error.is_cancelled());
        if replace {
            self.worst = Some(error);
        }
    }

    /// Record the error of a result, if any.
    pub fn absorb<T>(&mut self, result: Result<T, GenerateError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(e) => {
                self.record(e);
                None
            }
        }
    }

    #[must_use]
    pub const fn count(&self) -> usize {
        self.count
    }

    /// `Ok(value)` if nothing failed, the most significant error otherwise.
    pub fn into_result<T>(self, value: T) -> Result<T, GenerateError> {
        self.worst.map_or(Ok(value), Err)
    }
}

/// Spawn `apply` for every pending binding without waiting for any of them.
///
/// Dropped bindings stay dropped. Once `cancel` is tripped no new task is
/// spawned and the call fails.
pub fn map_pending<F, Fut>(
    runtime: &Handle,
    pending: Vec<Pending>,
    cancel: &CancellationToken,
    apply: F,
) -> Result<Vec<Pending>, GenerateError>
where
    F: Fn(Binding) -> Fut + Clone + Send + 'static,
    Fut: Future<Output = Result<Option<Binding>, GenerateError>> + Send + 'static,
{
    let mut mapped = Vec::with_capacity(pending.len());
    for item in pending {
        if cancel.is_cancelled() {
            return Err(GenerateError::Cancelled);
        }
        let apply = apply.clone();
        mapped.push(Pending::Spawned(runtime.spawn(async move {
            match item.resolve().await? {
                Some(binding) => apply(binding).await,
                None => Ok(None),
            }
        })));
    }
    Ok(mapped)
}

/// Wait for every task, then report the outputs or the worst failure.
pub async fn join_all<T>(
    handles: impl IntoIterator<Item = JoinHandle<Result<T, GenerateError>>>,
) -> Result<Vec<T>, GenerateError> {
    let mut failures = Failures::new();
    let mut outputs = Vec::new();
    for handle in handles {
        let result = handle.await.map_err(GenerateError::from).and_then(|r| r);
        if let Some(output) = failures.absorb(result) {
            outputs.push(output);
        }
    }
    failures.into_result(outputs)
}

/// Wait for every pending binding and keep the ones that were not dropped.
pub async fn resolve_all(pending: Vec<Pending>) -> Result<Vec<Binding>, GenerateError> {
    let mut failures = Failures::new();
    let mut bindings = Vec::with_capacity(pending.len());
    for item in pending {
        if let Some(Some(binding)) = failures.absorb(item.resolve().await) {
            bindings.push(binding);
        }
    }
    failures.into_result(bindings)
}
