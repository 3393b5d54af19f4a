//! The pattern evaluator boundary used by the end of a pipeline.

use std::sync::Arc;

use futures::StreamExt;
use futures::stream::{self, BoxStream};

use super::engine::QueryEngine;
use super::graph::Graph;
use super::types::SelectQuery;
use crate::binding::Binding;
use crate::error::EvaluationError;

/// Result rows of one evaluation.
pub type RowStream = BoxStream<'static, Result<Binding, EvaluationError>>;

/// Resolves a declarative pattern against accumulated bindings.
///
/// Every row produced must be consistent with one of the input bindings.
/// `None` means the pipeline has no pattern; implementations then return the
/// input bindings as rows.
pub trait PatternEvaluator: Send + Sync {
    fn evaluate(&self, bindings: Vec<Binding>, query: Option<Arc<SelectQuery>>) -> RowStream;
}

/// Evaluates queries against an in-memory graph.
#[derive(Debug, Clone, Default)]
pub struct GraphEvaluator {
    graph: Arc<Graph>,
}

impl GraphEvaluator {
    #[must_use]
    pub const fn new(graph: Arc<Graph>) -> Self {
        Self { graph }
    }

    /// An evaluator over an empty graph.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }
}

impl PatternEvaluator for GraphEvaluator {
    fn evaluate(&self, bindings: Vec<Binding>, query: Option<Arc<SelectQuery>>) -> RowStream {
        let Some(query) = query else {
            return stream::iter(bindings.into_iter().map(Ok)).boxed();
        };
        let rows = QueryEngine::new(&self.graph).execute(&query, bindings);
        stream::iter(rows.into_iter().map(Ok)).boxed()
    }
}
