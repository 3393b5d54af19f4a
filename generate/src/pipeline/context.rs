//! Collaborators shared by every invocation of a run.

use std::fmt;
use std::sync::Arc;

use tokio::runtime::Handle;

use super::definition::PipelineRegistry;
use crate::config::EngineConfig;
use crate::functions::FunctionRegistry;
use crate::query::{GraphEvaluator, PatternEvaluator};
use crate::source::{FileSourceFetcher, SourceFetcher};

/// Everything a run needs besides the pipeline, its bindings and its sink.
///
/// Cloning is cheap: collaborators are shared.
#[derive(Clone)]
pub struct ExecutionContext {
    pub(crate) runtime: Handle,
    pub(crate) functions: Arc<FunctionRegistry>,
    pub(crate) sources: Arc<dyn SourceFetcher>,
    pub(crate) evaluator: Arc<dyn PatternEvaluator>,
    pub(crate) pipelines: Arc<PipelineRegistry>,
    pub(crate) config: EngineConfig,
}

impl ExecutionContext {
    /// A context with the standard functions, a file fetcher rooted at the
    /// configured source directory, an empty graph and no named pipelines.
    #[must_use]
    pub fn new(runtime: Handle, config: EngineConfig) -> Self {
        Self {
            runtime,
            functions: Arc::new(FunctionRegistry::standard()),
            sources: Arc::new(FileSourceFetcher::new(config.source_directory.clone())),
            evaluator: Arc::new(GraphEvaluator::empty()),
            pipelines: Arc::new(PipelineRegistry::new()),
            config,
        }
    }

    #[must_use]
    pub fn with_functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = Arc::new(functions);
        self
    }

    #[must_use]
    pub fn with_sources(mut self, sources: impl SourceFetcher + 'static) -> Self {
        self.sources = Arc::new(sources);
        self
    }

    #[must_use]
    pub fn with_evaluator(mut self, evaluator: impl PatternEvaluator + 'static) -> Self {
        self.evaluator = Arc::new(evaluator);
        self
    }

    #[must_use]
    pub fn with_pipelines(mut self, pipelines: Arc<PipelineRegistry>) -> Self {
        self.pipelines = pipelines;
        self
    }

    #[must_use]
    pub const fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn pipelines(&self) -> &PipelineRegistry {
        &self.pipelines
    }
}

impl fmt::Debug for ExecutionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("functions", &self.functions)
            .field("pipelines", &self.pipelines)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
