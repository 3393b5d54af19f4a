//! Pipeline definitions and the registry of named pipelines.
//!
//! # Thread Safety
//!
//! The registry uses `RwLock`: lookups from concurrent invocations only take
//! the read lock. Pipelines are immutable once registered and shared as
//! `Arc<Pipeline>`.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use crate::error::GenerateError;
use crate::output::GenerateTemplate;
use crate::query::SelectQuery;
use crate::stage::Stage;

/// An ordered stage list, an optional pattern and a fact template.
#[derive(Debug)]
pub struct Pipeline {
    name: String,
    stages: Vec<Stage>,
    selection: Option<Arc<SelectQuery>>,
    template: GenerateTemplate,
}

impl Pipeline {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            stages: Vec::new(),
            selection: None,
            template: GenerateTemplate::new(),
        }
    }

    /// Append a stage.
    #[must_use]
    pub fn stage(mut self, stage: impl Into<Stage>) -> Self {
        self.stages.push(stage.into());
        self
    }

    /// Set the pattern resolved by the evaluator after the last stage.
    #[must_use]
    pub fn select(mut self, query: SelectQuery) -> Self {
        self.selection = Some(Arc::new(query));
        self
    }

    #[must_use]
    pub fn template(mut self, template: GenerateTemplate) -> Self {
        self.template = template;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    #[must_use]
    pub fn selection(&self) -> Option<Arc<SelectQuery>> {
        self.selection.clone()
    }

    #[must_use]
    pub const fn generate_template(&self) -> &GenerateTemplate {
        &self.template
    }
}

/// Named pipelines callable from templates.
#[derive(Debug, Default)]
pub struct PipelineRegistry {
    pipelines: RwLock<HashMap<String, Arc<Pipeline>>>,
}

impl PipelineRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pipeline under its name, replacing any previous one.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::LockPoisoned` if the registry lock is poisoned.
    pub fn register(&self, pipeline: Pipeline) -> Result<Arc<Pipeline>, GenerateError> {
        let pipeline = Arc::new(pipeline);
        self.pipelines
            .write()
            .map_err(|_| GenerateError::LockPoisoned)?
            .insert(pipeline.name().to_owned(), Arc::clone(&pipeline));
        Ok(pipeline)
    }

    /// Look up a pipeline by name.
    ///
    /// # Errors
    ///
    /// Returns `GenerateError::LockPoisoned` if the registry lock is poisoned.
    pub fn get(&self, name: &str) -> Result<Option<Arc<Pipeline>>, GenerateError> {
        let pipelines = self
            .pipelines
            .read()
            .map_err(|_| GenerateError::LockPoisoned)?;
        Ok(pipelines.get(name).cloned())
    }

    pub fn len(&self) -> Result<usize, GenerateError> {
        Ok(self
            .pipelines
            .read()
            .map_err(|_| GenerateError::LockPoisoned)?
            .len())
    }
}
