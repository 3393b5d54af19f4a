//! The binding-producing stages of a pipeline.
//!
//! - `BindStage`: synchronous, exactly one output per input, or zero when the
//!   expression fails to evaluate.
//! - `SourceStage`: asynchronous fetch, zero or one output per input.
//! - `IteratorStage`: asynchronous, zero or more tuples per input, delivered
//!   as batches that the batch synchronizer groups into rounds.
//!
//! Per-binding failures never escape a stage: they are logged and the binding
//! is dropped. Only rebinding a variable is fatal.

use std::fmt;

use tracing::{debug, info, warn};

use crate::binding::Binding;
use crate::error::{ConfigurationError, EvaluationError, GenerateError};
use crate::expression::Expression;
use crate::functions::{IteratorFunction, TupleBatch, TupleStream};
use crate::source::SourceFetcher;
use crate::types::value::{MEDIA_TYPE_PREFIX, XSD_STRING};
use crate::types::{Value, Variable};

/// Binds a variable to the value of an expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindStage {
    pub variable: Variable,
    pub expression: Expression,
}

impl BindStage {
    #[must_use]
    pub const fn new(variable: Variable, expression: Expression) -> Self {
        Self {
            variable,
            expression,
        }
    }

    /// Extend one binding. `Ok(None)` means the expression failed for it.
    pub fn apply(&self, binding: &Binding) -> Result<Option<Binding>, GenerateError> {
        match self.expression.evaluate(binding) {
            Ok(value) => Ok(Some(binding.extend(self.variable.clone(), value)?)),
            Err(e) => {
                debug!(variable = %self.variable, binding = %binding, error = %e, "bind dropped binding");
                Ok(None)
            }
        }
    }
}

/// Binds a variable to the content of a fetched document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceStage {
    pub variable: Variable,
    /// Must evaluate to an IRI.
    pub locator: Expression,
    pub media_type: Option<Expression>,
}

impl SourceStage {
    #[must_use]
    pub const fn new(variable: Variable, locator: Expression) -> Self {
        Self {
            variable,
            locator,
            media_type: None,
        }
    }

    /// Pass a media type hint to the fetcher.
    #[must_use]
    pub fn with_media_type(mut self, media_type: Expression) -> Self {
        self.media_type = Some(media_type);
        self
    }

    /// Fetch the document for one binding and bind it.
    ///
    /// An absent document or a transport failure yields `Ok(None)`.
    pub async fn apply(
        &self,
        binding: &Binding,
        fetcher: &dyn SourceFetcher,
    ) -> Result<Option<Binding>, GenerateError> {
        let (locator, accept) = match self.request(binding) {
            Ok(request) => request,
            Err(e) => {
                debug!(variable = %self.variable, binding = %binding, error = %e, "source dropped binding");
                return Ok(None);
            }
        };

        match fetcher.fetch(&locator, accept.as_deref()).await {
            Ok(Some(document)) => {
                let datatype = document
                    .media_type
                    .map_or_else(|| XSD_STRING.to_owned(), |t| format!("{MEDIA_TYPE_PREFIX}{t}"));
                let value = Value::typed(document.content, datatype);
                Ok(Some(binding.extend(self.variable.clone(), value)?))
            }
            Ok(None) => {
                info!(locator = %locator, "source document not found");
                Ok(None)
            }
            Err(e) => {
                warn!(locator = %locator, error = %e, "source fetch failed");
                Ok(None)
            }
        }
    }

    fn request(&self, binding: &Binding) -> Result<(String, Option<String>), EvaluationError> {
        let locator = self.locator.evaluate(binding)?;
        let Value::Iri(locator) = locator else {
            return Err(EvaluationError::TypeMismatch {
                expected: "IRI",
                found: locator.to_string(),
            });
        };
        let accept = match &self.media_type {
            Some(expression) => {
                let value = expression.evaluate(binding)?;
                Some(
                    value
                        .lexical_form()
                        .map(str::to_owned)
                        .ok_or_else(|| EvaluationError::TypeMismatch {
                            expected: "string",
                            found: value.to_string(),
                        })?,
                )
            }
            None => None,
        };
        Ok((locator, accept))
    }
}

/// Binds variables to the tuples produced by an iterator function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IteratorStage {
    pub variables: Vec<Variable>,
    /// Identifier looked up in the function registry.
    pub function: String,
    pub arguments: Vec<Expression>,
}

impl IteratorStage {
    #[must_use]
    pub fn new(variables: Vec<Variable>, function: impl Into<String>, arguments: Vec<Expression>) -> Self {
        Self {
            variables,
            function: function.into(),
            arguments,
        }
    }

    /// Start one execution of the function for one input binding.
    pub fn start(
        &self,
        binding: &Binding,
        function: &dyn IteratorFunction,
    ) -> Result<TupleStream, EvaluationError> {
        let arguments = self
            .arguments
            .iter()
            .map(|argument| argument.evaluate(binding))
            .collect::<Result<Vec<_>, _>>()?;
        function.call(arguments)
    }

    /// Extend one binding with every tuple of a batch.
    ///
    /// Short tuples are skipped. A `None` entry leaves its variable unbound.
    pub fn extend_all(
        &self,
        binding: &Binding,
        batch: TupleBatch,
    ) -> Result<Vec<Binding>, ConfigurationError> {
        let mut extended = Vec::with_capacity(batch.len());
        for tuple in batch {
            if tuple.len() < self.variables.len() {
                warn!(
                    function = %self.function,
                    expected = self.variables.len(),
                    got = tuple.len(),
                    "skipping short tuple"
                );
                continue;
            }
            let mut next = binding.clone();
            for (variable, value) in self.variables.iter().zip(tuple) {
                if let Some(value) = value {
                    next = next.extend(variable.clone(), value)?;
                }
            }
            extended.push(next);
        }
        Ok(extended)
    }
}

/// One clause of a pipeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Stage {
    Bind(BindStage),
    Source(SourceStage),
    Iterator(IteratorStage),
}

impl Stage {
    /// The variables this stage binds.
    #[must_use]
    pub fn bound_variables(&self) -> Vec<&Variable> {
        match self {
            Self::Bind(stage) => vec![&stage.variable],
            Self::Source(stage) => vec![&stage.variable],
            Self::Iterator(stage) => stage.variables.iter().collect(),
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Bind(_) => "bind",
            Self::Source(_) => "source",
            Self::Iterator(_) => "iterator",
        }
    }
}

impl From<BindStage> for Stage {
    fn from(stage: BindStage) -> Self {
        Self::Bind(stage)
    }
}

impl From<SourceStage> for Stage {
    fn from(stage: SourceStage) -> Self {
        Self::Source(stage)
    }
}

impl From<IteratorStage> for Stage {
    fn from(stage: IteratorStage) -> Self {
        Self::Iterator(stage)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind(stage) => write!(f, "BIND({} AS {})", stage.expression, stage.variable),
            Self::Source(stage) => write!(f, "SOURCE {} AS {}", stage.locator, stage.variable),
            Self::Iterator(stage) => {
                write!(f, "ITERATOR <{}>(", stage.function)?;
                for (i, argument) in stage.arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{argument}")?;
                }
                f.write_str(") AS")?;
                for variable in &stage.variables {
                    write!(f, " {variable}")?;
                }
                Ok(())
            }
        }
    }
}
