//! Declarative pattern types for the reference evaluator.
//!
//! This module defines:
//! - `PatternTerm` - A constant value or a variable in one position
//! - `Pattern` - A triple pattern
//! - `Filter` - A predicate on the value bound to one variable
//! - `SelectQuery` - Required, optional and negated patterns plus filters

#![allow(clippy::type_complexity)] // Boxed filter predicates

use std::fmt;

use crate::types::{Value, Variable};

/// One position of a triple pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatternTerm {
    Constant(Value),
    Variable(Variable),
}

impl PatternTerm {
    /// Create a variable term.
    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Variable(Variable::new(name))
    }

    /// Create an IRI term.
    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Constant(Value::iri(iri))
    }

    /// Create a plain string term.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Constant(Value::string(s))
    }

    /// Get the variable if this is one.
    #[must_use]
    pub const fn as_variable(&self) -> Option<&Variable> {
        match self {
            Self::Variable(v) => Some(v),
            Self::Constant(_) => None,
        }
    }
}

impl From<Value> for PatternTerm {
    fn from(value: Value) -> Self {
        Self::Constant(value)
    }
}

impl From<Variable> for PatternTerm {
    fn from(variable: Variable) -> Self {
        Self::Variable(variable)
    }
}

impl fmt::Display for PatternTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(variable) => write!(f, "{variable}"),
        }
    }
}

/// A triple pattern - any position can be a variable.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pattern {
    pub subject: PatternTerm,
    pub predicate: PatternTerm,
    pub object: PatternTerm,
}

impl Pattern {
    #[must_use]
    pub const fn new(subject: PatternTerm, predicate: PatternTerm, object: PatternTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }

    /// Every variable mentioned by this pattern.
    pub fn variables(&self) -> impl Iterator<Item = &Variable> {
        [&self.subject, &self.predicate, &self.object]
            .into_iter()
            .filter_map(PatternTerm::as_variable)
    }
}

impl fmt::Display for Pattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.subject, self.predicate, self.object)
    }
}

/// A filter applied to candidate rows.
pub struct Filter {
    /// The variable to filter on.
    pub selector: Variable,
    /// The filter predicate. Receives `None` when the variable is unbound.
    pub predicate: Box<dyn Fn(Option<&Value>) -> bool + Send + Sync>,
}

impl Filter {
    pub fn new<F>(selector: Variable, predicate: F) -> Self
    where
        F: Fn(Option<&Value>) -> bool + Send + Sync + 'static,
    {
        Self {
            selector,
            predicate: Box::new(predicate),
        }
    }

    #[must_use]
    pub fn apply(&self, value: Option<&Value>) -> bool {
        (self.predicate)(value)
    }
}

impl fmt::Debug for Filter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Filter")
            .field("selector", &self.selector)
            .field("predicate", &"<fn>")
            .finish()
    }
}

/// The declarative part of a pipeline.
///
/// An empty `find` list keeps every bound variable.
#[derive(Debug, Default)]
pub struct SelectQuery {
    /// Variables kept in result rows.
    pub find: Vec<Variable>,
    /// Required patterns (conjunction).
    pub where_patterns: Vec<Pattern>,
    /// Optional patterns (left join).
    pub optional_patterns: Vec<Pattern>,
    /// Negation patterns (anti-join).
    pub where_not_patterns: Vec<Pattern>,
    pub filters: Vec<Filter>,
}

impl SelectQuery {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a variable to the find clause.
    #[must_use]
    pub fn find(mut self, var: impl AsRef<str>) -> Self {
        self.find.push(Variable::new(var));
        self
    }

    #[must_use]
    pub fn where_pattern(mut self, pattern: Pattern) -> Self {
        self.where_patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn optional(mut self, pattern: Pattern) -> Self {
        self.optional_patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn where_not(mut self, pattern: Pattern) -> Self {
        self.where_not_patterns.push(pattern);
        self
    }

    #[must_use]
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pattern_variables() {
        let pattern = Pattern::new(
            PatternTerm::var("s"),
            PatternTerm::iri("http://ex.org/p"),
            PatternTerm::var("o"),
        );
        let names: Vec<&str> = pattern.variables().map(Variable::name).collect();
        assert_eq!(names, vec!["s", "o"]);
        assert_eq!(pattern.to_string(), "?s <http://ex.org/p> ?o");
    }

    #[test]
    fn test_filter_sees_unbound() {
        let filter = Filter::new(Variable::new("x"), |value| value.is_none());
        assert!(filter.apply(None));
        assert!(!filter.apply(Some(&Value::integer(1))));
    }
}
