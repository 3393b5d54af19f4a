//! Reference graph-pattern evaluator.
//!
//! The pipeline treats pattern evaluation as a black box behind the
//! `PatternEvaluator` trait. This module provides one implementation that
//! matches a `SelectQuery` against an in-memory `Graph`. It supports:
//! - Pattern matching with variables
//! - WHERE clauses (conjunction of patterns)
//! - OPTIONAL clauses (left join semantics)
//! - WHERE-NOT clauses (anti-join / negation)
//! - Filters (predicate functions)
//!
//! # Example
//!
//! ```ignore
//! let graph: Graph = triples.into_iter().collect();
//! let query = SelectQuery::new()
//!     .find("name")
//!     .where_pattern(Pattern::new(
//!         PatternTerm::var("e"),
//!         PatternTerm::iri("http://ex.org/name"),
//!         PatternTerm::var("name"),
//!     ));
//!
//! let rows = QueryEngine::new(&graph).execute(&query, vec![Binding::new()]);
//! ```

pub mod engine;
pub mod evaluator;
pub mod graph;
pub mod types;

pub use engine::QueryEngine;
pub use evaluator::{GraphEvaluator, PatternEvaluator, RowStream};
pub use graph::Graph;
pub use types::{Filter, Pattern, PatternTerm, SelectQuery};
