//! Pattern matching engine.
//!
//! The `QueryEngine` evaluates a `SelectQuery` against a `Graph`, starting
//! from a set of input bindings. It supports:
//! - WHERE patterns (required matches)
//! - OPTIONAL patterns (left join)
//! - WHERE-NOT patterns (anti-join / negation)
//! - Filters (predicate functions)
//!
//! Every output row is an extension of exactly one input binding.

#![allow(clippy::unused_self)] // Methods take &self for API consistency

use super::graph::Graph;
use super::types::{Pattern, PatternTerm, SelectQuery};
use crate::binding::Binding;
use crate::types::{Triple, Value};

/// The query engine evaluates queries against a graph.
pub struct QueryEngine<'a> {
    graph: &'a Graph,
}

impl<'a> QueryEngine<'a> {
    #[must_use]
    pub const fn new(graph: &'a Graph) -> Self {
        Self { graph }
    }

    /// Execute a query, extending each input binding.
    #[must_use]
    pub fn execute(&self, query: &SelectQuery, bindings: Vec<Binding>) -> Vec<Binding> {
        let mut rows = bindings;

        // Process WHERE patterns (required)
        for pattern in &query.where_patterns {
            rows = self.match_pattern_all(pattern, rows);
            if rows.is_empty() {
                return rows;
            }
        }

        // Process OPTIONAL patterns (left join)
        for pattern in &query.optional_patterns {
            rows = self.match_optional_pattern(pattern, rows);
        }

        // Process WHERE-NOT patterns (anti-join)
        for pattern in &query.where_not_patterns {
            rows = self.match_negation_pattern(pattern, rows);
        }

        for filter in &query.filters {
            rows.retain(|row| filter.apply(row.get(&filter.selector)));
        }

        if query.find.is_empty() {
            rows
        } else {
            rows.into_iter().map(|row| row.project(&query.find)).collect()
        }
    }

    /// Match a pattern against all triples, extending each row.
    fn match_pattern_all(&self, pattern: &Pattern, rows: Vec<Binding>) -> Vec<Binding> {
        rows.iter()
            .flat_map(|row| self.match_pattern(pattern, row))
            .collect()
    }

    /// Match a pattern against all candidate triples for one row.
    fn match_pattern(&self, pattern: &Pattern, row: &Binding) -> Vec<Binding> {
        let subject = resolve(&pattern.subject, row);
        let predicate = resolve(&pattern.predicate, row);
        self.graph
            .candidates(subject, predicate)
            .filter_map(|triple| self.try_match_triple(pattern, triple, row))
            .collect()
    }

    /// Try to match a triple against a pattern with the given row.
    /// Returns the row extended with the newly bound variables on success.
    fn try_match_triple(&self, pattern: &Pattern, triple: &Triple, row: &Binding) -> Option<Binding> {
        let row = match_term(&pattern.subject, triple.subject(), row.clone())?;
        let row = match_term(&pattern.predicate, triple.predicate(), row)?;
        match_term(&pattern.object, triple.object(), row)
    }

    /// Match an optional pattern (left join).
    fn match_optional_pattern(&self, pattern: &Pattern, rows: Vec<Binding>) -> Vec<Binding> {
        let mut results = Vec::new();
        for row in rows {
            let matches = self.match_pattern(pattern, &row);
            if matches.is_empty() {
                // No matches - keep original row (left join behavior)
                results.push(row);
            } else {
                results.extend(matches);
            }
        }
        results
    }

    /// Match a negation pattern (anti-join).
    fn match_negation_pattern(&self, pattern: &Pattern, rows: Vec<Binding>) -> Vec<Binding> {
        rows.into_iter()
            .filter(|row| self.match_pattern(pattern, row).is_empty())
            .collect()
    }
}

/// The value a term denotes under a row, if it is known.
fn resolve<'b>(term: &'b PatternTerm, row: &'b Binding) -> Option<&'b Value> {
    match term {
        PatternTerm::Constant(value) => Some(value),
        PatternTerm::Variable(variable) => row.get(variable),
    }
}

/// Match one position. A free variable gets bound; a bound one must agree.
fn match_term(term: &PatternTerm, value: &Value, row: Binding) -> Option<Binding> {
    match term {
        PatternTerm::Constant(constant) => (constant == value).then_some(row),
        PatternTerm::Variable(variable) => match row.get(variable) {
            Some(bound) => (bound == value).then_some(row),
            None => row.extend(variable.clone(), value.clone()).ok(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::types::Filter;
    use crate::types::Variable;

    const NAME: &str = "http://ex.org/name";
    const AGE: &str = "http://ex.org/age";

    fn graph_with_people() -> Graph {
        let people = [
            ("http://ex.org/alice", "Alice", Some(30)),
            ("http://ex.org/bob", "Bob", Some(25)),
            ("http://ex.org/charlie", "Charlie", None),
        ];
        let mut graph = Graph::new();
        for (iri, name, age) in people {
            graph.insert(Triple::new(Value::iri(iri), Value::iri(NAME), Value::string(name)).expect("valid"));
            if let Some(age) = age {
                graph.insert(Triple::new(Value::iri(iri), Value::iri(AGE), Value::integer(age)).expect("valid"));
            }
        }
        graph
    }

    fn name_pattern() -> Pattern {
        Pattern::new(PatternTerm::var("e"), PatternTerm::iri(NAME), PatternTerm::var("name"))
    }

    fn age_pattern() -> Pattern {
        Pattern::new(PatternTerm::var("e"), PatternTerm::iri(AGE), PatternTerm::var("age"))
    }

    #[test]
    fn test_simple_query() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new().where_pattern(name_pattern());
        assert_eq!(engine.execute(&query, vec![Binding::new()]).len(), 3);
    }

    #[test]
    fn test_input_bindings_constrain_matches() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new().find("name").where_pattern(name_pattern());
        let input = Binding::new()
            .extend(Variable::new("e"), Value::iri("http://ex.org/bob"))
            .expect("free");
        let rows = engine.execute(&query, vec![input]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::string("Bob")));
        assert!(rows[0].get_by_name("e").is_none());
    }

    #[test]
    fn test_query_with_multiple_patterns() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new()
            .where_pattern(name_pattern())
            .where_pattern(age_pattern());
        // Only Alice and Bob have an age
        assert_eq!(engine.execute(&query, vec![Binding::new()]).len(), 2);
    }

    #[test]
    fn test_optional_pattern() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new()
            .where_pattern(name_pattern())
            .optional(age_pattern());
        let rows = engine.execute(&query, vec![Binding::new()]);
        assert_eq!(rows.len(), 3);
        let charlie = rows
            .iter()
            .find(|row| row.get_by_name("name") == Some(&Value::string("Charlie")))
            .expect("charlie kept");
        assert!(charlie.get_by_name("age").is_none());
    }

    #[test]
    fn test_where_not_pattern() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new()
            .where_pattern(name_pattern())
            .where_not(age_pattern());
        let rows = engine.execute(&query, vec![Binding::new()]);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].get_by_name("name"), Some(&Value::string("Charlie")));
    }

    #[test]
    fn test_filter() {
        let graph = graph_with_people();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new()
            .where_pattern(age_pattern())
            .filter(Filter::new(Variable::new("age"), |value| {
                value.and_then(Value::as_integer).is_some_and(|age| age > 26)
            }));
        assert_eq!(engine.execute(&query, vec![Binding::new()]).len(), 1);
    }

    #[test]
    fn test_empty_graph() {
        let graph = Graph::new();
        let engine = QueryEngine::new(&graph);
        let query = SelectQuery::new().where_pattern(name_pattern());
        assert!(engine.execute(&query, vec![Binding::new()]).is_empty());
    }
}
