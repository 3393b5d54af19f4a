//! In-memory triple graph with subject and predicate indexes.

use std::collections::{HashMap, HashSet};

use crate::types::{Triple, Value};

/// An immutable-after-build set of triples.
#[derive(Debug, Default)]
pub struct Graph {
    triples: Vec<Triple>,
    seen: HashSet<Triple>,
    by_subject: HashMap<Value, Vec<usize>>,
    by_predicate: HashMap<Value, Vec<usize>>,
}

impl Graph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a triple. Returns false if it was already present.
    pub fn insert(&mut self, triple: Triple) -> bool {
        if !self.seen.insert(triple.clone()) {
            return false;
        }
        let index = self.triples.len();
        self.by_subject
            .entry(triple.subject().clone())
            .or_default()
            .push(index);
        self.by_predicate
            .entry(triple.predicate().clone())
            .or_default()
            .push(index);
        self.triples.push(triple);
        true
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.triples.len()
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.triples.is_empty()
    }

    /// Candidate triples for a lookup with optionally known subject and
    /// predicate. The most selective index is used; callers still match
    /// every position.
    pub fn candidates<'a>(
        &'a self,
        subject: Option<&Value>,
        predicate: Option<&Value>,
    ) -> Box<dyn Iterator<Item = &'a Triple> + 'a> {
        let indexed = match (subject, predicate) {
            (Some(s), Some(p)) => {
                let by_s = self.by_subject.get(s).map_or(0, Vec::len);
                let by_p = self.by_predicate.get(p).map_or(0, Vec::len);
                if by_s <= by_p {
                    self.by_subject.get(s)
                } else {
                    self.by_predicate.get(p)
                }
            }
            (Some(s), None) => self.by_subject.get(s),
            (None, Some(p)) => self.by_predicate.get(p),
            (None, None) => return Box::new(self.triples.iter()),
        };
        match indexed {
            Some(indexes) => Box::new(indexes.iter().filter_map(|&i| self.triples.get(i))),
            None => Box::new(std::iter::empty()),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Triple> {
        self.triples.iter()
    }
}

impl FromIterator<Triple> for Graph {
    fn from_iter<I: IntoIterator<Item = Triple>>(iter: I) -> Self {
        let mut graph = Self::new();
        for triple in iter {
            graph.insert(triple);
        }
        graph
    }
}
