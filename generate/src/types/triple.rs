use std::fmt;

use crate::types::Value;

/// A concrete output fact, readonly.
///
/// INVARIANT: a `Triple` is always well-formed. The subject is an IRI or a
/// blank node and the predicate is an IRI. Only `Triple::new` builds one.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Triple {
    subject: Value,
    predicate: Value,
    object: Value,
}

impl Triple {
    /// Build a triple, or `None` if the positions do not form a valid fact.
    #[must_use]
    pub fn new(subject: Value, predicate: Value, object: Value) -> Option<Self> {
        if subject.is_literal() || predicate.as_iri().is_none() {
            return None;
        }
        Some(Self {
            subject,
            predicate,
            object,
        })
    }

    #[must_use]
    pub const fn subject(&self) -> &Value {
        &self.subject
    }

    #[must_use]
    pub const fn predicate(&self) -> &Value {
        &self.predicate
    }

    #[must_use]
    pub const fn object(&self) -> &Value {
        &self.object
    }
}

impl fmt::Display for Triple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_literal_subject_is_rejected() {
        assert!(Triple::new(Value::string("s"), Value::iri("p"), Value::iri("o")).is_none());
    }

    #[test]
    fn test_non_iri_predicate_is_rejected() {
        assert!(Triple::new(Value::iri("s"), Value::integer(1), Value::iri("o")).is_none());
    }

    #[test]
    fn test_display_is_one_line() {
        let triple = Triple::new(
            Value::iri("http://ex.org/s"),
            Value::iri("http://ex.org/p"),
            Value::integer(2),
        )
        .expect("well-formed");
        assert_eq!(
            triple.to_string(),
            "<http://ex.org/s> <http://ex.org/p> \"2\"^^<http://www.w3.org/2001/XMLSchema#integer> ."
        );
    }
}
