//! RDF-like terms carried by bindings and emitted in facts.
//!
//! A `Value` is one of:
//! - an IRI
//! - a literal (lexical form, datatype IRI, optional language tag)
//! - a concrete blank node allocated by a `BlankNodeScope`
//!
//! Equality is structural: two values are equal when their content is equal.

use std::fmt;

/// Datatype IRI of plain string literals.
pub const XSD_STRING: &str = "http://www.w3.org/2001/XMLSchema#string";
/// Datatype IRI of integer literals.
pub const XSD_INTEGER: &str = "http://www.w3.org/2001/XMLSchema#integer";
/// Datatype IRI of boolean literals.
pub const XSD_BOOLEAN: &str = "http://www.w3.org/2001/XMLSchema#boolean";
/// Datatype IRI of language-tagged strings.
pub const RDF_LANG_STRING: &str = "http://www.w3.org/1999/02/22-rdf-syntax-ns#langString";
/// Prefix of the datatype IRI given to fetched documents of a known media type.
pub const MEDIA_TYPE_PREFIX: &str = "http://www.iana.org/assignments/media-types/";

/// Integer datatypes accepted by arithmetic.
const INTEGER_DATATYPES: [&str; 4] = [
    XSD_INTEGER,
    "http://www.w3.org/2001/XMLSchema#int",
    "http://www.w3.org/2001/XMLSchema#long",
    "http://www.w3.org/2001/XMLSchema#short",
];

/// A literal value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Literal {
    lexical: String,
    datatype: String,
    language: Option<String>,
}

impl Literal {
    /// Create a typed literal.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: datatype.into(),
            language: None,
        }
    }

    /// Create a language-tagged string.
    #[must_use]
    pub fn lang_string(lexical: impl Into<String>, language: impl Into<String>) -> Self {
        Self {
            lexical: lexical.into(),
            datatype: RDF_LANG_STRING.to_owned(),
            language: Some(language.into()),
        }
    }

    /// The lexical form.
    #[must_use]
    pub fn lexical(&self) -> &str {
        &self.lexical
    }

    /// The datatype IRI.
    #[must_use]
    pub fn datatype(&self) -> &str {
        &self.datatype
    }

    /// The language tag, if any.
    #[must_use]
    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }
}

/// A concrete blank node identifier.
///
/// Only `BlankNodeScope` allocates these; templates refer to placeholder
/// labels, never to concrete identifiers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlankNode(String);

impl BlankNode {
    pub(crate) const fn new(id: String) -> Self {
        Self(id)
    }

    /// The concrete identifier, without the `_:` prefix.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BlankNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "_:{}", self.0)
    }
}

/// A term bound to a variable or placed in a fact.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Value {
    Iri(String),
    Literal(Literal),
    Blank(BlankNode),
}

impl Value {
    /// Create an IRI value.
    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Iri(iri.into())
    }

    /// Create a plain string literal.
    #[must_use]
    pub fn string(s: impl Into<String>) -> Self {
        Self::Literal(Literal::typed(s, XSD_STRING))
    }

    /// Create an integer literal.
    #[must_use]
    pub fn integer(n: i64) -> Self {
        Self::Literal(Literal::typed(n.to_string(), XSD_INTEGER))
    }

    /// Create a boolean literal.
    #[must_use]
    pub fn boolean(b: bool) -> Self {
        Self::Literal(Literal::typed(b.to_string(), XSD_BOOLEAN))
    }

    /// Create a typed literal.
    #[must_use]
    pub fn typed(lexical: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self::Literal(Literal::typed(lexical, datatype))
    }

    /// Read this value as an integer, if it is an integer literal.
    #[must_use]
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Literal(literal) if INTEGER_DATATYPES.contains(&literal.datatype()) => {
                literal.lexical().trim().parse().ok()
            }
            _ => None,
        }
    }

    /// The IRI, if this is one.
    #[must_use]
    pub fn as_iri(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            _ => None,
        }
    }

    /// The literal, if this is one.
    #[must_use]
    pub const fn as_literal(&self) -> Option<&Literal> {
        match self {
            Self::Literal(literal) => Some(literal),
            _ => None,
        }
    }

    /// The string form used by `STR()`: the IRI itself or the lexical form.
    ///
    /// Blank nodes have no string form.
    #[must_use]
    pub fn lexical_form(&self) -> Option<&str> {
        match self {
            Self::Iri(iri) => Some(iri),
            Self::Literal(literal) => Some(literal.lexical()),
            Self::Blank(_) => None,
        }
    }

    #[must_use]
    pub const fn is_blank(&self) -> bool {
        matches!(self, Self::Blank(_))
    }

    #[must_use]
    pub const fn is_literal(&self) -> bool {
        matches!(self, Self::Literal(_))
    }
}

impl From<BlankNode> for Value {
    fn from(node: BlankNode) -> Self {
        Self::Blank(node)
    }
}

impl From<Literal> for Value {
    fn from(literal: Literal) -> Self {
        Self::Literal(literal)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Iri(iri) => write!(f, "<{iri}>"),
            Self::Blank(node) => write!(f, "{node}"),
            Self::Literal(literal) => {
                f.write_str("\"")?;
                write_escaped(f, literal.lexical())?;
                f.write_str("\"")?;
                if let Some(language) = literal.language() {
                    write!(f, "@{language}")
                } else if literal.datatype() == XSD_STRING {
                    Ok(())
                } else {
                    write!(f, "^^<{}>", literal.datatype())
                }
            }
        }
    }
}

fn write_escaped(f: &mut fmt::Formatter<'_>, s: &str) -> fmt::Result {
    for c in s.chars() {
        match c {
            '"' => f.write_str("\\\"")?,
            '\\' => f.write_str("\\\\")?,
            '\n' => f.write_str("\\n")?,
            '\r' => f.write_str("\\r")?,
            '\t' => f.write_str("\\t")?,
            _ => write!(f, "{c}")?,
        }
    }
    Ok(())
}
