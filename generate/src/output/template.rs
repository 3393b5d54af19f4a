//! Fact templates.

use std::fmt;

use crate::types::{Value, Variable};

/// One position of a triple template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateTerm {
    Constant(Value),
    Variable(Variable),
    /// `_:label{?k1 ?k2}`: one node per label and key values, for the whole
    /// invocation.
    ScopedBlank { label: String, keys: Vec<Variable> },
    /// A node that is fresh for every output row.
    RowBlank(String),
}

impl TemplateTerm {
    #[must_use]
    pub fn var(name: impl AsRef<str>) -> Self {
        Self::Variable(Variable::new(name))
    }

    #[must_use]
    pub fn iri(iri: impl Into<String>) -> Self {
        Self::Constant(Value::iri(iri))
    }

    /// A blank node shared by the whole invocation.
    #[must_use]
    pub fn blank(label: impl Into<String>) -> Self {
        Self::ScopedBlank {
            label: label.into(),
            keys: Vec::new(),
        }
    }

    /// A blank node keyed by the values of some variables.
    #[must_use]
    pub fn keyed_blank(label: impl Into<String>, keys: &[&str]) -> Self {
        Self::ScopedBlank {
            label: label.into(),
            keys: keys.iter().map(Variable::new).collect(),
        }
    }

    #[must_use]
    pub fn row_blank(label: impl Into<String>) -> Self {
        Self::RowBlank(label.into())
    }
}

impl fmt::Display for TemplateTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Constant(value) => write!(f, "{value}"),
            Self::Variable(variable) => write!(f, "{variable}"),
            Self::ScopedBlank { label, keys } => {
                write!(f, "_:{label}")?;
                if !keys.is_empty() {
                    f.write_str("{")?;
                    for (i, key) in keys.iter().enumerate() {
                        if i > 0 {
                            f.write_str(" ")?;
                        }
                        write!(f, "{key}")?;
                    }
                    f.write_str("}")?;
                }
                Ok(())
            }
            Self::RowBlank(label) => write!(f, "[{label}]"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripleTemplate {
    pub subject: TemplateTerm,
    pub predicate: TemplateTerm,
    pub object: TemplateTerm,
}

impl TripleTemplate {
    #[must_use]
    pub const fn new(subject: TemplateTerm, predicate: TemplateTerm, object: TemplateTerm) -> Self {
        Self {
            subject,
            predicate,
            object,
        }
    }
}

impl fmt::Display for TripleTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {} .", self.subject, self.predicate, self.object)
    }
}

/// A call to another registered pipeline for each completed round.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NestedInvocation {
    /// Name in the pipeline registry.
    pub name: String,
    /// Rows are projected onto these variables before the call.
    pub parameters: Vec<Variable>,
    /// Reuse the caller's blank node scope instead of a fresh one.
    pub share_scope: bool,
}

impl NestedInvocation {
    #[must_use]
    pub fn new(name: impl Into<String>, parameters: &[&str]) -> Self {
        Self {
            name: name.into(),
            parameters: parameters.iter().map(Variable::new).collect(),
            share_scope: false,
        }
    }

    #[must_use]
    pub const fn sharing_scope(mut self) -> Self {
        self.share_scope = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateElement {
    Triple(TripleTemplate),
    Nested(NestedInvocation),
}

/// The output part of a pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateTemplate {
    elements: Vec<TemplateElement>,
}

impl GenerateTemplate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn triple(mut self, subject: TemplateTerm, predicate: TemplateTerm, object: TemplateTerm) -> Self {
        self.elements
            .push(TemplateElement::Triple(TripleTemplate::new(subject, predicate, object)));
        self
    }

    #[must_use]
    pub fn nested(mut self, invocation: NestedInvocation) -> Self {
        self.elements.push(TemplateElement::Nested(invocation));
        self
    }

    #[must_use]
    pub fn elements(&self) -> &[TemplateElement] {
        &self.elements
    }

    pub fn triples(&self) -> impl Iterator<Item = &TripleTemplate> {
        self.elements.iter().filter_map(|element| match element {
            TemplateElement::Triple(triple) => Some(triple),
            TemplateElement::Nested(_) => None,
        })
    }

    pub fn nested_invocations(&self) -> impl Iterator<Item = &NestedInvocation> {
        self.elements.iter().filter_map(|element| match element {
            TemplateElement::Nested(nested) => Some(nested),
            TemplateElement::Triple(_) => None,
        })
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }
}
