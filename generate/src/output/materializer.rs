//! Turns completed rows into concrete facts.
//!
//! # Invariants
//!
//! - A triple template yields a fact only when all three positions resolve
//!   to a well-formed triple; otherwise it is skipped silently.
//! - Scoped blank nodes resolve through the invocation's `BlankNodeScope`,
//!   so the same label and key values give the same node across rows and
//!   rounds.
//! - Row-scoped blank nodes are fresh per row, shared by the row's triples.

use std::collections::HashMap;

use tracing::trace;

use super::sink::OutputSink;
use super::template::{GenerateTemplate, TemplateTerm};
use crate::binding::Binding;
use crate::bnode::BlankNodeScope;
use crate::error::GenerateError;
use crate::types::{BlankNode, Triple, Value};

/// Counts of one materialization.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MaterializeReport {
    pub facts_emitted: usize,
    /// Triple templates with an unresolved or ill-formed position.
    pub triples_skipped: usize,
}

/// Applies a template to rows within one blank node scope.
pub struct OutputMaterializer<'a> {
    template: &'a GenerateTemplate,
    scope: &'a BlankNodeScope,
}

impl<'a> OutputMaterializer<'a> {
    #[must_use]
    pub const fn new(template: &'a GenerateTemplate, scope: &'a BlankNodeScope) -> Self {
        Self { template, scope }
    }

    /// Emit the facts of every row to the sink.
    pub fn materialize(
        &self,
        rows: &[Binding],
        sink: &dyn OutputSink,
    ) -> Result<MaterializeReport, GenerateError> {
        let mut report = MaterializeReport::default();
        for row in rows {
            let mut row_nodes: HashMap<&str, BlankNode> = HashMap::new();
            for template in self.template.triples() {
                let subject = self.resolve(&template.subject, row, &mut row_nodes)?;
                let predicate = self.resolve(&template.predicate, row, &mut row_nodes)?;
                let object = self.resolve(&template.object, row, &mut row_nodes)?;
                let fact = match (subject, predicate, object) {
                    (Some(s), Some(p), Some(o)) => Triple::new(s, p, o),
                    _ => None,
                };
                match fact {
                    Some(fact) => {
                        trace!(fact = %fact, "emitting fact");
                        sink.fact(fact);
                        report.facts_emitted += 1;
                    }
                    None => report.triples_skipped += 1,
                }
            }
        }
        Ok(report)
    }

    fn resolve<'t>(
        &self,
        term: &'t TemplateTerm,
        row: &Binding,
        row_nodes: &mut HashMap<&'t str, BlankNode>,
    ) -> Result<Option<Value>, GenerateError> {
        match term {
            TemplateTerm::Constant(value) => Ok(Some(value.clone())),
            TemplateTerm::Variable(variable) => Ok(row.get(variable).cloned()),
            TemplateTerm::ScopedBlank { label, keys } => {
                let Some(key) = keys
                    .iter()
                    .map(|k| row.get(k).cloned())
                    .collect::<Option<Vec<_>>>()
                else {
                    return Ok(None);
                };
                Ok(Some(Value::Blank(self.scope.resolve(label, &key)?)))
            }
            TemplateTerm::RowBlank(label) => {
                if let Some(node) = row_nodes.get(label.as_str()) {
                    return Ok(Some(Value::Blank(node.clone())));
                }
                let node = self.scope.fresh()?;
                row_nodes.insert(label, node.clone());
                Ok(Some(Value::Blank(node)))
            }
        }
    }
}
