//! Fact templates, materialization and sinks.

pub mod materializer;
pub mod sink;
pub mod template;

pub use materializer::{MaterializeReport, OutputMaterializer};
pub use sink::{CollectingSink, LineSink, OutputSink};
pub use template::{GenerateTemplate, NestedInvocation, TemplateElement, TemplateTerm, TripleTemplate};
