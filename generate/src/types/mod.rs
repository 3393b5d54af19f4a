//! Terms shared by bindings, templates and output facts.

pub mod triple;
pub mod value;
pub mod variable;

pub use triple::Triple;
pub use value::{BlankNode, Literal, Value};
pub use variable::Variable;
