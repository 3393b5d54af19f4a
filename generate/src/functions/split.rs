use futures::StreamExt;
use futures::stream;

use super::{IteratorFunction, SPLIT, TupleStream, check_count};
use crate::error::EvaluationError;
use crate::types::Value;

/// `split(text, separator)`: every piece of `text` between separators, as
/// plain strings, in one contribution. Empty pieces are skipped.
#[derive(Debug, Clone, Copy, Default)]
pub struct Split;

impl IteratorFunction for Split {
    fn check_arity(&self, argument_count: usize) -> Result<(), String> {
        check_count(argument_count, 2, 2)
    }

    fn call(&self, arguments: Vec<Value>) -> Result<TupleStream, EvaluationError> {
        let [text, separator] = arguments.as_slice() else {
            return Err(EvaluationError::Function {
                function: SPLIT.to_owned(),
                message: format!("expected 2 arguments, got {}", arguments.len()),
            });
        };
        let text = literal_text(text)?;
        let separator = literal_text(separator)?;
        if separator.is_empty() {
            return Err(EvaluationError::InvalidArgument(
                "split separator must not be empty".to_owned(),
            ));
        }

        let tuples: Vec<_> = text
            .split(separator)
            .filter(|piece| !piece.is_empty())
            .map(|piece| vec![Some(Value::string(piece))])
            .collect();
        Ok(stream::once(async move { Ok::<_, EvaluationError>(tuples) }).boxed())
    }
}

fn literal_text(value: &Value) -> Result<&str, EvaluationError> {
    value
        .as_literal()
        .map(crate::types::Literal::lexical)
        .ok_or_else(|| EvaluationError::TypeMismatch {
            expected: "literal",
            found: value.to_string(),
        })
}
