use futures::StreamExt;
use futures::stream;

use super::{IteratorFunction, RANGE, TupleStream, check_count, integer_argument};
use crate::error::EvaluationError;
use crate::types::Value;

/// Most tuples a single `range` call may produce.
pub const MAX_RANGE_LENGTH: i128 = 1 << 20;

/// `range(start, end[, step])`: the integers from `start` up to, excluding,
/// `end`, emitted as a single contribution.
///
/// A range longer than `MAX_RANGE_LENGTH` is refused before anything is
/// allocated.
#[derive(Debug, Clone, Copy, Default)]
pub struct Range;

impl IteratorFunction for Range {
    fn check_arity(&self, argument_count: usize) -> Result<(), String> {
        check_count(argument_count, 2, 3)
    }

    fn call(&self, arguments: Vec<Value>) -> Result<TupleStream, EvaluationError> {
        let start = integer_argument(RANGE, &arguments, 0)?;
        let end = integer_argument(RANGE, &arguments, 1)?;
        let step = if arguments.len() > 2 {
            integer_argument(RANGE, &arguments, 2)?
        } else {
            1
        };
        if step == 0 {
            return Err(EvaluationError::InvalidArgument(
                "range step must not be zero".to_owned(),
            ));
        }

        let length = range_length(start, end, step);
        if length > MAX_RANGE_LENGTH {
            return Err(EvaluationError::InvalidArgument(format!(
                "range of {length} values exceeds the limit of {MAX_RANGE_LENGTH}"
            )));
        }

        let mut tuples = Vec::with_capacity(usize::try_from(length).unwrap_or_default());
        let mut current = start;
        while (step > 0 && current < end) || (step < 0 && current > end) {
            tuples.push(vec![Some(Value::integer(current))]);
            match current.checked_add(step) {
                Some(next) => current = next,
                None => break,
            }
        }
        Ok(stream::once(async move { Ok::<_, EvaluationError>(tuples) }).boxed())
    }
}

/// Number of values in the range. `step` is not zero.
fn range_length(start: i64, end: i64, step: i64) -> i128 {
    let (start, end, step) = (i128::from(start), i128::from(end), i128::from(step));
    let span = if step > 0 { end - start } else { start - end };
    if span <= 0 {
        return 0;
    }
    let step = step.abs();
    (span + step - 1) / step
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn collect(arguments: Vec<Value>) -> Vec<Vec<i64>> {
        let stream = Range.call(arguments).expect("valid arguments");
        stream
            .map(|batch| {
                batch
                    .expect("range never fails mid-stream")
                    .into_iter()
                    .map(|tuple| tuple[0].as_ref().and_then(Value::as_integer).expect("integer"))
                    .collect()
            })
            .collect()
            .await
    }

    #[tokio::test]
    async fn test_range_excludes_end() {
        let batches = collect(vec![Value::integer(1), Value::integer(4)]).await;
        assert_eq!(batches, vec![vec![1, 2, 3]]);
    }

    #[tokio::test]
    async fn test_range_negative_step() {
        let batches = collect(vec![Value::integer(3), Value::integer(0), Value::integer(-1)]).await;
        assert_eq!(batches, vec![vec![3, 2, 1]]);
    }

    #[tokio::test]
    async fn test_empty_range_still_contributes() {
        let batches = collect(vec![Value::integer(4), Value::integer(4)]).await;
        assert_eq!(batches, vec![Vec::<i64>::new()]);
    }

    #[test]
    fn test_zero_step_rejected() {
        assert!(Range
            .call(vec![Value::integer(0), Value::integer(3), Value::integer(0)])
            .is_err());
    }

    #[test]
    fn test_huge_range_refused() {
        let result = Range.call(vec![Value::integer(0), Value::integer(i64::MAX)]);
        assert!(matches!(result, Err(EvaluationError::InvalidArgument(_))));

        let result = Range.call(vec![Value::integer(i64::MAX), Value::integer(i64::MIN), Value::integer(-1)]);
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_limit_counts_values_not_span() {
        let end = i64::try_from(MAX_RANGE_LENGTH).expect("fits");
        assert!(Range.call(vec![Value::integer(0), Value::integer(end + 1)]).is_err());
        assert_eq!(range_length(0, end, 1), MAX_RANGE_LENGTH);

        // A large step keeps a wide span short.
        let batches = collect(vec![
            Value::integer(i64::MIN),
            Value::integer(i64::MAX),
            Value::integer(i64::MAX),
        ])
        .await;
        assert_eq!(batches, vec![vec![i64::MIN, -1, i64::MAX - 1]]);
    }

    #[test]
    fn test_arity() {
        assert!(Range.check_arity(2).is_ok());
        assert!(Range.check_arity(3).is_ok());
        assert!(Range.check_arity(1).is_err());
    }
}
