use std::time::Duration;

use futures::StreamExt;
use futures::stream;
use tokio::time::{Interval, MissedTickBehavior};

use super::{IteratorFunction, PERIODIC, TupleStream, check_count, integer_argument};
use crate::error::EvaluationError;
use crate::types::Value;

/// `periodic(interval_ms[, count])`: one contribution per interval holding a
/// single tuple with an increasing counter, starting at 0.
///
/// Without `count` the stream never ends; only cancellation stops it.
#[derive(Debug, Clone, Copy, Default)]
pub struct Periodic;

struct State {
    interval: Option<Interval>,
    period: Duration,
    next: i64,
    remaining: Option<i64>,
}

impl IteratorFunction for Periodic {
    fn check_arity(&self, argument_count: usize) -> Result<(), String> {
        check_count(argument_count, 1, 2)
    }

    fn call(&self, arguments: Vec<Value>) -> Result<TupleStream, EvaluationError> {
        let millis = integer_argument(PERIODIC, &arguments, 0)?;
        let millis = u64::try_from(millis)
            .ok()
            .filter(|ms| *ms > 0)
            .ok_or_else(|| {
                EvaluationError::InvalidArgument(format!(
                    "periodic interval must be positive, got {millis}"
                ))
            })?;
        let remaining = if arguments.len() > 1 {
            let count = integer_argument(PERIODIC, &arguments, 1)?;
            if count < 0 {
                return Err(EvaluationError::InvalidArgument(format!(
                    "periodic count must not be negative, got {count}"
                )));
            }
            Some(count)
        } else {
            None
        };

        // The interval is created on first poll so that `call` works outside
        // of a runtime context.
        let state = State {
            interval: None,
            period: Duration::from_millis(millis),
            next: 0,
            remaining,
        };
        Ok(stream::unfold(state, |mut state| async move {
            if state.remaining == Some(0) {
                return None;
            }
            let period = state.period;
            let interval = state.interval.get_or_insert_with(|| {
                let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                interval
            });
            interval.tick().await;

            let tuple = vec![Some(Value::integer(state.next))];
            state.next += 1;
            state.remaining = state.remaining.map(|n| n - 1);
            Some((Ok::<_, EvaluationError>(vec![tuple]), state))
        })
        .boxed())
    }
}
