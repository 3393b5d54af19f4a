//! Output sinks receiving materialized facts.
//!
//! # Thread Safety
//!
//! `fact` is called concurrently from any task of an invocation. Sinks
//! serialize writes internally.

use std::io::Write;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::warn;

use crate::types::Triple;

/// Receives the facts of one top-level invocation.
///
/// `start` is called once before any fact and `finish` once after every
/// in-flight branch of the invocation has completed.
pub trait OutputSink: Send + Sync {
    fn start(&self);
    fn fact(&self, triple: Triple);
    fn finish(&self);
}

#[derive(Debug, Default)]
struct Recorded {
    started: usize,
    finished: usize,
    facts: Vec<Triple>,
    facts_after_finish: usize,
}

/// Keeps every fact in memory and records lifecycle calls.
#[derive(Debug, Default)]
pub struct CollectingSink {
    recorded: Mutex<Recorded>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Recorded> {
        // A panicking writer cannot leave the record half-updated.
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Facts received so far, in arrival order.
    #[must_use]
    pub fn facts(&self) -> Vec<Triple> {
        self.lock().facts.clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().facts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().facts.is_empty()
    }

    #[must_use]
    pub fn start_count(&self) -> usize {
        self.lock().started
    }

    #[must_use]
    pub fn finish_count(&self) -> usize {
        self.lock().finished
    }

    /// Facts that arrived after `finish`. Always zero for a correct run.
    #[must_use]
    pub fn facts_after_finish(&self) -> usize {
        self.lock().facts_after_finish
    }
}

impl OutputSink for CollectingSink {
    fn start(&self) {
        self.lock().started += 1;
    }

    fn fact(&self, triple: Triple) {
        let mut recorded = self.lock();
        if recorded.finished > 0 {
            recorded.facts_after_finish += 1;
        }
        recorded.facts.push(triple);
    }

    fn finish(&self) {
        self.lock().finished += 1;
    }
}

/// Writes one line per fact.
#[derive(Debug)]
pub struct LineSink<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> LineSink<W> {
    pub const fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    /// Recover the writer.
    pub fn into_inner(self) -> W {
        self.writer.into_inner().unwrap_or_else(PoisonError::into_inner)
    }

    fn lock(&self) -> MutexGuard<'_, W> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<W: Write + Send> OutputSink for LineSink<W> {
    fn start(&self) {}

    fn fact(&self, triple: Triple) {
        if let Err(e) = writeln!(self.lock(), "{triple}") {
            warn!(error = %e, "failed to write fact");
        }
    }

    fn finish(&self) {
        if let Err(e) = self.lock().flush() {
            warn!(error = %e, "failed to flush output");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Value;

    fn fact(n: i64) -> Triple {
        Triple::new(Value::iri("http://ex.org/s"), Value::iri("http://ex.org/p"), Value::integer(n))
            .expect("valid")
    }

    #[test]
    fn test_collecting_sink_records_lifecycle() {
        let sink = CollectingSink::new();
        sink.start();
        sink.fact(fact(1));
        sink.finish();
        assert_eq!(sink.start_count(), 1);
        assert_eq!(sink.finish_count(), 1);
        assert_eq!(sink.facts(), vec![fact(1)]);
        assert_eq!(sink.facts_after_finish(), 0);

        sink.fact(fact(2));
        assert_eq!(sink.facts_after_finish(), 1);
    }

    #[test]
    fn test_line_sink_writes_lines() {
        let sink = LineSink::new(Vec::new());
        sink.start();
        sink.fact(fact(1));
        sink.finish();
        let text = String::from_utf8(sink.into_inner()).expect("utf8");
        assert_eq!(
            text,
            "<http://ex.org/s> <http://ex.org/p> \"1\"^^<http://www.w3.org/2001/XMLSchema#integer> .\n"
        );
    }
}
