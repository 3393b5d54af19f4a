//! Round invariants checked while a schedule is replayed.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use std::collections::BTreeSet;

use crate::pipeline::{ProducerId, Round, SyncReport};

/// A violated round invariant.
#[allow(dead_code)] // Fields are read through Debug in failure messages
#[derive(Debug, Clone)]
pub struct InvariantViolation {
    /// Description of the violation.
    pub description: String,
    /// Step index where it was detected.
    pub step: usize,
}

/// Mirrors what the book should know and checks every closed round.
#[derive(Debug)]
pub struct RoundChecker {
    contributed: Vec<u64>,
    terminated: Vec<bool>,
    last_sequence: Option<u64>,
    force_closed: bool,
    contributions: u64,
    delivered_contributions: u64,
    rounds: u64,
    violations: Vec<InvariantViolation>,
}

impl RoundChecker {
    #[must_use]
    pub fn new(producers: usize) -> Self {
        Self {
            contributed: vec![0; producers],
            terminated: vec![false; producers],
            last_sequence: None,
            force_closed: false,
            contributions: 0,
            delivered_contributions: 0,
            rounds: 0,
            violations: Vec::new(),
        }
    }

    #[must_use]
    pub fn violations(&self) -> &[InvariantViolation] {
        &self.violations
    }

    #[must_use]
    pub const fn rounds(&self) -> u64 {
        self.rounds
    }

    pub fn on_contribute(&mut self, producer: ProducerId) {
        self.contributed[producer.0] += 1;
        self.contributions += 1;
    }

    pub fn on_terminate(&mut self, producer: ProducerId) {
        self.terminated[producer.0] = true;
    }

    pub const fn on_force_close(&mut self) {
        self.force_closed = true;
    }

    /// Check one round as it leaves the book.
    pub fn on_round(&mut self, round: &Round, step: usize) {
        self.rounds += 1;
        self.delivered_contributions += round.contributors.len() as u64;

        if let Some(last) = self.last_sequence
            && round.sequence <= last
        {
            self.violate(step, format!("round {} closed after round {last}", round.sequence));
        }
        self.last_sequence = Some(round.sequence);

        let unique: BTreeSet<_> = round.contributors.iter().collect();
        if unique.len() != round.contributors.len() {
            self.violate(step, format!("round {} lists a producer twice", round.sequence));
        }

        for binding in &round.bindings {
            let tag = binding.get_by_name("k").and_then(crate::Value::as_integer);
            if tag.and_then(|k| u64::try_from(k).ok()) != Some(round.sequence) {
                self.violate(
                    step,
                    format!("round {} holds a binding from contribution {tag:?}", round.sequence),
                );
            }
        }

        if round.forced {
            if !self.force_closed {
                self.violate(step, format!("round {} forced without tear-down", round.sequence));
            }
            return;
        }

        let expected: Vec<ProducerId> = self
            .contributed
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > round.sequence)
            .map(|(i, _)| ProducerId(i))
            .collect();
        if round.contributors != expected {
            self.violate(
                step,
                format!(
                    "round {} closed with {:?}, expected {expected:?}",
                    round.sequence, round.contributors
                ),
            );
        }
        let complete = self
            .contributed
            .iter()
            .zip(&self.terminated)
            .all(|(count, terminated)| *terminated || *count > round.sequence);
        if !complete {
            self.violate(step, format!("round {} closed before it was complete", round.sequence));
        }
    }

    /// Check the totals once every producer has terminated.
    pub fn on_finish(&mut self, report: &SyncReport, finished: bool, step: usize) {
        if !finished {
            self.violate(step, "book not finished after every producer terminated".to_owned());
        }
        if report.rounds != self.rounds {
            self.violate(
                step,
                format!("report counts {} rounds, observed {}", report.rounds, self.rounds),
            );
        }
        if self.delivered_contributions + report.dropped_contributions != self.contributions {
            self.violate(
                step,
                format!(
                    "{} contributions made, {} delivered, {} dropped",
                    self.contributions, self.delivered_contributions, report.dropped_contributions
                ),
            );
        }
        if !self.force_closed {
            let expected = if self.contributed.is_empty() {
                1
            } else {
                self.contributed.iter().copied().max().unwrap_or(0)
            };
            if self.rounds != expected {
                self.violate(step, format!("{} rounds closed, expected {expected}", self.rounds));
            }
            if report.dropped_contributions != 0 {
                self.violate(step, "contribution dropped without tear-down".to_owned());
            }
        }
    }

    fn violate(&mut self, step: usize, description: String) {
        self.violations.push(InvariantViolation { description, step });
    }
}
