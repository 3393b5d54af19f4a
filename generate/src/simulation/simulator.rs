//! Main simulator harness for deterministic simulation testing.
//!
//! `run` replays a schedule step by step against a bare `RoundBook`.
//! `run_actor` gives each producer of the same schedule its own task and
//! lets the tokio scheduler pick the interleaving; only the per-producer
//! order is fixed.

// Simulation code legitimately needs cloning for test data
#![allow(clippy::disallowed_methods)]

use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use super::invariants::{InvariantViolation, RoundChecker};
use super::schedule::{Schedule, Step};
use crate::binding::Binding;
use crate::pipeline::{BatchSynchronizer, ProducerId, RoundBook};
use crate::types::{Value, Variable};

/// Configuration for the simulator.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    /// Random seed for reproducibility.
    pub seed: u64,
    pub producers: usize,
    pub max_contributions: usize,
    /// Likelihood that a schedule contains a tear-down.
    pub force_close_rate: f64,
}

impl SimulatorConfig {
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self {
            seed,
            producers: 3,
            max_contributions: 4,
            force_close_rate: 0.0,
        }
    }

    #[must_use]
    pub const fn with_producers(mut self, producers: usize) -> Self {
        self.producers = producers;
        self
    }

    #[must_use]
    pub const fn with_max_contributions(mut self, max: usize) -> Self {
        self.max_contributions = max;
        self
    }

    #[must_use]
    pub const fn with_force_close_rate(mut self, rate: f64) -> Self {
        self.force_close_rate = rate;
        self
    }
}

/// Results from a simulation run.
#[derive(Debug)]
pub struct SimulationResult {
    pub seed: u64,
    pub steps: usize,
    pub rounds: u64,
    pub forced: bool,
    pub invariant_violations: Vec<InvariantViolation>,
    /// Error message if the book rejected a step.
    pub error: Option<String>,
}

impl SimulationResult {
    #[must_use]
    pub fn passed(&self) -> bool {
        self.error.is_none() && self.invariant_violations.is_empty()
    }
}

pub struct Simulator {
    config: SimulatorConfig,
    schedule: Schedule,
}

impl Simulator {
    #[must_use]
    pub fn new(config: SimulatorConfig) -> Self {
        let schedule = Schedule::generate(
            config.seed,
            config.producers,
            config.max_contributions,
            config.force_close_rate,
        );
        Self { config, schedule }
    }

    #[must_use]
    pub const fn schedule(&self) -> &Schedule {
        &self.schedule
    }

    /// Replay the schedule against a bare round book.
    pub fn run(&self) -> SimulationResult {
        let mut book = RoundBook::new(self.schedule.producers);
        let mut checker = RoundChecker::new(self.schedule.producers);
        let mut sent = vec![0_i64; self.schedule.producers];
        let mut error = None;

        for round in book.start() {
            checker.on_round(&round, 0);
        }
        for (index, step) in self.schedule.steps.iter().enumerate() {
            let closed = match *step {
                Step::Contribute { producer, width } => {
                    checker.on_contribute(producer);
                    let bindings = tagged(producer, sent[producer.0], width);
                    sent[producer.0] += 1;
                    book.contribute(producer, bindings)
                }
                Step::Terminate { producer } => {
                    checker.on_terminate(producer);
                    book.terminate(producer)
                }
                Step::ForceClose => {
                    checker.on_force_close();
                    Ok(book.force_close())
                }
            };
            match closed {
                Ok(rounds) => {
                    for round in &rounds {
                        checker.on_round(round, index);
                    }
                }
                Err(e) => {
                    error = Some(format!("step {index}: {e}"));
                    break;
                }
            }
        }

        checker.on_finish(&book.report(), book.is_finished(), self.schedule.steps.len());
        self.result(&checker, error)
    }

    /// Replay the schedule through the synchronizer actor, one task per
    /// producer. Tear-down steps are ignored.
    pub async fn run_actor(&self) -> SimulationResult {
        let producers = self.schedule.producers;
        let (sync, mut rounds) =
            BatchSynchronizer::spawn(&Handle::current(), producers, 2, CancellationToken::new());

        let mut tasks = Vec::new();
        for id in 0..producers {
            let producer = sync.producer(ProducerId(id));
            let widths: Vec<usize> = self
                .schedule
                .steps
                .iter()
                .filter_map(|step| match *step {
                    Step::Contribute { producer: p, width } if p.0 == id => Some(width),
                    _ => None,
                })
                .collect();
            tasks.push(tokio::spawn(async move {
                for (k, width) in (0_i64..).zip(widths) {
                    producer.contribute(tagged(producer.id(), k, width)).await;
                    tokio::task::yield_now().await;
                }
                producer.terminate().await;
            }));
        }

        // Every contribution is already made by the time its round closes, so
        // the checker can be fed the whole schedule up front.
        let mut checker = RoundChecker::new(producers);
        for step in &self.schedule.steps {
            match *step {
                Step::Contribute { producer, .. } => checker.on_contribute(producer),
                Step::Terminate { producer } => checker.on_terminate(producer),
                Step::ForceClose => {}
            }
        }

        let mut closed = Vec::new();
        while let Some(round) = rounds.recv().await {
            closed.push(round);
        }
        for task in tasks {
            if let Err(e) = task.await {
                return self.result(&checker, Some(format!("producer task failed: {e}")));
            }
        }
        let report = match sync.finish().await {
            Ok(report) => report,
            Err(e) => return self.result(&checker, Some(e.to_string())),
        };

        let mut last_sequence = None;
        for (index, round) in closed.iter().enumerate() {
            if round.forced {
                return self.result(&checker, Some(format!("round {} was forced", round.sequence)));
            }
            if last_sequence.is_some_and(|last| round.sequence <= last) {
                return self.result(&checker, Some(format!("round {} out of order", round.sequence)));
            }
            last_sequence = Some(round.sequence);
            checker.on_round(round, index);
        }
        checker.on_finish(&report, true, closed.len());
        self.result(&checker, None)
    }

    fn result(&self, checker: &RoundChecker, error: Option<String>) -> SimulationResult {
        SimulationResult {
            seed: self.config.seed,
            steps: self.schedule.steps.len(),
            rounds: checker.rounds(),
            forced: self.schedule.is_forced(),
            invariant_violations: checker.violations().to_vec(),
            error,
        }
    }
}

/// `width` bindings tagged with their producer and contribution index.
fn tagged(producer: ProducerId, contribution: i64, width: usize) -> Vec<Binding> {
    (0_i64..)
        .take(width)
        .map(|i| {
            Binding::from_pairs([
                (Variable::new("p"), Value::integer(i64::try_from(producer.0).unwrap_or(i64::MAX))),
                (Variable::new("k"), Value::integer(contribution)),
                (Variable::new("i"), Value::integer(i)),
            ])
            .expect("distinct variables")
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_many_seeds_without_tear_down() {
        for seed in 0..200 {
            let config = SimulatorConfig::new(seed)
                .with_producers(usize::try_from(seed % 6).expect("small"))
                .with_max_contributions(5);
            let result = Simulator::new(config).run();
            assert!(
                result.passed(),
                "seed {} ({} steps): {:?} {:?}",
                result.seed,
                result.steps,
                result.error,
                result.invariant_violations
            );
            assert!(!result.forced);
        }
    }

    #[test]
    fn test_many_seeds_with_tear_down() {
        let mut forced = 0;
        for seed in 0..200 {
            let config = SimulatorConfig::new(seed)
                .with_producers(4)
                .with_max_contributions(6)
                .with_force_close_rate(1.0);
            let result = Simulator::new(config).run();
            assert!(
                result.passed(),
                "seed {} ({} steps): {:?} {:?}",
                result.seed,
                result.steps,
                result.error,
                result.invariant_violations
            );
            if result.forced {
                forced += 1;
            }
        }
        assert!(forced > 0, "no schedule exercised a tear-down");
    }

    #[test]
    fn test_replay_is_deterministic() {
        let config = SimulatorConfig::new(4242).with_producers(5).with_force_close_rate(0.5);
        let first = Simulator::new(config.clone());
        let second = Simulator::new(config);
        assert_eq!(first.schedule().steps, second.schedule().steps);
        assert_eq!(first.run().rounds, second.run().rounds);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_actor_under_real_scheduling() {
        for seed in 0..25 {
            let config = SimulatorConfig::new(seed)
                .with_producers(usize::try_from(seed % 5).expect("small"))
                .with_max_contributions(4);
            let result = Simulator::new(config).run_actor().await;
            assert!(
                result.passed(),
                "seed {} ({} steps): {:?} {:?}",
                result.seed,
                result.steps,
                result.error,
                result.invariant_violations
            );
        }
    }
}
