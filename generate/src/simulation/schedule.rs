//! Random but reproducible producer schedules.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::pipeline::ProducerId;

/// One event fed to the round book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// The producer's next contribution, carrying `width` bindings.
    Contribute { producer: ProducerId, width: usize },
    Terminate { producer: ProducerId },
    /// Tear-down of the stage.
    ForceClose,
}

/// A complete interleaving of producer events.
///
/// Every producer terminates exactly once, after its last contribution.
#[derive(Debug, Clone)]
pub struct Schedule {
    pub producers: usize,
    pub steps: Vec<Step>,
}

impl Schedule {
    /// Draw a schedule for `producers` producers with at most
    /// `max_contributions` contributions each.
    pub fn generate(
        seed: u64,
        producers: usize,
        max_contributions: usize,
        force_close_rate: f64,
    ) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut remaining: Vec<usize> = (0..producers)
            .map(|_| rng.random_range(0..=max_contributions))
            .collect();
        let mut live: Vec<usize> = (0..producers).collect();
        let mut steps = Vec::new();
        let mut force_closed = false;

        while !live.is_empty() {
            if !force_closed && rng.random::<f64>() < force_close_rate / 10.0 {
                force_closed = true;
                steps.push(Step::ForceClose);
            }
            let slot = rng.random_range(0..live.len());
            let index = live[slot];
            let producer = ProducerId(index);
            if remaining[index] == 0 {
                steps.push(Step::Terminate { producer });
                live.swap_remove(slot);
            } else {
                remaining[index] -= 1;
                steps.push(Step::Contribute {
                    producer,
                    width: rng.random_range(0..3),
                });
            }
        }
        Self { producers, steps }
    }

    #[must_use]
    pub fn is_forced(&self) -> bool {
        self.steps.contains(&Step::ForceClose)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_schedule() {
        let a = Schedule::generate(7, 4, 5, 0.5);
        let b = Schedule::generate(7, 4, 5, 0.5);
        assert_eq!(a.steps, b.steps);
    }

    #[test]
    fn test_every_producer_terminates_last() {
        let schedule = Schedule::generate(99, 5, 4, 0.0);
        for id in 0..5 {
            let producer = ProducerId(id);
            let terminations: Vec<usize> = schedule
                .steps
                .iter()
                .enumerate()
                .filter(|(_, step)| **step == Step::Terminate { producer })
                .map(|(i, _)| i)
                .collect();
            assert_eq!(terminations.len(), 1);
            let last_contribution = schedule
                .steps
                .iter()
                .rposition(|step| matches!(step, Step::Contribute { producer: p, .. } if *p == producer));
            assert!(last_contribution.is_none_or(|i| i < terminations[0]));
        }
        assert!(!schedule.is_forced());
    }
}
