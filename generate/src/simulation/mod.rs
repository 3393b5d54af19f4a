//! Deterministic simulation of batch synchronization.
//!
//! Producers of an iterator stage interleave arbitrarily in production. This
//! module replays seeded random interleavings against `RoundBook` and the
//! `BatchSynchronizer` actor and checks the round invariants after every
//! step.
//!
//! # Design Principles
//!
//! 1. All randomness is seeded for reproducibility
//! 2. Given the same seed, the schedule and every closed round are identical
//! 3. A failing seed is printed so it can be replayed alone
//!
//! # Usage
//!
//! ```ignore
//! use simulation::simulator::{Simulator, SimulatorConfig};
//!
//! let config = SimulatorConfig::new(12345).with_producers(4).with_force_close_rate(0.2);
//! let result = Simulator::new(config).run();
//! assert!(result.passed(), "{:?}", result.invariant_violations);
//! ```

mod invariants;
mod schedule;
mod simulator;
