//! End-to-end tests at the `run` / `RunHandle` level.
//!
//! Each test file covers one scenario, driving whole pipelines through the
//! executor with deterministic inputs and inspecting what reached the sink.

#![cfg(test)]

mod helpers;

mod test_cancellation;
mod test_configuration;
mod test_doubling;
mod test_nested;
mod test_rounds;
mod test_selection;
mod test_stages;
