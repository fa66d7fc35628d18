//! Scenario-based tests for ci-runner

mod dispatch;
mod fail_fast;
mod success_chain;
mod trigger_evaluation;
