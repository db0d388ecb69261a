//! CI agent runner for LLM security scanning and guardrail insertion.
//!
//! This crate drives one agent session per invocation: it resolves the run
//! context, builds the AI Defense bridge configuration, launches the agent
//! runtime against a mode-specific prompt, collects the turn-by-turn
//! transcript, and persists a single JSON report. The architecture enforces
//! a strict separation:
//!
//! - **[`core`]**: Pure, deterministic logic (task construction, event-stream
//!   parsing, report projection). No I/O, fully testable in isolation.
//! - **[`io`]**: Side-effecting operations (git, process execution, config,
//!   bridge resolution, report persistence). Isolated to enable mocking in
//!   tests.
//!
//! The orchestration module ([`run`]) coordinates core logic with I/O to
//! implement the CLI commands.

pub mod core;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod logging;
pub mod run;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
