//! Side-effecting operations for the scan runner.
//!
//! Filesystem, git, subprocess execution, and report persistence live here,
//! behind small seams ([`driver::AgentBackend`] in particular) so tests can
//! substitute scripted fakes.

pub mod bridge;
pub mod config;
pub mod driver;
pub mod git;
pub mod process;
pub mod report;
pub mod resolve;
