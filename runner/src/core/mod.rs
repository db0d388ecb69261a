//! Pure, deterministic logic for the scan runner.
//!
//! Nothing in this module performs I/O. Task construction, event-stream
//! parsing, and report projection are all plain functions over plain data,
//! so they stay testable without a repo, a bridge, or an agent runtime.

pub mod context;
pub mod report;
pub mod session;
pub mod task;
