//! Stable exit codes for the scan runner CLI.
//!
//! A completed run exits [`OK`] regardless of what the findings say: findings
//! are data for downstream CI steps, not a process failure. Non-zero codes
//! mark misconfiguration that produced no durable report.

/// Run completed and a report was produced (or printed).
pub const OK: i32 = 0;
/// Invalid configuration or usage.
pub const INVALID: i32 = 1;
/// Target directory missing or not a directory.
pub const INVALID_TARGET: i32 = 2;
/// Required credential absent from the environment in live mode.
pub const MISSING_CREDENTIAL: i32 = 3;
/// Bridge server entry point absent in live mode.
pub const BRIDGE_NOT_FOUND: i32 = 4;
/// Report could not be persisted.
pub const WRITE_ERROR: i32 = 5;
