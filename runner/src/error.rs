//! Fail-fast error taxonomy for a scan run.
//!
//! These errors abort the run before or after the agent session; session-level
//! failures never surface here. The Agent Driver captures them into
//! [`crate::core::session::SessionResult`] instead, so a best-effort report
//! can still be written.

use std::path::PathBuf;

use thiserror::Error;

use crate::exit_codes;

/// Misconfiguration that no retry can fix. Aborts with a stable exit code.
#[derive(Debug, Error)]
pub enum RunError {
    /// The target directory override does not point at an existing directory.
    #[error("invalid target directory {path}: {reason}")]
    InvalidTarget { path: PathBuf, reason: String },

    /// A required credential is absent from the environment in live mode.
    #[error("missing credential {name} (set it in the environment, or pass --dry-run)")]
    MissingCredential { name: String },

    /// The bridge server entry point is absent from its expected location.
    #[error("bridge server entry point not found at {expected}")]
    BridgeNotFound { expected: PathBuf },

    /// The report could not be persisted; the run produced no durable evidence.
    #[error("failed to write report {path}: {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid configuration file or other pre-session setup failure.
    #[error("invalid configuration: {0:#}")]
    Config(anyhow::Error),
}

impl From<anyhow::Error> for RunError {
    fn from(err: anyhow::Error) -> Self {
        RunError::Config(err)
    }
}

impl RunError {
    /// Stable process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            RunError::InvalidTarget { .. } => exit_codes::INVALID_TARGET,
            RunError::MissingCredential { .. } => exit_codes::MISSING_CREDENTIAL,
            RunError::BridgeNotFound { .. } => exit_codes::BRIDGE_NOT_FOUND,
            RunError::WriteError { .. } => exit_codes::WRITE_ERROR,
            RunError::Config(_) => exit_codes::INVALID,
        }
    }
}
