//! Per-run context shared by all components.

use std::path::PathBuf;

/// Immutable facts about one invocation: where the code lives, which commit
/// is being analyzed, and whether this is a dry run.
///
/// Created once by [`crate::io::resolve::resolve`] and never mutated after
/// construction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    /// Repository root (falls back to the working directory outside git).
    pub repo_root: PathBuf,
    /// Current commit id, when version metadata is available.
    pub commit_id: Option<String>,
    /// Directory the agent is asked to analyze.
    pub target_dir: PathBuf,
    /// Analysis-only mode: no credentials required, no mutating or bridge tools.
    pub dry_run: bool,
}
