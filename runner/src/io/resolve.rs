//! Context Resolver: repo root, commit id, and target directory.

use std::path::Path;

use tracing::debug;

use crate::core::context::RunContext;
use crate::error::RunError;
use crate::io::git::Git;

/// Resolve the run context for one invocation.
///
/// A target override must point at an existing directory and is normalized;
/// everything else degrades gracefully: outside version control the repo
/// root falls back to `cwd` and `commit_id` stays unset. Analysis must
/// proceed without version metadata, so a git failure is never an error.
/// No side effects beyond reads.
pub fn resolve(
    cwd: &Path,
    target_dir_override: Option<&Path>,
    commit_id_override: Option<String>,
    dry_run: bool,
) -> Result<RunContext, RunError> {
    let target_dir = match target_dir_override {
        Some(path) => {
            if !path.is_dir() {
                return Err(RunError::InvalidTarget {
                    path: path.to_path_buf(),
                    reason: "not an existing directory".to_string(),
                });
            }
            path.canonicalize().map_err(|err| RunError::InvalidTarget {
                path: path.to_path_buf(),
                reason: err.to_string(),
            })?
        }
        None => cwd.to_path_buf(),
    };

    let git = Git::new(cwd);
    let repo_root = match git.toplevel() {
        Ok(root) => root,
        Err(err) => {
            debug!(err = %err, "not in a git repository, using cwd as repo root");
            cwd.to_path_buf()
        }
    };
    let commit_id = commit_id_override.or_else(|| match git.head_sha() {
        Ok(sha) => Some(sha),
        Err(err) => {
            debug!(err = %err, "no commit id available");
            None
        }
    });

    debug!(
        target_dir = %target_dir.display(),
        commit = commit_id.as_deref().unwrap_or("<none>"),
        dry_run,
        "resolved run context"
    );
    Ok(RunContext {
        repo_root,
        commit_id,
        target_dir,
        dry_run,
    })
}
