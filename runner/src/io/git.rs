//! Git adapter for run metadata.
//!
//! The runner only reads from git (repository root and HEAD), so we keep a
//! small, explicit wrapper around `git` subprocess calls. Every operation is
//! fallible by design: running outside version control is supported and the
//! resolver degrades gracefully.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use anyhow::{anyhow, Context, Result};
use tracing::debug;

/// Wrapper for executing read-only git commands in a working directory.
#[derive(Debug, Clone)]
pub struct Git {
    workdir: PathBuf,
}

impl Git {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Return the repository root containing the working directory.
    pub fn toplevel(&self) -> Result<PathBuf> {
        let out = self.run_capture(&["rev-parse", "--show-toplevel"])?;
        let root = PathBuf::from(out.trim());
        debug!(root = %root.display(), "resolved repository root");
        Ok(root)
    }

    /// Return the full HEAD commit sha.
    pub fn head_sha(&self) -> Result<String> {
        let out = self.run_capture(&["rev-parse", "HEAD"])?;
        Ok(out.trim().to_string())
    }

    fn run_capture(&self, args: &[&str]) -> Result<String> {
        let output = self.run(args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("git {} failed: {}", args.join(" "), stderr.trim()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn run(&self, args: &[&str]) -> Result<Output> {
        Command::new("git")
            .args(args)
            .current_dir(&self.workdir)
            .output()
            .with_context(|| format!("spawn git {}", args.join(" ")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::process::Command;

    fn git_init(dir: &Path) {
        let run = |args: &[&str]| {
            let status = Command::new("git")
                .args(args)
                .current_dir(dir)
                .status()
                .expect("spawn git");
            assert!(status.success(), "git {args:?} failed");
        };
        run(&["init", "-q"]);
        run(&["config", "user.email", "runner@example.com"]);
        run(&["config", "user.name", "runner"]);
        std::fs::write(dir.join("README"), "fixture").expect("write file");
        run(&["add", "-A"]);
        run(&["commit", "-q", "-m", "init"]);
    }

    #[test]
    fn reads_toplevel_and_head_in_a_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        git_init(temp.path());

        let git = Git::new(temp.path());
        let root = git.toplevel().expect("toplevel");
        assert_eq!(
            root.canonicalize().expect("canonicalize"),
            temp.path().canonicalize().expect("canonicalize")
        );

        let sha = git.head_sha().expect("head sha");
        assert_eq!(sha.len(), 40);
        assert!(sha.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn fails_cleanly_outside_a_repo() {
        let temp = tempfile::tempdir().expect("tempdir");
        let git = Git::new(temp.path());
        assert!(git.toplevel().is_err());
        assert!(git.head_sha().is_err());
    }
}
