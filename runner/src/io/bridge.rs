//! Bridge Config Builder for the AI Defense MCP server.
//!
//! Pure construction: this module only decides how the bridge server would be
//! launched (command, args, working directory, credentials). The server
//! process itself is owned by the agent runtime for the duration of the
//! session; nothing is spawned here.

use std::collections::BTreeMap;
use std::env;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::RunError;
use crate::io::config::BridgeLocation;

/// Management credential required by the AI Defense backend.
pub const MANAGEMENT_CREDENTIAL: &str = "AIC_MANAGEMENT_API_KEY";
/// Authentication credential consumed by the agent runtime.
pub const AGENT_CREDENTIAL: &str = "ANTHROPIC_API_KEY";

const CREDENTIAL_NAMES: [&str; 2] = [MANAGEMENT_CREDENTIAL, AGENT_CREDENTIAL];

/// Launch description for the bridge server, owned by the Agent Driver for
/// one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeConfig {
    pub server_command: String,
    pub server_args: Vec<String>,
    pub working_dir: PathBuf,
    /// Credential name to value. Injected into the agent process environment,
    /// never written to disk and never logged.
    pub credentials: BTreeMap<String, String>,
    /// Whether the bridge may be attached to the session. Always false in
    /// dry-run mode, so the validation server is never contacted.
    pub reachable: bool,
}

/// Read the known credential variables from the process environment into an
/// explicit mapping. Keeping this a plain map keeps credential handling
/// auditable and testable with fakes.
pub fn credentials_from_env() -> BTreeMap<String, String> {
    let mut credentials = BTreeMap::new();
    for name in CREDENTIAL_NAMES {
        if let Ok(value) = env::var(name) {
            credentials.insert(name.to_string(), value);
        }
    }
    credentials
}

/// Assemble the bridge configuration for one run.
///
/// Live runs require every known credential and the server entry point on
/// disk; dry runs tolerate both being absent and simply mark the bridge
/// unreachable (the driver then restricts the task to read-only tools).
pub fn build(
    location: &BridgeLocation,
    repo_root: &Path,
    credentials: &BTreeMap<String, String>,
    dry_run: bool,
) -> Result<BridgeConfig, RunError> {
    let mut session_credentials = BTreeMap::new();
    for name in CREDENTIAL_NAMES {
        match credentials.get(name) {
            Some(value) => {
                session_credentials.insert(name.to_string(), value.clone());
            }
            None if dry_run => {
                debug!(credential = name, "credential absent, tolerated in dry-run");
            }
            None => {
                return Err(RunError::MissingCredential {
                    name: name.to_string(),
                });
            }
        }
    }

    let working_dir = repo_root.join(&location.dir);
    let entry = working_dir.join(&location.entry);
    let entry_exists = entry.is_file();
    if !entry_exists && !dry_run {
        return Err(RunError::BridgeNotFound { expected: entry });
    }

    // Prefer the bridge checkout's own venv, matching its deployment layout.
    let venv_python = working_dir.join(".venv").join("bin").join("python");
    let server_command = if venv_python.is_file() {
        venv_python.display().to_string()
    } else {
        "python3".to_string()
    };

    debug!(
        entry = %entry.display(),
        entry_exists,
        dry_run,
        credential_count = session_credentials.len(),
        "bridge config assembled"
    );
    Ok(BridgeConfig {
        server_command,
        server_args: vec!["-m".to_string(), entry_module(&location.entry)],
        working_dir,
        credentials: session_credentials,
        reachable: !dry_run,
    })
}

/// Convert the entry point path into the module the server is started as
/// (`src/server.py` runs as `python -m src.server`).
fn entry_module(entry: &str) -> String {
    entry
        .trim_end_matches(".py")
        .replace(['/', '\\'], ".")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write_entry(root: &Path, location: &BridgeLocation) {
        let entry = root.join(&location.dir).join(&location.entry);
        fs::create_dir_all(entry.parent().expect("parent")).expect("mkdir");
        fs::write(entry, "# server").expect("write entry");
    }

    fn full_credentials() -> BTreeMap<String, String> {
        BTreeMap::from([
            (MANAGEMENT_CREDENTIAL.to_string(), "mgmt-key".to_string()),
            (AGENT_CREDENTIAL.to_string(), "agent-key".to_string()),
        ])
    }

    #[test]
    fn dry_run_without_credentials_is_unreachable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let config = build(
            &BridgeLocation::default(),
            temp.path(),
            &BTreeMap::new(),
            true,
        )
        .expect("build");

        assert!(!config.reachable);
        assert!(config.credentials.is_empty());
    }

    #[test]
    fn live_without_management_key_names_the_variable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let location = BridgeLocation::default();
        write_entry(temp.path(), &location);
        let mut credentials = full_credentials();
        credentials.remove(MANAGEMENT_CREDENTIAL);

        let err = build(&location, temp.path(), &credentials, false).unwrap_err();
        match err {
            RunError::MissingCredential { name } => assert_eq!(name, MANAGEMENT_CREDENTIAL),
            other => panic!("expected MissingCredential, got {other}"),
        }
    }

    #[test]
    fn live_without_entry_point_is_bridge_not_found() {
        let temp = tempfile::tempdir().expect("tempdir");
        let err = build(
            &BridgeLocation::default(),
            temp.path(),
            &full_credentials(),
            false,
        )
        .unwrap_err();
        match err {
            RunError::BridgeNotFound { expected } => {
                assert!(expected.ends_with("ai-defense-mcp/src/server.py"));
            }
            other => panic!("expected BridgeNotFound, got {other}"),
        }
    }

    #[test]
    fn live_with_entry_and_credentials_is_reachable() {
        let temp = tempfile::tempdir().expect("tempdir");
        let location = BridgeLocation::default();
        write_entry(temp.path(), &location);

        let config = build(&location, temp.path(), &full_credentials(), false).expect("build");
        assert!(config.reachable);
        assert_eq!(config.server_command, "python3");
        assert_eq!(config.server_args, vec!["-m", "src.server"]);
        assert_eq!(config.working_dir, temp.path().join("ai-defense-mcp"));
        assert_eq!(config.credentials.len(), 2);
    }

    #[test]
    fn venv_python_is_preferred_when_present() {
        let temp = tempfile::tempdir().expect("tempdir");
        let location = BridgeLocation::default();
        write_entry(temp.path(), &location);
        let venv = temp.path().join("ai-defense-mcp/.venv/bin");
        fs::create_dir_all(&venv).expect("mkdir venv");
        fs::write(venv.join("python"), "").expect("write python");

        let config = build(&location, temp.path(), &full_credentials(), false).expect("build");
        assert!(config.server_command.ends_with(".venv/bin/python"));
    }

    #[test]
    fn entry_module_maps_paths_to_modules() {
        assert_eq!(entry_module("src/server.py"), "src.server");
        assert_eq!(entry_module("server.py"), "server");
    }
}
