//! Orchestration for a single scan run.
//!
//! Strictly sequential: Context Resolver, Bridge Config Builder, Agent
//! Driver, Report Writer. Resolver and builder failures abort before any
//! session starts; session failures are folded into the report; only a write
//! failure after the session aborts the run without durable evidence.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{info, instrument};

use crate::core::report::{build_report, Report};
use crate::core::task::{build_task, Mode, TaskInputs};
use crate::error::RunError;
use crate::io::bridge;
use crate::io::config::{config_path, load_config};
use crate::io::driver::{run_session, AgentBackend};
use crate::io::report::write_report;
use crate::io::resolve::resolve;

/// Caller-supplied parameters for one run (one per CLI invocation).
#[derive(Debug, Clone)]
pub struct RunRequest {
    pub mode: Mode,
    pub target_dir: Option<PathBuf>,
    pub commit_id: Option<String>,
    pub dry_run: bool,
    /// Report destination. `None` means print-only: the report is returned
    /// but nothing is persisted.
    pub output: Option<PathBuf>,
    /// Tee of the raw agent event stream for audit replay.
    pub transcript: Option<PathBuf>,
    /// Config file override (default: `.aisec/config.toml` under the repo root).
    pub config: Option<PathBuf>,
}

/// Execute one scan run end to end and return the report.
///
/// The agent session itself never fails this function: a failed session
/// yields a report with `success = false`. Exactly one bridge config and one
/// task exist per run, and the session is never retried here.
#[instrument(skip_all, fields(mode = request.mode.as_str(), dry_run = request.dry_run))]
pub fn run_scan<B: AgentBackend>(
    backend: &B,
    cwd: &Path,
    credentials: &BTreeMap<String, String>,
    request: &RunRequest,
) -> Result<Report, RunError> {
    let context = resolve(
        cwd,
        request.target_dir.as_deref(),
        request.commit_id.clone(),
        request.dry_run,
    )?;
    let config_file = request
        .config
        .clone()
        .unwrap_or_else(|| config_path(&context.repo_root));
    let config = load_config(&config_file)?;

    let bridge = bridge::build(
        &config.bridge,
        &context.repo_root,
        credentials,
        context.dry_run,
    )?;
    let task = build_task(
        &config.tools,
        request.mode,
        &TaskInputs {
            target_dir: &context.target_dir,
            dry_run: context.dry_run,
            bridge_reachable: bridge.reachable,
        },
    )?;

    let session = run_session(
        backend,
        &task,
        &context,
        &bridge,
        &config,
        request.transcript.as_deref(),
    );
    info!(
        success = session.success,
        turns = session.turns.len(),
        findings = session.findings.len(),
        "session finished"
    );

    let report = build_report(&session, &context, request.mode, Utc::now());
    if let Some(path) = &request.output {
        write_report(&report, path)?;
        info!(path = %path.display(), "report persisted");
    }
    Ok(report)
}
