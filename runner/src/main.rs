//! CLI for the AI security scan runner.
//!
//! One invocation drives one agent session: resolve context, build the
//! bridge config, run the session, write the report. Exit code 0 means the
//! run completed and produced a report; what the findings say is data for
//! downstream CI steps, not a process failure.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use aisec_runner::core::report::Report;
use aisec_runner::core::task::Mode;
use aisec_runner::error::RunError;
use aisec_runner::exit_codes;
use aisec_runner::io::bridge::credentials_from_env;
use aisec_runner::io::driver::ClaudeBackend;
use aisec_runner::logging;
use aisec_runner::run::{run_scan, RunRequest};

#[derive(Parser)]
#[command(
    name = "aisec-runner",
    version,
    about = "CI agent runner for LLM security scanning and guardrail insertion"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Find system prompts and validate them through the AI Defense backend.
    Validate(ScanArgs),
    /// Find LLM call sites and integrate AI Defense guardrails around them.
    Guardrails(ScanArgs),
}

#[derive(Args)]
struct ScanArgs {
    /// Directory to analyze (default: current directory).
    #[arg(long)]
    target_dir: Option<PathBuf>,

    /// Commit identifier to record (default: `git rev-parse HEAD`).
    #[arg(long)]
    commit_id: Option<String>,

    /// Analysis-only run: no credentials required, no mutating or bridge tools.
    #[arg(long)]
    dry_run: bool,

    /// Write the JSON report here (default: print the report to stdout).
    #[arg(long)]
    output: Option<PathBuf>,

    /// Tee the raw agent event stream here for audit replay.
    #[arg(long)]
    transcript: Option<PathBuf>,

    /// Config file (default: `.aisec/config.toml` under the repo root).
    #[arg(long)]
    config: Option<PathBuf>,
}

fn main() {
    logging::init();
    let cli = Cli::parse();
    let (mode, args) = match cli.command {
        Command::Validate(args) => (Mode::Validation, args),
        Command::Guardrails(args) => (Mode::Guardrails, args),
    };
    std::process::exit(execute(mode, args));
}

fn execute(mode: Mode, args: ScanArgs) -> i32 {
    let cwd = match std::env::current_dir() {
        Ok(cwd) => cwd,
        Err(err) => {
            eprintln!("error: cannot determine working directory: {err}");
            return exit_codes::INVALID;
        }
    };

    let request = RunRequest {
        mode,
        target_dir: args.target_dir,
        commit_id: args.commit_id,
        dry_run: args.dry_run,
        output: args.output.clone(),
        transcript: args.transcript,
        config: args.config,
    };
    let credentials = credentials_from_env();
    let backend = ClaudeBackend::default();

    match run_scan(&backend, &cwd, &credentials, &request) {
        Ok(report) => {
            present(&report, args.output.as_deref());
            exit_codes::OK
        }
        Err(err) => {
            eprintln!("error: {err}");
            err.exit_code()
        }
    }
}

fn present(report: &Report, output: Option<&std::path::Path>) {
    match output {
        // The report is the artifact; the console gets a one-line summary.
        Some(path) => {
            println!(
                "{} scan {}: {} finding(s), report written to {}",
                report.mode.as_str(),
                if report.success { "completed" } else { "failed" },
                report.findings.len(),
                path.display()
            );
            if let Some(message) = &report.error_message {
                eprintln!("session error: {message}");
            }
        }
        // Print-only mode: emit the full report for inspection or piping.
        None => match serde_json::to_string_pretty(report) {
            Ok(json) => println!("{json}"),
            Err(err) => eprintln!("error: cannot render report: {err}"),
        },
    }
}
