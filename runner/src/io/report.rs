//! Report persistence: one JSON document, written atomically.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, instrument};

use crate::core::report::Report;
use crate::error::RunError;

/// Serialize the report to `path` as a single pretty-printed JSON document.
///
/// The content is fully materialized in memory, written to a temporary path,
/// and renamed into place, so a crash mid-write can never leave a truncated
/// file that a later reader would accept. The parent directory must already
/// exist; this writer creates nothing but the report itself.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn write_report(report: &Report, path: &Path) -> Result<(), RunError> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    if !parent.is_dir() {
        return Err(write_error(
            path,
            io::Error::new(
                io::ErrorKind::NotFound,
                format!("parent directory {} does not exist", parent.display()),
            ),
        ));
    }

    let mut payload = serde_json::to_string_pretty(report)
        .map_err(|err| write_error(path, io::Error::other(err)))?;
    payload.push('\n');

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, payload).map_err(|err| write_error(path, err))?;
    fs::rename(&tmp_path, path).map_err(|err| write_error(path, err))?;
    debug!("report written");
    Ok(())
}

fn write_error(path: &Path, source: io::Error) -> RunError {
    RunError::WriteError {
        path: path.to_path_buf(),
        source,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::context::RunContext;
    use crate::core::report::build_report;
    use crate::core::session::SessionResult;
    use crate::core::task::Mode;
    use std::path::PathBuf;

    fn sample_report() -> Report {
        let context = RunContext {
            repo_root: PathBuf::from("/repo"),
            commit_id: None,
            target_dir: PathBuf::from("/repo/app"),
            dry_run: true,
        };
        let session = SessionResult {
            turns: Vec::new(),
            findings: vec![serde_json::json!({"kind": "llm_call_site"})],
            success: true,
            error_message: None,
        };
        let timestamp = "2026-08-23T10:00:00Z".parse().expect("timestamp");
        build_report(&session, &context, Mode::Validation, timestamp)
    }

    #[test]
    fn writes_round_trippable_json() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        let report = sample_report();

        write_report(&report, &path).expect("write");
        let contents = fs::read_to_string(&path).expect("read");
        let parsed: Report = serde_json::from_str(&contents).expect("parse");
        assert_eq!(parsed, report);
        assert!(contents.ends_with('\n'));
    }

    /// Writing twice with identical inputs produces byte-identical content.
    #[test]
    fn rewrites_are_byte_identical() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");
        let report = sample_report();

        write_report(&report, &path).expect("first write");
        let first = fs::read(&path).expect("read first");
        write_report(&report, &path).expect("second write");
        let second = fs::read(&path).expect("read second");
        assert_eq!(first, second);
    }

    #[test]
    fn missing_parent_is_write_error() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("absent").join("report.json");

        let err = write_report(&sample_report(), &path).unwrap_err();
        assert!(matches!(err, RunError::WriteError { .. }));
        assert!(!path.exists());
    }

    #[test]
    fn leaves_no_temp_file_behind() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("report.json");

        write_report(&sample_report(), &path).expect("write");
        let leftovers: Vec<_> = fs::read_dir(temp.path())
            .expect("read dir")
            .map(|entry| entry.expect("entry").file_name())
            .collect();
        assert_eq!(leftovers, vec![std::ffi::OsString::from("report.json")]);
    }
}
