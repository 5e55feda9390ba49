//! Runners for the external quality tools
//!
//! Both runners follow the same pattern:
//! 1. Run the configured shell command inside the sandbox with a timeout
//! 2. Read the JSON report from a report file, or from stdout if no file
//! 3. Parse it into findings
//!
//! Exit status 0 means the tool found nothing. Any other status means the
//! tool found something and must have produced a report. A tool that could
//! not run, or ran out of time before writing a report, is a `ToolError`,
//! never an empty result.

pub mod lint;
pub mod test_suite;

pub use lint::LintRunner;
pub use test_suite::TestRunner;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{debug, warn};

/// Placeholder in `report_args` replaced by the report file name
pub const REPORT_PLACEHOLDER: &str = "{report}";

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// How long pipes may take to close once the process group is gone
const DRAIN_GRACE: Duration = Duration::from_millis(200);

/// Errors from running an external tool
#[derive(Error, Debug)]
pub enum ToolError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` timed out after {timeout_secs}s without a report")]
    Timeout { command: String, timeout_secs: u64 },

    #[error("`{command}` exited with status {status} but produced no report")]
    MissingReport { command: String, status: i32 },

    #[error("malformed report from `{command}`: {reason}")]
    MalformedReport { command: String, reason: String },

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid line pattern `{pattern}`: {source}")]
    InvalidPattern {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

pub type ToolResult<T> = Result<T, ToolError>;

/// Captured result of one shell invocation
#[derive(Debug, Clone, Default)]
pub struct ToolOutput {
    /// `None` when killed by a signal or after a timeout
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0) && !self.timed_out
    }
}

/// Run `command` through `sh -c` in `cwd`
///
/// Output pipes are drained on helper threads so a verbose tool cannot fill
/// the pipe and stall the timeout loop. The command runs in its own process
/// group: on timeout the whole group is killed, and anything still running
/// in it after the shell exits is killed too. Collecting output never waits
/// past the deadline plus a short grace period.
pub fn run_shell(
    command: &str,
    cwd: &Path,
    timeout: Duration,
    stdin: Option<&str>,
) -> ToolResult<ToolOutput> {
    debug!("Running `{}` in {}", command, cwd.display());

    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(cwd)
        .stdin(if stdin.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }

    let deadline = Instant::now() + timeout;
    let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
        command: command.to_string(),
        source,
    })?;

    if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
        let input = input.to_string();
        thread::spawn(move || {
            // A tool that exits without reading its input closes the pipe early
            let _ = pipe.write_all(input.as_bytes());
        });
    }

    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    match wait_until(&mut child, deadline) {
        Ok(Some(status)) => {
            if kill_process_group(&child) {
                debug!("Killed processes left running by `{}`", command);
            }
            match (collect(stdout, deadline), collect(stderr, deadline)) {
                (Some(stdout), Some(stderr)) => Ok(ToolOutput {
                    status: status.code(),
                    stdout,
                    stderr,
                    timed_out: false,
                }),
                _ => {
                    warn!(
                        "`{}` kept its output open past the {}s timeout",
                        command,
                        timeout.as_secs()
                    );
                    Ok(ToolOutput {
                        timed_out: true,
                        ..Default::default()
                    })
                }
            }
        }
        Ok(None) => {
            warn!("`{}` timed out after {}s", command, timeout.as_secs());
            kill_process_group(&child);
            let _ = child.kill();
            let _ = child.wait();
            Ok(ToolOutput {
                timed_out: true,
                ..Default::default()
            })
        }
        Err(source) => {
            kill_process_group(&child);
            let _ = child.kill();
            Err(ToolError::Spawn {
                command: command.to_string(),
                source,
            })
        }
    }
}

fn wait_until(
    child: &mut Child,
    deadline: Instant,
) -> std::io::Result<Option<std::process::ExitStatus>> {
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// SIGKILL the child's process group. Returns whether anything was left to kill.
#[cfg(unix)]
fn kill_process_group(child: &Child) -> bool {
    use nix::sys::signal::{killpg, Signal};
    use nix::unistd::Pid;

    let Ok(pid) = i32::try_from(child.id()) else {
        return false;
    };
    killpg(Pid::from_raw(pid), Signal::SIGKILL).is_ok()
}

#[cfg(not(unix))]
fn kill_process_group(_child: &Child) -> bool {
    false
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        let _ = tx.send(String::from_utf8_lossy(&buf).into_owned());
    });
    rx
}

/// Output of one drained pipe, `None` if it is still open at the deadline
fn collect(pipe: Option<Receiver<String>>, deadline: Instant) -> Option<String> {
    let Some(rx) = pipe else {
        return Some(String::new());
    };
    let wait = deadline
        .saturating_duration_since(Instant::now())
        .max(DRAIN_GRACE);
    match rx.recv_timeout(wait) {
        Ok(text) => Some(text),
        Err(RecvTimeoutError::Disconnected) => Some(String::new()),
        Err(RecvTimeoutError::Timeout) => None,
    }
}

/// Build the full command line from the base command and report arguments
pub(crate) fn command_line(command: &str, report_args: &str, report_file: &str) -> String {
    let args = report_args.replace(REPORT_PLACEHOLDER, report_file);
    if args.trim().is_empty() {
        command.to_string()
    } else {
        format!("{} {}", command, args)
    }
}

/// A report file scoped to one tool invocation
///
/// A stale file from an earlier run is removed on creation and the file is
/// removed again on drop, whichever way the invocation ends.
pub(crate) struct ReportFile {
    path: PathBuf,
}

impl ReportFile {
    pub(crate) fn new(dir: &Path, name: &str) -> Self {
        let path = dir.join(name);
        if path.exists() {
            debug!("Removing stale report {}", path.display());
            let _ = std::fs::remove_file(&path);
        }
        Self { path }
    }

    /// Report contents, `None` when the tool did not write one
    pub(crate) fn read(&self) -> ToolResult<Option<String>> {
        match std::fs::read_to_string(&self.path) {
            Ok(text) if text.trim().is_empty() => Ok(None),
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(ToolError::Io {
                path: self.path.clone(),
                source,
            }),
        }
    }
}

impl Drop for ReportFile {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!("Failed to remove report {}: {}", self.path.display(), e);
            }
        }
    }
}

/// Locate the JSON report for a finished invocation
///
/// Returns `None` for a clean exit (nothing to report). Prefers the report
/// file over stdout.
pub(crate) fn collect_report(
    command: &str,
    output: &ToolOutput,
    report: &ReportFile,
    timeout: Duration,
) -> ToolResult<Option<String>> {
    if output.timed_out {
        return match report.read()? {
            Some(text) => Ok(Some(text)),
            None => Err(ToolError::Timeout {
                command: command.to_string(),
                timeout_secs: timeout.as_secs(),
            }),
        };
    }

    if output.success() {
        return Ok(None);
    }

    if let Some(text) = report.read()? {
        return Ok(Some(text));
    }
    if !output.stdout.trim().is_empty() {
        return Ok(Some(output.stdout.clone()));
    }

    if !output.stderr.trim().is_empty() {
        debug!("stderr of `{}`: {}", command, output.stderr.trim());
    }
    Err(ToolError::MissingReport {
        command: command.to_string(),
        status: output.status.unwrap_or(-1),
    })
}

/// A report collected from a failing run has to list something
///
/// Exit 0 is the only way to say "nothing found". A failing tool whose
/// report is empty crashed or reported in a format the parser skips.
pub(crate) fn require_entries<T>(
    command: &str,
    output: &ToolOutput,
    entries: Vec<T>,
) -> ToolResult<Vec<T>> {
    if !entries.is_empty() {
        return Ok(entries);
    }
    let reason = if output.timed_out {
        "timed out and the report lists nothing".to_string()
    } else {
        format!(
            "exited with status {} but the report lists nothing",
            output.status.unwrap_or(-1)
        )
    };
    Err(ToolError::MalformedReport {
        command: command.to_string(),
        reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_line_substitutes_report() {
        assert_eq!(
            command_line("npx eslint .", "--format json -o {report}", "out.json"),
            "npx eslint . --format json -o out.json"
        );
        assert_eq!(command_line("npx eslint .", "", "out.json"), "npx eslint .");
    }

    #[test]
    fn test_run_shell_captures_output_and_status() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell(
            "echo hello; echo oops >&2; exit 3",
            dir.path(),
            Duration::from_secs(10),
            None,
        )
        .unwrap();
        assert_eq!(output.status, Some(3));
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert!(!output.success());
    }

    #[test]
    fn test_run_shell_pipes_stdin() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell("cat", dir.path(), Duration::from_secs(10), Some("abc")).unwrap();
        assert!(output.success());
        assert_eq!(output.stdout, "abc");
    }

    #[test]
    fn test_run_shell_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell("sleep 5", dir.path(), Duration::from_millis(200), None).unwrap();
        assert!(output.timed_out);
        assert_eq!(output.status, None);
    }

    #[test]
    fn test_run_shell_does_not_wait_for_background_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let output = run_shell(
            "echo hi; sleep 4 & exit 0",
            dir.path(),
            Duration::from_millis(500),
            None,
        )
        .unwrap();
        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hi");
    }

    #[test]
    fn test_run_shell_timeout_kills_descendants() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell(
            "(sleep 1; touch late.txt); sleep 5",
            dir.path(),
            Duration::from_millis(200),
            None,
        )
        .unwrap();
        assert!(output.timed_out);

        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late.txt").exists());
    }

    #[test]
    fn test_run_shell_kills_leftover_background_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let output = run_shell(
            "(sleep 1; touch late.txt) & exit 0",
            dir.path(),
            Duration::from_secs(10),
            None,
        )
        .unwrap();
        assert!(output.success());

        thread::sleep(Duration::from_millis(1500));
        assert!(!dir.path().join("late.txt").exists());
    }

    #[test]
    fn test_require_entries_rejects_empty_failing_report() {
        let failed = ToolOutput {
            status: Some(1),
            ..Default::default()
        };
        assert_eq!(require_entries("t", &failed, vec![1]).unwrap(), vec![1]);

        let err = require_entries::<u32>("t", &failed, Vec::new()).unwrap_err();
        match err {
            ToolError::MalformedReport { reason, .. } => assert!(reason.contains("status 1")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_report_file_removes_stale_and_cleans_up() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("report.json");
        std::fs::write(&path, "stale").unwrap();

        {
            let report = ReportFile::new(dir.path(), "report.json");
            assert!(!path.exists());
            assert!(report.read().unwrap().is_none());
            std::fs::write(&path, "[]").unwrap();
            assert_eq!(report.read().unwrap().as_deref(), Some("[]"));
        }
        assert!(!path.exists());
    }

    #[test]
    fn test_collect_report_distinguishes_outcomes() {
        let dir = tempfile::tempdir().unwrap();
        let report = ReportFile::new(dir.path(), "r.json");
        let timeout = Duration::from_secs(1);

        let clean = ToolOutput {
            status: Some(0),
            ..Default::default()
        };
        assert!(collect_report("t", &clean, &report, timeout)
            .unwrap()
            .is_none());

        let from_stdout = ToolOutput {
            status: Some(1),
            stdout: "[1]".into(),
            ..Default::default()
        };
        assert_eq!(
            collect_report("t", &from_stdout, &report, timeout)
                .unwrap()
                .as_deref(),
            Some("[1]")
        );

        let crashed = ToolOutput {
            status: Some(2),
            stderr: "config error".into(),
            ..Default::default()
        };
        assert!(matches!(
            collect_report("t", &crashed, &report, timeout),
            Err(ToolError::MissingReport { status: 2, .. })
        ));

        let timed_out = ToolOutput {
            timed_out: true,
            ..Default::default()
        };
        assert!(matches!(
            collect_report("t", &timed_out, &report, timeout),
            Err(ToolError::Timeout { .. })
        ));

        // A report written before the timeout is still usable
        std::fs::write(dir.path().join("r.json"), "[2]").unwrap();
        assert_eq!(
            collect_report("t", &timed_out, &report, timeout)
                .unwrap()
                .as_deref(),
            Some("[2]")
        );
    }
}
