//! ESLint-format lint runner
//!
//! Expects the lint tool's JSON formatter output: an array with one entry per
//! file, each carrying `filePath` and a `messages` list.

use super::{
    collect_report, command_line, require_entries, run_shell, ReportFile, ToolError, ToolResult,
};
use crate::config::LintConfig;
use crate::models::LintFinding;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info, warn};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileResult {
    file_path: PathBuf,
    #[serde(default)]
    messages: Vec<Message>,
    /// Present in fix and fix-dry-run mode when something was fixed
    #[serde(default)]
    output: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Message {
    #[serde(default)]
    rule_id: Option<String>,
    message: String,
    #[serde(default)]
    line: u32,
}

/// Runs the configured lint command inside a sandbox
#[derive(Debug, Clone)]
pub struct LintRunner {
    command: String,
    report_args: String,
    report_file: String,
    timeout: Duration,
    autofix_command: String,
}

impl Default for LintRunner {
    fn default() -> Self {
        Self::from_config(&LintConfig::default())
    }
}

impl LintRunner {
    pub fn from_config(config: &LintConfig) -> Self {
        Self {
            command: config.command.clone(),
            report_args: config.report_args.clone(),
            report_file: config.report_file.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            autofix_command: config.autofix_command.clone(),
        }
    }

    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = command.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Lint the sandbox
    ///
    /// Each finding carries the offending line as it reads on disk right
    /// now, so later edits to the file do not change an existing finding.
    pub fn run(&self, sandbox: &Path) -> ToolResult<Vec<LintFinding>> {
        let report = ReportFile::new(sandbox, &self.report_file);
        let command = command_line(&self.command, &self.report_args, &self.report_file);
        let output = run_shell(&command, sandbox, self.timeout, None)?;

        let Some(text) = collect_report(&command, &output, &report, self.timeout)? else {
            debug!("Lint passed");
            return Ok(Vec::new());
        };

        let findings = parse_report(&command, &text, sandbox)?;
        let findings = require_entries(&command, &output, findings)?;
        info!("Lint reported {} finding(s)", findings.len());
        Ok(findings)
    }

    /// Run the lint tool's fixer over `code` without touching any file
    ///
    /// Returns the fixed code, or `code` unchanged when nothing was fixable.
    pub fn autofix(&self, sandbox: &Path, code: &str) -> ToolResult<String> {
        let output = run_shell(&self.autofix_command, sandbox, self.timeout, Some(code))?;
        if output.timed_out {
            return Err(ToolError::Timeout {
                command: self.autofix_command.clone(),
                timeout_secs: self.timeout.as_secs(),
            });
        }
        if output.stdout.trim().is_empty() {
            return Err(ToolError::MissingReport {
                command: self.autofix_command.clone(),
                status: output.status.unwrap_or(-1),
            });
        }

        let results: Vec<FileResult> =
            serde_json::from_str(&output.stdout).map_err(|e| ToolError::MalformedReport {
                command: self.autofix_command.clone(),
                reason: e.to_string(),
            })?;

        Ok(results
            .into_iter()
            .next()
            .and_then(|r| r.output)
            .unwrap_or_else(|| code.to_string()))
    }
}

fn parse_report(command: &str, text: &str, sandbox: &Path) -> ToolResult<Vec<LintFinding>> {
    let results: Vec<FileResult> =
        serde_json::from_str(text).map_err(|e| ToolError::MalformedReport {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

    let mut sources: HashMap<PathBuf, Vec<String>> = HashMap::new();
    let mut findings = Vec::new();

    for result in results {
        if result.messages.is_empty() {
            continue;
        }
        let file = if result.file_path.is_absolute() {
            result.file_path
        } else {
            sandbox.join(result.file_path)
        };
        let lines = sources
            .entry(file.clone())
            .or_insert_with(|| read_lines(&file));

        for message in result.messages {
            let offending_source_line = message
                .line
                .checked_sub(1)
                .and_then(|i| lines.get(i as usize))
                .cloned()
                .unwrap_or_default();
            findings.push(LintFinding {
                rule_id: message.rule_id,
                message: message.message,
                file: file.clone(),
                target_line: message.line,
                offending_source_line,
            });
        }
    }

    Ok(findings)
}

fn read_lines(path: &Path) -> Vec<String> {
    match std::fs::read_to_string(path) {
        Ok(content) => content.lines().map(str::to_string).collect(),
        Err(e) => {
            warn!("Cannot read linted file {}: {}", path.display(), e);
            Vec::new()
        }
    }
}
