//! Mocha-format test runner

use super::{
    collect_report, command_line, require_entries, run_shell, ReportFile, ToolError, ToolResult,
};
use crate::config::TestConfig;
use crate::models::TestFailure;
use regex::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

#[derive(Debug, Deserialize)]
struct Report {
    #[serde(default)]
    failures: Vec<Failure>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Failure {
    #[serde(default)]
    full_title: String,
    #[serde(default)]
    file: Option<PathBuf>,
    #[serde(default)]
    err: FailureError,
}

#[derive(Debug, Default, Deserialize)]
struct FailureError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    stack: Option<String>,
}

/// Runs the configured test command inside a sandbox
#[derive(Debug, Clone)]
pub struct TestRunner {
    command: String,
    report_args: String,
    report_file: String,
    timeout: Duration,
    line_pattern: Regex,
}

impl TestRunner {
    /// Fails with `InvalidPattern` when `line_pattern` is not a valid regex
    pub fn from_config(config: &TestConfig) -> ToolResult<Self> {
        let line_pattern =
            Regex::new(&config.line_pattern).map_err(|source| ToolError::InvalidPattern {
                pattern: config.line_pattern.clone(),
                source,
            })?;
        Ok(Self {
            command: config.command.clone(),
            report_args: config.report_args.clone(),
            report_file: config.report_file.clone(),
            timeout: Duration::from_secs(config.timeout_secs),
            line_pattern,
        })
    }

    pub fn run(&self, sandbox: &Path) -> ToolResult<Vec<TestFailure>> {
        let report = ReportFile::new(sandbox, &self.report_file);
        let command = command_line(&self.command, &self.report_args, &self.report_file);
        let output = run_shell(&command, sandbox, self.timeout, None)?;

        let Some(text) = collect_report(&command, &output, &report, self.timeout)? else {
            debug!("All tests passed");
            return Ok(Vec::new());
        };

        let failures = self.parse_report(&command, &text)?;
        let failures = require_entries(&command, &output, failures)?;
        info!("{} failing test(s)", failures.len());
        Ok(failures)
    }

    fn parse_report(&self, command: &str, text: &str) -> ToolResult<Vec<TestFailure>> {
        let report: Report = serde_json::from_str(text).map_err(|e| ToolError::MalformedReport {
            command: command.to_string(),
            reason: e.to_string(),
        })?;

        Ok(report
            .failures
            .into_iter()
            .map(|failure| {
                let message_and_stack = failure
                    .err
                    .stack
                    .or(failure.err.message)
                    .unwrap_or_default();
                let target_line = self.target_line(&message_and_stack);
                TestFailure {
                    expectation_title: failure.full_title,
                    message_and_stack,
                    test_file: failure.file.unwrap_or_default(),
                    target_line,
                }
            })
            .collect())
    }

    fn target_line(&self, stack: &str) -> Option<u32> {
        self.line_pattern
            .captures(stack)
            .and_then(|caps| caps.get(1))
            .and_then(|m| m.as_str().parse().ok())
    }
}
