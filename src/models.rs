//! Core data models for ccloop
//!
//! These models are shared by the analyzer, the tool runners and the
//! verification engine. All of them are plain values: a scan or a tool run
//! produces fresh instances, nothing is mutated in place.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A function discovered by a complexity scan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionRecord {
    pub file: PathBuf,
    /// 1-based, inclusive
    pub start_line: u32,
    /// 1-based, inclusive
    pub end_line: u32,
    pub name: String,
    /// Cyclomatic complexity
    pub complexity: u32,
    /// Lines inside the span that carry code (comments and blank lines excluded)
    #[serde(default)]
    pub nloc: u32,
}

impl FunctionRecord {
    /// `file:line name` label used in logs and error messages
    pub fn label(&self) -> String {
        format!("{}:{} {}", self.file.display(), self.start_line, self.name)
    }
}

/// One message reported by the lint tool
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LintFinding {
    /// `None` for fatal parse errors, which lint tools report without a rule
    pub rule_id: Option<String>,
    pub message: String,
    pub file: PathBuf,
    pub target_line: u32,
    /// Content of `file` at `target_line`, read when the report was parsed
    pub offending_source_line: String,
}

/// One failing test from the test reporter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestFailure {
    pub expectation_title: String,
    pub message_and_stack: String,
    pub test_file: PathBuf,
    /// Recovered from the stack trace, if the line pattern matched
    pub target_line: Option<u32>,
}

/// A verification gate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Linting,
    Tests,
    Complexity,
}

impl Stage {
    /// All gates in check order
    pub const ALL: [Stage; 3] = [Stage::Linting, Stage::Tests, Stage::Complexity];

    /// Gates that must be re-validated after a repair at this gate, in order.
    ///
    /// A repair may regress any earlier gate, so a retry re-runs every
    /// earlier gate before re-checking its own condition.
    pub fn prerequisites(self) -> &'static [Stage] {
        match self {
            Stage::Linting => &[],
            Stage::Tests => &[Stage::Linting],
            Stage::Complexity => &[Stage::Linting, Stage::Tests],
        }
    }

    pub(crate) fn index(self) -> usize {
        match self {
            Stage::Linting => 0,
            Stage::Tests => 1,
            Stage::Complexity => 2,
        }
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Stage::Linting => write!(f, "linting"),
            Stage::Tests => write!(f, "tests"),
            Stage::Complexity => write!(f, "complexity"),
        }
    }
}

/// Terminal result of one verification session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationOutcome {
    Accepted { new_complexity: u32 },
    Rejected { stage: Stage, reason: String },
}

impl VerificationOutcome {
    pub fn is_accepted(&self) -> bool {
        matches!(self, VerificationOutcome::Accepted { .. })
    }
}

/// Aggregate metrics over one scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProjectSummary {
    pub function_count: usize,
    pub average_complexity: f64,
    pub average_nloc: f64,
    pub max_complexity: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_prerequisites_form_chain() {
        assert!(Stage::Linting.prerequisites().is_empty());
        assert_eq!(Stage::Tests.prerequisites(), &[Stage::Linting]);
        assert_eq!(
            Stage::Complexity.prerequisites(),
            &[Stage::Linting, Stage::Tests]
        );
        // Every prerequisite comes strictly earlier, so re-entry cannot cycle
        for stage in Stage::ALL {
            for pre in stage.prerequisites() {
                assert!(pre.index() < stage.index());
            }
        }
    }

    #[test]
    fn test_stage_display() {
        assert_eq!(Stage::Linting.to_string(), "linting");
        assert_eq!(Stage::Tests.to_string(), "tests");
        assert_eq!(Stage::Complexity.to_string(), "complexity");
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = VerificationOutcome::Rejected {
            stage: Stage::Tests,
            reason: "2 failing tests".into(),
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "rejected");
        assert_eq!(json["stage"], "tests");

        let accepted = VerificationOutcome::Accepted { new_complexity: 5 };
        assert!(accepted.is_accepted());
        assert!(!outcome.is_accepted());
    }
}
