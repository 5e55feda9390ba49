use super::QualityChecks;
use crate::complexity::{AnalysisResult, ComplexityAnalyzer};
use crate::config::LoopConfig;
use crate::models::{LintFinding, TestFailure};
use crate::tools::{LintRunner, TestRunner, ToolResult};
use std::path::PathBuf;

/// Quality checks backed by the configured tools, run inside one sandbox
pub struct SandboxChecks {
    sandbox: PathBuf,
    lint: LintRunner,
    tests: TestRunner,
    analyzer: ComplexityAnalyzer,
}

impl SandboxChecks {
    pub fn new(
        sandbox: impl Into<PathBuf>,
        lint: LintRunner,
        tests: TestRunner,
        analyzer: ComplexityAnalyzer,
    ) -> Self {
        Self {
            sandbox: sandbox.into(),
            lint,
            tests,
            analyzer,
        }
    }

    /// Fails when the configured test line pattern is not a valid regex
    pub fn from_config(sandbox: impl Into<PathBuf>, config: &LoopConfig) -> ToolResult<Self> {
        Ok(Self::new(
            sandbox,
            LintRunner::from_config(&config.lint),
            TestRunner::from_config(&config.tests)?,
            ComplexityAnalyzer::from_config(&config.analysis),
        ))
    }
}

impl QualityChecks for SandboxChecks {
    fn lint(&self) -> ToolResult<Vec<LintFinding>> {
        self.lint.run(&self.sandbox)
    }

    fn tests(&self) -> ToolResult<Vec<TestFailure>> {
        self.tests.run(&self.sandbox)
    }

    fn complexity(&self, code: &str) -> AnalysisResult<u32> {
        self.analyzer.complexity_of_snippet(code)
    }
}
