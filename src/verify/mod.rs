//! Verification of refactoring candidates
//!
//! A candidate is one function rewritten inside a sandbox. It is accepted only
//! after passing three gates in order:
//!
//! ```text
//! linting ──▶ tests ──▶ complexity ──▶ Accepted { new_complexity }
//!    │          │            │
//!    ▼          ▼            ▼
//!         Rejected { stage, reason }
//! ```
//!
//! A failing gate triggers its repair action and is checked again. Since a
//! repair can regress an earlier gate, every gate listed in
//! [`Stage::prerequisites`] is re-validated before the failing gate is
//! re-checked. Repairs are limited per gate and session by a
//! [`RepairBudget`], shared between direct checks and re-validations.
//!
//! Gate failures end in a [`VerificationOutcome`]; tool faults, analysis
//! faults and failing repair actions are returned as [`VerifyError`].

mod checks;
mod staged;


pub use checks::SandboxChecks;
pub use staged::StagedRetry;

use crate::complexity::{AnalysisError, AnalysisResult, ComplexityAnalyzer};
use crate::config::VerificationConfig;
use crate::models::{FunctionRecord, LintFinding, Stage, TestFailure, VerificationOutcome};
use crate::tools::{ToolError, ToolResult};
use std::path::PathBuf;
use thiserror::Error;
use tracing::{info, warn};

/// Faults that abort a session
#[derive(Error, Debug)]
pub enum VerifyError {
    #[error(transparent)]
    Tool(#[from] ToolError),

    #[error(transparent)]
    Analysis(#[from] AnalysisError),

    #[error("{stage} repair action failed: {source:#}")]
    Repair {
        stage: Stage,
        #[source]
        source: anyhow::Error,
    },
}

pub type VerifyResult<T> = Result<T, VerifyError>;

/// A function that could not be improved within the repair budget
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{name} at {}:{start_line} cannot be improved: {stage} gate failed ({reason})", file.display())]
pub struct NotImprovable {
    pub name: String,
    pub file: PathBuf,
    pub start_line: u32,
    pub stage: Stage,
    pub reason: String,
}

impl VerificationOutcome {
    /// The new complexity, or the rejection as a typed error for `record`
    pub fn into_result(self, record: &FunctionRecord) -> Result<u32, NotImprovable> {
        match self {
            VerificationOutcome::Accepted { new_complexity } => Ok(new_complexity),
            VerificationOutcome::Rejected { stage, reason } => Err(NotImprovable {
                name: record.name.clone(),
                file: record.file.clone(),
                start_line: record.start_line,
                stage,
                reason,
            }),
        }
    }
}

/// The function under refactoring, together with its repair actions
///
/// Repair actions rewrite the function inside the sandbox and return once the
/// files on disk reflect the change.
pub trait Candidate {
    /// The function as measured before refactoring
    fn record(&self) -> &FunctionRecord;

    /// Source of the function as it currently reads on disk
    fn current_source(&self) -> AnalysisResult<String> {
        ComplexityAnalyzer::extract_source(self.record())
    }

    fn repair_with_lint_findings(&mut self, findings: &[LintFinding]) -> anyhow::Result<()>;

    fn repair_with_test_failures(&mut self, failures: &[TestFailure]) -> anyhow::Result<()>;

    fn repair_for_complexity(&mut self) -> anyhow::Result<()>;
}

/// The quality queries a session runs against the sandbox
pub trait QualityChecks {
    fn lint(&self) -> ToolResult<Vec<LintFinding>>;

    fn tests(&self) -> ToolResult<Vec<TestFailure>>;

    /// Highest complexity among the functions in `code`
    fn complexity(&self, code: &str) -> AnalysisResult<u32>;
}

/// How many repairs each gate may request in one session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_repairs_per_stage: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_repairs_per_stage: 1,
        }
    }
}

impl From<&VerificationConfig> for RetryPolicy {
    fn from(config: &VerificationConfig) -> Self {
        Self {
            max_repairs_per_stage: config.max_repairs_per_stage,
        }
    }
}

/// Repairs spent per gate in one session
#[derive(Debug, Clone)]
pub struct RepairBudget {
    limit: u32,
    spent: [u32; 3],
}

impl RepairBudget {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            limit: policy.max_repairs_per_stage,
            spent: [0; 3],
        }
    }

    /// Take one repair for `stage`; false once the gate is out of repairs
    pub fn try_spend(&mut self, stage: Stage) -> bool {
        let spent = &mut self.spent[stage.index()];
        if *spent >= self.limit {
            return false;
        }
        *spent += 1;
        true
    }

    pub fn spent(&self, stage: Stage) -> u32 {
        self.spent[stage.index()]
    }

    pub fn total_spent(&self) -> u32 {
        self.spent.iter().sum()
    }
}

/// Result of a gate that is not the last one
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateOutcome {
    Passed,
    /// `stage` may be an earlier gate that failed re-validation
    Failed { stage: Stage, reason: String },
}

/// State of one verification attempt for a single candidate
pub struct Session<'a> {
    candidate: &'a mut dyn Candidate,
    checks: &'a dyn QualityChecks,
    budget: RepairBudget,
    old_complexity: u32,
}

impl<'a> Session<'a> {
    pub fn new(
        candidate: &'a mut dyn Candidate,
        checks: &'a dyn QualityChecks,
        policy: RetryPolicy,
    ) -> Self {
        let old_complexity = candidate.record().complexity;
        Self {
            candidate,
            checks,
            budget: RepairBudget::new(policy),
            old_complexity,
        }
    }

    pub fn record(&self) -> &FunctionRecord {
        self.candidate.record()
    }

    pub fn old_complexity(&self) -> u32 {
        self.old_complexity
    }

    pub fn budget(&self) -> &RepairBudget {
        &self.budget
    }

    pub fn try_spend(&mut self, stage: Stage) -> bool {
        self.budget.try_spend(stage)
    }

    pub fn lint(&self) -> VerifyResult<Vec<LintFinding>> {
        Ok(self.checks.lint()?)
    }

    pub fn tests(&self) -> VerifyResult<Vec<TestFailure>> {
        Ok(self.checks.tests()?)
    }

    /// Complexity of the candidate as it reads on disk now
    pub fn measure(&self) -> VerifyResult<u32> {
        let code = self.candidate.current_source()?;
        Ok(self.checks.complexity(&code)?)
    }

    pub fn repair_lint(&mut self, findings: &[LintFinding]) -> VerifyResult<()> {
        info!("Repairing {} lint finding(s)", findings.len());
        self.candidate
            .repair_with_lint_findings(findings)
            .map_err(|source| VerifyError::Repair {
                stage: Stage::Linting,
                source,
            })
    }

    pub fn repair_tests(&mut self, failures: &[TestFailure]) -> VerifyResult<()> {
        info!("Repairing {} failing test(s)", failures.len());
        self.candidate
            .repair_with_test_failures(failures)
            .map_err(|source| VerifyError::Repair {
                stage: Stage::Tests,
                source,
            })
    }

    pub fn repair_complexity(&mut self) -> VerifyResult<()> {
        info!("Requesting a simpler rewrite");
        self.candidate
            .repair_for_complexity()
            .map_err(|source| VerifyError::Repair {
                stage: Stage::Complexity,
                source,
            })
    }
}

/// A rule set deciding when each gate passes
///
/// Strategies differ in how they check and repair; the gate order is fixed
/// by [`VerificationStrategy::verify`].
pub trait VerificationStrategy {
    fn name(&self) -> &str;

    fn verify_linting(&self, session: &mut Session<'_>) -> VerifyResult<GateOutcome>;

    fn verify_unit_tests(&self, session: &mut Session<'_>) -> VerifyResult<GateOutcome>;

    fn verify_improvement(&self, session: &mut Session<'_>) -> VerifyResult<VerificationOutcome>;

    fn verify(&self, session: &mut Session<'_>) -> VerifyResult<VerificationOutcome> {
        if let GateOutcome::Failed { stage, reason } = self.verify_linting(session)? {
            return Ok(VerificationOutcome::Rejected { stage, reason });
        }
        if let GateOutcome::Failed { stage, reason } = self.verify_unit_tests(session)? {
            return Ok(VerificationOutcome::Rejected { stage, reason });
        }
        self.verify_improvement(session)
    }
}

/// Runs verification sessions with one strategy and retry policy
pub struct VerificationEngine<S = StagedRetry> {
    strategy: S,
    policy: RetryPolicy,
}

impl Default for VerificationEngine<StagedRetry> {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

impl VerificationEngine<StagedRetry> {
    pub fn new(policy: RetryPolicy) -> Self {
        Self::with_strategy(StagedRetry, policy)
    }

    pub fn from_config(config: &VerificationConfig) -> Self {
        Self::new(RetryPolicy::from(config))
    }
}

impl<S: VerificationStrategy> VerificationEngine<S> {
    pub fn with_strategy(strategy: S, policy: RetryPolicy) -> Self {
        Self { strategy, policy }
    }

    pub fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Verify one candidate; the sandbox keeps whatever the last repair wrote
    pub fn verify(
        &self,
        candidate: &mut dyn Candidate,
        checks: &dyn QualityChecks,
    ) -> VerifyResult<VerificationOutcome> {
        let label = candidate.record().label();
        info!(
            "Verifying {} (complexity {}) with {}",
            label,
            candidate.record().complexity,
            self.strategy.name()
        );

        let mut session = Session::new(candidate, checks, self.policy);
        let outcome = self.strategy.verify(&mut session)?;

        match &outcome {
            VerificationOutcome::Accepted { new_complexity } => info!(
                "Accepted {}: complexity {} -> {} after {} repair(s)",
                label,
                session.old_complexity(),
                new_complexity,
                session.budget().total_spent()
            ),
            VerificationOutcome::Rejected { stage, reason } => {
                warn!("Rejected {} at {} gate: {}", label, stage, reason)
            }
        }
        Ok(outcome)
    }
}
