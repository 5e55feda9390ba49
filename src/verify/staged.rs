use super::{GateOutcome, Session, VerificationStrategy, VerifyResult};
use crate::models::{Stage, VerificationOutcome};
use tracing::{debug, info};

/// Check, repair, re-validate earlier gates, check again
///
/// Each gate gets as many repairs as the session's budget allows. After a
/// repair, every prerequisite of the gate runs again as a full gate (with its
/// own repair budget) before the gate re-checks its own condition.
#[derive(Debug, Default, Clone, Copy)]
pub struct StagedRetry;

impl StagedRetry {
    fn gate(&self, session: &mut Session<'_>, stage: Stage) -> VerifyResult<GateOutcome> {
        match stage {
            Stage::Linting => self.verify_linting(session),
            Stage::Tests => self.verify_unit_tests(session),
            Stage::Complexity => Ok(match self.verify_improvement(session)? {
                VerificationOutcome::Accepted { .. } => GateOutcome::Passed,
                VerificationOutcome::Rejected { stage, reason } => {
                    GateOutcome::Failed { stage, reason }
                }
            }),
        }
    }

    fn revalidate(&self, session: &mut Session<'_>, stage: Stage) -> VerifyResult<GateOutcome> {
        for &earlier in stage.prerequisites() {
            debug!("Re-validating {} after {} repair", earlier, stage);
            let outcome = self.gate(session, earlier)?;
            if outcome != GateOutcome::Passed {
                return Ok(outcome);
            }
        }
        Ok(GateOutcome::Passed)
    }
}

impl VerificationStrategy for StagedRetry {
    fn name(&self) -> &str {
        "staged-retry"
    }

    fn verify_linting(&self, session: &mut Session<'_>) -> VerifyResult<GateOutcome> {
        loop {
            let findings = session.lint()?;
            if findings.is_empty() {
                info!("Lint gate passed");
                return Ok(GateOutcome::Passed);
            }
            if !session.try_spend(Stage::Linting) {
                return Ok(GateOutcome::Failed {
                    stage: Stage::Linting,
                    reason: format!("{} lint finding(s) remain", findings.len()),
                });
            }
            session.repair_lint(&findings)?;
            if let failed @ GateOutcome::Failed { .. } = self.revalidate(session, Stage::Linting)? {
                return Ok(failed);
            }
        }
    }

    fn verify_unit_tests(&self, session: &mut Session<'_>) -> VerifyResult<GateOutcome> {
        loop {
            let failures = session.tests()?;
            if failures.is_empty() {
                info!("Test gate passed");
                return Ok(GateOutcome::Passed);
            }
            if !session.try_spend(Stage::Tests) {
                return Ok(GateOutcome::Failed {
                    stage: Stage::Tests,
                    reason: format!("{} test(s) still failing", failures.len()),
                });
            }
            session.repair_tests(&failures)?;
            if let failed @ GateOutcome::Failed { .. } = self.revalidate(session, Stage::Tests)? {
                return Ok(failed);
            }
        }
    }

    fn verify_improvement(&self, session: &mut Session<'_>) -> VerifyResult<VerificationOutcome> {
        let old = session.old_complexity();
        loop {
            let new = session.measure()?;
            if new < old {
                info!("Complexity gate passed: {} -> {}", old, new);
                return Ok(VerificationOutcome::Accepted {
                    new_complexity: new,
                });
            }
            if !session.try_spend(Stage::Complexity) {
                return Ok(VerificationOutcome::Rejected {
                    stage: Stage::Complexity,
                    reason: format!("complexity {} is not below {}", new, old),
                });
            }
            session.repair_complexity()?;
            if let GateOutcome::Failed { stage, reason } =
                self.revalidate(session, Stage::Complexity)?
            {
                return Ok(VerificationOutcome::Rejected { stage, reason });
            }
        }
    }
}
