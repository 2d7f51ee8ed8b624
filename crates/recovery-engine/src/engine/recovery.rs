//! Recovery chain of a failed action

use super::cache::RecoveryUsage;
use super::{ActionOutcome, RecoveryEngine};
use crate::error::EngineError;
use recovery_plan::Action;

impl<'a> RecoveryEngine<'a> {
    /// Try the recovery actions of `owner` in order, each at most once per run.
    ///
    /// Returns a start-over error as soon as one recovery passes or is
    /// skipped, and abort or start-over errors raised by a recovery as-is.
    /// `Ok(())` means no recovery helped and the owner's failure stands.
    pub(super) async fn run_recoveries(
        &mut self,
        owner: &str,
        action: &'a Action,
    ) -> Result<(), EngineError> {
        for recovery in &action.recovery_actions {
            if let Some(usage) = self.recovery_usage.get(owner, recovery) {
                match usage {
                    RecoveryUsage::Failed(err) => tracing::debug!(
                        "Recovery action {:?} of {:?}: already failed: {}",
                        recovery,
                        owner,
                        err
                    ),
                    RecoveryUsage::Started | RecoveryUsage::Passed => tracing::debug!(
                        "Recovery action {:?} of {:?}: already used",
                        recovery,
                        owner
                    ),
                }
                continue;
            }

            // Already failed elsewhere in this attempt-cycle.
            if let Some(Err(cached)) = self.action_results.get(recovery) {
                let cached = cached.clone();
                tracing::debug!(
                    "Recovery action {:?} of {:?}: skipped, failed earlier: {}",
                    recovery,
                    owner,
                    cached
                );
                self.recovery_usage
                    .mark(owner, recovery, RecoveryUsage::Failed(cached));
                continue;
            }

            self.recovery_usage.mark(owner, recovery, RecoveryUsage::Started);
            self.started_recoveries += 1;
            tracing::info!("Recovery action {:?} of {:?}: started", recovery, owner);

            match self.run_action(recovery, Some(owner), false, 0).await {
                Ok(outcome) => {
                    self.recovery_usage.mark(owner, recovery, RecoveryUsage::Passed);
                    if outcome != ActionOutcome::Pass {
                        tracing::info!(
                            "Recovery action {:?} of {:?}: {:?}, counted as passed",
                            recovery,
                            owner,
                            outcome
                        );
                    }
                    return Err(EngineError::StartOver {
                        action: owner.to_string(),
                        recovery: recovery.clone(),
                    });
                }
                Err(err) if err.is_control_signal() => return Err(err),
                Err(err) => {
                    tracing::info!(
                        "Recovery action {:?} of {:?}: failed: {}",
                        recovery,
                        owner,
                        err
                    );
                    self.recovery_usage
                        .mark(owner, recovery, RecoveryUsage::Failed(err));
                }
            }
        }
        tracing::info!("Action {:?}: no recovery action helped", owner);
        Ok(())
    }
}
