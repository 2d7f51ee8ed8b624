//! Per-run caches
//!
//! Action results are kept per attempt-cycle according to each action's run
//! control. Recovery usage is kept for the whole run and is never purged.

use crate::error::EngineError;
use recovery_plan::{Plan, RunControl};
use std::collections::HashMap;

/// Action name → known result
#[derive(Debug, Default)]
pub(crate) struct ActionCache {
    results: HashMap<String, Result<(), EngineError>>,
}

impl ActionCache {
    pub(crate) fn get(&self, name: &str) -> Option<&Result<(), EngineError>> {
        self.results.get(name)
    }

    /// Store a final exec result, replacing any previous one.
    pub(crate) fn record(
        &mut self,
        name: &str,
        run_control: RunControl,
        result: Result<(), EngineError>,
    ) {
        self.results.remove(name);
        if run_control.is_cacheable() {
            self.results.insert(name.to_string(), result);
        }
    }

    /// Drop every result whose action reruns after a recovery.
    /// Returns the number of dropped entries.
    pub(crate) fn purge_after_recovery(&mut self, plan: &Plan) -> usize {
        let before = self.results.len();
        self.results.retain(|name, _| {
            !plan
                .action(name)
                .is_some_and(|a| a.run_control.purged_on_start_over())
        });
        before - self.results.len()
    }

    #[cfg(test)]
    pub(crate) fn insert(&mut self, name: &str, result: Result<(), EngineError>) {
        self.results.insert(name.to_string(), result);
    }
}

/// State of a recovery action used for an owner
#[derive(Debug, Clone)]
pub(crate) enum RecoveryUsage {
    /// Marked before its outcome is known
    Started,
    /// Passed; the plan started over
    Passed,
    /// Failed, or had already failed elsewhere in the plan
    Failed(EngineError),
}

/// (owner action, recovery action) → usage
#[derive(Debug, Default)]
pub(crate) struct RecoveryUsageCache {
    used: HashMap<(String, String), RecoveryUsage>,
}

impl RecoveryUsageCache {
    pub(crate) fn get(&self, owner: &str, recovery: &str) -> Option<&RecoveryUsage> {
        self.used.get(&(owner.to_string(), recovery.to_string()))
    }

    pub(crate) fn mark(&mut self, owner: &str, recovery: &str, usage: RecoveryUsage) {
        self.used
            .insert((owner.to_string(), recovery.to_string()), usage);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecError;
    use recovery_plan::Action;

    fn failure() -> EngineError {
        EngineError::exec("x", ExecError::failed("boom"))
    }

    #[test]
    fn record_follows_run_control() {
        let mut cache = ActionCache::default();
        cache.record("once", RunControl::RunOnce, Err(failure()));
        cache.record("always", RunControl::AlwaysRun, Ok(()));
        assert!(matches!(cache.get("once"), Some(Err(_))));
        assert!(cache.get("always").is_none());

        cache.record("once", RunControl::RunOnce, Ok(()));
        assert!(matches!(cache.get("once"), Some(Ok(()))));
    }

    #[test]
    fn purge_only_drops_rerun_after_recovery() {
        let plan = Plan::new()
            .with_action("rerun", Action::new("x"))
            .with_action("once", Action::new("x").with_run_control(RunControl::RunOnce));
        let mut cache = ActionCache::default();
        cache.record("rerun", RunControl::RerunAfterRecovery, Ok(()));
        cache.record("once", RunControl::RunOnce, Err(failure()));

        assert_eq!(cache.purge_after_recovery(&plan), 1);
        assert!(cache.get("rerun").is_none());
        assert!(cache.get("once").is_some());
    }

    #[test]
    fn recovery_usage_is_keyed_by_owner() {
        let mut usage = RecoveryUsageCache::default();
        usage.mark("a", "r", RecoveryUsage::Started);
        assert!(usage.get("a", "r").is_some());
        assert!(usage.get("b", "r").is_none());
        usage.mark("a", "r", RecoveryUsage::Failed(failure()));
        assert!(matches!(usage.get("a", "r"), Some(RecoveryUsage::Failed(_))));
    }
}
