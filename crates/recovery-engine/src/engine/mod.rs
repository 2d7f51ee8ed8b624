//! Recovery engine
//!
//! Walks a [`Plan`] against one device:
//! - Runs the critical actions in order, each through [`RecoveryEngine::run_action`]
//! - Evaluates conditions, dependencies and the exec of every action recursively
//! - Tries recovery actions when an exec fails
//! - Starts the critical actions over after a successful recovery
//!
//! # Invariants
//!
//! - Engine state lives for exactly one [`run`] call
//! - Each (owner, recovery) pair is evaluated at most once per run, and each
//!   action's exec may request a start-over at most once per run, which
//!   bounds the number of start-overs
//! - Action names are resolved against the plan; a missing name is a
//!   programming error and panics

mod action;
mod cache;
mod recovery;

use crate::error::EngineError;
use crate::exec::ExecRegistry;
use crate::metrics::{Metric, MetricSaver, MetricStatus, Observation, RunId};
use crate::steps::{Step, StepKind, StepOutcome, StepReporter};
use cache::{ActionCache, RecoveryUsageCache};
use recovery_plan::{Action, Plan};
use std::collections::HashSet;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

/// Arguments of one engine run
#[derive(Clone)]
pub struct RunArgs {
    /// Device the plan runs against
    pub resource_name: String,
    /// Whether failing execs may run their recovery actions
    pub enable_recovery: bool,
    /// Whether the step reporter is notified
    pub show_steps: bool,
    /// Exec registry
    pub execs: Arc<dyn ExecRegistry>,
    /// Optional step reporter
    pub step_reporter: Option<Arc<dyn StepReporter>>,
}

impl RunArgs {
    /// Create run arguments with recovery enabled and steps hidden
    #[must_use]
    pub fn new(resource_name: impl Into<String>, execs: Arc<dyn ExecRegistry>) -> Self {
        Self {
            resource_name: resource_name.into(),
            enable_recovery: true,
            show_steps: false,
            execs,
            step_reporter: None,
        }
    }

    /// With recovery enabled or disabled
    #[inline]
    #[must_use]
    pub fn with_recovery(mut self, enable: bool) -> Self {
        self.enable_recovery = enable;
        self
    }

    /// With a step reporter; also turns step display on
    #[inline]
    #[must_use]
    pub fn with_steps(mut self, reporter: Arc<dyn StepReporter>) -> Self {
        self.step_reporter = Some(reporter);
        self.show_steps = true;
        self
    }
}

impl std::fmt::Debug for RunArgs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunArgs")
            .field("resource_name", &self.resource_name)
            .field("enable_recovery", &self.enable_recovery)
            .field("show_steps", &self.show_steps)
            .field("step_reporter", &self.step_reporter.is_some())
            .finish_non_exhaustive()
    }
}

/// Run a plan against a device.
///
/// Returns `Ok` when the plan passed or its failure is allowed, otherwise
/// the annotated error of the deepest failing action.
///
/// # Panics
///
/// Panics if the plan refers to an action it does not define.
pub async fn run(
    cancel: &CancellationToken,
    plan_name: &str,
    plan: &Plan,
    args: &RunArgs,
    metric_saver: Option<Arc<dyn MetricSaver>>,
) -> Result<(), EngineError> {
    let span = tracing::info_span!("plan", plan = %plan_name, resource = %args.resource_name);
    let mut engine = RecoveryEngine::new(plan_name, plan, args, metric_saver, cancel.clone());
    engine.run_plan().instrument(span).await
}

/// Outcome of an action for its caller
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ActionOutcome {
    /// Passed, now or earlier in this attempt-cycle
    Pass,
    /// Skipped because a condition failed
    Skip,
    /// Failed, but the action allows failure
    Forgiven,
}

/// State of one plan run
pub(crate) struct RecoveryEngine<'a> {
    plan_name: &'a str,
    plan: &'a Plan,
    args: &'a RunArgs,
    metric_saver: Option<Arc<dyn MetricSaver>>,
    cancel: CancellationToken,
    run_id: RunId,
    action_results: ActionCache,
    recovery_usage: RecoveryUsageCache,
    start_over_requests: HashSet<String>,
    plan_run_tally: u64,
    started_recoveries: u64,
}

impl<'a> RecoveryEngine<'a> {
    pub(crate) fn new(
        plan_name: &'a str,
        plan: &'a Plan,
        args: &'a RunArgs,
        metric_saver: Option<Arc<dyn MetricSaver>>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            plan_name,
            plan,
            args,
            metric_saver,
            cancel,
            run_id: RunId::new(),
            action_results: ActionCache::default(),
            recovery_usage: RecoveryUsageCache::default(),
            start_over_requests: HashSet::new(),
            plan_run_tally: 0,
            started_recoveries: 0,
        }
    }

    /// Run critical-action attempts until one completes, aborts or fails.
    pub(crate) async fn run_plan(&mut self) -> Result<(), EngineError> {
        tracing::info!("Plan {:?}: started", self.plan_name);
        let step = Step {
            kind: StepKind::Plan,
            name: self.plan_name.to_string(),
            parent: None,
            level: 0,
        };
        self.step_started(&step);
        let mut metric = Metric::start(
            self.run_id,
            format!("plan:{}", self.plan_name),
            &self.args.resource_name,
        );

        let result = loop {
            match self.run_critical_actions_attempt().await {
                Ok(()) => break Ok(()),
                Err(err) if err.is_start_over() => {
                    let purged = self.action_results.purge_after_recovery(self.plan);
                    self.plan_run_tally += 1;
                    tracing::info!(
                        restarts = self.plan_run_tally,
                        purged,
                        "Plan {:?}: received request to start over",
                        self.plan_name
                    );
                }
                Err(err) if err.is_abort() => {
                    break Err(err.annotate(format!("run plan {:?}: aborted", self.plan_name)));
                }
                Err(err) => break Err(err.annotate(format!("run plan {:?}", self.plan_name))),
            }
        };

        metric.observe(Observation::new("restarts", self.plan_run_tally));
        metric.observe(Observation::new("recoveries_started", self.started_recoveries));

        match result {
            Ok(()) => {
                tracing::info!("Plan {:?}: finished successfully", self.plan_name);
                metric.finish(MetricStatus::Success, None);
                self.step_finished(&step, StepOutcome::Pass, None);
                self.save_metric(&metric).await;
                Ok(())
            }
            Err(err) => {
                let reason = err.to_string();
                metric.finish(MetricStatus::Fail, Some(reason.clone()));
                self.save_metric(&metric).await;
                if self.plan.allow_fail && !err.is_abort() {
                    tracing::warn!(
                        "Plan {:?}: failed with error: {}; ignored as plan is allowed to fail",
                        self.plan_name,
                        reason
                    );
                    self.step_finished(&step, StepOutcome::Forgiven, Some(&reason));
                    return Ok(());
                }
                tracing::error!("Plan {:?}: failed: {}", self.plan_name, reason);
                self.step_finished(&step, StepOutcome::Fail, Some(&reason));
                Err(err)
            }
        }
    }

    /// One pass over the critical actions.
    async fn run_critical_actions_attempt(&mut self) -> Result<(), EngineError> {
        let plan = self.plan;
        tracing::debug!(
            attempt = self.plan_run_tally,
            actions = plan.critical_actions.len(),
            "Running critical actions"
        );
        let enable_recovery = self.args.enable_recovery;
        for name in &plan.critical_actions {
            self.run_action(name, None, enable_recovery, 0).await?;
        }
        Ok(())
    }

    /// Resolve an action by name.
    fn action(&self, name: &str) -> &'a Action {
        let plan = self.plan;
        plan.action(name).unwrap_or_else(|| {
            panic!(
                "action {name:?} is not defined in plan {:?}",
                self.plan_name
            )
        })
    }

    fn step_started(&self, step: &Step) {
        if let (true, Some(reporter)) = (self.args.show_steps, &self.args.step_reporter) {
            reporter.step_started(step);
        }
    }

    fn step_finished(&self, step: &Step, outcome: StepOutcome, reason: Option<&str>) {
        if let (true, Some(reporter)) = (self.args.show_steps, &self.args.step_reporter) {
            reporter.step_finished(step, outcome, reason);
        }
    }

    async fn save_metric(&self, metric: &Metric) {
        let Some(saver) = &self.metric_saver else {
            return;
        };
        if let Err(err) = saver.save(metric).await {
            tracing::warn!(kind = %metric.kind, error = %err, "Failed to save metric");
        }
    }
}
