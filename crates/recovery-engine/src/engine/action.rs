//! Action evaluation: cache check, conditions, dependencies, exec

use super::{ActionOutcome, RecoveryEngine};
use crate::error::{EngineError, ExecError};
use crate::exec::{execute_with_watchdog, ExecArgs, ExecInfo};
use crate::metrics::{Metric, MetricStatus};
use crate::steps::{Step, StepKind, StepOutcome};
use futures::future::BoxFuture;
use recovery_plan::Action;
use std::sync::Arc;

/// Real result of evaluating an action, before forgiveness
enum Evaluation {
    Passed,
    Skipped(EngineError),
    Failed(EngineError),
}

impl<'a> RecoveryEngine<'a> {
    /// Evaluate an action and decide what its caller sees.
    ///
    /// Boxed because conditions, dependencies and recoveries recurse into it.
    pub(crate) fn run_action<'s>(
        &'s mut self,
        name: &'s str,
        parent: Option<&'s str>,
        enable_recovery: bool,
        level: usize,
    ) -> BoxFuture<'s, Result<ActionOutcome, EngineError>> {
        Box::pin(async move {
            let action = self.action(name);
            if let Some(cached) = self.action_results.get(name) {
                return match cached {
                    Ok(()) => {
                        tracing::debug!("Action {:?}: pass (cached)", name);
                        Ok(ActionOutcome::Pass)
                    }
                    Err(err) if action.allow_fail_after_recovery => {
                        tracing::info!(
                            "Action {:?}: fail (cached), forgiven: {}",
                            name,
                            err
                        );
                        Ok(ActionOutcome::Forgiven)
                    }
                    Err(err) => Err(err
                        .clone()
                        .annotate(format!("run action {name:?} (cached)"))),
                };
            }

            let step = Step {
                kind: StepKind::Action,
                name: name.to_string(),
                parent: Some(parent.unwrap_or(self.plan_name).to_string()),
                level,
            };
            self.step_started(&step);
            let metric_kind = if action.metrics_config.custom_kind.is_empty() {
                format!("action:{name}")
            } else {
                action.metrics_config.custom_kind.clone()
            };
            let mut metric = Metric::start(self.run_id, metric_kind, &self.args.resource_name);

            let evaluation = self
                .evaluate(name, action, enable_recovery, level, &mut metric)
                .await;

            let (status, outcome, reason) = match &evaluation {
                Evaluation::Passed => (MetricStatus::Success, StepOutcome::Pass, None),
                Evaluation::Skipped(err) => {
                    (MetricStatus::Skip, StepOutcome::Skip, Some(err.to_string()))
                }
                Evaluation::Failed(err)
                    if action.allow_fail_after_recovery && !err.is_control_signal() =>
                {
                    (MetricStatus::Fail, StepOutcome::Forgiven, Some(err.to_string()))
                }
                Evaluation::Failed(err) => {
                    (MetricStatus::Fail, StepOutcome::Fail, Some(err.to_string()))
                }
            };
            metric.finish(status, reason.clone());
            if action
                .metrics_config
                .upload_policy
                .should_upload(metric.failed())
            {
                self.save_metric(&metric).await;
            }
            self.step_finished(&step, outcome, reason.as_deref());

            match evaluation {
                Evaluation::Passed => Ok(ActionOutcome::Pass),
                Evaluation::Skipped(err) => {
                    tracing::info!("Action {:?}: skipped: {}", name, err);
                    Ok(ActionOutcome::Skip)
                }
                Evaluation::Failed(err) if err.is_control_signal() => {
                    Err(err.annotate(format!("run action {name:?}")))
                }
                Evaluation::Failed(err) if action.allow_fail_after_recovery => {
                    tracing::warn!(
                        "Action {:?}: failed: {}; forgiven as action is allowed to fail",
                        name,
                        err
                    );
                    Ok(ActionOutcome::Forgiven)
                }
                Evaluation::Failed(err) => {
                    tracing::info!("Action {:?}: failed: {}", name, err);
                    Err(err.annotate(format!("run action {name:?}")))
                }
            }
        })
    }

    /// Each action may request a start-over once per run; a repeated request
    /// becomes an ordinary failure.
    fn limit_start_over(&mut self, name: &str, exec_err: ExecError) -> ExecError {
        match exec_err {
            ExecError::StartOver(reason) if !self.start_over_requests.insert(name.to_string()) => {
                tracing::warn!(
                    "Action {:?}: start over requested again, treated as failure",
                    name
                );
                ExecError::failed(format!("start over requested again: {reason}"))
            }
            other => other,
        }
    }

    async fn evaluate(
        &mut self,
        name: &str,
        action: &'a Action,
        enable_recovery: bool,
        level: usize,
        metric: &mut Metric,
    ) -> Evaluation {
        tracing::debug!(level, "Action {:?}: started", name);

        for condition in &action.conditions {
            if let Err(err) = self.run_action(condition, Some(name), false, level + 1).await {
                if err.is_control_signal() {
                    return Evaluation::Failed(err);
                }
                return Evaluation::Skipped(
                    err.annotate(format!("condition {condition:?} failed")),
                );
            }
        }

        for dependency in &action.dependencies {
            if let Err(err) = self
                .run_action(dependency, Some(name), enable_recovery, level + 1)
                .await
            {
                return Evaluation::Failed(
                    err.annotate(format!("dependency {dependency:?}")),
                );
            }
        }

        let info = ExecInfo::new(
            action.exec_name.as_str(),
            name,
            self.args.resource_name.as_str(),
            ExecArgs::parse(&action.exec_args),
            action.exec_timeout(),
            self.cancel.clone(),
        );
        let exec_result = execute_with_watchdog(Arc::clone(&self.args.execs), info.clone()).await;
        for observation in info.observations() {
            metric.observe(observation);
        }

        match exec_result {
            Ok(()) => {
                self.action_results.record(name, action.run_control, Ok(()));
                tracing::debug!("Action {:?}: exec {:?} passed", name, action.exec_name);
                Evaluation::Passed
            }
            Err(exec_err) => {
                let exec_err = self.limit_start_over(name, exec_err);
                let err = EngineError::exec(action.exec_name.as_str(), exec_err);
                if err.is_control_signal() {
                    return Evaluation::Failed(err);
                }
                tracing::info!("Action {:?}: exec failed: {}", name, err);
                if enable_recovery && !action.recovery_actions.is_empty() {
                    if let Err(signal) = self.run_recoveries(name, action).await {
                        return Evaluation::Failed(signal);
                    }
                }
                self.action_results
                    .record(name, action.run_control, Err(err.clone()));
                Evaluation::Failed(err)
            }
        }
    }
}
