//! Configuration runner
//!
//! Runs every plan of a [`Configuration`] in order against one device. The
//! first failing plan stops the rest, except the `close` plan, which always
//! runs last when it is listed.

use crate::engine::{self, RunArgs};
use crate::error::EngineError;
use crate::metrics::MetricSaver;
use recovery_plan::{Configuration, CLOSE_PLAN};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Run the plans of a configuration, returning the first failure.
///
/// # Panics
///
/// Panics if a plan refers to an action it does not define.
pub async fn run_configuration(
    cancel: &CancellationToken,
    config: &Configuration,
    args: &RunArgs,
    metric_saver: Option<Arc<dyn MetricSaver>>,
) -> Result<(), EngineError> {
    let mut first_error: Option<EngineError> = None;
    let mut close = None;

    for (name, plan) in config.plans_in_order() {
        if name == CLOSE_PLAN {
            close = Some(plan);
            continue;
        }
        if first_error.is_some() {
            tracing::info!(plan = %name, "Skipping plan after earlier failure");
            continue;
        }
        if let Err(err) = engine::run(cancel, name, plan, args, metric_saver.clone()).await {
            tracing::error!(plan = %name, error = %err, "Plan failed");
            first_error = Some(err);
        }
    }

    if let Some(plan) = close {
        if let Err(err) = engine::run(cancel, CLOSE_PLAN, plan, args, metric_saver).await {
            tracing::error!(plan = CLOSE_PLAN, error = %err, "Close plan failed");
            first_error.get_or_insert(err);
        }
    }

    match first_error {
        Some(err) => Err(err),
        None => {
            tracing::info!(resource = %args.resource_name, "All plans passed");
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::ExecTable;
    use recovery_plan::{Action, Plan};

    fn config(order: &[&str], failing: &[&str]) -> Configuration {
        let mut config = Configuration::default();
        for name in order {
            let exec = if failing.contains(name) { "sample_fail" } else { "sample_pass" };
            let action = format!("{name}_check");
            config.plan_names.push((*name).to_string());
            config.plans.insert(
                (*name).to_string(),
                Plan::new()
                    .with_critical(action.as_str())
                    .with_action(action.as_str(), Action::new(exec)),
            );
        }
        config
    }

    fn args() -> RunArgs {
        RunArgs::new("dut-1", Arc::new(ExecTable::with_builtins()))
    }

    #[tokio::test]
    async fn all_plans_pass() {
        let config = config(&["repair", "close"], &[]);
        run_configuration(&CancellationToken::new(), &config, &args(), None)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn failure_stops_later_plans_but_not_close() {
        let config = config(&["close", "repair", "audit"], &["repair", "close"]);
        let err = run_configuration(&CancellationToken::new(), &config, &args(), None)
            .await
            .unwrap_err();
        // First failure wins over the close plan's failure.
        assert!(err.to_string().starts_with("run plan \"repair\""));
    }

    #[tokio::test]
    async fn close_failure_is_reported() {
        let config = config(&["repair", "close"], &["close"]);
        let err = run_configuration(&CancellationToken::new(), &config, &args(), None)
            .await
            .unwrap_err();
        assert!(err.to_string().starts_with("run plan \"close\""));
    }
}
