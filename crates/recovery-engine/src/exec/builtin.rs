//! Sample execs
//!
//! Device-independent execs for dry runs of plans and for exercising
//! engine control flow from configuration files.

use super::{ExecInfo, ExecTable};
use crate::error::ExecError;
use crate::metrics::Observation;
use std::time::Duration;

/// Always passes
pub const SAMPLE_PASS: &str = "sample_pass";
/// Always fails; `message:<text>` sets the failure text
pub const SAMPLE_FAIL: &str = "sample_fail";
/// Blocks for `sleep:<seconds>` then passes
pub const SAMPLE_SLEEP: &str = "sample_sleep";
/// Requests a plan start-over
pub const SAMPLE_START_OVER: &str = "sample_start_over";
/// Requests a plan abort
pub const SAMPLE_ABORT: &str = "sample_abort";
/// Records every argument as an observation
pub const SAMPLE_OBSERVATION: &str = "sample_observation";

pub(crate) fn register(table: &mut ExecTable) {
    table
        .register_blocking(SAMPLE_PASS, |_| Ok(()))
        .register_blocking(SAMPLE_FAIL, |info| {
            Err(ExecError::failed(info.args.as_string("message", "sample fail")))
        })
        .register_blocking(SAMPLE_SLEEP, sample_sleep)
        .register_blocking(SAMPLE_START_OVER, |info| {
            Err(ExecError::StartOver(format!(
                "requested by {:?}",
                info.action_name
            )))
        })
        .register_blocking(SAMPLE_ABORT, |info| {
            Err(ExecError::Abort(info.args.as_string("message", "sample abort")))
        })
        .register_blocking(SAMPLE_OBSERVATION, sample_observation);
}

fn sample_sleep(info: &ExecInfo) -> Result<(), ExecError> {
    let duration = info.args.as_duration("sleep", Duration::ZERO);
    tracing::debug!(action = %info.action_name, ?duration, "Sleeping");
    std::thread::sleep(duration);
    Ok(())
}

fn sample_observation(info: &ExecInfo) -> Result<(), ExecError> {
    for (key, value) in info.args.iter() {
        let observation = match value.parse::<f64>() {
            Ok(number) => Observation::new(key, number),
            Err(_) => Observation::new(key, value),
        };
        info.add_observation(observation);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecArgs, ExecRegistry};
    use crate::metrics::ObservationValue;
    use tokio_util::sync::CancellationToken;

    fn info(exec: &str, args: &[&str]) -> ExecInfo {
        ExecInfo::new(
            exec,
            "action",
            "dut-1",
            ExecArgs::parse(args),
            Duration::from_secs(5),
            CancellationToken::new(),
        )
    }

    #[tokio::test]
    async fn builtins_behave_as_named() {
        let table = ExecTable::with_builtins();
        assert!(table.execute(info(SAMPLE_PASS, &[])).await.is_ok());
        assert_eq!(
            table.execute(info(SAMPLE_FAIL, &["message:broken"])).await,
            Err(ExecError::failed("broken"))
        );
        assert!(matches!(
            table.execute(info(SAMPLE_START_OVER, &[])).await,
            Err(ExecError::StartOver(_))
        ));
        assert!(matches!(
            table.execute(info(SAMPLE_ABORT, &[])).await,
            Err(ExecError::Abort(_))
        ));
        assert!(table.execute(info(SAMPLE_SLEEP, &["sleep:0.01"])).await.is_ok());
    }

    #[tokio::test]
    async fn observation_exec_records_args() {
        let table = ExecTable::with_builtins();
        let info = info(SAMPLE_OBSERVATION, &["firmware:R100", "uptime:42"]);
        table.execute(info.clone()).await.unwrap();
        let observations = info.observations();
        assert_eq!(observations.len(), 2);
        assert_eq!(observations[0].value, ObservationValue::String("R100".into()));
        assert_eq!(observations[1].value, ObservationValue::Number(42.0));
    }

    #[test]
    fn all_builtins_registered() {
        let table = ExecTable::with_builtins();
        assert_eq!(
            table.names(),
            vec![
                SAMPLE_ABORT,
                SAMPLE_FAIL,
                SAMPLE_OBSERVATION,
                SAMPLE_PASS,
                SAMPLE_SLEEP,
                SAMPLE_START_OVER
            ]
        );
    }
}
