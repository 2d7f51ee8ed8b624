//! Exec watchdog
//!
//! Every exec runs on its own task and reports through a one-slot channel.
//! The caller races that channel against the exec timeout and the run's
//! cancellation token.
//!
//! # Leaked execs
//!
//! A timed out or cancelled exec is **not** aborted. Its task keeps running
//! detached until the underlying operation returns, and its result is
//! dropped. Execs block on hardware (SSH sessions, servo commands) that
//! cannot be interrupted safely mid-flight, and some callers depend on the
//! eventual side effects of an abandoned operation. Cancellation is only
//! observed at this select, never inside the exec.

use super::{ExecInfo, ExecRegistry};
use crate::error::ExecError;
use std::sync::Arc;
use tokio::sync::oneshot;

/// Run an exec with its timeout enforced
pub async fn execute_with_watchdog(
    registry: Arc<dyn ExecRegistry>,
    info: ExecInfo,
) -> Result<(), ExecError> {
    let timeout = info.timeout;
    let cancel = info.cancel.clone();
    let exec_name = info.exec_name.clone();
    let (tx, rx) = oneshot::channel();

    // Handle dropped on purpose: the task outlives a timeout.
    let _detached = tokio::spawn(async move {
        let result = registry.execute(info).await;
        // Receiver is gone when the watchdog already gave up.
        let _ = tx.send(result);
    });

    tokio::select! {
        received = rx => received.unwrap_or(Err(ExecError::Lost)),
        () = tokio::time::sleep(timeout) => {
            tracing::warn!(
                exec = %exec_name,
                timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
                "Exec timed out, leaving it running detached"
            );
            Err(ExecError::Timeout(timeout))
        }
        () = cancel.cancelled() => {
            tracing::warn!(exec = %exec_name, "Run cancelled while exec was running");
            Err(ExecError::Cancelled)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exec::{ExecArgs, ExecTable};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::{Duration, Instant};
    use tokio_util::sync::CancellationToken;

    fn info(exec: &str, timeout: Duration, cancel: CancellationToken) -> ExecInfo {
        ExecInfo::new(exec, "action", "dut-1", ExecArgs::default(), timeout, cancel)
    }

    #[tokio::test]
    async fn passes_result_through() {
        let mut table = ExecTable::new();
        table.register_blocking("ok", |_| Ok(()));
        table.register_blocking("bad", |_| Err(ExecError::failed("nope")));
        let registry: Arc<dyn ExecRegistry> = Arc::new(table);

        let cancel = CancellationToken::new();
        assert!(execute_with_watchdog(
            Arc::clone(&registry),
            info("ok", Duration::from_secs(5), cancel.clone())
        )
        .await
        .is_ok());
        assert_eq!(
            execute_with_watchdog(registry, info("bad", Duration::from_secs(5), cancel)).await,
            Err(ExecError::failed("nope"))
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn times_out_and_leaves_exec_running() {
        let finished = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&finished);
        let mut table = ExecTable::new();
        table.register_blocking("slow", move |_| {
            std::thread::sleep(Duration::from_millis(300));
            flag.store(true, Ordering::SeqCst);
            Ok(())
        });

        let started = Instant::now();
        let result = execute_with_watchdog(
            Arc::new(table),
            info("slow", Duration::from_millis(50), CancellationToken::new()),
        )
        .await;
        assert_eq!(result, Err(ExecError::Timeout(Duration::from_millis(50))));
        assert!(started.elapsed() < Duration::from_millis(300));
        assert!(!finished.load(Ordering::SeqCst));

        // The abandoned exec still completes on its own.
        tokio::time::sleep(Duration::from_millis(600)).await;
        assert!(finished.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancellation_stops_waiting() {
        let mut table = ExecTable::new();
        table.register_blocking("slow", |_| {
            std::thread::sleep(Duration::from_millis(200));
            Ok(())
        });
        let cancel = CancellationToken::new();
        cancel.cancel();
        let result = execute_with_watchdog(
            Arc::new(table),
            info("slow", Duration::from_secs(10), cancel),
        )
        .await;
        assert_eq!(result, Err(ExecError::Cancelled));
    }
}
