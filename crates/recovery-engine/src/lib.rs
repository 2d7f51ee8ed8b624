//! Recovery Engine - diagnose and repair lab devices
//!
//! Walks a declarative [`Plan`](recovery_plan::Plan) of named actions against
//! a device under test:
//! - Recursive action evaluation (conditions, dependencies, exec)
//! - Per-run result caching by run control
//! - Recovery chains with bounded plan start-overs
//! - Exec timeouts enforced by a watchdog over blocking operations
//! - Optional metrics and step reporting
//!
//! # Example
//!
//! ```rust,no_run
//! use recovery_engine::prelude::*;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), EngineError> {
//! let plan = Plan::new()
//!     .with_critical("dut_ssh")
//!     .with_action("dut_ssh", Action::new("sample_pass"));
//! let args = RunArgs::new("dut-1", Arc::new(ExecTable::with_builtins()));
//!
//! run(&CancellationToken::new(), "repair", &plan, &args, None).await?;
//! # Ok(())
//! # }
//! ```

#![warn(unreachable_pub)]

pub mod engine;
pub mod error;
pub mod exec;
pub mod metrics;
pub mod runner;
pub mod steps;

// Re-exports for convenience
pub use engine::{run, RunArgs};
pub use error::{EngineError, ErrorKind, ExecError};
pub use exec::{
    execute_with_watchdog, BlockingExec, Exec, ExecArgs, ExecInfo, ExecRegistry, ExecTable,
};
pub use metrics::{
    LogMetricSaver, Metric, MetricError, MetricSaver, MetricStatus, Observation,
    ObservationValue, RunId,
};
pub use runner::run_configuration;
pub use steps::{LogStepReporter, Step, StepKind, StepOutcome, StepReporter};

/// Prelude module for common imports
pub mod prelude {
    //! Common imports for running plans
    pub use crate::{
        run, run_configuration, EngineError, ExecError, ExecInfo, ExecRegistry, ExecTable,
        LogMetricSaver, LogStepReporter, MetricSaver, RunArgs,
    };
    pub use recovery_plan::{Action, Configuration, Plan, RunControl};
    pub use tokio_util::sync::CancellationToken;
}

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
