//! Recovery Plan - declarative repair plans
//!
//! Data model consumed by the recovery engine:
//! - Plans with ordered critical actions
//! - Actions with conditions, dependencies and recovery chains
//! - Run-control and metric upload policies
//! - JSON/YAML configuration loading
//!
//! # Example
//!
//! ```rust
//! use recovery_plan::{Action, Plan};
//!
//! let plan = Plan::new()
//!     .with_critical("dut_ssh")
//!     .with_action("dut_ssh", Action::new("sample_pass").with_recoveries(["reboot"]))
//!     .with_action("reboot", Action::new("sample_pass"));
//!
//! assert_eq!(plan.critical_actions, vec!["dut_ssh"]);
//! ```

pub mod config;
pub mod error;
pub mod types;

pub use config::{ConfigFormat, Configuration, CLOSE_PLAN};
pub use error::{ConfigError, MissingExec};
pub use types::{
    Action, ActionName, ExecTimeout, MetricsConfig, Plan, RunControl, UploadPolicy,
    DEFAULT_EXEC_TIMEOUT,
};

/// Version of this crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
