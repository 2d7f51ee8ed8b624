//! Plan and action definitions
//!
//! Defines the declarative data the recovery engine walks:
//! - Plans with their ordered critical actions
//! - Actions with conditions, dependencies and recovery chains
//! - Run-control (caching) policies
//! - Per-action metric upload configuration

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Name of an action inside a plan
pub type ActionName = String;

/// Exec timeout applied when an action does not declare one
pub const DEFAULT_EXEC_TIMEOUT: Duration = Duration::from_secs(60);

/// Caching policy of an action result within one attempt-cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunControl {
    /// Cached, but dropped from the cache when the plan starts over
    #[default]
    RerunAfterRecovery,
    /// Cached for the whole run
    RunOnce,
    /// Never cached
    AlwaysRun,
}

impl RunControl {
    /// Whether results under this policy are kept in the cache at all
    #[inline]
    #[must_use]
    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::AlwaysRun)
    }

    /// Whether cached results under this policy are purged on start-over
    #[inline]
    #[must_use]
    pub fn purged_on_start_over(&self) -> bool {
        matches!(self, Self::RerunAfterRecovery)
    }
}

/// When an action metric is handed to the metric sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UploadPolicy {
    /// Always upload
    #[default]
    Default,
    /// Upload only when the action failed
    UploadOnError,
    /// Never upload
    SkipAll,
}

impl UploadPolicy {
    /// Decide whether a metric with the given failure state is uploaded
    #[inline]
    #[must_use]
    pub fn should_upload(&self, failed: bool) -> bool {
        match self {
            Self::Default => true,
            Self::UploadOnError => failed,
            Self::SkipAll => false,
        }
    }
}

/// Metric settings of an action
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Upload policy
    pub upload_policy: UploadPolicy,
    /// Metric kind used instead of `action:<name>` when not empty
    pub custom_kind: String,
}

/// Timeout as written in configuration files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecTimeout {
    /// Whole seconds
    pub seconds: u64,
    /// Sub-second part
    pub nanos: u32,
}

impl ExecTimeout {
    /// Timeout of whole seconds
    #[inline]
    #[must_use]
    pub fn from_secs(seconds: u64) -> Self {
        Self { seconds, nanos: 0 }
    }

    /// Convert to a `Duration`, `None` on overflow
    #[inline]
    #[must_use]
    pub fn as_duration(&self) -> Option<Duration> {
        Duration::from_secs(self.seconds).checked_add(Duration::from_nanos(u64::from(self.nanos)))
    }
}

impl From<Duration> for ExecTimeout {
    fn from(value: Duration) -> Self {
        Self {
            seconds: value.as_secs(),
            nanos: value.subsec_nanos(),
        }
    }
}

/// A named unit of diagnosis or repair
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Action {
    /// Human readable description
    pub docs: Vec<String>,
    /// Gating checks; a failing condition skips this action
    pub conditions: Vec<ActionName>,
    /// Prerequisites; may trigger recovery
    pub dependencies: Vec<ActionName>,
    /// Remedial actions tried in order when the exec fails
    pub recovery_actions: Vec<ActionName>,
    /// Identifier of the operation in the exec registry
    pub exec_name: String,
    /// Raw `key:value` arguments for the exec
    pub exec_args: Vec<String>,
    /// Bound for the exec call
    pub exec_timeout: Option<ExecTimeout>,
    /// Caching policy
    pub run_control: RunControl,
    /// Forgive the failure of this action for its caller
    pub allow_fail_after_recovery: bool,
    /// Metric settings
    pub metrics_config: MetricsConfig,
}

impl Action {
    /// Create an action bound to an exec
    #[inline]
    #[must_use]
    pub fn new(exec_name: impl Into<String>) -> Self {
        Self {
            exec_name: exec_name.into(),
            ..Self::default()
        }
    }

    /// Effective exec timeout, falling back to [`DEFAULT_EXEC_TIMEOUT`]
    #[must_use]
    pub fn exec_timeout(&self) -> Duration {
        let Some(timeout) = self.exec_timeout else {
            return DEFAULT_EXEC_TIMEOUT;
        };
        match timeout.as_duration() {
            Some(duration) if !duration.is_zero() => duration,
            Some(_) => DEFAULT_EXEC_TIMEOUT,
            None => {
                tracing::warn!(
                    seconds = timeout.seconds,
                    nanos = timeout.nanos,
                    "Exec timeout overflows, using the default"
                );
                DEFAULT_EXEC_TIMEOUT
            }
        }
    }

    /// With conditions
    #[inline]
    #[must_use]
    pub fn with_conditions<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ActionName>,
    {
        self.conditions = names.into_iter().map(Into::into).collect();
        self
    }

    /// With dependencies
    #[inline]
    #[must_use]
    pub fn with_dependencies<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ActionName>,
    {
        self.dependencies = names.into_iter().map(Into::into).collect();
        self
    }

    /// With recovery actions
    #[inline]
    #[must_use]
    pub fn with_recoveries<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<ActionName>,
    {
        self.recovery_actions = names.into_iter().map(Into::into).collect();
        self
    }

    /// With exec arguments
    #[inline]
    #[must_use]
    pub fn with_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exec_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// With exec timeout
    #[inline]
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.exec_timeout = Some(timeout.into());
        self
    }

    /// With run control
    #[inline]
    #[must_use]
    pub fn with_run_control(mut self, run_control: RunControl) -> Self {
        self.run_control = run_control;
        self
    }

    /// Mark failures of this action as forgiven for the caller
    #[inline]
    #[must_use]
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail_after_recovery = true;
        self
    }

    /// With metric settings
    #[inline]
    #[must_use]
    pub fn with_metrics(mut self, metrics_config: MetricsConfig) -> Self {
        self.metrics_config = metrics_config;
        self
    }

    /// Every action name this action refers to
    pub fn referenced_names(&self) -> impl Iterator<Item = &ActionName> {
        self.conditions
            .iter()
            .chain(self.dependencies.iter())
            .chain(self.recovery_actions.iter())
    }
}

/// Ordered critical actions plus their action graph
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    /// Entry points, executed in order every attempt
    pub critical_actions: Vec<ActionName>,
    /// All actions reachable from the critical actions
    pub actions: HashMap<ActionName, Action>,
    /// Log a plan failure instead of surfacing it
    pub allow_fail: bool,
}

impl Plan {
    /// Create empty plan
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a critical action name
    #[inline]
    #[must_use]
    pub fn with_critical<S: Into<ActionName>>(mut self, name: S) -> Self {
        self.critical_actions.push(name.into());
        self
    }

    /// Add an action definition
    #[inline]
    #[must_use]
    pub fn with_action<S: Into<ActionName>>(mut self, name: S, action: Action) -> Self {
        self.actions.insert(name.into(), action);
        self
    }

    /// Allow the plan to fail
    #[inline]
    #[must_use]
    pub fn allow_fail(mut self) -> Self {
        self.allow_fail = true;
        self
    }

    /// Look up an action
    #[inline]
    #[must_use]
    pub fn action(&self, name: &str) -> Option<&Action> {
        self.actions.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exec_timeout_defaults_to_sixty_seconds() {
        assert_eq!(Action::new("x").exec_timeout(), Duration::from_secs(60));

        let zero = Action {
            exec_timeout: Some(ExecTimeout::default()),
            ..Action::new("x")
        };
        assert_eq!(zero.exec_timeout(), DEFAULT_EXEC_TIMEOUT);

        let overflow = Action {
            exec_timeout: Some(ExecTimeout {
                seconds: u64::MAX,
                nanos: 1_500_000_000,
            }),
            ..Action::new("x")
        };
        assert_eq!(overflow.exec_timeout(), DEFAULT_EXEC_TIMEOUT);

        let carried = ExecTimeout {
            seconds: 1,
            nanos: 1_500_000_000,
        };
        assert_eq!(carried.as_duration(), Some(Duration::from_millis(2500)));

        let custom = Action::new("x").with_timeout(Duration::from_millis(1500));
        assert_eq!(custom.exec_timeout(), Duration::from_millis(1500));
    }

    #[test]
    fn run_control_cache_rules() {
        assert!(RunControl::RunOnce.is_cacheable());
        assert!(RunControl::RerunAfterRecovery.is_cacheable());
        assert!(!RunControl::AlwaysRun.is_cacheable());

        assert!(RunControl::RerunAfterRecovery.purged_on_start_over());
        assert!(!RunControl::RunOnce.purged_on_start_over());
    }

    #[test]
    fn upload_policy_decisions() {
        assert!(UploadPolicy::Default.should_upload(false));
        assert!(UploadPolicy::Default.should_upload(true));
        assert!(!UploadPolicy::UploadOnError.should_upload(false));
        assert!(UploadPolicy::UploadOnError.should_upload(true));
        assert!(!UploadPolicy::SkipAll.should_upload(true));
    }

    #[test]
    fn referenced_names_cover_all_edges() {
        let action = Action::new("x")
            .with_conditions(["c"])
            .with_dependencies(["d"])
            .with_recoveries(["r1", "r2"]);
        let names: Vec<_> = action.referenced_names().cloned().collect();
        assert_eq!(names, vec!["c", "d", "r1", "r2"]);
    }
}
