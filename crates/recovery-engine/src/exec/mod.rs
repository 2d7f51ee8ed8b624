//! Exec registry
//!
//! Execs are the operations actions run against a device: SSH checks,
//! servo commands, power cycles. The engine never implements them; it
//! looks them up by name through an [`ExecRegistry`] and runs them under
//! the [`watchdog`].

pub mod args;
pub mod builtin;
pub mod watchdog;

pub use args::ExecArgs;
pub use watchdog::execute_with_watchdog;

use crate::error::ExecError;
use crate::metrics::Observation;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Everything an exec gets to know about its invocation
#[derive(Debug, Clone)]
pub struct ExecInfo {
    /// Registered exec name
    pub exec_name: String,
    /// Action the exec runs for
    pub action_name: String,
    /// Device the run targets
    pub resource_name: String,
    /// Parsed arguments
    pub args: ExecArgs,
    /// Timeout the watchdog enforces
    pub timeout: Duration,
    /// Cancellation of the whole run; execs may observe it cooperatively
    pub cancel: CancellationToken,
    observations: Arc<Mutex<Vec<Observation>>>,
}

impl ExecInfo {
    /// Create exec info
    #[must_use]
    pub fn new(
        exec_name: impl Into<String>,
        action_name: impl Into<String>,
        resource_name: impl Into<String>,
        args: ExecArgs,
        timeout: Duration,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            exec_name: exec_name.into(),
            action_name: action_name.into(),
            resource_name: resource_name.into(),
            args,
            timeout,
            cancel,
            observations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Record an observation for the action metric
    pub fn add_observation(&self, observation: Observation) {
        self.observations.lock().push(observation);
    }

    /// Observations recorded so far, by this info or any clone of it
    #[must_use]
    pub fn observations(&self) -> Vec<Observation> {
        self.observations.lock().clone()
    }
}

/// A single operation
#[async_trait::async_trait]
pub trait Exec: Send + Sync {
    /// Run the operation
    async fn run(&self, info: &ExecInfo) -> Result<(), ExecError>;
}

/// Exec backed by a blocking function.
///
/// The function runs on the blocking thread pool so it cannot stall the
/// runtime while it waits on hardware.
pub struct BlockingExec<F> {
    func: Arc<F>,
}

impl<F> BlockingExec<F>
where
    F: Fn(&ExecInfo) -> Result<(), ExecError> + Send + Sync + 'static,
{
    /// Wrap a blocking function
    pub fn new(func: F) -> Self {
        Self {
            func: Arc::new(func),
        }
    }
}

#[async_trait::async_trait]
impl<F> Exec for BlockingExec<F>
where
    F: Fn(&ExecInfo) -> Result<(), ExecError> + Send + Sync + 'static,
{
    async fn run(&self, info: &ExecInfo) -> Result<(), ExecError> {
        let func = Arc::clone(&self.func);
        let info = info.clone();
        tokio::task::spawn_blocking(move || (*func)(&info))
            .await
            .map_err(|e| ExecError::failed(format!("blocking exec panicked: {e}")))?
    }
}

/// Resolves exec names to operations
#[async_trait::async_trait]
pub trait ExecRegistry: Send + Sync {
    /// Run the exec named in `info`
    async fn execute(&self, info: ExecInfo) -> Result<(), ExecError>;

    /// Whether an exec is registered under the name
    fn contains(&self, exec_name: &str) -> bool;
}

/// Name → exec table
#[derive(Default, Clone)]
pub struct ExecTable {
    execs: HashMap<String, Arc<dyn Exec>>,
}

impl ExecTable {
    /// Create empty table
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Table with the sample execs from [`builtin`]
    #[must_use]
    pub fn with_builtins() -> Self {
        let mut table = Self::new();
        builtin::register(&mut table);
        table
    }

    /// Register an exec, replacing any previous one with the same name
    pub fn register(&mut self, name: impl Into<String>, exec: impl Exec + 'static) -> &mut Self {
        let name = name.into();
        if self.execs.insert(name.clone(), Arc::new(exec)).is_some() {
            tracing::warn!(exec = %name, "Exec registered twice, keeping the latest");
        }
        self
    }

    /// Register a blocking function
    pub fn register_blocking<F>(&mut self, name: impl Into<String>, func: F) -> &mut Self
    where
        F: Fn(&ExecInfo) -> Result<(), ExecError> + Send + Sync + 'static,
    {
        self.register(name, BlockingExec::new(func))
    }

    /// Registered names, sorted
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<_> = self.execs.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl std::fmt::Debug for ExecTable {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecTable")
            .field("execs", &self.names())
            .finish()
    }
}

#[async_trait::async_trait]
impl ExecRegistry for ExecTable {
    async fn execute(&self, info: ExecInfo) -> Result<(), ExecError> {
        let exec = self
            .execs
            .get(&info.exec_name)
            .cloned()
            .ok_or_else(|| ExecError::NotRegistered(info.exec_name.clone()))?;
        exec.run(&info).await
    }

    fn contains(&self, exec_name: &str) -> bool {
        self.execs.contains_key(exec_name)
    }
}
