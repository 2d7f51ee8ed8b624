//! Error types for the recovery engine
//!
//! Errors carry a small closed set of kinds the plan loop reacts to:
//! - Ordinary failures
//! - Start-over requests (restart the critical actions)
//! - Abort requests (stop the plan, no retry)
//!
//! The kind survives any number of annotation layers.

use std::time::Duration;

/// Errors produced by exec functions and the exec watchdog
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExecError {
    /// Operation failed
    #[error("{0}")]
    Failed(String),

    /// Operation did not finish within its timeout
    #[error("timed out after {0:?}")]
    Timeout(Duration),

    /// The run was cancelled while waiting for the operation
    #[error("cancelled")]
    Cancelled,

    /// No exec registered under the name
    #[error("exec {0:?} is not registered")]
    NotRegistered(String),

    /// Exec task ended without reporting a result
    #[error("exec task ended without a result")]
    Lost,

    /// Exec asks the plan to restart its critical actions
    #[error("start over requested: {0}")]
    StartOver(String),

    /// Exec asks the plan to stop immediately
    #[error("abort requested: {0}")]
    Abort(String),
}

impl ExecError {
    /// Create an ordinary failure
    #[inline]
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed(message.into())
    }

    /// Control-signal kind of this error
    #[inline]
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::StartOver(_) => ErrorKind::StartOver,
            Self::Abort(_) | Self::Cancelled => ErrorKind::Abort,
            _ => ErrorKind::Failure,
        }
    }
}

/// Control-signal classification of an engine error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Ordinary failure
    Failure,
    /// Restart the plan's critical actions
    StartOver,
    /// Stop the plan now, do not retry
    Abort,
}

/// Main engine error type
#[derive(Debug, Clone, thiserror::Error)]
pub enum EngineError {
    /// Exec of an action failed
    #[error("exec {exec:?}: {source}")]
    Exec {
        /// Exec name
        exec: String,
        /// Underlying exec error
        #[source]
        source: ExecError,
    },

    /// A recovery action succeeded and the plan must start over
    #[error("recovery action {recovery:?} of {action:?} passed, start over")]
    StartOver {
        /// Owner action whose exec failed
        action: String,
        /// Recovery action that passed
        recovery: String,
    },

    /// Annotation layer
    #[error("{context}: {source}")]
    Context {
        /// What was being done
        context: String,
        /// Wrapped error
        #[source]
        source: Box<EngineError>,
    },
}

impl EngineError {
    /// Wrap an exec error
    #[inline]
    pub fn exec(exec: impl Into<String>, source: ExecError) -> Self {
        Self::Exec {
            exec: exec.into(),
            source,
        }
    }

    /// Add an annotation layer
    #[inline]
    #[must_use]
    pub fn annotate(self, context: impl Into<String>) -> Self {
        Self::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Control-signal kind, looking through annotation layers
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Exec { source, .. } => source.kind(),
            Self::StartOver { .. } => ErrorKind::StartOver,
            Self::Context { source, .. } => source.kind(),
        }
    }

    /// Whether the plan must start over
    #[inline]
    #[must_use]
    pub fn is_start_over(&self) -> bool {
        self.kind() == ErrorKind::StartOver
    }

    /// Whether the plan must stop without retry
    #[inline]
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.kind() == ErrorKind::Abort
    }

    /// Start-over and abort errors bypass local recovery and forgiveness
    #[inline]
    #[must_use]
    pub fn is_control_signal(&self) -> bool {
        self.kind() != ErrorKind::Failure
    }

    /// Innermost error
    #[must_use]
    pub fn root(&self) -> &EngineError {
        let mut current = self;
        while let Self::Context { source, .. } = current {
            current = source.as_ref();
        }
        current
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_survives_annotation() {
        let err = EngineError::StartOver {
            action: "a".into(),
            recovery: "r".into(),
        }
        .annotate("run action \"a\"")
        .annotate("run plan \"p\"");
        assert!(err.is_start_over());
        assert!(err.is_control_signal());
        assert!(matches!(err.root(), EngineError::StartOver { .. }));
    }

    #[test]
    fn exec_errors_map_to_kinds() {
        let failure = EngineError::exec("x", ExecError::failed("boom"));
        assert_eq!(failure.kind(), ErrorKind::Failure);
        assert!(!failure.is_control_signal());

        let timeout = EngineError::exec("x", ExecError::Timeout(Duration::from_secs(1)));
        assert_eq!(timeout.kind(), ErrorKind::Failure);

        let abort = EngineError::exec("x", ExecError::Abort("stop".into())).annotate("ctx");
        assert!(abort.is_abort());

        let cancelled = EngineError::exec("x", ExecError::Cancelled);
        assert!(cancelled.is_abort());

        let start_over = EngineError::exec("x", ExecError::StartOver("again".into()));
        assert!(start_over.is_start_over());
    }

    #[test]
    fn display_includes_whole_chain() {
        let err = EngineError::exec("sample_fail", ExecError::failed("boom"))
            .annotate("run action \"a\"");
        assert_eq!(err.to_string(), "run action \"a\": exec \"sample_fail\": boom");
    }
}
