//! Step reporting
//!
//! Observers notified when a plan or action begins and ends. Purely
//! observational: reporters cannot influence the run.

use std::fmt;

/// What a step describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepKind {
    /// A whole plan
    Plan,
    /// A single action
    Action,
}

/// Outcome reported when a step ends
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StepOutcome {
    /// Passed
    Pass,
    /// Failed and surfaced to the caller
    Fail,
    /// Failed but forgiven for the caller
    Forgiven,
    /// Skipped because a condition failed
    Skip,
}

impl fmt::Display for StepOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Forgiven => "fail (allowed)",
            Self::Skip => "skip",
        };
        f.write_str(text)
    }
}

/// A plan or action evaluation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Plan or action
    pub kind: StepKind,
    /// Plan or action name
    pub name: String,
    /// Logical parent (owner action or plan)
    pub parent: Option<String>,
    /// Nesting level
    pub level: usize,
}

/// Receives step notifications
pub trait StepReporter: Send + Sync {
    /// A step began
    fn step_started(&self, step: &Step);

    /// A step ended
    fn step_finished(&self, step: &Step, outcome: StepOutcome, reason: Option<&str>);
}

/// Reporter that renders steps as indented log lines
#[derive(Debug, Clone, Copy, Default)]
pub struct LogStepReporter;

impl LogStepReporter {
    fn indent(level: usize) -> String {
        "  ".repeat(level)
    }
}

impl StepReporter for LogStepReporter {
    fn step_started(&self, step: &Step) {
        tracing::info!(
            "{}{:?} {:?}: started",
            Self::indent(step.level),
            step.kind,
            step.name
        );
    }

    fn step_finished(&self, step: &Step, outcome: StepOutcome, reason: Option<&str>) {
        match reason {
            Some(reason) => tracing::info!(
                "{}{:?} {:?}: {} ({})",
                Self::indent(step.level),
                step.kind,
                step.name,
                outcome,
                reason
            ),
            None => tracing::info!(
                "{}{:?} {:?}: {}",
                Self::indent(step.level),
                step.kind,
                step.name,
                outcome
            ),
        }
    }
}
