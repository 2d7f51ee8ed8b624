//! Testing utilities for the recovery workspace
//!
//! Scripted exec registry, recording sinks and plan fixtures.

#![allow(missing_docs)]

use parking_lot::Mutex;
use recovery_engine::{
    EngineError, ExecError, ExecInfo, ExecRegistry, Metric, MetricError, MetricSaver,
    Observation, RunArgs, Step, StepOutcome, StepReporter,
};
use recovery_plan::{Action, Plan};
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// One scripted exec answer
#[derive(Debug, Clone)]
pub enum Answer {
    Pass,
    Fail(String),
    StartOver,
    Abort,
    /// Pass and record the observation
    Observe(Observation),
}

impl Answer {
    fn result(&self, info: &ExecInfo) -> Result<(), ExecError> {
        match self {
            Self::Pass => Ok(()),
            Self::Fail(msg) => Err(ExecError::failed(msg.clone())),
            Self::StartOver => Err(ExecError::StartOver(info.action_name.clone())),
            Self::Abort => Err(ExecError::Abort(info.action_name.clone())),
            Self::Observe(observation) => {
                info.add_observation(observation.clone());
                Ok(())
            }
        }
    }
}

/// Exec registry answering from per-exec scripts.
///
/// The last answer of a script repeats forever.
#[derive(Debug, Default)]
pub struct ScriptedExecs {
    scripts: Mutex<HashMap<String, Vec<Answer>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedExecs {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn script(self, exec: &str, answers: Vec<Answer>) -> Self {
        self.scripts.lock().insert(exec.to_string(), answers);
        self
    }

    pub fn pass(self, exec: &str) -> Self {
        self.script(exec, vec![Answer::Pass])
    }

    pub fn fail(self, exec: &str) -> Self {
        self.script(exec, vec![Answer::Fail(format!("{exec} failed"))])
    }

    /// Fail `times` times, then pass
    pub fn fail_then_pass(self, exec: &str, times: usize) -> Self {
        let mut answers = vec![Answer::Fail(format!("{exec} failed")); times];
        answers.push(Answer::Pass);
        self.script(exec, answers)
    }

    pub fn calls(&self, exec: &str) -> usize {
        self.calls.lock().iter().filter(|c| *c == exec).count()
    }

    /// Exec names in call order
    pub fn call_log(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait::async_trait]
impl ExecRegistry for ScriptedExecs {
    async fn execute(&self, info: ExecInfo) -> Result<(), ExecError> {
        let call = {
            let mut calls = self.calls.lock();
            let call = calls.iter().filter(|c| **c == info.exec_name).count();
            calls.push(info.exec_name.clone());
            call
        };
        let answer = {
            let scripts = self.scripts.lock();
            let answers = scripts
                .get(&info.exec_name)
                .filter(|a| !a.is_empty())
                .ok_or_else(|| ExecError::NotRegistered(info.exec_name.clone()))?;
            answers[call.min(answers.len() - 1)].clone()
        };
        answer.result(&info)
    }

    fn contains(&self, exec_name: &str) -> bool {
        self.scripts.lock().contains_key(exec_name)
    }
}

/// Metric saver keeping every metric in memory
#[derive(Debug, Default)]
pub struct RecordingMetrics {
    metrics: Mutex<Vec<Metric>>,
}

impl RecordingMetrics {
    pub fn all(&self) -> Vec<Metric> {
        self.metrics.lock().clone()
    }

    pub fn kinds(&self) -> Vec<String> {
        self.metrics.lock().iter().map(|m| m.kind.clone()).collect()
    }

    pub fn find(&self, kind: &str) -> Option<Metric> {
        self.metrics.lock().iter().find(|m| m.kind == kind).cloned()
    }
}

#[async_trait::async_trait]
impl MetricSaver for RecordingMetrics {
    async fn save(&self, metric: &Metric) -> Result<(), MetricError> {
        self.metrics.lock().push(metric.clone());
        Ok(())
    }
}

/// Metric saver that always fails
#[derive(Debug, Default)]
pub struct BrokenMetrics;

#[async_trait::async_trait]
impl MetricSaver for BrokenMetrics {
    async fn save(&self, _metric: &Metric) -> Result<(), MetricError> {
        Err(MetricError::Unavailable("broken sink".into()))
    }
}

/// Finished step as recorded
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedStep {
    pub name: String,
    pub parent: Option<String>,
    pub level: usize,
    pub outcome: StepOutcome,
}

/// Step reporter keeping every notification in memory
#[derive(Debug, Default)]
pub struct RecordingSteps {
    started: Mutex<Vec<String>>,
    finished: Mutex<Vec<FinishedStep>>,
}

impl RecordingSteps {
    pub fn started(&self) -> Vec<String> {
        self.started.lock().clone()
    }

    pub fn finished(&self) -> Vec<FinishedStep> {
        self.finished.lock().clone()
    }

    pub fn outcome(&self, name: &str) -> Option<StepOutcome> {
        self.finished
            .lock()
            .iter()
            .rev()
            .find(|s| s.name == name)
            .map(|s| s.outcome)
    }
}

impl StepReporter for RecordingSteps {
    fn step_started(&self, step: &Step) {
        self.started.lock().push(step.name.clone());
    }

    fn step_finished(&self, step: &Step, outcome: StepOutcome, _reason: Option<&str>) {
        self.finished.lock().push(FinishedStep {
            name: step.name.clone(),
            parent: step.parent.clone(),
            level: step.level,
            outcome,
        });
    }
}

/// Action whose exec has the same name as the action
pub fn action(name: &str) -> Action {
    Action::new(name)
}

/// Plan with the given critical actions, each running its own exec
pub fn simple_plan(critical: &[&str]) -> Plan {
    critical.iter().fold(Plan::new(), |plan, name| {
        plan.with_critical(*name).with_action(*name, action(name))
    })
}

/// Everything a test run needs, wired together
pub struct Harness {
    pub execs: Arc<ScriptedExecs>,
    pub metrics: Arc<RecordingMetrics>,
    pub steps: Arc<RecordingSteps>,
    pub args: RunArgs,
}

impl Harness {
    pub fn new(execs: ScriptedExecs) -> Self {
        let execs = Arc::new(execs);
        let steps = Arc::new(RecordingSteps::default());
        let args = RunArgs::new("dut-1", execs.clone()).with_steps(steps.clone());
        Self {
            execs,
            metrics: Arc::new(RecordingMetrics::default()),
            steps,
            args,
        }
    }

    pub fn without_recovery(mut self) -> Self {
        self.args.enable_recovery = false;
        self
    }

    pub async fn run(&self, plan_name: &str, plan: &Plan) -> Result<(), EngineError> {
        let saver: Arc<dyn MetricSaver> = self.metrics.clone();
        recovery_engine::run(&CancellationToken::new(), plan_name, plan, &self.args, Some(saver))
            .await
    }
}
