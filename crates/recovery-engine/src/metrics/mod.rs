//! Action and plan metrics
//!
//! The engine records one [`Metric`] per evaluated action and per plan and
//! hands it to an optional [`MetricSaver`]. Saver errors are logged by the
//! engine and never change the outcome of a run.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use ulid::Ulid;

/// Identifier shared by every metric of one engine run
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RunId(pub Ulid);

impl RunId {
    /// Generate new run ID
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self(Ulid::new())
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Final status of a metric
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricStatus {
    /// Passed
    Success,
    /// Failed, including forgiven failures
    Fail,
    /// Skipped because a condition failed
    Skip,
}

/// Value of an observation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ObservationValue {
    /// Text
    String(String),
    /// Number
    Number(f64),
}

impl From<&str> for ObservationValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for ObservationValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<f64> for ObservationValue {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<u64> for ObservationValue {
    #[allow(clippy::cast_precision_loss)]
    fn from(value: u64) -> Self {
        Self::Number(value as f64)
    }
}

/// A named value recorded while an action ran
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Name
    pub name: String,
    /// Value
    pub value: ObservationValue,
}

impl Observation {
    /// Create new observation
    #[inline]
    pub fn new(name: impl Into<String>, value: impl Into<ObservationValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

/// Record of one action or plan evaluation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metric {
    /// Run the metric belongs to
    pub run_id: RunId,
    /// `action:<name>`, `plan:<name>` or a custom kind
    pub kind: String,
    /// Device the run targeted
    pub resource_name: String,
    /// When evaluation started
    pub start_time: DateTime<Utc>,
    /// When evaluation finished
    pub stop_time: Option<DateTime<Utc>>,
    /// Final status
    pub status: Option<MetricStatus>,
    /// Failure description
    pub fail_reason: Option<String>,
    /// Observations recorded by execs or the engine
    pub observations: Vec<Observation>,
}

impl Metric {
    /// Start a metric now
    #[must_use]
    pub fn start(run_id: RunId, kind: impl Into<String>, resource_name: impl Into<String>) -> Self {
        Self {
            run_id,
            kind: kind.into(),
            resource_name: resource_name.into(),
            start_time: Utc::now(),
            stop_time: None,
            status: None,
            fail_reason: None,
            observations: Vec::new(),
        }
    }

    /// Close the metric with a status
    pub fn finish(&mut self, status: MetricStatus, fail_reason: Option<String>) {
        self.stop_time = Some(Utc::now());
        self.status = Some(status);
        self.fail_reason = fail_reason;
    }

    /// Whether the metric is closed as failed
    #[inline]
    #[must_use]
    pub fn failed(&self) -> bool {
        self.status == Some(MetricStatus::Fail)
    }

    /// Add an observation
    #[inline]
    pub fn observe(&mut self, observation: Observation) {
        self.observations.push(observation);
    }
}

/// Metric sink errors
#[derive(Debug, thiserror::Error)]
pub enum MetricError {
    /// Sink is unavailable
    #[error("metric sink unavailable: {0}")]
    Unavailable(String),

    /// Metric could not be encoded
    #[error("encode metric: {0}")]
    Encode(#[from] serde_json::Error),

    /// Sink I/O failed
    #[error("metric io: {0}")]
    Io(#[from] std::io::Error),
}

/// Receives finished metrics
#[async_trait::async_trait]
pub trait MetricSaver: Send + Sync {
    /// Persist a finished metric
    async fn save(&self, metric: &Metric) -> Result<(), MetricError>;
}

/// Saver that writes metrics to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogMetricSaver;

#[async_trait::async_trait]
impl MetricSaver for LogMetricSaver {
    async fn save(&self, metric: &Metric) -> Result<(), MetricError> {
        let encoded = serde_json::to_string(metric)?;
        tracing::info!(kind = %metric.kind, metric = %encoded, "Metric");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_sets_status_and_stop_time() {
        let mut metric = Metric::start(RunId::new(), "action:a", "dut-1");
        assert!(metric.stop_time.is_none());
        metric.finish(MetricStatus::Fail, Some("boom".into()));
        assert!(metric.failed());
        assert!(metric.stop_time.unwrap() >= metric.start_time);
        assert_eq!(metric.fail_reason.as_deref(), Some("boom"));
    }

    #[test]
    fn observation_values_serialize_untagged() {
        let text = serde_json::to_string(&Observation::new("restarts", 2u64)).unwrap();
        assert_eq!(text, r#"{"name":"restarts","value":2.0}"#);
        let text = serde_json::to_string(&Observation::new("fw", "R100")).unwrap();
        assert_eq!(text, r#"{"name":"fw","value":"R100"}"#);
    }

    #[tokio::test]
    async fn log_saver_accepts_metrics() {
        let mut metric = Metric::start(RunId::new(), "plan:repair", "dut-1");
        metric.finish(MetricStatus::Success, None);
        assert!(LogMetricSaver.save(&metric).await.is_ok());
    }
}
