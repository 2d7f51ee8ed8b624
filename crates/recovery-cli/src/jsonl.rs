//! JSON-lines metric file

use parking_lot::Mutex;
use recovery_engine::{Metric, MetricError, MetricSaver};
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;

/// Appends one JSON document per metric to a file
#[derive(Debug)]
pub(crate) struct JsonLinesMetricSaver {
    file: Mutex<File>,
}

impl JsonLinesMetricSaver {
    pub(crate) fn open(path: &Path) -> Result<Self, MetricError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

#[async_trait::async_trait]
impl MetricSaver for JsonLinesMetricSaver {
    async fn save(&self, metric: &Metric) -> Result<(), MetricError> {
        let mut line = serde_json::to_vec(metric)?;
        line.push(b'\n');
        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use recovery_engine::{MetricStatus, RunId};

    #[tokio::test]
    async fn appends_one_line_per_metric() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("metrics.jsonl");
        let saver = JsonLinesMetricSaver::open(&path).unwrap();

        let run_id = RunId::new();
        for kind in ["action:a", "plan:repair"] {
            let mut metric = Metric::start(run_id, kind, "dut-1");
            metric.finish(MetricStatus::Success, None);
            saver.save(&metric).await.unwrap();
        }

        let text = std::fs::read_to_string(&path).unwrap();
        let kinds: Vec<String> = text
            .lines()
            .map(|l| serde_json::from_str::<Metric>(l).unwrap().kind)
            .collect();
        assert_eq!(kinds, vec!["action:a", "plan:repair"]);
    }
}
