//! Error types for plan configuration

use std::path::PathBuf;

/// Configuration loading and checking errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// File could not be read
    #[error("read config {path}: {source}")]
    Io {
        /// Path of the file
        path: PathBuf,
        /// Underlying error
        #[source]
        source: std::io::Error,
    },

    /// JSON document is malformed
    #[error("parse json config: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML document is malformed
    #[error("parse yaml config: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// Format cannot be derived from the file name
    #[error("unsupported config format: {0}")]
    UnsupportedFormat(String),

    /// `plan_names` lists a plan that is not defined
    #[error("plan {0:?} is listed but not defined")]
    UnknownPlan(String),

    /// Actions bound to execs the registry does not know
    #[error("unknown execs: {}", format_missing(.0))]
    UnknownExecs(Vec<MissingExec>),
}

/// An action whose exec is not registered
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingExec {
    /// Plan containing the action
    pub plan: String,
    /// Action name
    pub action: String,
    /// Exec the action is bound to
    pub exec: String,
}

fn format_missing(missing: &[MissingExec]) -> String {
    missing
        .iter()
        .map(|m| format!("{}/{} -> {:?}", m.plan, m.action, m.exec))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_execs_display_lists_every_entry() {
        let err = ConfigError::UnknownExecs(vec![
            MissingExec {
                plan: "repair".into(),
                action: "a".into(),
                exec: "nope".into(),
            },
            MissingExec {
                plan: "close".into(),
                action: "b".into(),
                exec: "gone".into(),
            },
        ]);
        let text = err.to_string();
        assert!(text.contains("repair/a -> \"nope\""));
        assert!(text.contains("close/b -> \"gone\""));
    }
}
